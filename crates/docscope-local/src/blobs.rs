//! Session-owned storage for original file bytes.
//!
//! The store hands out one [`ResourceHandle`] per blob. The handle is not `Clone` and
//! [`BlobStore::release`] consumes it, so a blob can be released at most once. Renderers
//! read bytes through a [`BlobLease`], which keeps the bytes alive on its own; a lease taken
//! before release stays valid, and no lease can be taken after it.

use docscope_core::{BlobId, Error, Result};
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

#[derive(Debug, PartialEq, Eq)]
#[must_use = "a resource handle must be released through its BlobStore"]
pub struct ResourceHandle {
    id: BlobId,
}

impl ResourceHandle {
    pub fn id(&self) -> BlobId {
        self.id
    }
}

#[derive(Debug, Clone)]
pub struct BlobLease {
    id: BlobId,
    bytes: Arc<[u8]>,
}

impl BlobLease {
    pub fn id(&self) -> BlobId {
        self.id
    }
}

impl Deref for BlobLease {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

#[derive(Debug, Default)]
pub struct BlobStore {
    next: u64,
    live: HashMap<BlobId, Arc<[u8]>>,
    acquired: u64,
    released: u64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bytes: Vec<u8>) -> ResourceHandle {
        self.next += 1;
        let id = BlobId(self.next);
        self.live.insert(id, Arc::from(bytes));
        self.acquired += 1;
        ResourceHandle { id }
    }

    pub fn lease(&self, id: BlobId) -> Result<BlobLease> {
        self.live
            .get(&id)
            .map(|bytes| BlobLease {
                id,
                bytes: Arc::clone(bytes),
            })
            .ok_or_else(|| Error::ResourceReleased(id.to_string()))
    }

    pub fn release(&mut self, handle: ResourceHandle) -> Result<()> {
        let bytes = self
            .live
            .remove(&handle.id)
            .ok_or_else(|| Error::ResourceReleased(handle.id.to_string()))?;
        let outstanding = Arc::strong_count(&bytes) - 1;
        if outstanding > 0 {
            tracing::warn!(blob = %handle.id, outstanding, "blob released with live leases");
        }
        self.released += 1;
        Ok(())
    }

    pub fn contains(&self, id: BlobId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    pub fn released(&self) -> u64 {
        self.released
    }
}
