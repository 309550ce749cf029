use docscope_core::ErrorCode;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(5_000);

/// A batch-level message (rejected format, unreadable file), shown until it expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip)]
    created: Instant,
}

impl Notice {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            created: Instant::now(),
        }
    }

    pub fn unsupported(name: &str) -> Self {
        Self::new(ErrorCode::UnsupportedFormat, format!("Unsupported format: {name}"))
    }

    pub fn failed(name: &str, detail: &str) -> Self {
        Self::new(ErrorCode::ReadFailed, format!("Failed to process {name}: {detail}"))
    }
}

#[derive(Debug)]
pub struct NoticeBoard {
    ttl: Duration,
    items: Vec<Notice>,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_TTL)
    }
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, notice: Notice) {
        self.items.push(notice);
    }

    /// Drop expired notices and return the rest, oldest first.
    pub fn active(&mut self) -> &[Notice] {
        let ttl = self.ttl;
        self.items.retain(|n| n.created.elapsed() < ttl);
        &self.items
    }

    pub fn dismiss_all(&mut self) {
        self.items.clear();
    }
}
