//! Quiet-period debouncing over a watch channel: only the latest value after the input goes
//! quiet is delivered.

use std::time::Duration;
use tokio::sync::watch;

pub struct DebounceInput<T> {
    tx: watch::Sender<T>,
}

impl<T> DebounceInput<T> {
    pub fn push(&self, value: T) {
        // A closed channel only means nobody listens any more.
        let _ = self.tx.send(value);
    }
}

pub struct Debounced<T> {
    rx: watch::Receiver<T>,
    quiet: Duration,
}

/// `initial` is treated as already delivered.
pub fn debounce<T>(initial: T, quiet: Duration) -> (DebounceInput<T>, Debounced<T>) {
    let (tx, rx) = watch::channel(initial);
    (DebounceInput { tx }, Debounced { rx, quiet })
}

impl<T: Clone> Debounced<T> {
    /// Wait for the next change, then until no further change arrives for the quiet period.
    ///
    /// Returns `None` once the input is dropped with nothing left to deliver. A drop during
    /// the quiet period settles immediately.
    pub async fn settled(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.quiet) => break,
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Some(self.rx.borrow_and_update().clone())
    }
}
