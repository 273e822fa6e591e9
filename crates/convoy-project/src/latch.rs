//! One-shot completion signal.
//!
//! A [`Latch`] starts armed and is released once. Any number of tasks can
//! wait on it, before or after the release. A latch never re-arms: a new
//! round allocates a fresh one, so waiters of an old round are never
//! confused with the new one.

use tokio::sync::watch;

/// One-shot release signal shared between a service task and its waiters.
#[derive(Debug)]
pub struct Latch {
    tx: watch::Sender<bool>,
}

impl Latch {
    /// Creates an armed latch.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Releases the latch. Returns `false` if it was already released.
    pub fn release(&self) -> bool {
        self.tx.send_if_modified(|released| {
            if *released {
                false
            } else {
                *released = true;
                true
            }
        })
    }

    /// Returns whether the latch has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the latch is released.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|released| *released).await;
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn releases_once() {
        let latch = Latch::new();
        assert!(!latch.is_released());
        assert!(latch.release());
        assert!(!latch.release());
        assert!(latch.is_released());
    }

    #[tokio::test]
    async fn waiters_before_and_after_release() {
        let latch = Arc::new(Latch::new());

        let early = {
            let latch = Arc::clone(&latch);
            tokio::spawn(async move { latch.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!early.is_finished());

        let _ = latch.release();
        early.await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), latch.wait())
            .await
            .unwrap();
    }
}
