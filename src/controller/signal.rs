//! One-shot change notification.
//!
//! A [`ChangeSignal`] belongs to exactly one snapshot and fires once, when that
//! snapshot is superseded. [`ChangeToken`]s are cheap handles readers wait on.

use tokio::sync::watch;

/// Owner side of the notification.
#[derive(Debug)]
pub struct ChangeSignal {
    tx: watch::Sender<bool>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns false if it had already fired.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn token(&self) -> ChangeToken {
        ChangeToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side: resolves once the owning snapshot has been superseded.
#[derive(Debug, Clone)]
pub struct ChangeToken {
    rx: watch::Receiver<bool>,
}

impl ChangeToken {
    pub fn has_changed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal fires. Returns immediately if it already has.
    pub async fn changed(&mut self) {
        // A dropped sender means the snapshot is gone; there is nothing left to wait for.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}
