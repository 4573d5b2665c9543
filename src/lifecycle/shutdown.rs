//! Stop signal for background tasks.

use tokio::sync::watch;

/// One-shot, level-triggered stop signal.
///
/// Late subscribers still observe a signal sent before they subscribed, and
/// dropping the last `Shutdown` handle counts as a stop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Listeners still attached.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once the signal is raised or every sender is gone.
    pub async fn recv(&mut self) {
        // Err means the sender was dropped, which also stops the task.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}
