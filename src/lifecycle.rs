//! Lifecycle signals kept apart from the data queues
//!
//! A [`DoneSignal`] is consumed when fired, so a phase can announce its end
//! at most once. Dropping the signal without firing also wakes the listener,
//! which lets an aborted run stop its background tasks.

use tokio::sync::oneshot;

/// Create a connected signal/listener pair
pub fn done_channel() -> (DoneSignal, DoneListener) {
    let (tx, rx) = oneshot::channel();
    (DoneSignal { tx }, DoneListener { rx, fired: None })
}

/// Sending half; firing consumes it
#[derive(Debug)]
pub struct DoneSignal {
    tx: oneshot::Sender<()>,
}

impl DoneSignal {
    /// Announce completion
    pub fn fire(self) {
        // The listener may already be gone; nothing left to notify then.
        let _ = self.tx.send(());
    }
}

/// Receiving half
#[derive(Debug)]
pub struct DoneListener {
    rx: oneshot::Receiver<()>,
    fired: Option<bool>,
}

impl DoneListener {
    /// Wait for the signal. Returns `true` when it was fired and `false`
    /// when the sending half was dropped. Cancel safe, and may be awaited
    /// again after it resolved.
    pub async fn wait(&mut self) -> bool {
        if let Some(fired) = self.fired {
            return fired;
        }
        let fired = (&mut self.rx).await.is_ok();
        self.fired = Some(fired);
        fired
    }
}
