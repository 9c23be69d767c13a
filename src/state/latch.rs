use tokio::sync::oneshot;

/// What resolved a collection phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every present roster member responded
    AllSubmitted,
    /// The phase deadline elapsed
    Deadline,
    /// The session was torn down mid-phase
    Aborted,
}

/// Single-fire latch for one collection phase.
///
/// The first `fire` wins and wakes the waiting orchestrator; every later call
/// is a no-op and reports the trigger that actually won.
#[derive(Debug, Default)]
pub struct PhaseLatch {
    tx: Option<oneshot::Sender<Trigger>>,
    fired: Option<Trigger>,
}

impl PhaseLatch {
    pub fn arm() -> (Self, oneshot::Receiver<Trigger>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Some(tx),
                fired: None,
            },
            rx,
        )
    }

    /// Returns true if this call resolved the phase
    pub fn fire(&mut self, trigger: Trigger) -> bool {
        match self.tx.take() {
            Some(tx) => {
                self.fired = Some(trigger);
                // Receiver gone means the orchestrator already stopped waiting
                let _ = tx.send(trigger);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.tx.is_some()
    }

    /// The trigger that resolved the phase, if any
    pub fn fired(&self) -> Option<Trigger> {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_fire_wins() {
        let (mut latch, rx) = PhaseLatch::arm();
        assert!(latch.is_armed());

        assert!(latch.fire(Trigger::AllSubmitted));
        assert!(!latch.fire(Trigger::Deadline));
        assert!(!latch.is_armed());
        assert_eq!(latch.fired(), Some(Trigger::AllSubmitted));
        assert_eq!(rx.await.unwrap(), Trigger::AllSubmitted);
    }

    #[test]
    fn test_unarmed_latch_never_fires() {
        let mut latch = PhaseLatch::default();
        assert!(!latch.fire(Trigger::Deadline));
        assert_eq!(latch.fired(), None);
    }

    #[test]
    fn test_fire_after_receiver_dropped() {
        let (mut latch, rx) = PhaseLatch::arm();
        drop(rx);
        assert!(latch.fire(Trigger::Aborted));
        assert_eq!(latch.fired(), Some(Trigger::Aborted));
    }
}
