use crate::{MockError, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

type Outcome = std::result::Result<(), String>;

/// Signals the end of an asynchronous test
///
/// Clones share the same signal, so one clone can go into each callback.
/// Only the first `done` or `fail` counts.
#[derive(Debug, Clone)]
pub struct Done {
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl Done {
    pub fn done(&self) {
        self.signal(Ok(()));
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.signal(Err(reason.into()));
    }

    pub fn is_signalled(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn signal(&self, outcome: Outcome) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(sender) => {
                let _ = sender.send(outcome);
            }
            None => debug!(?outcome, "Completion already signalled"),
        }
    }
}

/// Waiting side of a [`Done`] handle
#[derive(Debug)]
pub struct Completion {
    receiver: oneshot::Receiver<Outcome>,
}

impl Completion {
    /// Waits for the test to signal, failing after `limit`
    pub async fn wait(self, limit: Duration) -> Result<()> {
        match timeout(limit, self.receiver).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(MockError::Failed(reason)),
            Ok(Err(_)) => Err(MockError::Failed(
                "every Done handle was dropped without signalling".to_string(),
            )),
            Err(_) => Err(MockError::Timeout(format!(
                "test did not signal completion within {limit:?}"
            ))),
        }
    }
}

/// Creates a linked completion pair
pub fn done() -> (Done, Completion) {
    let (sender, receiver) = oneshot::channel();
    (
        Done {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        Completion { receiver },
    )
}
