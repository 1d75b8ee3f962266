//! Per-response completion notification.
//!
//! The connection owns a [`CompletionNotifier`] for every response it writes and
//! reports exactly one terminal outcome: the response was flushed, or the
//! connection failed first. Handlers observe it through [`CompletionWatch`].

use std::future;

use tokio::sync::watch;

use crate::protocol::TransportError;

/// The lifecycle of one response on its connection.
#[derive(Debug, Clone, Default)]
pub enum Completion {
    #[default]
    Pending,
    /// the last byte of the response was flushed
    Finished,
    /// the connection closed or errored before the response was flushed
    Failed(TransportError),
}

impl Completion {
    pub fn is_pending(&self) -> bool {
        matches!(self, Completion::Pending)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }
}

/// Connection side: reports the outcome of one response.
#[derive(Debug)]
pub struct CompletionNotifier {
    tx: watch::Sender<Completion>,
}

/// Handler side: observes the outcome of one response.
#[derive(Debug, Clone)]
pub struct CompletionWatch {
    rx: watch::Receiver<Completion>,
}

/// Creates a linked notifier/watch pair in the `Pending` state.
pub fn completion() -> (CompletionNotifier, CompletionWatch) {
    let (tx, rx) = watch::channel(Completion::Pending);
    (CompletionNotifier { tx }, CompletionWatch { rx })
}

impl CompletionNotifier {
    /// Marks the response as flushed. Returns false if an outcome was already reported.
    pub fn finish(&self) -> bool {
        self.transition(Completion::Finished)
    }

    /// Marks the response as failed. Returns false if an outcome was already reported.
    pub fn fail(&self, error: TransportError) -> bool {
        self.transition(Completion::Failed(error))
    }

    pub fn current(&self) -> Completion {
        self.tx.borrow().clone()
    }

    fn transition(&self, next: Completion) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_pending() {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

impl CompletionWatch {
    pub fn current(&self) -> Completion {
        self.rx.borrow().clone()
    }

    pub fn is_failed(&self) -> bool {
        self.rx.borrow().is_failed()
    }

    /// Resolves with the transport error once the response fails.
    ///
    /// Never resolves when the response finishes normally or the notifier is
    /// dropped without reporting a failure.
    pub async fn failed(mut self) -> TransportError {
        loop {
            let failed = match &*self.rx.borrow_and_update() {
                Completion::Failed(error) => Some(error.clone()),
                _ => None,
            };
            if let Some(error) = failed {
                return error;
            }

            if self.rx.changed().await.is_err() {
                return future::pending().await;
            }
        }
    }

    /// Resolves with the outcome once one is reported.
    ///
    /// Resolves with [`Completion::Pending`] when the notifier is dropped
    /// without reporting anything.
    pub async fn settled(mut self) -> Completion {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if !current.is_pending() {
                return current;
            }

            if self.rx.changed().await.is_err() {
                return Completion::Pending;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_outcome_wins() {
        let (notifier, watch) = completion();
        assert!(watch.current().is_pending());

        assert!(notifier.fail(TransportError::Closed));
        assert!(!notifier.finish());
        assert!(!notifier.fail(TransportError::Closed));

        assert!(watch.is_failed());
        assert!(notifier.current().is_failed());
    }

    #[tokio::test]
    async fn failed_resolves_on_failure() {
        let (notifier, watch) = completion();

        let waiter = tokio::spawn(watch.failed());
        tokio::task::yield_now().await;
        notifier.fail(TransportError::Closed);

        let error = waiter.await.unwrap();
        assert!(matches!(error, TransportError::Closed));
    }

    #[tokio::test]
    async fn failed_stays_pending_after_finish() {
        let (notifier, watch) = completion();
        notifier.finish();

        let result = tokio::time::timeout(Duration::from_millis(20), watch.clone().failed()).await;
        assert!(result.is_err());

        drop(notifier);
        let result = tokio::time::timeout(Duration::from_millis(20), watch.failed()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn settled_reports_the_outcome() {
        let (notifier, watch) = completion();
        let waiter = tokio::spawn(watch.clone().settled());
        tokio::task::yield_now().await;
        notifier.finish();
        assert!(matches!(waiter.await.unwrap(), Completion::Finished));

        assert!(matches!(watch.settled().await, Completion::Finished));

        let (notifier, watch) = completion();
        notifier.fail(TransportError::Closed);
        assert!(watch.settled().await.is_failed());
    }

    #[tokio::test]
    async fn settled_gives_up_when_notifier_dropped() {
        let (notifier, watch) = completion();
        drop(notifier);
        assert!(watch.settled().await.is_pending());
    }
}
