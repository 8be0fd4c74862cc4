//! Fulfillment queue and the worker that drains it.
//!
//! Oracle callbacks are delivered at least once and possibly concurrently.
//! They are pushed onto a bounded queue and applied one at a time by a single
//! worker; the fulfillment handler itself is idempotent, so a redelivered
//! answer settles to `AlreadyFulfilled`. An accepted answer is not
//! redelivered, so the worker retries conflicts and store failures itself.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nordle_core::clock::Clock;
use nordle_core::error::DomainError;
use nordle_core::repository::EventRepository;
use nordle_core::rng::DeterministicRng;
use nordle_registry::application::command_handlers::{self, FulfillmentResult};
use nordle_registry::domain::commands::FulfillRequest;
use nordle_registry::domain::word_bank::WordBank;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

/// Default bound on queued fulfillments.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Times the worker applies one answer before giving up on it.
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Delay before the first retry; doubles on each further attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Producer side of the fulfillment queue.
#[derive(Debug, Clone)]
pub struct FulfillmentQueue {
    tx: mpsc::Sender<FulfillRequest>,
}

impl FulfillmentQueue {
    /// Creates a queue bounded at `capacity` and returns its receiving end.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FulfillRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues a fulfillment without waiting.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the queue is full or the
    /// worker has stopped. The oracle is expected to redeliver.
    pub fn enqueue(&self, command: FulfillRequest) -> Result<(), DomainError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(command) => DomainError::Infrastructure(format!(
                "fulfillment queue full; request {} not accepted",
                command.request_id
            )),
            mpsc::error::TrySendError::Closed(command) => DomainError::Infrastructure(format!(
                "fulfillment worker stopped; request {} not accepted",
                command.request_id
            )),
        })
    }

    /// Number of fulfillments that can be enqueued before the queue is full.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Applies queued fulfillments to their collections.
pub struct FulfillmentWorker {
    clock: Arc<dyn Clock>,
    bank: Arc<dyn WordBank>,
    rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    repo: Arc<dyn EventRepository>,
    retry_backoff: Duration,
}

impl FulfillmentWorker {
    /// Creates a worker over the shared registry dependencies.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        bank: Arc<dyn WordBank>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
        repo: Arc<dyn EventRepository>,
    ) -> Self {
        Self {
            clock,
            bank,
            rng,
            repo,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Overrides the delay before the first retry.
    #[must_use]
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Applies one fulfillment.
    ///
    /// # Errors
    ///
    /// Propagates the error from the fulfillment handler.
    #[instrument(
        skip(self, command),
        fields(
            collection_id = %command.collection_id,
            request_id = %command.request_id,
            correlation_id = %command.correlation_id,
        )
    )]
    pub async fn process(&self, command: &FulfillRequest) -> Result<FulfillmentResult, DomainError> {
        command_handlers::handle_fulfill_request(
            command,
            self.clock.as_ref(),
            self.bank.as_ref(),
            &self.rng,
            self.repo.as_ref(),
        )
        .await
    }

    /// Applies one fulfillment, retrying with exponential backoff while the
    /// failure is a lost race or a store error, up to
    /// [`MAX_DELIVERY_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// Returns the last error once it is not retryable or attempts run out.
    pub async fn deliver(&self, command: &FulfillRequest) -> Result<FulfillmentResult, DomainError> {
        let mut attempt = 1;
        let mut delay = self.retry_backoff;
        loop {
            match self.process(command).await {
                Err(e) if is_retryable(&e) && attempt < MAX_DELIVERY_ATTEMPTS => {
                    warn!(
                        request_id = %command.request_id,
                        attempt,
                        error = %e,
                        "fulfillment failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Drains `rx` until every producer is dropped. Returns the number of
    /// fulfillments that changed state.
    pub async fn run(self, mut rx: mpsc::Receiver<FulfillRequest>) -> usize {
        info!("fulfillment worker started");
        let mut settled = 0;
        while let Some(command) = rx.recv().await {
            match self.deliver(&command).await {
                Ok(result) if !result.outcome.is_noop() => settled += 1,
                Ok(_) | Err(DomainError::UnknownRequest(_)) => {}
                Err(e) => {
                    error!(request_id = %command.request_id, error = %e, "fulfillment abandoned; request stays pending");
                }
            }
        }
        info!(settled, "fulfillment worker stopped");
        settled
    }

    /// Spawns [`FulfillmentWorker::run`] on the current runtime.
    #[must_use]
    pub fn spawn(self, rx: mpsc::Receiver<FulfillRequest>) -> JoinHandle<usize> {
        tokio::spawn(self.run(rx))
    }
}

fn is_retryable(err: &DomainError) -> bool {
    err.is_transient() || matches!(err, DomainError::Infrastructure(_))
}

#[cfg(test)]
mod tests {
    use nordle_core::ids::{Address, RequestId, TokenId};
    use nordle_event_store::memory::InMemoryEventRepository;
    use nordle_registry::application::command_handlers::{
        MAX_COMMAND_ATTEMPTS, handle_open_collection, handle_request_create,
    };
    use nordle_registry::application::query_handlers;
    use nordle_registry::domain::commands::{OpenCollection, RequestCreate};
    use nordle_registry::domain::fulfillment::OracleAnswer;
    use nordle_registry::domain::ledger::RequestStatus;
    use nordle_registry::domain::word_bank::StaticWordBank;
    use nordle_test_support::{
        ConflictingEventRepository, FailingEventRepository, FixedClock, MockRng,
        SequentialOracleGateway, fixed_now,
    };
    use uuid::Uuid;

    use super::*;

    struct Harness {
        collection_id: Uuid,
        repo: Arc<InMemoryEventRepository>,
        oracle: SequentialOracleGateway,
    }

    impl Harness {
        async fn new() -> Self {
            let harness = Self {
                collection_id: Uuid::new_v4(),
                repo: Arc::new(InMemoryEventRepository::new()),
                oracle: SequentialOracleGateway::new(),
            };
            handle_open_collection(
                &OpenCollection {
                    correlation_id: Uuid::new_v4(),
                    collection_id: harness.collection_id,
                    name: Some("genesis".into()),
                },
                &FixedClock(fixed_now()),
                harness.repo.as_ref(),
            )
            .await
            .unwrap();
            harness
        }

        async fn create(&self) -> RequestId {
            handle_request_create(
                &RequestCreate {
                    correlation_id: Uuid::new_v4(),
                    collection_id: self.collection_id,
                    requester: Address::parse("0xa11ce").unwrap(),
                    suggested_word: None,
                    fee: 0,
                },
                &FixedClock(fixed_now()),
                &StaticWordBank::builtin(),
                &self.oracle,
                self.repo.as_ref(),
            )
            .await
            .unwrap()
            .request_id
        }

        fn fulfill(&self, request_id: &RequestId, word: &str) -> FulfillRequest {
            FulfillRequest {
                correlation_id: Uuid::new_v4(),
                collection_id: self.collection_id,
                request_id: request_id.clone(),
                answer: OracleAnswer::word(word),
            }
        }

        fn worker(&self) -> FulfillmentWorker {
            self.worker_over(self.repo.clone())
        }

        fn worker_over(&self, repo: Arc<dyn EventRepository>) -> FulfillmentWorker {
            let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(MockRng));
            FulfillmentWorker::new(
                Arc::new(FixedClock(fixed_now())),
                Arc::new(StaticWordBank::builtin()),
                rng,
                repo,
            )
            .with_retry_backoff(Duration::ZERO)
        }
    }

    #[tokio::test]
    async fn test_worker_applies_queued_fulfillments() {
        // Arrange
        let harness = Harness::new().await;
        let first = harness.create().await;
        let second = harness.create().await;
        let (queue, rx) = FulfillmentQueue::channel(8);
        queue.enqueue(harness.fulfill(&first, "unicorn")).unwrap();
        queue.enqueue(harness.fulfill(&second, "rainbow")).unwrap();
        drop(queue);

        // Act
        let settled = harness.worker().spawn(rx).await.unwrap();

        // Assert
        assert_eq!(settled, 2);
        let token = query_handlers::get_token(harness.collection_id, TokenId(1), harness.repo.as_ref())
            .await
            .unwrap();
        assert_eq!(token.word.as_str(), "rainbow");
        assert!(
            query_handlers::list_pending_requests(harness.collection_id, harness.repo.as_ref())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_redelivered_answer_is_a_noop() {
        // Arrange
        let harness = Harness::new().await;
        let request_id = harness.create().await;
        let (queue, rx) = FulfillmentQueue::channel(8);
        queue.enqueue(harness.fulfill(&request_id, "unicorn")).unwrap();
        queue.enqueue(harness.fulfill(&request_id, "dragon")).unwrap();
        drop(queue);

        // Act
        let settled = harness.worker().run(rx).await;

        // Assert
        assert_eq!(settled, 1);
        let request = query_handlers::get_request(
            harness.collection_id,
            &request_id,
            harness.repo.as_ref(),
        )
        .await
        .unwrap();
        assert_eq!(request.status, RequestStatus::Fulfilled);
        assert_eq!(harness.repo.stream_len(harness.collection_id).unwrap(), 4);
    }

    #[tokio::test]
    async fn test_worker_retries_after_exhausted_append_races() {
        // Arrange
        let harness = Harness::new().await;
        let request_id = harness.create().await;
        let racing = Arc::new(ConflictingEventRepository::new(
            harness.repo.clone(),
            MAX_COMMAND_ATTEMPTS,
        ));
        let (queue, rx) = FulfillmentQueue::channel(8);
        queue.enqueue(harness.fulfill(&request_id, "unicorn")).unwrap();
        drop(queue);

        // Act
        let settled = harness.worker_over(racing.clone()).run(rx).await;

        // Assert
        assert_eq!(settled, 1);
        assert_eq!(racing.rejected(), MAX_COMMAND_ATTEMPTS);
        let request = query_handlers::get_request(
            harness.collection_id,
            &request_id,
            harness.repo.as_ref(),
        )
        .await
        .unwrap();
        assert_eq!(request.status, RequestStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_worker_gives_up_on_persistent_store_failure() {
        let harness = Harness::new().await;
        let command = harness.fulfill(&RequestId::new("req-1"), "unicorn");

        let result = harness
            .worker_over(Arc::new(FailingEventRepository))
            .deliver(&command)
            .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_unknown_request_does_not_stop_the_worker() {
        let harness = Harness::new().await;
        let request_id = harness.create().await;
        let (queue, rx) = FulfillmentQueue::channel(8);
        queue
            .enqueue(harness.fulfill(&RequestId::new("req-orphan"), "dragon"))
            .unwrap();
        queue.enqueue(harness.fulfill(&request_id, "unicorn")).unwrap();
        drop(queue);

        let settled = harness.worker().run(rx).await;

        assert_eq!(settled, 1);
    }

    #[tokio::test]
    async fn test_enqueue_reports_full_queue() {
        let harness = Harness::new().await;
        let (queue, _rx) = FulfillmentQueue::channel(1);
        queue
            .enqueue(harness.fulfill(&RequestId::new("req-1"), "unicorn"))
            .unwrap();

        let result = queue.enqueue(harness.fulfill(&RequestId::new("req-2"), "rainbow"));

        assert_eq!(queue.remaining_capacity(), 0);
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stops_fails() {
        let harness = Harness::new().await;
        let (queue, rx) = FulfillmentQueue::channel(4);
        drop(rx);

        let result = queue.enqueue(harness.fulfill(&RequestId::new("req-1"), "unicorn"));

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
