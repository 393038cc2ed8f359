//! Request chain engine.
//!
//! A chain sends one request, hands the response to a continuation step, and
//! keeps going with replacement responses until the step declares a response
//! final or cancels. The loop is iterative, so chain length is bounded only by
//! the continuation step.
//!
//! Three ways to consume a chain:
//!
//! - [`RequestChain::start_async`] - spawn and get a completion callback
//! - [`RequestChain::get_response_with_timeout`] - block the calling thread
//! - [`RequestChain::execute`] - await it from async code
//!
//! Only one response is ever handed to the caller, through
//! [`RequestChain::take_response`]. Every other response is released as soon
//! as the chain moves past it.

use serde::{Deserialize, Serialize};
use ssochain_core::{ChainRequest, ChainResponse, ContinuationDecision, CoreError, DecisionKind, Transport};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChainError;
use crate::gate::{InteractionGate, InteractionGateBuilder};
use crate::interaction::InteractionHandler;
use crate::step::{ContinuationStep, FinalStep};

/// Factory producing the initial request when the chain starts.
pub type RequestFactory = Box<dyn FnOnce() -> Result<ChainRequest, CoreError> + Send>;

// ============================================================================
// Wait / Timeout Policy
// ============================================================================

/// How long a blocking caller waits for a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wait {
    /// Wait until the chain completes.
    #[default]
    Infinite,
    /// Wait at most this long.
    For(Duration),
}

impl Wait {
    /// Builds a wait from milliseconds; negative values mean infinite.
    pub fn from_millis(millis: i64) -> Self {
        u64::try_from(millis).map_or(Self::Infinite, |ms| Self::For(Duration::from_millis(ms)))
    }
}

impl From<Duration> for Wait {
    fn from(duration: Duration) -> Self {
        Self::For(duration)
    }
}

impl From<Option<Duration>> for Wait {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Infinite, Self::For)
    }
}

/// What happens to a chain when a blocking wait times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Abort the chain. In-flight requests are dropped and any held response
    /// is released.
    #[default]
    CancelChain,
    /// Let the chain run to completion in the background. Its outcome is
    /// discarded; a late final response is released rather than stored.
    Detach,
}

// ============================================================================
// Completion / Hop Records
// ============================================================================

/// How a chain that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainCompletion {
    /// A final response is available.
    Completed,
    /// The interaction handler canceled; no response is available.
    Canceled,
}

impl ChainCompletion {
    /// Returns true for [`ChainCompletion::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Record of one hop.
#[derive(Debug, Clone)]
pub struct HopRecord {
    /// 1-based hop number.
    pub index: usize,
    /// Status of the hop's response.
    pub status: u16,
    /// Resolved URL of the hop's response.
    pub resolved_url: String,
    /// What the continuation step decided.
    pub decision: DecisionKind,
    /// Time since the chain started when the decision was made.
    pub elapsed: Duration,
}

// ============================================================================
// Chain Trait
// ============================================================================

/// Surface shared by every kind of chain.
pub trait Chain: Clone + Send + Sync + 'static {
    /// Starts the chain without blocking.
    ///
    /// `on_complete(chain, canceled)` runs exactly once when the chain ends
    /// with a final response or a cancellation. Failures end the returned
    /// task with an error instead.
    fn start_async<F>(&self, on_complete: F) -> Result<JoinHandle<Result<(), ChainError>>, ChainError>
    where
        F: FnOnce(&Self, bool) + Send + 'static;

    /// Runs the chain and blocks the calling thread until it ends or `wait`
    /// elapses.
    ///
    /// On success the final response is available from
    /// [`take_response`](Chain::take_response).
    fn get_response_with_timeout(&self, wait: Wait) -> Result<(), ChainError>;

    /// Takes the final response. `None` before successful completion.
    fn take_response(&self) -> Option<ChainResponse>;
}

// ============================================================================
// Request Chain
// ============================================================================

enum RequestSource {
    Request(Box<ChainRequest>),
    Factory(RequestFactory),
}

struct ChainInner {
    transport: Arc<dyn Transport>,
    step: Arc<dyn ContinuationStep>,
    source: Mutex<Option<RequestSource>>,
    runtime: Option<Handle>,
    timeout_policy: TimeoutPolicy,
    response: Mutex<Option<ChainResponse>>,
    hops: Mutex<Vec<HopRecord>>,
    abandoned: AtomicBool,
}

/// Handle to a request chain.
///
/// Cloning the handle shares the chain. A chain runs once.
#[derive(Clone)]
pub struct RequestChain {
    inner: Arc<ChainInner>,
}

const RUNTIME_THREAD_WAIT: &str = "Blocking wait called from a thread owned by the async runtime \
     (a worker or a spawn_blocking thread); use execute().await, or wait from a std::thread";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RequestChain {
    /// Creates a builder using `transport` for every hop.
    pub fn builder(transport: Arc<dyn Transport>) -> RequestChainBuilder {
        RequestChainBuilder::new(transport)
    }

    /// Runs the chain to completion on the current task.
    pub async fn execute(&self) -> Result<ChainCompletion, ChainError> {
        let request = self.take_request()?;
        self.run(request).await
    }

    /// Starts the chain without blocking. See [`Chain::start_async`].
    pub fn start_async<F>(&self, on_complete: F) -> Result<JoinHandle<Result<(), ChainError>>, ChainError>
    where
        F: FnOnce(&RequestChain, bool) + Send + 'static,
    {
        let handle = self.runtime_handle()?;
        let request = self.take_request()?;
        let chain = self.clone();

        Ok(handle.spawn(async move {
            let completion = chain.run(request).await?;
            on_complete(&chain, completion.is_canceled());
            Ok(())
        }))
    }

    /// Blocks until the chain ends or `wait` elapses. See
    /// [`Chain::get_response_with_timeout`].
    ///
    /// Must be called from a thread the runtime does not own. Runtime worker
    /// threads and `spawn_blocking` threads are both refused; use
    /// [`execute`](Self::execute) there, or wait from a `std::thread`.
    pub fn get_response_with_timeout(&self, wait: impl Into<Wait>) -> Result<(), ChainError> {
        let wait = wait.into();
        if Handle::try_current().is_ok() {
            return Err(ChainError::Configuration(RUNTIME_THREAD_WAIT.to_string()));
        }

        let handle = self.runtime_handle()?;
        let request = self.take_request()?;
        let chain = self.clone();
        let (done_tx, done_rx) = mpsc::sync_channel(1);

        let task = handle.spawn(async move {
            let result = chain.run(request).await;
            // The waiter may already have timed out.
            let _ = done_tx.send(result);
        });

        let result = match wait {
            Wait::Infinite => done_rx.recv().map_err(|_| task_ended()),
            Wait::For(timeout) => match done_rx.recv_timeout(timeout) {
                Ok(result) => Ok(result),
                Err(RecvTimeoutError::Timeout) => {
                    self.abandon(&task, timeout);
                    return Err(ChainError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => Err(task_ended()),
            },
        };

        match result?? {
            ChainCompletion::Completed => Ok(()),
            ChainCompletion::Canceled => Err(ChainError::Canceled),
        }
    }

    /// Takes the final response. `None` before successful completion.
    pub fn take_response(&self) -> Option<ChainResponse> {
        lock(&self.inner.response).take()
    }

    /// Returns true while a final response is waiting to be taken.
    pub fn has_response(&self) -> bool {
        lock(&self.inner.response).is_some()
    }

    /// Hops of the current or last run.
    pub fn hops(&self) -> Vec<HopRecord> {
        lock(&self.inner.hops).clone()
    }

    /// Timeout policy used by blocking waits.
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.inner.timeout_policy
    }

    fn runtime_handle(&self) -> Result<Handle, ChainError> {
        self.inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| {
                ChainError::Configuration(
                    "No tokio runtime available; set one with RequestChainBuilder::runtime".to_string(),
                )
            })
    }

    fn take_request(&self) -> Result<ChainRequest, ChainError> {
        let source = lock(&self.inner.source).take();
        match source {
            Some(RequestSource::Request(request)) => Ok(*request),
            Some(RequestSource::Factory(factory)) => Ok(factory()?),
            None => Err(ChainError::Configuration(
                "Chain has already been started".to_string(),
            )),
        }
    }

    fn abandon(&self, task: &JoinHandle<()>, timeout: Duration) {
        let raced = {
            let mut slot = lock(&self.inner.response);
            self.inner.abandoned.store(true, Ordering::SeqCst);
            slot.take()
        };
        if let Some(response) = raced {
            debug!("Chain completed as the wait timed out, releasing final response");
            response.release();
        }
        match self.inner.timeout_policy {
            TimeoutPolicy::CancelChain => {
                warn!(timeout = ?timeout, "Wait timed out, aborting chain");
                task.abort();
            }
            TimeoutPolicy::Detach => {
                warn!(timeout = ?timeout, "Wait timed out, chain continues in background");
            }
        }
    }

    async fn run(&self, request: ChainRequest) -> Result<ChainCompletion, ChainError> {
        let started = Instant::now();
        lock(&self.inner.hops).clear();

        info!(method = %request.method, url = %request.url, "Starting request chain");

        let mut current = self.inner.transport.send(request).await?;
        let mut index = 0;

        loop {
            index += 1;
            let status = current.status();
            let resolved_url = current.resolved_url().to_string();
            debug!(hop = index, status, url = %resolved_url, "Inspecting response");

            let decision = self.inner.step.decide(&mut current).await?;

            lock(&self.inner.hops).push(HopRecord {
                index,
                status,
                resolved_url,
                decision: decision.kind(),
                elapsed: started.elapsed(),
            });

            match decision {
                ContinuationDecision::Final => {
                    info!(hops = index, status, duration = ?started.elapsed(), "Request chain completed");
                    self.store_response(current);
                    return Ok(ChainCompletion::Completed);
                }
                ContinuationDecision::Cancel => {
                    info!(hops = index, "Request chain canceled");
                    current.release();
                    return Ok(ChainCompletion::Canceled);
                }
                ContinuationDecision::Continue(next) => {
                    debug!(hop = index, next = %next.resolved_url(), "Continuing with next response");
                    current.release();
                    current = next;
                }
            }
        }
    }

    fn store_response(&self, response: ChainResponse) {
        let mut slot = lock(&self.inner.response);
        if self.inner.abandoned.load(Ordering::SeqCst) {
            drop(slot);
            debug!("Chain completed after its waiter gave up, releasing final response");
            response.release();
            return;
        }
        *slot = Some(response);
    }
}

fn task_ended() -> ChainError {
    ChainError::Runtime("chain task ended without reporting an outcome".to_string())
}

impl Chain for RequestChain {
    fn start_async<F>(&self, on_complete: F) -> Result<JoinHandle<Result<(), ChainError>>, ChainError>
    where
        F: FnOnce(&Self, bool) + Send + 'static,
    {
        RequestChain::start_async(self, on_complete)
    }

    fn get_response_with_timeout(&self, wait: Wait) -> Result<(), ChainError> {
        RequestChain::get_response_with_timeout(self, wait)
    }

    fn take_response(&self) -> Option<ChainResponse> {
        RequestChain::take_response(self)
    }
}

impl fmt::Debug for RequestChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestChain")
            .field("timeout_policy", &self.inner.timeout_policy)
            .field("has_response", &self.has_response())
            .field("hops", &lock(&self.inner.hops).len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Request Chain Builder
// ============================================================================

/// Builder for a [`RequestChain`].
pub struct RequestChainBuilder {
    transport: Arc<dyn Transport>,
    step: Option<Arc<dyn ContinuationStep>>,
    source: Option<RequestSource>,
    runtime: Option<Handle>,
    timeout_policy: TimeoutPolicy,
}

impl RequestChainBuilder {
    /// Creates a new builder.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            step: None,
            source: None,
            runtime: None,
            timeout_policy: TimeoutPolicy::default(),
        }
    }

    /// Sets the initial request.
    pub fn request(mut self, request: ChainRequest) -> Self {
        self.source = Some(RequestSource::Request(Box::new(request)));
        self
    }

    /// Sets a factory that builds the initial request when the chain starts.
    pub fn request_factory(
        mut self,
        factory: impl FnOnce() -> Result<ChainRequest, CoreError> + Send + 'static,
    ) -> Self {
        self.source = Some(RequestSource::Factory(Box::new(factory)));
        self
    }

    /// Sets the continuation step. Defaults to [`FinalStep`].
    pub fn step(mut self, step: Arc<dyn ContinuationStep>) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets the runtime chains are spawned on. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Sets the timeout policy.
    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Builds the chain. Fails if no initial request was set.
    pub fn build(self) -> Result<RequestChain, ChainError> {
        let source = self.source.ok_or_else(|| {
            ChainError::Configuration("An initial request or request factory must be set".to_string())
        })?;

        Ok(RequestChain {
            inner: Arc::new(ChainInner {
                transport: self.transport,
                step: self.step.unwrap_or_else(|| Arc::new(FinalStep)),
                source: Mutex::new(Some(source)),
                runtime: self.runtime,
                timeout_policy: self.timeout_policy,
                response: Mutex::new(None),
                hops: Mutex::new(Vec::new()),
                abandoned: AtomicBool::new(false),
            }),
        })
    }
}

// ============================================================================
// Interactive Request
// ============================================================================

/// Request chain whose continuation step is an [`InteractionGate`].
#[derive(Clone)]
pub struct InteractiveRequest {
    chain: RequestChain,
    gate: Arc<InteractionGate>,
}

impl InteractiveRequest {
    /// Creates a builder using `transport` for every hop.
    pub fn builder(transport: Arc<dyn Transport>) -> InteractiveRequestBuilder {
        InteractiveRequestBuilder::new(transport)
    }

    /// The gate deciding when interaction is required.
    pub fn gate(&self) -> &InteractionGate {
        &self.gate
    }

    /// The underlying chain.
    pub fn chain(&self) -> &RequestChain {
        &self.chain
    }

    /// Runs the chain to completion on the current task.
    pub async fn execute(&self) -> Result<ChainCompletion, ChainError> {
        self.chain.execute().await
    }

    /// Hops of the current or last run.
    pub fn hops(&self) -> Vec<HopRecord> {
        self.chain.hops()
    }
}

impl Chain for InteractiveRequest {
    fn start_async<F>(&self, on_complete: F) -> Result<JoinHandle<Result<(), ChainError>>, ChainError>
    where
        F: FnOnce(&Self, bool) + Send + 'static,
    {
        let this = self.clone();
        self.chain
            .start_async(move |_, canceled| on_complete(&this, canceled))
    }

    fn get_response_with_timeout(&self, wait: Wait) -> Result<(), ChainError> {
        self.chain.get_response_with_timeout(wait)
    }

    fn take_response(&self) -> Option<ChainResponse> {
        self.chain.take_response()
    }
}

impl fmt::Debug for InteractiveRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractiveRequest")
            .field("gate", &self.gate)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Builder for an [`InteractiveRequest`].
pub struct InteractiveRequestBuilder {
    chain: RequestChainBuilder,
    gate: InteractionGateBuilder,
}

impl InteractiveRequestBuilder {
    /// Creates a new builder.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            chain: RequestChainBuilder::new(transport),
            gate: InteractionGateBuilder::new(),
        }
    }

    /// Sets the initial request.
    pub fn request(mut self, request: ChainRequest) -> Self {
        self.chain = self.chain.request(request);
        self
    }

    /// Sets a factory that builds the initial request when the chain starts.
    pub fn request_factory(
        mut self,
        factory: impl FnOnce() -> Result<ChainRequest, CoreError> + Send + 'static,
    ) -> Self {
        self.chain = self.chain.request_factory(factory);
        self
    }

    /// Sets the pattern that marks responses needing interaction.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.gate = self.gate.pattern(pattern);
        self
    }

    /// Sets the interaction handler.
    pub fn handler(mut self, handler: Arc<dyn InteractionHandler>) -> Self {
        self.gate = self.gate.handler(handler);
        self
    }

    /// Sets the runtime chains are spawned on.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.chain = self.chain.runtime(runtime);
        self
    }

    /// Sets the timeout policy.
    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.chain = self.chain.timeout_policy(policy);
        self
    }

    /// Builds the request. Fails on a missing request, an invalid pattern, or
    /// a pattern without a handler.
    pub fn build(self) -> Result<InteractiveRequest, ChainError> {
        let gate = Arc::new(self.gate.build()?);
        let chain = self.chain.step(gate.clone()).build()?;
        Ok(InteractiveRequest { chain, gate })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ssochain_core::{CookieStore, TransportError};

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(&self, request: ChainRequest) -> Result<ChainResponse, TransportError> {
            Ok(ChainResponse::new(200, request.url, request.cookie_store).with_body("OK"))
        }
    }

    fn request() -> ChainRequest {
        ChainRequest::parse_get("http://x/", Arc::new(CookieStore::new())).unwrap()
    }

    #[test]
    fn test_wait_from_millis() {
        assert_eq!(Wait::from_millis(-1), Wait::Infinite);
        assert_eq!(Wait::from_millis(0), Wait::For(Duration::ZERO));
        assert_eq!(Wait::from(None), Wait::Infinite);
    }

    #[test]
    fn test_missing_request_fails_at_build() {
        let result = RequestChain::builder(Arc::new(EchoTransport)).build();
        assert!(matches!(result, Err(ChainError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_execute_stores_final_response() {
        let chain = RequestChain::builder(Arc::new(EchoTransport))
            .request(request())
            .build()
            .unwrap();

        assert!(!chain.has_response());
        let completion = chain.execute().await.unwrap();
        assert_eq!(completion, ChainCompletion::Completed);

        let mut response = chain.take_response().unwrap();
        assert_eq!(response.text().await.unwrap(), "OK");
        assert!(chain.take_response().is_none());
        assert_eq!(chain.hops().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_runs_once() {
        let chain = RequestChain::builder(Arc::new(EchoTransport))
            .request(request())
            .build()
            .unwrap();
        chain.execute().await.unwrap();
        assert!(matches!(chain.execute().await, Err(ChainError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_blocking_wait_inside_runtime_is_rejected() {
        let chain = RequestChain::builder(Arc::new(EchoTransport))
            .request(request())
            .build()
            .unwrap();
        assert!(matches!(
            chain.get_response_with_timeout(Wait::Infinite),
            Err(ChainError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_wait_on_spawn_blocking_thread_is_rejected() {
        let chain = RequestChain::builder(Arc::new(EchoTransport))
            .request(request())
            .build()
            .unwrap();
        let waiter = chain.clone();
        let result = tokio::task::spawn_blocking(move || waiter.get_response_with_timeout(Wait::Infinite))
            .await
            .unwrap();
        match result {
            Err(ChainError::Configuration(message)) => assert!(message.contains("spawn_blocking")),
            other => panic!("expected a configuration error, got {other:?}"),
        }
        // The refused wait leaves the chain startable.
        assert_eq!(chain.execute().await.unwrap(), ChainCompletion::Completed);
    }

    #[tokio::test]
    async fn test_factory_can_inspect_its_chain() {
        let slot: Arc<Mutex<Option<RequestChain>>> = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&slot);
        let chain = RequestChain::builder(Arc::new(EchoTransport))
            .request_factory(move || {
                if let Some(chain) = lock(&seen).as_ref() {
                    assert!(!chain.has_response());
                    assert!(matches!(chain.take_request(), Err(ChainError::Configuration(_))));
                }
                Ok(request())
            })
            .build()
            .unwrap();
        *lock(&slot) = Some(chain.clone());

        assert_eq!(chain.execute().await.unwrap(), ChainCompletion::Completed);
        assert!(chain.has_response());
        lock(&slot).take();
    }

    #[tokio::test]
    async fn test_factory_error_surfaces() {
        let chain = RequestChain::builder(Arc::new(EchoTransport))
            .request_factory(|| ChainRequest::parse_get("::bad::", Arc::new(CookieStore::new())))
            .build()
            .unwrap();
        assert!(matches!(
            chain.execute().await,
            Err(ChainError::Core(CoreError::InvalidUrl(_)))
        ));
    }
}
