//! State Guardian
//!
//! A [`Guardian`] owns one value of type `T` through a dedicated coordinating
//! task. Callers never touch the value; they send [`Request`]s over a bounded
//! channel and the task applies them one at a time, in the order they were
//! accepted. Reads come back over a private oneshot channel.
//!
//! The guardian lives until [`Cleanup::cleanup`] runs. Cleanup flips the
//! closed flag and signals the coordinating task, which closes the request
//! channel, serves whatever was already accepted, and exits. A caller that
//! races cleanup past the closed-flag check gets the send failure converted
//! into [`GuardianError::Closed`]; nothing panics or hangs.

use crate::command::Request;
use crate::config::GuardianConfig;
use crate::context::Context;
use crate::errors::{GuardianError, GuardianResult, Operation};
use crate::stats::{GuardianStats, StatsCounters};
use core::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

cfg_if::cfg_if! {
    if #[cfg(feature = "tracing")] {
        use tracing::{debug, error, info};
    } else {
        use log::{debug, error, info};
    }
}

// ----------------------------------------------------------------------------
// Shared State
// ----------------------------------------------------------------------------

/// State visible to callers without going through the coordinating task
#[derive(Debug)]
struct Shared {
    name: String,
    closed: AtomicBool,
    terminated: AtomicBool,
    shutdown: CancellationToken,
    stats: StatsCounters,
}

impl Shared {
    fn new(name: String) -> Self {
        Self {
            name,
            closed: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            stats: StatsCounters::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Guardian Handle
// ----------------------------------------------------------------------------

/// Caller-facing handle to a guarded value
///
/// Cloning is cheap and every clone talks to the same coordinating task.
pub struct Guardian<T> {
    request_sender: mpsc::Sender<Request<T>>,
    shared: Arc<Shared>,
}

impl<T> Clone for Guardian<T> {
    fn clone(&self) -> Self {
        Self {
            request_sender: self.request_sender.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Guardian<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guardian")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl<T> Guardian<T> {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// True once cleanup has been called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// True once the coordinating task has exited
    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> GuardianStats {
        self.shared.stats.snapshot()
    }

    fn check_open(&self, operation: Operation) -> GuardianResult<()> {
        if self.is_closed() {
            return Err(self.reject_closed(operation));
        }
        Ok(())
    }

    fn check_context(&self, ctx: &Context) -> GuardianResult<()> {
        match ctx.err() {
            Some(err) => Err(self.reject_cancelled(err)),
            None => Ok(()),
        }
    }

    fn reject_closed(&self, operation: Operation) -> GuardianError {
        self.shared.stats.record_rejected_closed();
        GuardianError::closed(operation)
    }

    fn reject_cancelled(&self, err: GuardianError) -> GuardianError {
        self.shared.stats.record_cancelled();
        err
    }

    /// Send a request, racing the caller's context. Either the request is
    /// fully enqueued or the context wins and nothing was sent.
    async fn enqueue(
        &self,
        ctx: &Context,
        request: Request<T>,
        operation: Operation,
    ) -> GuardianResult<()> {
        tokio::select! {
            biased;
            err = ctx.done() => Err(self.reject_cancelled(err)),
            sent = self.request_sender.send(request) => {
                sent.map_err(|_| self.reject_closed(operation))
            }
        }
    }
}

impl<T> Guardian<T>
where
    T: Clone + Send + 'static,
{
    /// Start a guardian on the current Tokio runtime with default settings.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, like `tokio::spawn`.
    /// Use [`Guardian::with_config`] or [`Guardian::with_runtime`] to get an
    /// error instead.
    pub fn new(initial: T) -> (Self, Cleanup) {
        Self::start(initial, GuardianConfig::default(), &Handle::current())
    }

    pub fn with_config(initial: T, config: GuardianConfig) -> GuardianResult<(Self, Cleanup)> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| GuardianError::NoRuntime)?;
        Ok(Self::start(initial, config, &runtime))
    }

    /// Start the coordinating task on an explicit runtime, e.g. from a thread
    /// that is not itself inside one.
    pub fn with_runtime(
        initial: T,
        config: GuardianConfig,
        runtime: &Handle,
    ) -> GuardianResult<(Self, Cleanup)> {
        config.validate()?;
        Ok(Self::start(initial, config, runtime))
    }

    fn start(initial: T, config: GuardianConfig, runtime: &Handle) -> (Self, Cleanup) {
        let (request_sender, request_receiver) = mpsc::channel(config.request_buffer_size);
        let shared = Arc::new(Shared::new(config.name));

        let coordinator = CoordinatorTask {
            state: initial,
            request_receiver,
            shared: Arc::clone(&shared),
        };
        let task = runtime.spawn(coordinator.run());

        let guardian = Self {
            request_sender,
            shared: Arc::clone(&shared),
        };
        (guardian, Cleanup { shared, task })
    }

    pub async fn read(&self) -> GuardianResult<T> {
        self.read_with_context(&Context::background()).await
    }

    /// Read a copy of the value. The context is raced against both the
    /// enqueue and the wait for the reply.
    pub async fn read_with_context(&self, ctx: &Context) -> GuardianResult<T> {
        self.check_open(Operation::Read)?;
        self.check_context(ctx)?;

        let (reply, response) = oneshot::channel();
        self.enqueue(ctx, Request::read(reply), Operation::Read).await?;

        tokio::select! {
            biased;
            value = response => value.map_err(|_| self.reject_closed(Operation::Read)),
            err = ctx.done() => Err(self.reject_cancelled(err)),
        }
    }

    pub async fn write<F>(&self, mutator: F) -> GuardianResult<()>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.write_with_context(&Context::background(), mutator).await
    }

    /// Enqueue a mutator. Returns once the request is accepted; the mutator
    /// runs later, after every request accepted before it.
    pub async fn write_with_context<F>(&self, ctx: &Context, mutator: F) -> GuardianResult<()>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.check_open(Operation::Write)?;
        self.check_context(ctx)?;
        self.enqueue(ctx, Request::write(mutator), Operation::Write).await
    }

    /// Blocking variant of [`Guardian::read`] for synchronous threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_read(&self) -> GuardianResult<T> {
        self.check_open(Operation::Read)?;

        let (reply, response) = oneshot::channel();
        self.request_sender
            .blocking_send(Request::read(reply))
            .map_err(|_| self.reject_closed(Operation::Read))?;
        response
            .blocking_recv()
            .map_err(|_| self.reject_closed(Operation::Read))
    }

    /// Blocking variant of [`Guardian::write`] for synchronous threads.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_write<F>(&self, mutator: F) -> GuardianResult<()>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.check_open(Operation::Write)?;
        self.request_sender
            .blocking_send(Request::write(mutator))
            .map_err(|_| self.reject_closed(Operation::Write))
    }
}

// ----------------------------------------------------------------------------
// Cleanup
// ----------------------------------------------------------------------------

/// One-shot cleanup for a guardian, returned alongside it by the constructors
///
/// Consuming `self` makes a second call impossible.
#[must_use = "the coordinating task keeps running until cleanup is called"]
pub struct Cleanup {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("name", &self.shared.name)
            .field("task_finished", &self.task.is_finished())
            .finish()
    }
}

impl Cleanup {
    /// True once the coordinating task has exited, which also happens when
    /// every [`Guardian`] handle has been dropped
    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Acquire)
    }

    /// Close the guardian. Later reads and writes fail with
    /// [`GuardianError::Closed`] and the coordinating task stops after
    /// serving requests it had already accepted.
    pub fn cleanup(self) {
        self.close();
    }

    /// Close the guardian and wait for the coordinating task to exit
    pub async fn shutdown(self) {
        self.close();
        if let Err(e) = self.task.await {
            error!(
                "Guardian '{}' coordinating task ended abnormally: {}",
                self.shared.name, e
            );
        }
    }

    fn close(&self) {
        // Flag first so that callers stop at the fast path, then the loop
        self.shared.closed.store(true, Ordering::Release);
        self.shared.shutdown.cancel();
        debug!("Guardian '{}' cleanup requested", self.shared.name);
    }
}

// ----------------------------------------------------------------------------
// Coordinating Task
// ----------------------------------------------------------------------------

/// Sole owner of the guarded value
struct CoordinatorTask<T> {
    state: T,
    request_receiver: mpsc::Receiver<Request<T>>,
    shared: Arc<Shared>,
}

impl<T> CoordinatorTask<T>
where
    T: Clone + Send + 'static,
{
    async fn run(mut self) {
        let _termination = TerminationGuard(Arc::clone(&self.shared));
        info!("Guardian '{}' coordinating task starting", self.shared.name);

        loop {
            tokio::select! {
                biased;
                _ = self.shared.shutdown.cancelled() => {
                    debug!("Guardian '{}' received shutdown signal", self.shared.name);
                    break;
                }
                request = self.request_receiver.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => {
                        debug!("Guardian '{}' handles all dropped", self.shared.name);
                        break;
                    }
                },
            }
        }

        // New sends fail from here on; accepted requests are still served
        self.request_receiver.close();
        let mut drained = 0usize;
        while let Some(request) = self.request_receiver.recv().await {
            self.handle_request(request);
            drained += 1;
        }
        if drained > 0 {
            debug!(
                "Guardian '{}' served {} accepted requests after shutdown",
                self.shared.name, drained
            );
        }

        info!(
            "Guardian '{}' coordinating task stopped after {} requests",
            self.shared.name,
            self.shared.stats.snapshot().total_handled()
        );
    }

    fn handle_request(&mut self, request: Request<T>) {
        let kind = request.kind();
        match request {
            Request::Read { reply } => {
                if reply.is_closed() {
                    self.shared.stats.record_abandoned_reply();
                    debug!("Guardian '{}' {} abandoned by caller", self.shared.name, kind);
                    return;
                }
                // Counted before the send: a caller woken by the reply must see it
                self.shared.stats.record_read_served();
                if reply.send(self.state.clone()).is_err() {
                    self.shared.stats.reclassify_served_as_abandoned();
                    debug!("Guardian '{}' {} abandoned by caller", self.shared.name, kind);
                }
            }
            Request::Write { mutator } => {
                mutator(&mut self.state);
                self.shared.stats.record_write_applied();
            }
        }
    }
}

/// Marks the coordinating task terminated however it exits
struct TerminationGuard(Arc<Shared>);

impl Drop for TerminationGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!(
                "Guardian '{}' mutator panicked; guardian is no longer usable",
                self.0.name
            );
            self.0.closed.store(true, Ordering::Release);
        }
        self.0.terminated.store(true, Ordering::Release);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_returns_initial_value() {
        let (guardian, cleanup) = Guardian::new(7u32);
        assert_eq!(guardian.read().await, Ok(7));
        cleanup.shutdown().await;
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (guardian, cleanup) = Guardian::new(String::from("a"));
        guardian.write(|s| s.push('b')).await.unwrap();
        guardian.write(|s| s.push('c')).await.unwrap();
        assert_eq!(guardian.read().await.unwrap(), "abc");
        cleanup.shutdown().await;
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (guardian, cleanup) = Guardian::new(0i64);
        let other = guardian.clone();
        other.write(|v| *v -= 5).await.unwrap();
        assert_eq!(guardian.read().await, Ok(-5));
        assert_eq!(guardian.name(), other.name());
        cleanup.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_after_cleanup() {
        let (guardian, cleanup) = Guardian::new(1u8);
        assert!(!guardian.is_closed());
        cleanup.cleanup();
        assert!(guardian.is_closed());
        assert_eq!(
            guardian.read().await,
            Err(GuardianError::closed(Operation::Read))
        );
        assert_eq!(
            guardian.write(|v| *v += 1).await,
            Err(GuardianError::closed(Operation::Write))
        );
        assert_eq!(guardian.stats().rejected_closed, 2);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_task() {
        let (guardian, cleanup) = Guardian::new(());
        assert!(!guardian.is_terminated());
        cleanup.shutdown().await;
        assert!(guardian.is_terminated());
    }

    #[tokio::test]
    async fn test_with_config_rejects_invalid() {
        let config = GuardianConfig::testing().with_request_buffer_size(0);
        let result = Guardian::with_config(0u32, config);
        assert!(matches!(
            result,
            Err(GuardianError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_with_config_outside_runtime() {
        let result = Guardian::with_config(0u32, GuardianConfig::testing());
        assert!(matches!(result, Err(GuardianError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_debug_output() {
        let config = GuardianConfig::testing().with_name("debug-me");
        let (guardian, cleanup) = Guardian::with_config(0u32, config).unwrap();
        let rendered = format!("{:?}", guardian);
        assert!(rendered.contains("debug-me"));
        assert!(rendered.contains("closed: false"));
        assert!(format!("{:?}", cleanup).contains("debug-me"));
        cleanup.shutdown().await;
    }
}
