use crate::node::Node;
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::provider::ProviderError;
use crate::shared_store::NodeStore;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Where the executor is in a run.
///
/// A successful run goes `Idle → Validating → Running → Idle`; a failed one
/// passes through `Failed` before settling back on `Idle`. `Failed` is held
/// while the failure is reported to the notifier, so a notifier reading
/// [`WorkflowContext::state`] sees it. Watchers that only poll may miss it;
/// [`WorkflowContext::last_outcome`] keeps the result of the last run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    #[default]
    Idle,
    Validating,
    Running,
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionState::Idle => "idle",
            ExecutionState::Validating => "validating",
            ExecutionState::Running => "running",
            ExecutionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the last run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The provider answered and the output node holds the result
    Succeeded,
    /// Validation refused the run; no provider was called
    Rejected(ValidationError),
    /// The provider call failed; the output node holds the error text
    Failed(ProviderError),
    /// The run future was dropped before it finished
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded)
    }
}

/// Everything a run shares with the outside world.
///
/// The context is passed explicitly into the executor: the node store the
/// editor reads from, the notification sink, the observable execution state
/// and the "disable while processing" flag. Clones share all of them.
#[derive(Clone)]
pub struct WorkflowContext {
    store: NodeStore,
    notifier: Arc<dyn Notifier>,
    state: Arc<watch::Sender<ExecutionState>>,
    outcome: Arc<watch::Sender<Option<RunOutcome>>>,
    processing: Arc<AtomicBool>,
}

impl WorkflowContext {
    /// Create a context over an existing store
    pub fn new(store: NodeStore, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(ExecutionState::Idle);
        let (outcome, _) = watch::channel(None);
        Self {
            store,
            notifier,
            state: Arc::new(state),
            outcome: Arc::new(outcome),
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a context holding `nodes`, logging notifications via `tracing`
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        Self::new(NodeStore::new(nodes), Arc::new(TracingNotifier))
    }

    /// Replace the notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Push one notification to the side-channel
    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Current execution state
    pub fn state(&self) -> ExecutionState {
        *self.state.borrow()
    }

    /// Subscribe to execution state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    /// Outcome of the most recent run, `None` before the first one ends
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.outcome.borrow().clone()
    }

    /// Subscribe to run outcomes
    pub fn subscribe_outcome(&self) -> watch::Receiver<Option<RunOutcome>> {
        self.outcome.subscribe()
    }

    /// Whether a triggered run is in flight
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, next: ExecutionState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "execution state changed");
    }

    /// Enter `Validating` and return the guard that settles the run
    pub(crate) fn begin_run(&self) -> RunGuard {
        self.set_state(ExecutionState::Validating);
        RunGuard {
            ctx: self.clone(),
            finished: false,
        }
    }

    /// Claim the processing flag, or `None` if a run already holds it
    pub(crate) fn try_begin(&self) -> Option<ProcessingGuard> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProcessingGuard {
                flag: Arc::clone(&self.processing),
            })
    }

    // The outcome is published before `Idle`, so anyone woken by `Idle`
    // already sees it.
    fn settle(&self, outcome: RunOutcome) {
        self.outcome.send_replace(Some(outcome));
        self.set_state(ExecutionState::Idle);
    }
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::with_nodes(Vec::new())
    }
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("store", &self.store)
            .field("state", &self.state())
            .field("last_outcome", &self.last_outcome())
            .field("processing", &self.is_processing())
            .finish_non_exhaustive()
    }
}

/// Returns the context to `Idle` when a run ends, however it ends.
///
/// Dropping the guard without [`finish`](Self::finish) records
/// [`RunOutcome::Cancelled`].
#[derive(Debug)]
pub(crate) struct RunGuard {
    ctx: WorkflowContext,
    finished: bool,
}

impl RunGuard {
    pub(crate) fn finish(mut self, outcome: RunOutcome) {
        self.finished = true;
        self.ctx.settle(outcome);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("run dropped before finishing");
            self.ctx.settle(RunOutcome::Cancelled);
        }
    }
}

/// Releases the processing flag when dropped
#[derive(Debug)]
pub(crate) struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
