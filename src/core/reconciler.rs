//! # StateReconciler: drive one resource toward a desired state.
//!
//! One reconciler per resource kind, parameterized by the kind's [`StatusReader`] and
//! [`ActionInvoker`]. [`StateReconciler::converge`] is the only entry point callers need.
//!
//! ## Flow
//! ```text
//! converge(id, desired, opts)
//!   │
//!   ├─► observe (retried)                      ── satisfied ──► return, no mutation
//!   │
//!   ├─► wait until own state is final          (serialize behind in-flight transitions)
//!   ├─► wait until parent state is final       (kinds with a parent only)
//!   │                                          ── satisfied ──► return, no mutation
//!   ├─► select transition:
//!   │     RUNNING   + DEPLOYMENT_ERROR        ─► Restart
//!   │     RUNNING   + RUNNING (refresh/stale) ─► Restart
//!   │     RUNNING   + anything else           ─► Deploy
//!   │     STOPPED                             ─► Stop
//!   │     RESTARTED                           ─► Restart
//!   │     DELETED                             ─► Delete
//!   │
//!   ├─► issue transition (never retried)       ── failure ──► Err(Operation)
//!   ├─► wait until target state reached
//!   │
//!   └─► landed RUNNING but out of date         ─► one Restart, wait again
//!       (unless the first call already restarted a RUNNING resource)
//! ```
//!
//! ## Rules
//! - Status reads go through [`RetryExecutor`]; mutating calls are issued exactly once.
//! - Each wait has its own full `timeout` budget; a timed-out wait proceeds as if satisfied.
//! - Re-invoking `converge` after a failure is safe: it re-observes and resumes.
//! - Delete treats any response status `>= 300` as a failure, including `404`.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::retry::RetryExecutor;
use super::waiter::Waiter;
use crate::config::ReconcilerConfig;
use crate::error::{OperationError, ReconcileError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{RetryPolicy, WaitPolicy};
use crate::resource::{
    Action, ActionInvoker, DesiredState, LifecycleState, Observation, ResourceKind, StatusReader,
    Transition,
};
use crate::transport::RemoteFailure;

/// Caller options for a single [`StateReconciler::converge`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergeOptions {
    /// Restart a resource that already runs, even when it reports up to date.
    ///
    /// Only affects [`DesiredState::Running`]. For the other desired states a resource
    /// already in the target state is left alone, with no call.
    pub force_refresh: bool,
}

impl ConvergeOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

/// Outcome of a successful [`StateReconciler::converge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    /// Last observation of the resource.
    pub observation: Observation,
    /// Mutating calls issued, in order; empty when nothing had to change.
    pub transitions: Vec<Transition>,
}

impl Convergence {
    #[inline]
    pub fn state(&self) -> &LifecycleState {
        &self.observation.state
    }

    /// Whether any mutating call was issued.
    #[inline]
    pub fn issued(&self) -> bool {
        !self.transitions.is_empty()
    }
}

/// Converges resources of one kind.
///
/// Holds no per-resource state: concurrent `converge` calls for distinct ids are independent.
/// Serializing calls for the same id is up to the caller.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use convergent::test_support::ScriptedDriver;
/// use convergent::{
///     ConvergeOptions, DesiredState, LifecycleState, ResourceKind, StateReconciler, Transition,
///     WaitPolicy,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let driver = Arc::new(
///     ScriptedDriver::with_states([LifecycleState::Stopped])
///         .after(Transition::Deploy, [LifecycleState::Running]),
/// );
/// let reconciler = StateReconciler::for_driver(ResourceKind::Application, driver)
///     .with_wait_policy(WaitPolicy::new(Duration::from_millis(1), Duration::from_secs(1)));
///
/// let token = CancellationToken::new();
/// let done = reconciler
///     .converge(&token, "app-1", DesiredState::Running, ConvergeOptions::default())
///     .await
///     .unwrap();
///
/// assert_eq!(done.state(), &LifecycleState::Running);
/// assert_eq!(done.transitions, vec![Transition::Deploy]);
/// # }
/// ```
#[derive(Clone)]
pub struct StateReconciler {
    kind: ResourceKind,
    reader: Arc<dyn StatusReader>,
    invoker: Arc<dyn ActionInvoker>,
    retry: RetryPolicy,
    wait: WaitPolicy,
    bus: Option<Bus>,
}

impl std::fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateReconciler")
            .field("kind", &self.kind)
            .field("retry", &self.retry)
            .field("wait", &self.wait)
            .field("bus", &self.bus.is_some())
            .finish_non_exhaustive()
    }
}

impl StateReconciler {
    /// Reconciler built from two separate collaborators, with default policies.
    pub fn new(
        kind: ResourceKind,
        reader: Arc<dyn StatusReader>,
        invoker: Arc<dyn ActionInvoker>,
    ) -> Self {
        Self {
            kind,
            reader,
            invoker,
            retry: RetryPolicy::default(),
            wait: WaitPolicy::default(),
            bus: None,
        }
    }

    /// Reconciler built from one driver implementing both collaborator traits.
    pub fn for_driver<D>(kind: ResourceKind, driver: Arc<D>) -> Self
    where
        D: StatusReader + ActionInvoker,
    {
        let reader: Arc<dyn StatusReader> = driver.clone();
        let invoker: Arc<dyn ActionInvoker> = driver;
        Self::new(kind, reader, invoker)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_wait_policy(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Applies both policies from a loaded configuration.
    pub fn with_config(self, cfg: &ReconcilerConfig) -> Self {
        self.with_retry_policy(cfg.retry).with_wait_policy(cfg.wait)
    }

    /// Publishes lifecycle events (and those of the inner retry/wait loops) to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Drives `id` toward `desired`.
    ///
    /// ### Returns
    /// - `Ok(Convergence)` with the last observation and the transitions issued.
    /// - `Err(Operation)` for the first failed call: a status read after its retries, or a
    ///   mutating call on its first failure.
    /// - `Err(Canceled)` once `ctx` fires.
    /// - `Err(Config)` if a policy is invalid; nothing is called remotely then.
    ///
    /// The wait after a transition only looks for the target state. A transition that
    /// lands in an error state (a Deploy ending in `DEPLOYMENT_ERROR`, a Stop ending in
    /// `STOP_ERROR`) is polled until the wait times out, and the result is `Ok` with that
    /// error state as [`Convergence::observation`]. Callers should check
    /// [`Convergence::state`]; calling `converge` again picks the recovery transition.
    #[instrument(level = "info", skip_all, fields(kind = %self.kind, id = %id, desired = %desired))]
    pub async fn converge(
        &self,
        ctx: &CancellationToken,
        id: &str,
        desired: DesiredState,
        opts: ConvergeOptions,
    ) -> Result<Convergence, ReconcileError> {
        self.retry.validate()?;
        self.wait.validate()?;

        self.publish(self.event(EventKind::ConvergeStarted, id).with_desired(desired));

        let res = self.run(ctx, id, desired, opts).await;
        match &res {
            Ok(done) => {
                info!(state = %done.state(), transitions = done.transitions.len(), "converged");
                self.publish(
                    self.event(EventKind::Converged, id)
                        .with_desired(desired)
                        .with_state(done.state().clone())
                        .with_attempt(done.transitions.len() as u32),
                );
            }
            Err(err) => {
                warn!(err = %err, label = err.as_label(), "convergence failed");
                self.publish(
                    self.event(EventKind::ConvergeFailed, id)
                        .with_desired(desired)
                        .with_reason(err.to_string()),
                );
            }
        }
        res
    }

    async fn run(
        &self,
        ctx: &CancellationToken,
        id: &str,
        desired: DesiredState,
        opts: ConvergeOptions,
    ) -> Result<Convergence, ReconcileError> {
        let current = self.observe(ctx, id).await?;
        if is_satisfied(&current, desired, opts) {
            return Ok(self.already_converged(id, current));
        }

        let current = self.await_settled(ctx, id, current).await?;
        if is_satisfied(&current, desired, opts) {
            return Ok(self.already_converged(id, current));
        }

        let mut transitions = Vec::with_capacity(2);
        let first = select_transition(&current.state, desired);
        // A restart of an already running resource is the refresh itself.
        let may_refresh =
            desired == DesiredState::Running && current.state != LifecycleState::Running;
        let mut observation = self.transition(ctx, id, first, current, &mut transitions).await?;

        if may_refresh
            && observation.state == LifecycleState::Running
            && observation.freshness.is_out_of_date()
        {
            info!(after = %first, "running version is out of date, restarting");
            observation = self
                .transition(ctx, id, Transition::Restart, observation, &mut transitions)
                .await?;
        }

        Ok(Convergence {
            observation,
            transitions,
        })
    }

    /// Reads the resource's current state, retrying transient failures.
    pub async fn observe(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<Observation, OperationError> {
        let reader = &self.reader;
        let kind = self.kind;
        let obs = self
            .retry_executor()
            .execute(
                move || async move {
                    reader
                        .get_state(ctx, id)
                        .await
                        .map_err(|f| OperationError::from_failure(Action::Read, kind, id, f))
                },
                ctx,
            )
            .await?;

        debug!(state = %obs.state, freshness = ?obs.freshness, "observed");
        self.publish(self.event(EventKind::Observed, id).with_state(obs.state.clone()));
        Ok(obs)
    }

    /// Reads the owning resource's state, retrying transient failures.
    ///
    /// `None` when the kind has no parent.
    pub async fn observe_parent(
        &self,
        ctx: &CancellationToken,
        id: &str,
    ) -> Result<Option<LifecycleState>, OperationError> {
        let reader = &self.reader;
        let kind = self.kind;
        self.retry_executor()
            .execute(
                move || async move {
                    reader.get_parent_state(ctx, id).await.map_err(|f| {
                        OperationError::from_failure(Action::ReadParent, kind, id, f)
                    })
                },
                ctx,
            )
            .await
    }

    async fn await_settled(
        &self,
        ctx: &CancellationToken,
        id: &str,
        current: Observation,
    ) -> Result<Observation, ReconcileError> {
        let settled = if current.state.is_final() {
            current
        } else {
            info!(state = %current.state, "transition in flight, waiting for it to settle");
            self.publish(
                self.event(EventKind::WaitingForSettle, id)
                    .with_state(current.state.clone()),
            );
            self.poll_until(ctx, id, current, |obs| obs.state.is_final())
                .await?
        };

        if let Some(parent) = self.reader.parent_kind() {
            debug!(parent = %parent, "waiting for parent to settle");
            self.waiter(id)
                .wait(
                    move |ctx| async move {
                        let state = self.observe_parent(&ctx, id).await?;
                        Ok(state.map_or(true, |s| s.is_final()))
                    },
                    ctx,
                )
                .await?;
        }

        Ok(settled)
    }

    async fn transition(
        &self,
        ctx: &CancellationToken,
        id: &str,
        transition: Transition,
        before: Observation,
        issued: &mut Vec<Transition>,
    ) -> Result<Observation, ReconcileError> {
        if ctx.is_cancelled() {
            return Err(ReconcileError::Canceled);
        }

        info!(transition = %transition, from = %before.state, "issuing transition");
        let outcome = match transition {
            Transition::Deploy => self.invoker.deploy(ctx, id).await,
            Transition::Stop => self.invoker.stop(ctx, id).await,
            Transition::Restart => self.invoker.restart(ctx, id).await,
            Transition::Delete => self.invoker.delete(ctx, id).await,
        };
        let failure = match outcome {
            Ok(resp) if transition == Transition::Delete && !resp.is_success() => {
                Some(RemoteFailure::response(resp))
            }
            Ok(_) => None,
            Err(failure) => Some(failure),
        };

        if let Some(failure) = failure {
            let err = OperationError::from_failure(transition.action(), self.kind, id, failure);
            warn!(transition = %transition, err = %err, "transition failed");
            self.publish(
                self.event(EventKind::TransitionFailed, id)
                    .with_action(transition.action())
                    .with_reason(err.to_string()),
            );
            return Err(err.into());
        }

        issued.push(transition);
        self.publish(
            self.event(EventKind::TransitionIssued, id)
                .with_action(transition.action())
                .with_state(before.state.clone()),
        );

        let target = transition.target_state();
        self.poll_until(ctx, id, before, move |obs| obs.state == target)
            .await
    }

    /// Polls until `done` holds, returning the last observation seen (or `fallback` if none).
    async fn poll_until<P>(
        &self,
        ctx: &CancellationToken,
        id: &str,
        fallback: Observation,
        done: P,
    ) -> Result<Observation, ReconcileError>
    where
        P: Fn(&Observation) -> bool + Sync,
    {
        let last = Mutex::new(None);
        let last_ref = &last;
        let done = &done;

        self.waiter(id)
            .wait(
                move |ctx| async move {
                    let obs = self.observe(&ctx, id).await?;
                    let reached = done(&obs);
                    *last_ref.lock().unwrap_or_else(PoisonError::into_inner) = Some(obs);
                    Ok(reached)
                },
                ctx,
            )
            .await?;

        let last = last.into_inner().unwrap_or_else(PoisonError::into_inner);
        Ok(last.unwrap_or(fallback))
    }

    fn already_converged(&self, id: &str, observation: Observation) -> Convergence {
        debug!(state = %observation.state, "already converged");
        self.publish(
            self.event(EventKind::AlreadyConverged, id)
                .with_state(observation.state.clone()),
        );
        Convergence {
            observation,
            transitions: Vec::new(),
        }
    }

    fn retry_executor(&self) -> RetryExecutor {
        RetryExecutor::new(self.retry).with_bus_opt(self.bus.clone())
    }

    fn waiter(&self, id: &str) -> Waiter {
        Waiter::new(self.wait)
            .with_bus_opt(self.bus.clone())
            .with_subject(self.kind, id)
    }

    fn event(&self, kind: EventKind, id: &str) -> Event {
        Event::new(kind).with_kind_of(self.kind).with_resource(id)
    }

    #[inline]
    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }
}

/// Whether `obs` already satisfies `desired` without any mutating call.
fn is_satisfied(obs: &Observation, desired: DesiredState, opts: ConvergeOptions) -> bool {
    match desired {
        DesiredState::Running => {
            obs.state == LifecycleState::Running
                && !opts.force_refresh
                && !obs.freshness.is_out_of_date()
        }
        DesiredState::Stopped => obs.state == LifecycleState::Stopped,
        DesiredState::Deleted => obs.state == LifecycleState::Deleted,
        DesiredState::Restarted => false,
    }
}

/// Mutating call that moves `current` toward `desired`.
fn select_transition(current: &LifecycleState, desired: DesiredState) -> Transition {
    match desired {
        DesiredState::Running => match current {
            LifecycleState::DeploymentError | LifecycleState::Running => Transition::Restart,
            _ => Transition::Deploy,
        },
        DesiredState::Stopped => Transition::Stop,
        DesiredState::Restarted => Transition::Restart,
        DesiredState::Deleted => Transition::Delete,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::policies::JitterStrategy;
    use crate::resource::Freshness;
    use crate::test_support::{ScriptedDriver, ScriptedFailure};
    use crate::transport::TransportError;

    fn reconciler(driver: &Arc<ScriptedDriver>) -> StateReconciler {
        StateReconciler::for_driver(ResourceKind::Application, Arc::clone(driver))
            .with_retry_policy(RetryPolicy {
                jitter: JitterStrategy::None,
                ..RetryPolicy::default()
            })
            .with_wait_policy(WaitPolicy::new(
                Duration::from_secs(10),
                Duration::from_secs(300),
            ))
    }

    async fn converge(
        driver: &Arc<ScriptedDriver>,
        desired: DesiredState,
        opts: ConvergeOptions,
    ) -> Result<Convergence, ReconcileError> {
        let token = CancellationToken::new();
        reconciler(driver)
            .converge(&token, "app-1", desired, opts)
            .await
    }

    fn kinds(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect()
    }

    #[test]
    fn transition_selection() {
        use DesiredState as D;
        use LifecycleState as S;

        assert_eq!(select_transition(&S::DeploymentError, D::Running), Transition::Restart);
        assert_eq!(select_transition(&S::Running, D::Running), Transition::Restart);
        assert_eq!(select_transition(&S::Stopped, D::Running), Transition::Deploy);
        assert_eq!(select_transition(&S::StopError, D::Running), Transition::Deploy);
        assert_eq!(select_transition(&S::Running, D::Stopped), Transition::Stop);
        assert_eq!(select_transition(&S::Stopped, D::Restarted), Transition::Restart);
        assert_eq!(select_transition(&S::Running, D::Deleted), Transition::Delete);
    }

    #[test]
    fn satisfaction_honors_refresh_and_freshness() {
        let fresh = Observation::new(LifecycleState::Running).with_freshness(Freshness::UpToDate);
        let stale = Observation::new(LifecycleState::Running).with_freshness(Freshness::OutOfDate);
        let plain = ConvergeOptions::default();

        assert!(is_satisfied(&fresh, DesiredState::Running, plain));
        assert!(!is_satisfied(&fresh, DesiredState::Running, ConvergeOptions::refresh()));
        assert!(!is_satisfied(&stale, DesiredState::Running, plain));
        assert!(!is_satisfied(&fresh, DesiredState::Restarted, plain));
        assert!(!is_satisfied(&fresh, DesiredState::Stopped, plain));
        assert!(is_satisfied(
            &Observation::new(LifecycleState::Deleted),
            DesiredState::Deleted,
            plain
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn running_and_up_to_date_issues_nothing() {
        let driver = Arc::new(ScriptedDriver::with_states([LifecycleState::Running]));

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(done.state(), &LifecycleState::Running);
        assert!(!done.issued());
        assert!(driver.mutations().is_empty());
        assert_eq!(driver.count(Action::Read), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deployment_error_recovers_with_restart() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::DeploymentError])
                .after(Transition::Restart, [LifecycleState::Restarting, LifecycleState::Running]),
        );

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Restart]);
        assert_eq!(driver.count(Action::Restart), 1);
        assert_eq!(driver.count(Action::Deploy), 0);
        assert_eq!(done.state(), &LifecycleState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_transition_settles_before_stop() {
        let driver = Arc::new(
            ScriptedDriver::with_states([
                LifecycleState::Deploying,
                LifecycleState::Deploying,
                LifecycleState::Running,
            ])
            .after(Transition::Stop, [LifecycleState::Stopping, LifecycleState::Stopped]),
        );

        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();

        let done = reconciler(&driver)
            .with_bus(bus)
            .converge(&token, "app-1", DesiredState::Stopped, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(
            kinds(&mut rx),
            vec![
                EventKind::ConvergeStarted,
                EventKind::Observed,
                EventKind::WaitingForSettle,
                EventKind::Observed,
                EventKind::Observed,
                EventKind::TransitionIssued,
                EventKind::Observed,
                EventKind::Observed,
                EventKind::Converged,
            ]
        );
        assert_eq!(
            driver.calls(),
            vec![
                Action::Read,
                Action::Read,
                Action::Read,
                Action::Stop,
                Action::Read,
                Action::Read,
            ]
        );
        assert_eq!(done.state(), &LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn transition_finished_while_waiting_is_not_repeated() {
        let driver = Arc::new(ScriptedDriver::with_states([
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]));

        let done = converge(&driver, DesiredState::Stopped, ConvergeOptions::default())
            .await
            .expect("converged");

        assert!(!done.issued());
        assert!(driver.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_resource_is_deployed() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped]).after(
                Transition::Deploy,
                [
                    LifecycleState::DeploymentQueued,
                    LifecycleState::Deploying,
                    LifecycleState::Running,
                ],
            ),
        );
        let start = Instant::now();

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Deploy]);
        assert_eq!(driver.count(Action::Read), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_restarts_running_resource() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Running])
                .after(Transition::Restart, [LifecycleState::Restarting, LifecycleState::Running]),
        );

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::refresh())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Restart]);
        assert_eq!(driver.mutations(), vec![Action::Restart]);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_date_after_deploy_restarts_once() {
        let stale = Observation::new(LifecycleState::Running).with_freshness(Freshness::OutOfDate);
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped])
                .after_observations(Transition::Deploy, [stale])
                .after(Transition::Restart, [LifecycleState::Running]),
        );

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Deploy, Transition::Restart]);
        assert_eq!(done.observation.freshness, Freshness::UpToDate);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_running_resource_is_restarted() {
        let stale = Observation::new(LifecycleState::Running).with_freshness(Freshness::OutOfDate);
        let driver = Arc::new(
            ScriptedDriver::with_observations([stale])
                .after(Transition::Restart, [LifecycleState::Running]),
        );

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Restart]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_after_recovery_restart_restarts_once_more() {
        let stale = Observation::new(LifecycleState::Running).with_freshness(Freshness::OutOfDate);
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::DeploymentError])
                .after_observations(Transition::Restart, [stale]),
        );

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Restart, Transition::Restart]);
        assert_eq!(driver.mutations(), vec![Action::Restart, Action::Restart]);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_restart_landing_stale_is_not_repeated() {
        let stale = Observation::new(LifecycleState::Running).with_freshness(Freshness::OutOfDate);
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Running])
                .after_observations(Transition::Restart, [stale]),
        );

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::refresh())
            .await
            .expect("converged");

        assert_eq!(done.transitions, vec![Transition::Restart]);
        assert!(done.observation.freshness.is_out_of_date());
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_does_not_touch_stopped_resource() {
        let driver = Arc::new(ScriptedDriver::with_states([LifecycleState::Stopped]));

        let done = converge(&driver, DesiredState::Stopped, ConvergeOptions::refresh())
            .await
            .expect("nothing to do");

        assert!(!done.issued());
        assert!(driver.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_landing_in_error_is_returned_after_timeout() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped])
                .after(Transition::Deploy, [LifecycleState::DeploymentError])
                .after(Transition::Restart, [LifecycleState::Running]),
        );
        let start = Instant::now();

        let done = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("timeouts are not errors");

        assert_eq!(done.state(), &LifecycleState::DeploymentError);
        assert_eq!(done.transitions, vec![Transition::Deploy]);
        assert_eq!(start.elapsed(), Duration::from_secs(300));

        let again = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("recovered");

        assert_eq!(again.transitions, vec![Transition::Restart]);
        assert_eq!(again.state(), &LifecycleState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn mutating_failure_is_not_retried() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped]).fail(
                Transition::Deploy,
                ScriptedFailure::Status(503, Some(r#"{"message":"busy"}"#.into())),
            ),
        );

        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();

        let err = reconciler(&driver)
            .with_bus(bus)
            .converge(&token, "app-1", DesiredState::Running, ConvergeOptions::default())
            .await
            .expect_err("deploy fails");

        let events: Vec<Event> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let seen: Vec<EventKind> = events.iter().map(|ev| ev.kind).collect();
        assert_eq!(
            seen,
            vec![
                EventKind::ConvergeStarted,
                EventKind::Observed,
                EventKind::TransitionFailed,
                EventKind::ConvergeFailed,
            ]
        );
        assert_eq!(events[2].action, Some(Action::Deploy));
        assert!(events[3].reason.as_deref().is_some_and(|r| r.contains("busy")));

        assert_eq!(driver.count(Action::Deploy), 1);
        let op = err.operation().expect("operation error");
        assert_eq!(op.action(), Action::Deploy);
        assert_eq!(op.status(), Some(503));
        assert!(err.to_string().contains("busy"));
        assert!(err.to_string().contains("app-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_read_failures_are_retried() {
        let driver = Arc::new(
            ScriptedDriver::with_observations([])
                .then_fail_read(ScriptedFailure::Transport(TransportError::ConnectionReset))
                .then_fail_read(ScriptedFailure::Status(502, None))
                .then_read(Observation::new(LifecycleState::Stopped)),
        );

        let done = converge(&driver, DesiredState::Stopped, ConvergeOptions::default())
            .await
            .expect("converged");

        assert!(!done.issued());
        assert_eq!(driver.count(Action::Read), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_read_failure_is_returned() {
        let driver = Arc::new(
            ScriptedDriver::with_observations([])
                .then_fail_read(ScriptedFailure::Status(403, None)),
        );

        let err = converge(&driver, DesiredState::Running, ConvergeOptions::default())
            .await
            .expect_err("forbidden");

        assert_eq!(driver.count(Action::Read), 1);
        assert_eq!(err.operation().map(|e| e.action()), Some(Action::Read));
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_with_not_found_response_fails() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped]).respond(Transition::Delete, 404),
        );

        let err = converge(&driver, DesiredState::Deleted, ConvergeOptions::default())
            .await
            .expect_err("404 on delete is a failure");

        assert_eq!(err.operation().and_then(|e| e.status()), Some(404));
        assert_eq!(driver.count(Action::Delete), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_deleted_marker() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped])
                .after(Transition::Delete, [LifecycleState::Deleting, LifecycleState::Deleted]),
        );

        let done = converge(&driver, DesiredState::Deleted, ConvergeOptions::default())
            .await
            .expect("deleted");

        assert_eq!(done.state(), &LifecycleState::Deleted);
        assert_eq!(done.transitions, vec![Transition::Delete]);
    }

    #[tokio::test(start_paused = true)]
    async fn already_deleted_is_a_no_op() {
        let driver = Arc::new(ScriptedDriver::with_states([LifecycleState::Deleted]));

        let done = converge(&driver, DesiredState::Deleted, ConvergeOptions::default())
            .await
            .expect("nothing to do");

        assert!(!done.issued());
        assert_eq!(driver.count(Action::Delete), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_parent_before_acting() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Running])
                .with_parent(
                    ResourceKind::Environment,
                    [LifecycleState::Deploying, LifecycleState::Running],
                )
                .after(Transition::Stop, [LifecycleState::Stopped]),
        );

        let done = converge(&driver, DesiredState::Stopped, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(
            driver.calls(),
            vec![
                Action::Read,
                Action::ReadParent,
                Action::ReadParent,
                Action::Stop,
                Action::Read,
            ]
        );
        assert_eq!(done.state(), &LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_waiting() {
        let driver = Arc::new(ScriptedDriver::with_states([LifecycleState::Deploying]));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            canceller.cancel();
        });

        let err = reconciler(&driver)
            .converge(&token, "app-1", DesiredState::Stopped, ConvergeOptions::default())
            .await
            .expect_err("cancelled");

        assert!(matches!(err, ReconcileError::Canceled));
        assert!(driver.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_transition_times_out_and_proceeds() {
        let driver = Arc::new(ScriptedDriver::with_states([LifecycleState::Deploying]));
        let start = Instant::now();

        let done = converge(&driver, DesiredState::Stopped, ConvergeOptions::default())
            .await
            .expect("timeouts are not errors");

        assert_eq!(driver.mutations(), vec![Action::Stop]);
        assert_eq!(done.state(), &LifecycleState::Deploying);
        assert_eq!(start.elapsed(), Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_policy_is_rejected_before_any_call() {
        let driver = Arc::new(ScriptedDriver::with_states([LifecycleState::Running]));
        let token = CancellationToken::new();

        let err = reconciler(&driver)
            .with_wait_policy(WaitPolicy::new(Duration::ZERO, Duration::from_secs(1)))
            .converge(&token, "app-1", DesiredState::Running, ConvergeOptions::default())
            .await
            .expect_err("invalid");

        assert!(matches!(err, ReconcileError::Config(_)));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_lifecycle_events() {
        let driver = Arc::new(
            ScriptedDriver::with_states([LifecycleState::Stopped])
                .after(Transition::Deploy, [LifecycleState::Running]),
        );
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();

        reconciler(&driver)
            .with_bus(bus)
            .converge(&token, "app-1", DesiredState::Running, ConvergeOptions::default())
            .await
            .expect("converged");

        assert_eq!(
            kinds(&mut rx),
            vec![
                EventKind::ConvergeStarted,
                EventKind::Observed,
                EventKind::TransitionIssued,
                EventKind::Observed,
                EventKind::Converged,
            ]
        );
    }
}
