//! # Example: converge_in_memory
//!
//! Drives an in-memory "remote" application through a few desired states and prints the
//! events published by the reconciler.
//!
//! The fake remote behaves like the real one:
//! - transitions are accepted immediately and finish asynchronously (`*ING` states first);
//! - the first status read fails with a connection reset, so a retry is visible;
//! - the first deploy lands out of date, so the reconciler follows up with a restart.
//!
//! ## Flow
//! ```text
//! STOPPED ──converge(RUNNING)──► Deploy ─► DEPLOYING ─► RUNNING (out of date)
//!                                 └─► Restart ─► RESTARTING ─► RUNNING
//!         ──converge(STOPPED)──► Stop   ─► STOPPING  ─► STOPPED
//!         ──converge(DELETED)──► Delete ─► DELETING  ─► DELETED
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=convergent=info cargo run --example converge_in_memory --features logging
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use convergent::{
    ActionInvoker, Bus, ConvergeOptions, DesiredState, Freshness, JitterStrategy, LifecycleState,
    Observation, RemoteFailure, ResourceKind, RetryPolicy, StateReconciler, StatusReader,
    TransportError, TransportResponse, WaitPolicy,
};

/// Remote application whose transitions complete in the background.
struct InMemoryApp {
    state: Arc<Mutex<Observation>>,
    flaky_read: AtomicBool,
    stale_deploy: AtomicBool,
}

impl InMemoryApp {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Observation::new(LifecycleState::Stopped))),
            flaky_read: AtomicBool::new(true),
            stale_deploy: AtomicBool::new(true),
        }
    }

    fn set(state: &Mutex<Observation>, obs: Observation) {
        *state.lock().unwrap_or_else(PoisonError::into_inner) = obs;
    }

    /// Moves to `during` now and to `settled` a little later.
    fn begin(&self, during: LifecycleState, settled: Observation) -> TransportResponse {
        Self::set(&self.state, Observation::new(during));
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            Self::set(&state, settled);
        });
        TransportResponse::empty(202)
    }
}

#[async_trait]
impl StatusReader for InMemoryApp {
    async fn get_state(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<Observation, RemoteFailure> {
        if self.flaky_read.swap(false, Ordering::Relaxed) {
            return Err(TransportError::ConnectionReset.into());
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

#[async_trait]
impl ActionInvoker for InMemoryApp {
    async fn deploy(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        let freshness = if self.stale_deploy.swap(false, Ordering::Relaxed) {
            Freshness::OutOfDate
        } else {
            Freshness::UpToDate
        };
        let settled = Observation::new(LifecycleState::Running).with_freshness(freshness);
        Ok(self.begin(LifecycleState::Deploying, settled))
    }

    async fn stop(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        let settled = Observation::new(LifecycleState::Stopped);
        Ok(self.begin(LifecycleState::Stopping, settled))
    }

    async fn restart(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        let settled =
            Observation::new(LifecycleState::Running).with_freshness(Freshness::UpToDate);
        Ok(self.begin(LifecycleState::Restarting, settled))
    }

    async fn delete(
        &self,
        _ctx: &CancellationToken,
        _id: &str,
    ) -> Result<TransportResponse, RemoteFailure> {
        let settled = Observation::new(LifecycleState::Deleted);
        Ok(self.begin(LifecycleState::Deleting, settled))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Tracing to stderr, driven by RUST_LOG
    convergent::logging::init();

    // 2. Print every event published by the reconciler
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(ev) = rx.recv().await {
            let state = ev.state.as_ref().map(|s| s.as_str()).unwrap_or("-");
            let action = ev.action.map(|a| a.as_str()).unwrap_or("-");
            println!(
                "[event #{:>3}] {:<18} state={:<12} action={}",
                ev.seq,
                ev.kind.as_str(),
                state,
                action
            );
        }
    });

    // 3. Short policies so the demo finishes in a few seconds
    let app = Arc::new(InMemoryApp::new());
    let reconciler = StateReconciler::for_driver(ResourceKind::Application, app)
        .with_retry_policy(RetryPolicy {
            base_backoff: Duration::from_millis(200),
            jitter: JitterStrategy::Equal,
            ..RetryPolicy::default()
        })
        .with_wait_policy(WaitPolicy::new(
            Duration::from_millis(250),
            Duration::from_secs(10),
        ))
        .with_bus(bus);

    // 4. Ctrl-C cancels whatever is in flight
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    // 5. Walk the application through its lifecycle
    for desired in [
        DesiredState::Running,
        DesiredState::Running,
        DesiredState::Stopped,
        DesiredState::Deleted,
    ] {
        let done = reconciler
            .converge(&token, "demo-app", desired, ConvergeOptions::default())
            .await?;
        println!(
            "[main] desired={desired} reached={} transitions={:?}",
            done.state(),
            done.transitions
        );
    }

    println!("[main] done.");
    Ok(())
}
