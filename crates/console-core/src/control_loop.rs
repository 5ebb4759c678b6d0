//! Background refresh of whatever data the current route shows.
//!
//! One loop runs at a time. Each pass reads the route's control loop hook,
//! runs it to completion, then sleeps for the configured interval or until
//! the route changes, whichever comes first.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::hooks::HookName;
use crate::routes::Router;
use crate::state::{AppState, Dispatcher, Store};

/// Runs a refreshable hook on behalf of the loop.
pub trait Refresh: Send + Sync + 'static {
    fn refresh(&self, hook: HookName, dispatch: Dispatcher) -> impl Future<Output = ()> + Send;
}

struct LoopHandle {
    active: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Closes the write gate and wakes the sleeping loop. An in-flight
    /// refresh is left to finish; only its call state is still recorded.
    fn cancel(self) {
        self.active.store(false, Ordering::SeqCst);
        let _ = self.stop.send(true);
        drop(self.task);
    }
}

pub struct ControlLoop<R> {
    runner: Arc<R>,
    store: Store,
    router: Router,
    interval: Duration,
    current: Mutex<Option<LoopHandle>>,
}

impl<R: Refresh> ControlLoop<R> {
    pub fn new(runner: Arc<R>, store: Store, router: Router, interval: Duration) -> Self {
        Self {
            runner,
            store,
            router,
            interval,
            current: Mutex::new(None),
        }
    }

    /// Starts a fresh loop, cancelling the running one first.
    pub fn start(&self) -> Result<()> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| anyhow!("control loop lock poisoned"))?;

        if let Some(previous) = current.take() {
            previous.cancel();
        }

        let active = Arc::new(AtomicBool::new(true));
        let (stop, stop_rx) = watch::channel(false);
        let dispatch =
            Dispatcher::new(self.store.clone(), self.router.clone()).gated(active.clone());
        let task = tokio::spawn(run_loop(
            self.runner.clone(),
            dispatch,
            self.interval,
            stop_rx,
        ));

        info!(interval_ms = self.interval.as_millis() as u64, "control loop started");
        *current = Some(LoopHandle { active, stop, task });
        Ok(())
    }

    /// No-op when nothing is running.
    pub fn stop(&self) -> Result<()> {
        let previous = self
            .current
            .lock()
            .map_err(|_| anyhow!("control loop lock poisoned"))?
            .take();

        if let Some(previous) = previous {
            previous.cancel();
            info!("control loop stopped");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .map(|current| current.is_some())
            .unwrap_or(false)
    }
}

impl<R> Drop for ControlLoop<R> {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock()
            && let Some(previous) = current.take()
        {
            previous.cancel();
        }
    }
}

async fn run_loop<R: Refresh>(
    runner: Arc<R>,
    dispatch: Dispatcher,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut updates = dispatch.store().subscribe();

    while dispatch.is_active() {
        let (hook, generation) = {
            let state = updates.borrow_and_update();
            (state.route.policy.control_loop_hook, state.route_generation)
        };

        if let Some(hook) = hook {
            debug!(%hook, "control loop pass");
            runner.refresh(hook, dispatch.clone()).await;
        }

        if !dispatch.is_active() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = stop.changed() => break,
            _ = route_changed(&mut updates, generation) => {}
        }
    }

    debug!("control loop exited");
}

async fn route_changed(updates: &mut watch::Receiver<AppState>, seen: u64) {
    loop {
        if updates.changed().await.is_err() {
            return std::future::pending().await;
        }
        if updates.borrow().route_generation != seen {
            return;
        }
    }
}
