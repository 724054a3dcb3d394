//! Single-flight credential renewal
//!
//! Any number of requests may discover at the same moment that the access
//! credential has expired. The first one to ask starts a renewal cycle; every
//! later caller joins the waiter queue of that cycle instead of calling the
//! provider again. When the provider finishes, the outcome is broadcast to
//! everyone in the queue and the coordinator returns to idle.
//!
//! ```text
//! Idle     --(first caller)-----> InFlight
//! InFlight --(more callers)-----> InFlight   (queued, no new provider call)
//! InFlight --(provider success)-> Idle       (store updated, all resolved)
//! InFlight --(failure/timeout)--> Idle       (store cleared, all rejected, session invalidated)
//! ```
//!
//! A cycle only writes its result if the store is unchanged since the cycle
//! started. If a login or logout happened meanwhile, the result is dropped
//! and waiters get whatever the store holds now.
//!
//! The provider call runs on its own task, so dropping any caller (including
//! the one that started the cycle) only removes that caller from the queue.

use super::error::RenewalError;
use super::invalidator::SessionInvalidator;
use super::provider::RenewalProvider;
use super::store::CredentialStore;
use hostel_core::Credential;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info, info_span, warn};

/// Default bound on a single provider call
pub const DEFAULT_RENEWAL_TIMEOUT: Duration = Duration::from_secs(10);

/// What every caller of one renewal cycle receives
pub type RenewalOutcome = Result<Arc<Credential>, RenewalError>;

type Waiter = oneshot::Sender<RenewalOutcome>;

enum RenewalState {
    Idle,
    InFlight {
        cycle: u64,
        waiters: HashMap<u64, Waiter>,
    },
}

/// Coordinates renewal so that one provider call serves all concurrent callers
#[derive(Clone)]
pub struct RenewalCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn RenewalProvider>,
    store: CredentialStore,
    invalidator: Arc<SessionInvalidator>,
    timeout: Duration,
    state: Mutex<RenewalState>,
    next_waiter: AtomicU64,
    cycles: AtomicU64,
}

impl RenewalCoordinator {
    pub fn new(
        provider: Arc<dyn RenewalProvider>,
        store: CredentialStore,
        invalidator: Arc<SessionInvalidator>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                invalidator,
                timeout,
                state: Mutex::new(RenewalState::Idle),
                next_waiter: AtomicU64::new(0),
                cycles: AtomicU64::new(0),
            }),
        }
    }

    /// Wait for a renewed credential, starting a renewal cycle if none is running
    ///
    /// All callers that overlap with one cycle get the same outcome. Must be
    /// called from within a tokio runtime.
    pub async fn await_renewal(&self) -> RenewalOutcome {
        let (tx, rx) = oneshot::channel();
        let id = self.inner.next_waiter.fetch_add(1, Ordering::Relaxed);

        let started = {
            let mut state = self.inner.lock_state();
            match &mut *state {
                RenewalState::Idle => {
                    let cycle = self.inner.cycles.fetch_add(1, Ordering::AcqRel) + 1;
                    *state = RenewalState::InFlight {
                        cycle,
                        waiters: HashMap::from([(id, tx)]),
                    };
                    Some((cycle, self.inner.store.epoch()))
                }
                RenewalState::InFlight { cycle, waiters } => {
                    waiters.insert(id, tx);
                    debug!(cycle = *cycle, queued = waiters.len(), "Joined in-flight renewal");
                    None
                }
            }
        };

        if let Some((cycle, epoch)) = started {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(
                inner
                    .run_cycle(cycle, epoch)
                    .instrument(info_span!("credential_renewal", cycle)),
            );
        }

        let _guard = WaiterGuard {
            inner: &*self.inner,
            id,
        };
        rx.await.unwrap_or(Err(RenewalError::Abandoned))
    }

    /// Whether a renewal cycle is currently running
    pub fn is_in_flight(&self) -> bool {
        matches!(*self.inner.lock_state(), RenewalState::InFlight { .. })
    }

    /// Number of callers waiting on the current cycle
    pub fn waiting(&self) -> usize {
        match &*self.inner.lock_state() {
            RenewalState::Idle => 0,
            RenewalState::InFlight { waiters, .. } => waiters.len(),
        }
    }

    /// Number of renewal cycles started so far
    pub fn cycles_started(&self) -> u64 {
        self.inner.cycles.load(Ordering::Acquire)
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the waiters of `cycle` and return to idle
    fn finish(&self, cycle: u64) -> HashMap<u64, Waiter> {
        let mut state = self.lock_state();
        match &*state {
            RenewalState::InFlight { cycle: current, .. } if *current == cycle => {
                match std::mem::replace(&mut *state, RenewalState::Idle) {
                    RenewalState::InFlight { waiters, .. } => waiters,
                    RenewalState::Idle => HashMap::new(),
                }
            }
            _ => HashMap::new(),
        }
    }

    async fn run_cycle(self: Arc<Self>, cycle: u64, epoch: u64) {
        // Drains the queue with `Abandoned` if the provider panics
        let mut guard = CycleGuard {
            inner: &*self,
            cycle,
            done: false,
        };

        info!("Renewing access credential");
        let result = match tokio::time::timeout(self.timeout, self.provider.renew()).await {
            Ok(result) => result,
            Err(_) => Err(RenewalError::Timeout(self.timeout)),
        };

        let settled = match result {
            Ok(credential) => self.store.set_if_current(epoch, credential).await.map(Ok),
            Err(e) => self.store.clear_if_current(epoch).await.then_some(Err(e)),
        };
        let reset_session = matches!(settled, Some(Err(_)));
        let outcome = settled.unwrap_or_else(|| {
            debug!("Credential changed during renewal; discarding result");
            self.store.get().ok_or(RenewalError::SessionEnded)
        });

        let waiters = self.finish(cycle);
        guard.done = true;

        match &outcome {
            Ok(_) => info!(waiters = waiters.len(), "Access credential renewed"),
            Err(e) => warn!(waiters = waiters.len(), "Access credential renewal failed: {e}"),
        }

        // Callers observe the failure only after the session has been reset
        if let (true, Err(e)) = (reset_session, &outcome) {
            self.invalidator.invalidate(&e.to_string()).await;
        }

        for (_, waiter) in waiters {
            // A dropped receiver means that caller went away
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Removes a cancelled caller from the queue
struct WaiterGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        if let RenewalState::InFlight { waiters, .. } = &mut *self.inner.lock_state() {
            waiters.remove(&self.id);
        }
    }
}

struct CycleGuard<'a> {
    inner: &'a Inner,
    cycle: u64,
    done: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            let abandoned = self.inner.finish(self.cycle);
            warn!(waiters = abandoned.len(), "Renewal cycle ended without an outcome");
        }
    }
}
