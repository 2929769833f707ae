//! Degraded-Mode Controller
//!
//! Decides whether the site renders CMS-driven navigation or the hardcoded fallback,
//! and runs the manual restore. All decisions go through [`state::transition`]; this
//! module only feeds it events and executes the side effects.

pub mod state;

pub use state::{
    transition, DegradeCause, NavEvent, NavMode, NavState, PendingDegrade, RestoreRejected,
    RESTORE_FAILED_NOTICE,
};

use crate::cache::{MutationKind, ReadCache};
use crate::config::NavigationConfig;
use crate::error::CmsError;
use crate::navigation::Navigation;
use crate::sync::SyncEngine;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

/// Link in the hardcoded fallback navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FallbackLink {
    pub label: &'static str,
    pub path: &'static str,
}

/// Navigation rendered while the store cannot be trusted.
pub const FALLBACK_LINKS: &[FallbackLink] = &[
    FallbackLink {
        label: "Home",
        path: "/",
    },
    FallbackLink {
        label: "Membership",
        path: "/membership",
    },
    FallbackLink {
        label: "Classes",
        path: "/classes",
    },
    FallbackLink {
        label: "Shop",
        path: "/shop",
    },
    FallbackLink {
        label: "Contact",
        path: "/contact",
    },
];

/// What the navigation UI should draw
#[derive(Debug, Clone)]
pub enum RenderedNavigation {
    Pending,
    Cms(Arc<Navigation>),
    Fallback(&'static [FallbackLink]),
}

/// Render-side snapshot of the controller
#[derive(Debug, Clone)]
pub struct NavigationView {
    pub mode: NavMode,
    pub items: RenderedNavigation,
    /// The single Restore control; enabled only while degraded
    pub restore_enabled: bool,
    pub notice: Option<&'static str>,
}

impl NavigationView {
    fn from_state(state: &NavState) -> Self {
        let (items, notice) = match state {
            NavState::Loading { .. } => (RenderedNavigation::Pending, None),
            NavState::Normal { navigation, .. } => {
                (RenderedNavigation::Cms(navigation.clone()), None)
            }
            NavState::Degraded { notice, .. } => {
                (RenderedNavigation::Fallback(FALLBACK_LINKS), *notice)
            }
            NavState::Restoring { .. } => (RenderedNavigation::Fallback(FALLBACK_LINKS), None),
        };
        Self {
            mode: state.mode(),
            items,
            restore_enabled: state.mode() == NavMode::Degraded,
            notice,
        }
    }
}

/// Result of a restore request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOutcome {
    Restored,
    StillDegraded,
    Rejected(RestoreRejected),
}

/// Timing bounds for the controller
#[derive(Debug, Clone, Copy)]
pub struct ControllerTiming {
    /// Delay between a failed or empty load and entering Degraded
    pub settle: Duration,
    pub load_timeout: Duration,
    pub restore_timeout: Duration,
}

impl Default for ControllerTiming {
    fn default() -> Self {
        Self::from(&NavigationConfig::default())
    }
}

impl From<&NavigationConfig> for ControllerTiming {
    fn from(config: &NavigationConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.settle_ms),
            load_timeout: Duration::from_millis(config.load_timeout_ms),
            restore_timeout: Duration::from_millis(config.restore_timeout_ms),
        }
    }
}

struct Inner {
    state: Mutex<NavState>,
    view_tx: watch::Sender<NavigationView>,
    cache: Arc<ReadCache>,
    sync: Arc<SyncEngine>,
    timing: ControllerTiming,
}

/// Degraded-mode controller; cheap to clone, all clones share one state
#[derive(Clone)]
pub struct NavigationController {
    inner: Arc<Inner>,
}

impl NavigationController {
    pub fn new(cache: Arc<ReadCache>, sync: Arc<SyncEngine>, timing: ControllerTiming) -> Self {
        let state = NavState::default();
        let (view_tx, _) = watch::channel(NavigationView::from_state(&state));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                view_tx,
                cache,
                sync,
                timing,
            }),
        }
    }

    pub fn mode(&self) -> NavMode {
        self.inner.state.lock().mode()
    }

    pub fn view(&self) -> NavigationView {
        self.inner.view_tx.borrow().clone()
    }

    /// Receiver that observes every view change.
    pub fn subscribe(&self) -> watch::Receiver<NavigationView> {
        self.inner.view_tx.subscribe()
    }

    pub fn timing(&self) -> ControllerTiming {
        self.inner.timing
    }

    /// Re-read navigation from the store and feed the result to the state machine.
    ///
    /// Always goes past the read cache. A read that does not finish within the load
    /// timeout counts as failed.
    pub async fn refresh(&self) -> NavMode {
        let load = self.inner.cache.refetch_navigation();
        let event = match timeout(self.inner.timing.load_timeout, load).await {
            Ok(Ok(navigation)) => NavEvent::Loaded(navigation),
            Ok(Err(e)) => {
                warn!(error = %e, kind = e.kind(), "Navigation load failed");
                NavEvent::LoadFailed
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.inner.timing.load_timeout.as_millis() as u64,
                    "Navigation load timed out"
                );
                NavEvent::LoadFailed
            }
        };
        self.inner.apply(event).unwrap_or_else(|_| self.mode())
    }

    /// Run the force-bootstrap recovery.
    ///
    /// Only accepted while degraded, and only one restore runs at a time. The work runs
    /// on its own task, so dropping the returned future does not cancel it. Whatever
    /// happens, the controller ends up actionable again (Normal or Degraded).
    pub async fn restore(&self) -> Result<RestoreOutcome, CmsError> {
        if let Err(rejected) = self.inner.apply(NavEvent::RestoreRequested) {
            info!(reason = %rejected, "Restore request rejected");
            return Ok(RestoreOutcome::Rejected(rejected));
        }

        let inner = self.inner.clone();
        match tokio::spawn(inner.run_restore()).await {
            Ok(result) => result,
            Err(join_error) => {
                let _ = self.inner.apply(NavEvent::RestoreFailed);
                Err(CmsError::Transport(format!(
                    "restore task ended abnormally: {}",
                    join_error
                )))
            }
        }
    }
}

impl Inner {
    fn apply(self: &Arc<Self>, event: NavEvent) -> Result<NavMode, RestoreRejected> {
        let mut state = self.state.lock();
        let previous_mode = state.mode();
        let previous_deadline = state.pending().map(|p| p.deadline);

        let next = transition(&state, event, Instant::now(), self.timing.settle)?;
        let next_deadline = next.pending().map(|p| p.deadline);
        let mode = next.mode();
        *state = next;
        self.view_tx.send_replace(NavigationView::from_state(&state));
        drop(state);

        if mode != previous_mode {
            info!(from = previous_mode.as_str(), to = mode.as_str(), "Navigation mode changed");
        }
        if let Some(deadline) = next_deadline {
            if previous_deadline != Some(deadline) {
                self.schedule_settle(deadline);
            }
        }
        Ok(mode)
    }

    fn schedule_settle(self: &Arc<Self>, deadline: Instant) {
        debug!(
            settle_ms = self.timing.settle.as_millis() as u64,
            "Navigation failure settling before degrade"
        );
        let inner = self.clone();
        tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = inner.apply(NavEvent::SettleElapsed);
        });
    }

    async fn run_restore(self: Arc<Self>) -> Result<RestoreOutcome, CmsError> {
        let bootstrap = self.sync.force_bootstrap();
        let outcome = match timeout(self.timing.restore_timeout, bootstrap).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(fault)) => {
                warn!(error = %fault, kind = fault.kind(), "Restore hit a data-integrity fault");
                let _ = self.apply(NavEvent::RestoreFailed);
                return Err(fault);
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timing.restore_timeout.as_millis() as u64,
                    "Restore timed out"
                );
                let _ = self.apply(NavEvent::RestoreFailed);
                return Ok(RestoreOutcome::StillDegraded);
            }
        };

        if !outcome.is_repair() {
            match outcome.error() {
                Some(error) => warn!(error = %error, "Restore failed"),
                None => warn!("Restore created nothing; navigation stays degraded"),
            }
            let _ = self.apply(NavEvent::RestoreFailed);
            return Ok(RestoreOutcome::StillDegraded);
        }

        self.cache.invalidate(MutationKind::NavigationBootstrapped);
        let reload = self.cache.refetch_navigation();
        let event = match timeout(self.timing.load_timeout, reload).await {
            Ok(Ok(navigation)) => NavEvent::RestoreSucceeded(navigation),
            Ok(Err(e)) => {
                warn!(error = %e, "Navigation refetch after restore failed");
                NavEvent::RestoreFailed
            }
            Err(_) => {
                warn!("Navigation refetch after restore timed out");
                NavEvent::RestoreFailed
            }
        };
        match self.apply(event) {
            Ok(NavMode::Normal) => Ok(RestoreOutcome::Restored),
            _ => Ok(RestoreOutcome::StillDegraded),
        }
    }
}
