//! Navigation mode state machine: one tagged state, one transition function.

use crate::navigation::Navigation;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Generic message shown after a failed restore; never carries raw error text.
pub const RESTORE_FAILED_NOTICE: &str =
    "Navigation could not be restored. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavMode {
    Loading,
    Normal,
    Degraded,
    Restoring,
}

impl NavMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NavMode::Loading => "loading",
            NavMode::Normal => "normal",
            NavMode::Degraded => "degraded",
            NavMode::Restoring => "restoring",
        }
    }
}

/// Why navigation was (or is about to be) degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeCause {
    LoadFailed,
    EmptyNavigation,
    RestoreFailed,
}

/// A degrade waiting out the settle window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDegrade {
    pub deadline: Instant,
    pub cause: DegradeCause,
}

#[derive(Debug, Clone)]
pub enum NavState {
    Loading {
        pending: Option<PendingDegrade>,
    },
    /// Last good navigation; `pending` is set while a failed refresh settles
    Normal {
        navigation: Arc<Navigation>,
        pending: Option<PendingDegrade>,
    },
    Degraded {
        cause: DegradeCause,
        notice: Option<&'static str>,
    },
    Restoring {
        cause: DegradeCause,
    },
}

impl Default for NavState {
    fn default() -> Self {
        NavState::Loading { pending: None }
    }
}

impl NavState {
    pub fn mode(&self) -> NavMode {
        match self {
            NavState::Loading { .. } => NavMode::Loading,
            NavState::Normal { .. } => NavMode::Normal,
            NavState::Degraded { .. } => NavMode::Degraded,
            NavState::Restoring { .. } => NavMode::Restoring,
        }
    }

    pub fn pending(&self) -> Option<PendingDegrade> {
        match self {
            NavState::Loading { pending } | NavState::Normal { pending, .. } => *pending,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NavEvent {
    /// A navigation read completed
    Loaded(Arc<Navigation>),
    /// A navigation read errored or timed out
    LoadFailed,
    /// A settle timer fired
    SettleElapsed,
    RestoreRequested,
    /// Bootstrap repaired something and the refetch produced this navigation
    RestoreSucceeded(Arc<Navigation>),
    RestoreFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreRejected {
    #[error("navigation is not degraded")]
    NotDegraded,
    #[error("a restore is already in flight")]
    AlreadyRestoring,
}

/// Compute the next state.
///
/// Only `RestoreRequested` can be rejected; every other event outside its state is
/// ignored and returns the current state unchanged.
pub fn transition(
    state: &NavState,
    event: NavEvent,
    now: Instant,
    settle: Duration,
) -> Result<NavState, RestoreRejected> {
    // An existing deadline is kept so repeated failures cannot push degradation out.
    let arm = |pending: Option<PendingDegrade>, cause: DegradeCause| {
        pending.or(Some(PendingDegrade {
            deadline: now + settle,
            cause,
        }))
    };

    let next = match (state, event) {
        (NavState::Degraded { cause, .. }, NavEvent::RestoreRequested) => {
            NavState::Restoring { cause: *cause }
        }
        (NavState::Restoring { .. }, NavEvent::RestoreRequested) => {
            return Err(RestoreRejected::AlreadyRestoring)
        }
        (_, NavEvent::RestoreRequested) => return Err(RestoreRejected::NotDegraded),

        (NavState::Restoring { .. }, NavEvent::RestoreSucceeded(navigation)) => {
            if navigation.main_is_empty() {
                NavState::Degraded {
                    cause: DegradeCause::EmptyNavigation,
                    notice: Some(RESTORE_FAILED_NOTICE),
                }
            } else {
                NavState::Normal {
                    navigation,
                    pending: None,
                }
            }
        }
        (NavState::Restoring { .. }, NavEvent::RestoreFailed) => NavState::Degraded {
            cause: DegradeCause::RestoreFailed,
            notice: Some(RESTORE_FAILED_NOTICE),
        },
        // The restore's own refetch decides the outcome.
        (NavState::Restoring { .. }, _) => state.clone(),
        (_, NavEvent::RestoreSucceeded(_) | NavEvent::RestoreFailed) => state.clone(),

        (_, NavEvent::Loaded(navigation)) if !navigation.main_is_empty() => NavState::Normal {
            navigation,
            pending: None,
        },
        (NavState::Loading { pending }, NavEvent::Loaded(_)) => NavState::Loading {
            pending: arm(*pending, DegradeCause::EmptyNavigation),
        },
        (NavState::Loading { pending }, NavEvent::LoadFailed) => NavState::Loading {
            pending: arm(*pending, DegradeCause::LoadFailed),
        },
        (NavState::Normal { navigation, pending }, NavEvent::Loaded(_)) => NavState::Normal {
            navigation: navigation.clone(),
            pending: arm(*pending, DegradeCause::EmptyNavigation),
        },
        (NavState::Normal { navigation, pending }, NavEvent::LoadFailed) => NavState::Normal {
            navigation: navigation.clone(),
            pending: arm(*pending, DegradeCause::LoadFailed),
        },
        (NavState::Degraded { .. }, NavEvent::Loaded(_) | NavEvent::LoadFailed) => state.clone(),

        (_, NavEvent::SettleElapsed) => match state.pending() {
            Some(pending) if now >= pending.deadline => NavState::Degraded {
                cause: pending.cause,
                notice: None,
            },
            _ => state.clone(),
        },
    };
    Ok(next)
}
