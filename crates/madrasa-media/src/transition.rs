//! Pure slot transitions.
//!
//! [`compute`] decides the next [`SlotState`] and the storage side effects a
//! replace or clear implies. It performs no I/O, so the same decision can be
//! persisted first and acted on afterwards.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::MediaError;
use crate::slot::{AssetPointer, RetainedAsset, SlotState};

/// What the caller wants the slot to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Replace(AssetPointer),
    Clear,
}

/// How long a displaced asset is retained. Zero disables retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention(TimeDelta);

impl Retention {
    pub fn new(window: TimeDelta) -> Result<Self, MediaError> {
        if window < TimeDelta::zero() {
            return Err(MediaError::NegativeRetention);
        }
        Ok(Self(window))
    }

    pub fn days(days: u32) -> Self {
        Self(TimeDelta::days(i64::from(days)))
    }

    pub fn from_std(window: std::time::Duration) -> Result<Self, MediaError> {
        TimeDelta::from_std(window)
            .map(Self)
            .map_err(|_| MediaError::InvalidRequest("retention window out of range".to_string()))
    }

    pub fn disabled() -> Self {
        Self(TimeDelta::zero())
    }

    pub fn is_disabled(&self) -> bool {
        self.0.is_zero()
    }

    pub fn window(&self) -> TimeDelta {
        self.0
    }

    pub fn deadline_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.0
    }
}

/// A storage action implied by a transition, run after the state is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    MoveToTrash(AssetPointer),
    DeleteNow(AssetPointer),
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::MoveToTrash(_) => "move_to_trash",
            SideEffect::DeleteNow(_) => "delete_now",
        }
    }

    pub fn asset(&self) -> &AssetPointer {
        match self {
            SideEffect::MoveToTrash(asset) | SideEffect::DeleteNow(asset) => asset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing to do.
    Unchanged,
    /// Same stored object under a new URL; no storage work.
    Rekeyed,
    Replaced,
    Cleared,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Rekeyed => "rekeyed",
            Outcome::Replaced => "replaced",
            Outcome::Cleared => "cleared",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SlotState,
    pub effects: Vec<SideEffect>,
    pub outcome: Outcome,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.outcome == Outcome::Unchanged
    }
}

pub fn compute(
    state: &SlotState,
    intent: Intent,
    retention: Retention,
    now: DateTime<Utc>,
) -> Transition {
    match intent {
        Intent::Clear => clear(state, retention, now),
        Intent::Replace(incoming) => replace(state, incoming, retention, now),
    }
}

fn unchanged(state: &SlotState) -> Transition {
    Transition {
        next: state.clone(),
        effects: Vec::new(),
        outcome: Outcome::Unchanged,
    }
}

fn clear(state: &SlotState, retention: Retention, now: DateTime<Utc>) -> Transition {
    let Some(displaced) = state.current.clone() else {
        return unchanged(state);
    };

    let mut effects = Vec::new();
    let old = displace(displaced, state.old.as_ref(), None, retention, now, &mut effects);

    Transition {
        next: SlotState { current: None, old },
        effects,
        outcome: Outcome::Cleared,
    }
}

fn replace(
    state: &SlotState,
    incoming: AssetPointer,
    retention: Retention,
    now: DateTime<Utc>,
) -> Transition {
    match &state.current {
        // A URL already shown collapses to no change, whatever key came with it.
        Some(existing) if existing.url == incoming.url => unchanged(state),
        Some(existing) if existing.object_key == incoming.object_key => {
            let old = state
                .old
                .clone()
                .filter(|old| !old.asset.same_object(&incoming));
            Transition {
                next: SlotState {
                    current: Some(incoming),
                    old,
                },
                effects: Vec::new(),
                outcome: Outcome::Rekeyed,
            }
        }
        Some(existing) => {
            let mut effects = Vec::new();
            let old = displace(
                existing.clone(),
                state.old.as_ref(),
                Some(&incoming),
                retention,
                now,
                &mut effects,
            );
            Transition {
                next: SlotState {
                    current: Some(incoming),
                    old,
                },
                effects,
                outcome: Outcome::Replaced,
            }
        }
        None => {
            // The old asset may be reinstated; it is then no longer pending.
            let old = state
                .old
                .clone()
                .filter(|old| !old.asset.same_object(&incoming));
            Transition {
                next: SlotState {
                    current: Some(incoming),
                    old,
                },
                effects: Vec::new(),
                outcome: Outcome::Replaced,
            }
        }
    }
}

/// Moves `displaced` out of the current position and returns the new old
/// position, pushing the storage work it implies onto `effects`.
fn displace(
    displaced: AssetPointer,
    previous_old: Option<&RetainedAsset>,
    incoming: Option<&AssetPointer>,
    retention: Retention,
    now: DateTime<Utc>,
    effects: &mut Vec<SideEffect>,
) -> Option<RetainedAsset> {
    let previous_old =
        previous_old.filter(|old| incoming.is_none_or(|asset| !old.asset.same_object(asset)));

    if retention.is_disabled() {
        effects.push(SideEffect::DeleteNow(displaced));
        return previous_old.cloned();
    }

    if let Some(bumped) = previous_old {
        effects.push(SideEffect::DeleteNow(bumped.asset.clone()));
    }
    effects.push(SideEffect::MoveToTrash(displaced.clone()));

    Some(RetainedAsset {
        asset: displaced,
        delete_pending_until: retention.deadline_from(now),
    })
}
