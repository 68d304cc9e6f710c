//! Lifecycle state machines.
//!
//! The four transition tables are plain data: `(state, trigger, next)`
//! edges. A state with no outgoing edges is terminal. The `advance_*`
//! functions layer the progress side effects of `wait` on top of the
//! tables and map an illegal trigger to the device error code.

use std::fmt;

use serde::Serialize;

use crate::error::ErrorCode;
use crate::model::{CopyType, CyclingMode, FcMap, RcRelationship};

/// FlashCopy mapping and FlashCopy consistency-group states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FcState {
    Begin,
    Empty,
    IdleOrCopied,
    Preparing,
    Prepared,
    Copying,
    Stopping,
    Stopped,
    End,
}

impl FcState {
    pub fn as_str(self) -> &'static str {
        match self {
            FcState::Begin => "begin",
            FcState::Empty => "empty",
            FcState::IdleOrCopied => "idle_or_copied",
            FcState::Preparing => "preparing",
            FcState::Prepared => "prepared",
            FcState::Copying => "copying",
            FcState::Stopping => "stopping",
            FcState::Stopped => "stopped",
            FcState::End => "end",
        }
    }
}

impl fmt::Display for FcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FcTrigger {
    Make,
    Add,
    Prepare,
    FlushFailed,
    Wait,
    Start,
    Stop,
    Delete,
    DeleteForce,
}

/// Remote-copy relationship and consistency-group states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RcState {
    Empty,
    InconsistentStopped,
    InconsistentCopying,
    ConsistentSynchronized,
    ConsistentCopying,
    ConsistentStopped,
    Idling,
    End,
}

impl RcState {
    pub fn as_str(self) -> &'static str {
        match self {
            RcState::Empty => "empty",
            RcState::InconsistentStopped => "inconsistent_stopped",
            RcState::InconsistentCopying => "inconsistent_copying",
            RcState::ConsistentSynchronized => "consistent_synchronized",
            RcState::ConsistentCopying => "consistent_copying",
            RcState::ConsistentStopped => "consistent_stopped",
            RcState::Idling => "idling",
            RcState::End => "end",
        }
    }
}

impl fmt::Display for RcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RcTrigger {
    Add,
    Start,
    Stop,
    StopAccess,
    Wait,
    Delete,
    DeleteForce,
}

/// A static `(state, trigger) -> next` table.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTable<S: 'static, T: 'static> {
    edges: &'static [(S, T, S)],
}

impl<S: Copy + Eq, T: Copy + Eq> TransitionTable<S, T> {
    pub const fn new(edges: &'static [(S, T, S)]) -> Self {
        Self { edges }
    }

    pub fn next(&self, state: S, trigger: T) -> Option<S> {
        self.edges
            .iter()
            .find(|(from, on, _)| *from == state && *on == trigger)
            .map(|(_, _, to)| *to)
    }

    pub fn accepts(&self, state: S, trigger: T) -> bool {
        self.next(state, trigger).is_some()
    }

    pub fn is_terminal(&self, state: S) -> bool {
        !self.edges.iter().any(|(from, _, _)| *from == state)
    }
}

use FcState as F;
use FcTrigger as FT;
use RcState as R;
use RcTrigger as RT;

pub const FC_MAP: TransitionTable<FcState, FcTrigger> = TransitionTable::new(&[
    (F::Begin, FT::Make, F::IdleOrCopied),
    (F::IdleOrCopied, FT::Prepare, F::Preparing),
    (F::IdleOrCopied, FT::Delete, F::End),
    (F::IdleOrCopied, FT::DeleteForce, F::End),
    (F::Preparing, FT::FlushFailed, F::Stopped),
    (F::Preparing, FT::Wait, F::Prepared),
    (F::Prepared, FT::Stop, F::Stopped),
    (F::Prepared, FT::Start, F::Copying),
    (F::Copying, FT::Wait, F::IdleOrCopied),
    (F::Copying, FT::Stop, F::Stopping),
    (F::Stopping, FT::Wait, F::Stopped),
    (F::Stopped, FT::Prepare, F::Preparing),
    (F::Stopped, FT::DeleteForce, F::End),
]);

pub const FC_GROUP: TransitionTable<FcState, FcTrigger> = TransitionTable::new(&[
    (F::Begin, FT::Make, F::Empty),
    (F::Empty, FT::Add, F::IdleOrCopied),
    (F::Empty, FT::Delete, F::End),
    (F::Empty, FT::DeleteForce, F::End),
    (F::IdleOrCopied, FT::Prepare, F::Preparing),
    (F::IdleOrCopied, FT::Delete, F::End),
    (F::IdleOrCopied, FT::DeleteForce, F::End),
    (F::Preparing, FT::FlushFailed, F::Stopped),
    (F::Preparing, FT::Wait, F::Prepared),
    (F::Prepared, FT::Stop, F::Stopped),
    (F::Prepared, FT::Start, F::Copying),
    (F::Prepared, FT::Delete, F::End),
    (F::Prepared, FT::DeleteForce, F::End),
    (F::Copying, FT::Wait, F::IdleOrCopied),
    (F::Copying, FT::Stop, F::Stopping),
    (F::Copying, FT::Delete, F::End),
    (F::Copying, FT::DeleteForce, F::End),
    (F::Stopping, FT::Wait, F::Stopped),
    (F::Stopped, FT::Prepare, F::Preparing),
    (F::Stopped, FT::DeleteForce, F::End),
]);

pub const RC_REL: TransitionTable<RcState, RcTrigger> = TransitionTable::new(&[
    (R::InconsistentStopped, RT::Start, R::InconsistentCopying),
    (R::InconsistentStopped, RT::Stop, R::InconsistentStopped),
    (R::InconsistentStopped, RT::Delete, R::End),
    (R::InconsistentStopped, RT::DeleteForce, R::End),
    (R::InconsistentCopying, RT::Wait, R::ConsistentSynchronized),
    (R::InconsistentCopying, RT::Start, R::InconsistentCopying),
    (R::InconsistentCopying, RT::Stop, R::InconsistentStopped),
    (R::InconsistentCopying, RT::Delete, R::End),
    (R::InconsistentCopying, RT::DeleteForce, R::End),
    (R::ConsistentSynchronized, RT::Start, R::ConsistentSynchronized),
    (R::ConsistentSynchronized, RT::Stop, R::ConsistentStopped),
    (R::ConsistentSynchronized, RT::StopAccess, R::Idling),
    (R::ConsistentSynchronized, RT::Delete, R::End),
    (R::ConsistentSynchronized, RT::DeleteForce, R::End),
    (R::ConsistentCopying, RT::Start, R::ConsistentCopying),
    (R::ConsistentCopying, RT::Stop, R::ConsistentStopped),
    (R::ConsistentCopying, RT::StopAccess, R::Idling),
    (R::ConsistentCopying, RT::Delete, R::End),
    (R::ConsistentCopying, RT::DeleteForce, R::End),
    (R::ConsistentStopped, RT::Start, R::ConsistentSynchronized),
    (R::ConsistentStopped, RT::Stop, R::ConsistentStopped),
    (R::ConsistentStopped, RT::StopAccess, R::Idling),
    (R::ConsistentStopped, RT::Delete, R::End),
    (R::ConsistentStopped, RT::DeleteForce, R::End),
    (R::Idling, RT::Start, R::InconsistentCopying),
    (R::Idling, RT::Stop, R::InconsistentStopped),
    (R::Idling, RT::StopAccess, R::Idling),
    (R::Idling, RT::Delete, R::End),
    (R::Idling, RT::DeleteForce, R::End),
]);

pub const RC_GROUP: TransitionTable<RcState, RcTrigger> = TransitionTable::new(&[
    (R::Empty, RT::Add, R::InconsistentStopped),
    (R::Empty, RT::Delete, R::End),
    (R::Empty, RT::DeleteForce, R::End),
    (R::InconsistentStopped, RT::Start, R::InconsistentCopying),
    (R::InconsistentStopped, RT::Stop, R::InconsistentStopped),
    (R::InconsistentStopped, RT::Delete, R::End),
    (R::InconsistentStopped, RT::DeleteForce, R::End),
    (R::InconsistentCopying, RT::Wait, R::ConsistentSynchronized),
    (R::InconsistentCopying, RT::Start, R::InconsistentCopying),
    (R::InconsistentCopying, RT::Stop, R::InconsistentStopped),
    (R::InconsistentCopying, RT::Delete, R::End),
    (R::InconsistentCopying, RT::DeleteForce, R::End),
    (R::ConsistentSynchronized, RT::Start, R::ConsistentSynchronized),
    (R::ConsistentSynchronized, RT::Stop, R::ConsistentStopped),
    (R::ConsistentSynchronized, RT::StopAccess, R::Idling),
    (R::ConsistentSynchronized, RT::Delete, R::End),
    (R::ConsistentSynchronized, RT::DeleteForce, R::End),
    (R::ConsistentCopying, RT::Start, R::ConsistentCopying),
    (R::ConsistentCopying, RT::Stop, R::ConsistentStopped),
    (R::ConsistentCopying, RT::StopAccess, R::Idling),
    (R::ConsistentCopying, RT::Delete, R::End),
    (R::ConsistentCopying, RT::DeleteForce, R::End),
    (R::ConsistentStopped, RT::Start, R::ConsistentSynchronized),
    (R::ConsistentStopped, RT::Stop, R::ConsistentStopped),
    (R::ConsistentStopped, RT::StopAccess, R::Idling),
    (R::ConsistentStopped, RT::Delete, R::End),
    (R::ConsistentStopped, RT::DeleteForce, R::End),
    (R::Idling, RT::Start, R::InconsistentCopying),
    (R::Idling, RT::Stop, R::InconsistentStopped),
    (R::Idling, RT::StopAccess, R::Idling),
    (R::Idling, RT::Delete, R::End),
    (R::Idling, RT::DeleteForce, R::End),
]);

/// Next state for an fcmap, without side effects. `Ok(None)` means a
/// `wait` the current state ignores.
pub fn fcmap_next(state: FcState, trigger: FcTrigger) -> Result<Option<FcState>, ErrorCode> {
    table_next(&FC_MAP, state, trigger, FcTrigger::Wait, ErrorCode::FcInvalidState)
}

pub fn fc_group_next(state: FcState, trigger: FcTrigger) -> Result<Option<FcState>, ErrorCode> {
    table_next(&FC_GROUP, state, trigger, FcTrigger::Wait, ErrorCode::FcInvalidState)
}

pub fn rc_rel_next(state: RcState, trigger: RcTrigger) -> Result<Option<RcState>, ErrorCode> {
    table_next(&RC_REL, state, trigger, RcTrigger::Wait, ErrorCode::RcInvalidState)
}

pub fn rc_group_next(state: RcState, trigger: RcTrigger) -> Result<Option<RcState>, ErrorCode> {
    table_next(&RC_GROUP, state, trigger, RcTrigger::Wait, ErrorCode::RcInvalidState)
}

fn table_next<S: Copy + Eq, T: Copy + Eq>(
    table: &TransitionTable<S, T>,
    state: S,
    trigger: T,
    wait: T,
    illegal: ErrorCode,
) -> Result<Option<S>, ErrorCode> {
    match table.next(state, trigger) {
        Some(next) => Ok(Some(next)),
        None if trigger == wait => Ok(None),
        None => Err(illegal),
    }
}

/// Apply `trigger` to an fcmap. A `wait` while copying advances progress
/// by half instead of jumping straight to `idle_or_copied`; a mapping with
/// copy rate 0 never advances.
pub fn advance_fcmap(map: &mut FcMap, trigger: FcTrigger) -> Result<(), ErrorCode> {
    if map.status == FcState::Copying && trigger == FcTrigger::Wait {
        if map.copy_rate != 0 {
            if map.progress == 0 {
                map.progress = 50;
            } else {
                map.progress = 100;
                map.status = FcState::IdleOrCopied;
            }
        }
        return Ok(());
    }

    if let Some(next) = fcmap_next(map.status, trigger)? {
        if trigger == FcTrigger::Start {
            map.progress = 0;
        }
        map.status = next;
    }
    Ok(())
}

/// Apply `trigger` to a remote-copy relationship. A `wait` while
/// `inconsistent_copying` takes two steps: progress 50, then 100 with the
/// relationship consistent.
pub fn advance_rcrel(rel: &mut RcRelationship, trigger: RcTrigger) -> Result<(), ErrorCode> {
    if rel.state == RcState::InconsistentCopying && trigger == RcTrigger::Wait {
        if rel.progress == 0 {
            rel.progress = 50;
        } else {
            rel.progress = 100;
            rel.state = synchronized_state(rel.cycling_mode, Some(rel.copy_type));
        }
        return Ok(());
    }

    if let Some(next) = rc_rel_next(rel.state, trigger)? {
        if next == RcState::InconsistentCopying && rel.state != RcState::InconsistentCopying {
            rel.progress = 0;
        }
        rel.state = next;
    }
    Ok(())
}

/// State a copying relationship settles in once its data is in sync.
pub fn synchronized_state(cycling: CyclingMode, copy_type: Option<CopyType>) -> RcState {
    if cycling == CyclingMode::Multi && copy_type == Some(CopyType::Global) {
        RcState::ConsistentCopying
    } else {
        RcState::ConsistentSynchronized
    }
}
