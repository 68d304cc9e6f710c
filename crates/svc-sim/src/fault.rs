//! One-shot fault injection.
//!
//! A fault is armed against a verb and consumed by that verb's next
//! invocation, whatever the outcome.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{ErrorCode, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Drop one header column from a listing.
    HeaderMismatch,
    /// Drop the first field of every data row.
    RemoveField,
    /// Apply `wait` until the object stops changing.
    SpeedUp,
    /// Report a non-numeric id on creation.
    BadId,
    NoCompression,
    MissingHost,
    BiggerTroubles,
    FailFastpath,
    BlankPrefNode,
    NoPrefNode,
    NoHosts,
    NoInfo,
    FastFormatting,
    NoWwpn,
    NoIqn,
    /// Fail with this catalogue entry before the handler runs.
    Code(ErrorCode),
}

impl Fault {
    const MARKERS: [(&'static str, Fault); 15] = [
        ("header_mismatch", Fault::HeaderMismatch),
        ("remove_field", Fault::RemoveField),
        ("speed_up", Fault::SpeedUp),
        ("bad_id", Fault::BadId),
        ("no_compression", Fault::NoCompression),
        ("missing_host", Fault::MissingHost),
        ("bigger_troubles", Fault::BiggerTroubles),
        ("fail_fastpath", Fault::FailFastpath),
        ("blank_pref_node", Fault::BlankPrefNode),
        ("no_pref_node", Fault::NoPrefNode),
        ("no_hosts", Fault::NoHosts),
        ("no_info", Fault::NoInfo),
        ("fast_formatting", Fault::FastFormatting),
        ("no_wwpn", Fault::NoWwpn),
        ("no_iqn", Fault::NoIqn),
    ];
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Fault::Code(code) = self {
            return f.write_str(code.code());
        }
        let marker = Fault::MARKERS
            .iter()
            .find(|(_, fault)| fault == self)
            .map_or("unknown", |(marker, _)| *marker);
        f.write_str(marker)
    }
}

impl FromStr for Fault {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(code) = ErrorCode::from_code(s) {
            return Ok(Fault::Code(code));
        }
        Fault::MARKERS
            .iter()
            .find(|(marker, _)| *marker == s)
            .map(|(_, fault)| *fault)
            .ok_or_else(|| SimError::invalid_input(format!("unknown fault marker `{}`", s)))
    }
}

/// Armed faults, one per verb.
#[derive(Debug, Default, Clone)]
pub struct FaultTable {
    armed: HashMap<String, Fault>,
}

impl FaultTable {
    pub fn arm(&mut self, cmd: &str, fault: Fault) {
        debug!(cmd, fault = %fault, "armed fault");
        self.armed.insert(cmd.to_string(), fault);
    }

    /// Remove and return the fault armed for `cmd`.
    pub fn take(&mut self, cmd: &str) -> Option<Fault> {
        let fault = self.armed.remove(cmd);
        if let Some(fault) = fault {
            debug!(cmd, fault = %fault, "consumed fault");
        }
        fault
    }

    pub fn is_armed(&self, cmd: &str) -> bool {
        self.armed.contains_key(cmd)
    }
}
