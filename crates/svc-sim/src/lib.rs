//! In-process simulator of an IBM Storwize/SVC block-storage controller's
//! management CLI.
//!
//! A [`Simulator`] accepts the same token sequences a volume driver sends
//! over SSH and answers with the stdout/stderr text the real array would
//! produce. Objects live in per-kind [`Store`]s; FlashCopy mappings and
//! Remote-Copy relationships advance through explicit state machines.
//!
//! # Example
//!
//! ```
//! use svc_sim::Simulator;
//!
//! let mut sim = Simulator::default();
//! let out = sim
//!     .execute(&["svctask", "mkvdisk", "-name", "v1", "-mdiskgrp", "\"openstack\"", "-size", "1", "-unit", "gb"], true)
//!     .unwrap();
//! assert_eq!(out.stdout, "Virtual Disk, id [0], successfully created");
//! ```

pub mod error;
pub mod fault;
mod handlers;
pub mod model;
pub mod simulator;
pub mod state;
pub mod store;

pub use error::{CliError, ErrorCode, SimError};
pub use fault::Fault;
pub use model::{
    ClusterRef, CopyType, CyclingMode, FcConsistGrp, FcMap, Host, HostMapping, Partnership,
    Primary, RcConsistGrp, RcRelationship, Snapshot, ThinProvisioning, VdiskCopy, Volume,
    VolumeGroup,
};
pub use simulator::{Simulator, StateDump};
pub use state::{FcState, FcTrigger, RcState, RcTrigger};
pub use store::{Record, Store};
