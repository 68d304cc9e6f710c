//! Shared building blocks for the SVC simulator workspace: capacity units,
//! naming rules, seed configuration and the command-runner seam drivers
//! program against.

pub mod config;
pub mod naming;
pub mod traits;
pub mod units;

pub use config::{ConfigError, NodeSpec, PoolSpec, SimConfig, SystemSpec};
pub use naming::{is_quoted, is_valid_object_name, unquote};
pub use traits::{CliOutput, CommandRunner};
pub use units::{bytes_to_human, to_bytes, CapacityUnit, UnitError, GIB};
