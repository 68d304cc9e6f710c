//! The simulator instance and its command dispatcher.

use common::{CliOutput, CommandRunner, SimConfig};
use serde::Serialize;
use svc_cli::{tokenize, TokenizeError};
use tracing::{debug, instrument, warn};

use crate::error::{ErrorCode, SimError};
use crate::fault::{Fault, FaultTable};
use crate::handlers::{self, HandlerError, Request};
use crate::model::{
    FcConsistGrp, FcMap, Host, HostMapping, Partnership, RcConsistGrp, RcRelationship, Snapshot,
    Volume, VolumeGroup,
};
use crate::store::Store;

/// An in-process Storwize/SVC controller.
///
/// Commands run one at a time to completion; every handler observes the
/// writes of all earlier commands.
#[derive(Debug, Clone)]
pub struct Simulator {
    pub(crate) config: SimConfig,
    pub(crate) volumes: Store<Volume>,
    pub(crate) hosts: Store<Host>,
    pub(crate) mappings: Store<HostMapping>,
    pub(crate) fcmaps: Store<FcMap>,
    pub(crate) fc_groups: Store<FcConsistGrp>,
    pub(crate) rc_relationships: Store<RcRelationship>,
    pub(crate) rc_groups: Store<RcConsistGrp>,
    pub(crate) partnerships: Store<Partnership>,
    pub(crate) volume_groups: Store<VolumeGroup>,
    pub(crate) snapshots: Store<Snapshot>,
    faults: FaultTable,
}

/// Serialisable view of every store.
#[derive(Debug, Serialize)]
pub struct StateDump<'a> {
    pub volumes: &'a Store<Volume>,
    pub hosts: &'a Store<Host>,
    pub mappings: &'a Store<HostMapping>,
    pub fcmaps: &'a Store<FcMap>,
    pub fc_consistency_groups: &'a Store<FcConsistGrp>,
    pub rc_relationships: &'a Store<RcRelationship>,
    pub rc_consistency_groups: &'a Store<RcConsistGrp>,
    pub partnerships: &'a Store<Partnership>,
    pub volume_groups: &'a Store<VolumeGroup>,
    pub snapshots: &'a Store<Snapshot>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::with_config(SimConfig::default())
    }
}

impl Simulator {
    /// Build a simulator seeded from `config`.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: SimConfig) -> Self {
        Self {
            config,
            volumes: Store::new(),
            hosts: Store::new(),
            mappings: Store::new(),
            fcmaps: Store::new(),
            fc_groups: Store::new(),
            rc_relationships: Store::new(),
            rc_groups: Store::new(),
            partnerships: Store::new(),
            volume_groups: Store::new(),
            snapshots: Store::new(),
            faults: FaultTable::default(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Arm a one-shot fault for the next invocation of `cmd`. `fault` is a
    /// marker such as `header_mismatch` or a catalogue code.
    pub fn error_injection(&mut self, cmd: &str, fault: &str) -> Result<(), SimError> {
        let fault: Fault = fault.parse()?;
        self.inject(cmd, fault);
        Ok(())
    }

    pub fn inject(&mut self, cmd: &str, fault: Fault) {
        self.faults.arm(cmd, fault);
    }

    /// Run one command line.
    ///
    /// With `check_exit_code`, a device error is raised as
    /// [`SimError::ProcessExecution`]; otherwise it is returned in
    /// [`CliOutput::stderr`]. Caller mistakes (unknown verb or flag,
    /// unquoted pool name) are always raised.
    #[instrument(skip_all, fields(cmd = tracing::field::Empty))]
    pub fn execute<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        check_exit_code: bool,
    ) -> Result<CliOutput, SimError> {
        let line = tokens
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        let output = match tokenize(tokens) {
            Ok(args) => {
                tracing::Span::current().record("cmd", args.cmd.as_str());
                self.dispatch(Request::new(args, None))?
            }
            Err(TokenizeError::MissingArgument { cmd, flag }) => {
                debug!(cmd = %cmd, flag = %flag, "flag is missing its value");
                // The failed invocation still uses up its one-shot fault.
                self.faults.take(&cmd);
                CliOutput::failure(ErrorCode::MissingParameters.to_string())
            }
            Err(err) => return Err(SimError::invalid_input(err.to_string())),
        };

        if !output.is_success() {
            warn!(command = %line, code = output.error_code().unwrap_or(""), "command failed");
            if check_exit_code {
                return Err(SimError::ProcessExecution {
                    exit_code: 1,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    cmd: line,
                });
            }
        }
        Ok(output)
    }

    fn dispatch(&mut self, mut req: Request) -> Result<CliOutput, SimError> {
        let cmd = req.args.cmd.clone();
        let handler = handlers::lookup(&cmd).ok_or_else(|| SimError::UnknownCommand {
            cmd: cmd.clone(),
        })?;
        debug!(cmd = %cmd, obj = req.obj().unwrap_or(""), "dispatching");

        req.fault = self.faults.take(&cmd);
        match req.fault {
            Some(Fault::Code(code)) => return Ok(CliOutput::failure(code.to_string())),
            Some(Fault::FailFastpath) => {
                return Ok(CliOutput::failure(ErrorCode::NotSuitable.to_string()))
            }
            _ => {}
        }

        match handler(self, &req) {
            Ok(stdout) => Ok(CliOutput::success(stdout)),
            Err(HandlerError::Cli(err)) => {
                if let Some(detail) = &err.detail {
                    debug!(cmd = %cmd, code = err.code.code(), detail = %detail, "rejected");
                }
                Ok(CliOutput::failure(err.to_string()))
            }
            Err(HandlerError::Client(err)) => Err(err),
        }
    }

    /// Borrowed view of every store, for dumps and assertions.
    pub fn snapshot(&self) -> StateDump<'_> {
        StateDump {
            volumes: &self.volumes,
            hosts: &self.hosts,
            mappings: &self.mappings,
            fcmaps: &self.fcmaps,
            fc_consistency_groups: &self.fc_groups,
            rc_relationships: &self.rc_relationships,
            rc_consistency_groups: &self.rc_groups,
            partnerships: &self.partnerships,
            volume_groups: &self.volume_groups,
            snapshots: &self.snapshots,
        }
    }

    pub fn volumes(&self) -> &Store<Volume> {
        &self.volumes
    }

    pub fn hosts(&self) -> &Store<Host> {
        &self.hosts
    }

    pub fn mappings(&self) -> &Store<HostMapping> {
        &self.mappings
    }

    pub fn fcmaps(&self) -> &Store<FcMap> {
        &self.fcmaps
    }

    pub fn fc_groups(&self) -> &Store<FcConsistGrp> {
        &self.fc_groups
    }

    pub fn rc_relationships(&self) -> &Store<RcRelationship> {
        &self.rc_relationships
    }

    pub fn rc_groups(&self) -> &Store<RcConsistGrp> {
        &self.rc_groups
    }

    pub fn partnerships(&self) -> &Store<Partnership> {
        &self.partnerships
    }

    pub fn volume_groups(&self) -> &Store<VolumeGroup> {
        &self.volume_groups
    }

    pub fn snapshots(&self) -> &Store<Snapshot> {
        &self.snapshots
    }
}

impl CommandRunner for Simulator {
    type Error = SimError;

    fn run(&mut self, tokens: &[String], check_exit_code: bool) -> Result<CliOutput, Self::Error> {
        self.execute(tokens, check_exit_code)
    }
}
