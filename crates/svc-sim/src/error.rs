//! Device error catalogue and simulator client errors.

use std::fmt;

use common::ConfigError;
use thiserror::Error;

/// Device error catalogue. `Display` renders the exact stderr line the
/// device emits: `"<code> <message>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoObjectId,
    MissingParameters,
    UnsupportedParameter,
    MutuallyExclusive,
    NotSuitable,
    DoesNotExist,
    ObjectMissing,
    VdiskInUse,
    HostHasMappings,
    AlreadyMappedToHost,
    LunInUse,
    FcInvalidState,
    NoDirection,
    RcInvalidState,
    AlreadyExists,
    NotInGroup,
    VdiskAlreadyMapped,
    SameSourceTarget,
    LastCopy,
    CopyNotFound,
    InvalidName,
    PortInUse,
    FastFormatting,
    CopyTypeMismatch,
    FullyAllocatedInRelation,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 25] = [
        ErrorCode::NoObjectId,
        ErrorCode::MissingParameters,
        ErrorCode::UnsupportedParameter,
        ErrorCode::MutuallyExclusive,
        ErrorCode::NotSuitable,
        ErrorCode::DoesNotExist,
        ErrorCode::ObjectMissing,
        ErrorCode::VdiskInUse,
        ErrorCode::HostHasMappings,
        ErrorCode::AlreadyMappedToHost,
        ErrorCode::LunInUse,
        ErrorCode::FcInvalidState,
        ErrorCode::NoDirection,
        ErrorCode::RcInvalidState,
        ErrorCode::AlreadyExists,
        ErrorCode::NotInGroup,
        ErrorCode::VdiskAlreadyMapped,
        ErrorCode::SameSourceTarget,
        ErrorCode::LastCopy,
        ErrorCode::CopyNotFound,
        ErrorCode::InvalidName,
        ErrorCode::PortInUse,
        ErrorCode::FastFormatting,
        ErrorCode::CopyTypeMismatch,
        ErrorCode::FullyAllocatedInRelation,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ErrorCode::NoObjectId => "CMMVC5701E",
            ErrorCode::MissingParameters => "CMMVC5707E",
            ErrorCode::UnsupportedParameter => "CMMVC5709E",
            ErrorCode::MutuallyExclusive => "CMMVC5713E",
            ErrorCode::NotSuitable => "CMMVC5753E",
            ErrorCode::DoesNotExist => "CMMVC5754E",
            ErrorCode::ObjectMissing => "CMMVC5804E",
            ErrorCode::VdiskInUse => "CMMVC5840E",
            ErrorCode::HostHasMappings => "CMMVC5871E",
            ErrorCode::AlreadyMappedToHost => "CMMVC5878E",
            ErrorCode::LunInUse => "CMMVC5879E",
            ErrorCode::FcInvalidState => "CMMVC5903E",
            ErrorCode::NoDirection => "CMMVC5963E",
            ErrorCode::RcInvalidState => "CMMVC5982E",
            ErrorCode::AlreadyExists => "CMMVC6035E",
            ErrorCode::NotInGroup => "CMMVC6065E",
            ErrorCode::VdiskAlreadyMapped => "CMMVC6071E",
            ErrorCode::SameSourceTarget => "CMMVC6303E",
            ErrorCode::LastCopy => "CMMVC6351E",
            ErrorCode::CopyNotFound => "CMMVC6353E",
            ErrorCode::InvalidName => "CMMVC6527E",
            ErrorCode::PortInUse => "CMMVC6581E",
            ErrorCode::FastFormatting => "CMMVC8587E",
            ErrorCode::CopyTypeMismatch => "CMMVC9012E",
            ErrorCode::FullyAllocatedInRelation => "CMMVC9201E",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NoObjectId => "No object ID was specified.",
            ErrorCode::MissingParameters => "Required parameters are missing.",
            ErrorCode::UnsupportedParameter => "A parameter value is not supported.",
            ErrorCode::MutuallyExclusive => "Some parameters are mutually exclusive.",
            ErrorCode::NotSuitable => {
                "The specified object does not exist or is not a suitable candidate."
            }
            ErrorCode::DoesNotExist => {
                "The specified object does not exist, or the name supplied does not meet the naming rules."
            }
            ErrorCode::ObjectMissing => {
                "The action failed because an object that was specified in the command does not exist."
            }
            ErrorCode::VdiskInUse => {
                "The virtual disk (VDisk) was not deleted because it is mapped to a host or because it is part of a FlashCopy or Remote Copy mapping, or is involved in an image mode migrate."
            }
            ErrorCode::HostHasMappings => {
                "The action failed because one or more of the configured vdisks is mapped to the host."
            }
            ErrorCode::AlreadyMappedToHost => {
                "The VDisk-to-host mapping was not created because the VDisk is already mapped to this host."
            }
            ErrorCode::LunInUse => {
                "The VDisk-to-host mapping was not created because a VDisk is already mapped to this host with this SCSI LUN."
            }
            ErrorCode::FcInvalidState => {
                "The FlashCopy mapping was not changed because the mapping or consistency group is another state."
            }
            ErrorCode::NoDirection => "No direction has been defined.",
            ErrorCode::RcInvalidState => {
                "The operation was not performed because it is not valid given the current relationship state."
            }
            ErrorCode::AlreadyExists => "The action failed as the object already exists.",
            ErrorCode::NotInGroup => "The action failed as the object is not in a group.",
            ErrorCode::VdiskAlreadyMapped => {
                "The VDisk-to-host mapping was not created because the VDisk is already mapped to a host."
            }
            ErrorCode::SameSourceTarget => {
                "The FlashCopy mapping was not created because the source and target virtual disks (VDisks) are the same."
            }
            ErrorCode::LastCopy => {
                "The command failed because the copy is the last copy of the volume."
            }
            ErrorCode::CopyNotFound => "The command failed because the copy specified does not exist.",
            ErrorCode::InvalidName => {
                "The name that you have entered is not valid. The name can contain letters, numbers, spaces, periods, dashes, and underscores. The name must begin with a letter or an underscore. The name must not begin or end with a space."
            }
            ErrorCode::PortInUse => {
                "The command has failed because the port name is already assigned or is not valid."
            }
            ErrorCode::FastFormatting => {
                "The command failed because the volume is being fast formatted."
            }
            ErrorCode::CopyTypeMismatch => {
                "The copy type differs from other copies already in the consistency group."
            }
            ErrorCode::FullyAllocatedInRelation => {
                "The command failed because the copy is fully allocated and the volume is in a remote copy relationship with change volumes."
            }
        }
    }

    /// Look an entry up by its `CMMVCnnnnE` code.
    pub fn from_code(code: &str) -> Option<Self> {
        ErrorCode::ALL.into_iter().find(|entry| entry.code() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

/// A device-level failure returned by a handler. Only the catalogue entry
/// reaches stderr; `detail` is for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}")]
pub struct CliError {
    pub code: ErrorCode,
    pub detail: Option<String>,
}

impl CliError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: Some(detail.into()),
        }
    }
}

impl From<ErrorCode> for CliError {
    fn from(code: ErrorCode) -> Self {
        CliError::new(code)
    }
}

/// Errors raised to the caller of the simulator rather than rendered as
/// device output.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Unknown command: {cmd}")]
    UnknownCommand { cmd: String },

    #[error(
        "Unexpected error while running command.\nCommand: {cmd}\nExit code: {exit_code}\nStdout: {stdout:?}\nStderr: {stderr:?}"
    )]
    ProcessExecution {
        exit_code: i32,
        stdout: String,
        stderr: String,
        cmd: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SimError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        SimError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Device error code carried by a process-execution failure.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            SimError::ProcessExecution { stderr, .. } => stderr.split_whitespace().next(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_codes_are_unique_and_roundtrip() {
        for entry in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(entry.code()), Some(entry));
            assert!(entry.to_string().starts_with(entry.code()));
        }
        assert_eq!(ErrorCode::from_code("CMMVC0000E"), None);
    }

    #[test]
    fn test_cli_error_display_is_catalogue_line() {
        let err = CliError::with_detail(ErrorCode::NotSuitable, "volume vol9");
        assert_eq!(
            err.to_string(),
            "CMMVC5753E The specified object does not exist or is not a suitable candidate."
        );
    }

    #[test]
    fn test_process_execution_code() {
        let err = SimError::ProcessExecution {
            exit_code: 1,
            stdout: String::new(),
            stderr: ErrorCode::LunInUse.to_string(),
            cmd: "mkvdiskhostmap -host h1 -scsi 0 v1".into(),
        };
        assert_eq!(err.error_code(), Some("CMMVC5879E"));
        assert!(err.to_string().contains("mkvdiskhostmap"));
    }
}
