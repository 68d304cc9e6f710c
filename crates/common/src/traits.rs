/// Captured output of one CLI invocation.
///
/// A non-empty `stderr` means the command failed; the first token of
/// `stderr` is then the device error code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.stderr.is_empty()
    }

    /// Device error code carried in `stderr`, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.stderr.split_whitespace().next()
    }
}

/// Anything that executes device CLI invocations: the in-process
/// simulator, or an SSH transport on the driver side.
pub trait CommandRunner {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run one tokenised command. When `check_exit_code` is set a failing
    /// command is reported through `Err`; otherwise the failure stays in
    /// [`CliOutput::stderr`].
    fn run(&mut self, tokens: &[String], check_exit_code: bool) -> Result<CliOutput, Self::Error>;
}
