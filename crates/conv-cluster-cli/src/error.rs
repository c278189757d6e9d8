//! CLI exit code handling.
//!
//! Exit codes:
//! - 0: Success (report on stdout)
//! - 1: Input or configuration error (stderr)
//! - 2: Output failure: the run completed but its results could not be
//!   written (stderr)

use conv_cluster_core::PipelineError;

/// Exit codes for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CliExitCode {
    /// Success - report printed to stdout
    Success = 0,
    /// Bad input file, bad configuration, or data the pipeline cannot handle
    InputError = 1,
    /// Output or sidecar could not be serialized or written
    OutputFailure = 2,
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

impl From<&PipelineError> for CliExitCode {
    fn from(err: &PipelineError) -> Self {
        if err.is_output_failure() {
            CliExitCode::OutputFailure
        } else {
            CliExitCode::InputError
        }
    }
}

/// Determine the exit code for an error chain.
///
/// The first [`PipelineError`] in the chain decides; anything else is an
/// input error.
pub fn exit_code_for_error(err: &anyhow::Error) -> CliExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(CliExitCode::from)
        .unwrap_or(CliExitCode::InputError)
}

/// Stage name of the first [`PipelineError`] in the chain, if any.
pub fn failed_stage(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(PipelineError::stage)
}
