//! Shell completions generation.

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::args::Cli;
use crate::error::LearnsyncError;

/// Generate the completion script for `shell`.
///
/// # Errors
///
/// Returns `Config` if the generated script is not valid UTF-8.
pub fn completions(shell: Shell) -> Result<String, LearnsyncError> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "learnsync", &mut buf);
    String::from_utf8(buf).map_err(|e| LearnsyncError::Config(format!("UTF-8 error: {e}")))
}
