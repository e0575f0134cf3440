//! Component A: the Tool Invoker. Every external command this crate runs
//! goes through [`RunAndCheck`], so every failure surfaces as a structured
//! [`CoreError::ToolFailure`] rather than being swallowed or left as a bare
//! `io::Error`.

use std::process::Command;

use log::trace;

use crate::error::CoreError;

/// Captured output of a successfully-run external command.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit: Option<i32>,
}

pub trait RunAndCheck {
    /// Run the command, returning its captured output on success or a
    /// `ToolFailure` carrying the rendered arguments, exit code, and stderr.
    fn run_and_check(&mut self) -> Result<ToolOutput, CoreError>;

    /// Convenience wrapper around `run_and_check` for callers that only
    /// want stdout.
    fn output_and_check(&mut self) -> Result<String, CoreError> {
        self.run_and_check().map(|o| o.stdout)
    }
}

impl RunAndCheck for Command {
    fn run_and_check(&mut self) -> Result<ToolOutput, CoreError> {
        let tool = self.get_program().to_string_lossy().into_owned();
        let args: Vec<String> = self
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        trace!("Executing '{tool} {}'", args.join(" "));

        let output = self.output().map_err(|e| CoreError::ToolFailure {
            tool: tool.clone(),
            args: args.clone(),
            exit: None,
            stderr: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(CoreError::ToolFailure {
                tool,
                args,
                exit: output.status.code(),
                stderr,
            });
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            exit: output.status.code(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_run_and_check_success() {
        let mut cmd = Command::new("echo");
        cmd.arg("something");
        let output = cmd.run_and_check().unwrap();
        assert_eq!(output.stdout, "something\n");
        assert_eq!(output.exit, Some(0));
    }

    #[test]
    fn test_run_and_check_failure_exit_code() {
        let mut cmd = Command::new("false");
        let err = cmd.run_and_check().unwrap_err();
        match err {
            CoreError::ToolFailure { tool, exit, .. } => {
                assert_eq!(tool, "false");
                assert_eq!(exit, Some(1));
            }
            other => panic!("expected ToolFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_run_and_check_missing_binary() {
        let mut cmd = Command::new("nonexistent_command_1234");
        let err = cmd.run_and_check().unwrap_err();
        assert!(matches!(err, CoreError::ToolFailure { exit: None, .. }));
    }

    #[test]
    fn test_output_and_check() {
        let mut cmd = Command::new("echo");
        cmd.arg("hi");
        assert_eq!(cmd.output_and_check().unwrap(), "hi\n");
    }
}
