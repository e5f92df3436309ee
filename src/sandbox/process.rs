/// Interpreter child process handling

use crate::error::{EngineError, EngineResult};
use std::{path::Path, process::Stdio, time::Duration};
use tokio::process::Command;

/// Captured result of one interpreter run
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// None when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Error describing a non-zero exit, including everything written to stderr
    pub fn exit_error(&self) -> EngineError {
        let status = match self.exit_code {
            Some(code) => format!("Process exited with code {code}"),
            None => "Process terminated by signal".to_string(),
        };
        EngineError::Execution(format!("{status}: {}", self.stderr.trim()))
    }
}

/// Run `<interpreter> <script>` to completion.
///
/// Stdout and stderr are drained concurrently while the child runs. With a
/// timeout the child is killed once it expires.
pub async fn run_interpreter(
    interpreter: &str,
    script: &Path,
    timeout: Option<Duration>,
) -> EngineResult<ProcessOutput> {
    tracing::debug!("🐣 Spawning {} {}", interpreter, script.display());

    let child = Command::new(interpreter)
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            EngineError::Execution(format!("Failed to start interpreter '{interpreter}': {e}"))
        })?;

    let output = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            // Dropping the wait future drops the child, which kills it
            Err(_) => {
                return Err(EngineError::Execution(format!(
                    "Execution timed out after {}",
                    format_limit(limit)
                )))
            }
        },
        None => child.wait_with_output().await?,
    };

    Ok(ProcessOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Whole seconds as "Ns", anything finer as "Nms"
fn format_limit(limit: Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{}s", limit.as_secs())
    } else {
        format!("{}ms", limit.as_millis())
    }
}
