use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

/// Run a command to completion, killing it if it exceeds `timeout`
pub async fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
) -> Result<Output, CommandError> {
    let program = cmd.as_std().get_program().to_string_lossy().to_string();
    cmd.kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(CommandError::Spawn { program, source }),
        Err(_) => Err(CommandError::Timeout { program, timeout }),
    }
}

/// Render a command line for logs
pub fn display_command(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    std::iter::once(std_cmd.get_program())
        .chain(std_cmd.get_args())
        .map(|part| part.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let mut cmd = Command::new("terraform");
        cmd.arg("state").arg("list");
        assert_eq!(display_command(&cmd), "terraform state list");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let mut cmd = Command::new("/nonexistent/tfimport-test-binary");
        let result = run_with_timeout(&mut cmd, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }
}
