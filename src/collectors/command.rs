use crate::collectors::CollectError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

/// Runs `argv[0]` with the remaining arguments and returns its stdout.
/// The child is killed if it outlives `timeout`.
pub async fn run_command(argv: &[String], timeout: Duration) -> Result<String, CollectError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(CollectError::CommandSpawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let output = match time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(CollectError::CommandSpawn {
                program: program.clone(),
                source,
            });
        }
        Err(_elapsed) => {
            return Err(CollectError::CommandTimeout {
                program: program.clone(),
                timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(CollectError::CommandFailed {
            program: program.clone(),
            status: output.status,
            stderr: decode_cmd_stdout(&output.stderr).trim().to_string(),
        });
    }

    let text = decode_cmd_stdout(&output.stdout);
    debug!(program = %program, bytes = text.len(), output = %text, "command output captured");
    Ok(text)
}

/// Windows consoles may hand back UTF-16; everything else is UTF-8 or close to it.
fn decode_cmd_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let u16buf: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}
