//! Subprocess invocation for external plugins

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use super::ExternalError;

/// Runs an external plugin and returns its raw stdout
pub trait OutputGetter: Send + Sync {
    fn exec_output(&self, request: &[u8], path: &Path) -> Result<Vec<u8>, ExternalError>;
}

/// Runs the plugin as a child process
///
/// The executable gets no arguments. The request is written to its stdin
/// from a separate thread while its stdout is captured, and its stderr is
/// passed through to ours. Waits for the child to exit without a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOutputGetter;

impl OutputGetter for ProcessOutputGetter {
    fn exec_output(&self, request: &[u8], path: &Path) -> Result<Vec<u8>, ExternalError> {
        let execution = |reason: String| ExternalError::Execution {
            path: path.to_path_buf(),
            reason,
        };

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| execution(format!("failed to spawn: {}", e)))?;

        // Stdin is fed from its own thread while stdout drains; the pipe
        // closes when the writer drops it.
        let writer = child.stdin.take().map(|mut stdin| {
            let request = request.to_vec();
            let path = path.to_path_buf();
            thread::spawn(move || {
                if let Err(e) = stdin.write_all(&request) {
                    // Plugin may exit without reading stdin; the exit status decides
                    tracing::debug!(path = %path.display(), "failed to write request: {}", e);
                }
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| execution(format!("failed to wait for plugin: {}", e)))?;

        if let Some(writer) = writer {
            if writer.join().is_err() {
                tracing::debug!(path = %path.display(), "request writer panicked");
            }
        }

        if !output.status.success() {
            return Err(execution(match output.status.code() {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            }));
        }

        Ok(output.stdout)
    }
}
