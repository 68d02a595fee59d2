use std::io;

use tokio::io::{AsyncWriteExt, DuplexStream};

use teleglogger_types::StreamSource;

/// Bytes buffered per stream before an attachment has to wait for the reader
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Create the stdout/stderr pipe pair for one container.
///
/// The write halves go to the log attachment, the read halves to the line
/// splitters. Closing the sinks is what ends the splitters.
pub fn log_pipes() -> (LogSinks, LogSources) {
    let (stdout_tx, stdout_rx) = tokio::io::duplex(PIPE_CAPACITY);
    let (stderr_tx, stderr_rx) = tokio::io::duplex(PIPE_CAPACITY);
    (
        LogSinks {
            stdout: stdout_tx,
            stderr: stderr_tx,
        },
        LogSources {
            stdout: stdout_rx,
            stderr: stderr_rx,
        },
    )
}

/// Write halves of a container's output pipes
pub struct LogSinks {
    stdout: DuplexStream,
    stderr: DuplexStream,
}

impl LogSinks {
    pub async fn write(&mut self, source: StreamSource, bytes: &[u8]) -> io::Result<()> {
        match source {
            StreamSource::Stdout => self.stdout.write_all(bytes).await,
            StreamSource::Stderr => self.stderr.write_all(bytes).await,
        }
    }

    /// Close both pipes, ending the readers once buffered output is drained
    pub async fn close(mut self) -> io::Result<()> {
        let stdout = self.stdout.shutdown().await;
        let stderr = self.stderr.shutdown().await;
        stdout.and(stderr)
    }
}

/// Read halves of a container's output pipes
pub struct LogSources {
    pub stdout: DuplexStream,
    pub stderr: DuplexStream,
}
