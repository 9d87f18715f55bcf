//! Drains the command queue into the monitoring daemon's external command
//! file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::DispatchError;
use crate::sink::{CommandReceiver, ExternalCommand};
use crate::util::time::fmt_epoch_utc;

const MAX_BATCH: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Log every command instead of writing it.
    Log,
    /// Append to this file or named pipe. It is never created.
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    target: DispatchTarget,
    retry_window: Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub written: usize,
    pub dropped: usize,
}

impl Dispatcher {
    pub const fn new(target: DispatchTarget, retry_window: Duration) -> Self {
        Self {
            target,
            retry_window,
        }
    }

    /// Writes one batch in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RetryExhausted`] when the command file stays
    /// unwritable for the whole retry window.
    pub async fn dispatch(&self, batch: &[ExternalCommand]) -> Result<(), DispatchError> {
        match &self.target {
            DispatchTarget::Log => {
                for item in batch {
                    info!(
                        command = %item.command,
                        received_at = %item.received_at.to_rfc3339(),
                        "dry-run: would submit command"
                    );
                }
                Ok(())
            }
            DispatchTarget::File(path) => {
                let payload: String = batch.iter().map(|item| item.command.to_line()).collect();
                self.write_with_retry(path, payload.into_bytes()).await?;
                for item in batch {
                    debug!(
                        command = %item.command,
                        command_time = %item.command.timestamp().map_or_else(String::new, fmt_epoch_utc),
                        "command submitted"
                    );
                }
                Ok(())
            }
        }
    }

    /// Bytes already written survive a failed attempt; a retry resumes
    /// after them so no line is written twice.
    async fn write_with_retry(&self, path: &Path, payload: Vec<u8>) -> Result<(), DispatchError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_randomization_factor(0.25)
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(self.retry_window))
            .build();

        let mut offset = 0;
        loop {
            let target = path.to_path_buf();
            let rest = payload[offset..].to_vec();
            let (written, result) =
                tokio::task::spawn_blocking(move || append(&target, &rest))
                    .await
                    .map_err(|err| DispatchError::Io {
                        path: path.to_path_buf(),
                        source: io::Error::other(err),
                    })?;
            offset += written;

            let err = match result {
                Ok(()) => return Ok(()),
                Err(source) => DispatchError::Io {
                    path: path.to_path_buf(),
                    source,
                },
            };
            if !err.is_retriable() {
                return Err(err);
            }
            match backoff.next_backoff() {
                Some(delay) => {
                    warn!(error = %err, written = offset, retry_in = ?delay, "command file not writable, retrying");
                    sleep(delay).await;
                }
                None => {
                    return Err(DispatchError::RetryExhausted {
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

/// Never blocks: a named pipe without a reader fails with `ENXIO` and a
/// full pipe with `EAGAIN`. Returns the bytes written before any error.
fn append(path: &Path, payload: &[u8]) -> (usize, io::Result<()>) {
    let mut file = match open_for_append(path) {
        Ok(file) => file,
        Err(err) => return (0, Err(err)),
    };
    let mut written = 0;
    while written < payload.len() {
        match file.write(&payload[written..]) {
            Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return (written, Err(err)),
        }
    }
    (written, Ok(()))
}

fn open_for_append(path: &Path) -> io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.append(true);
    #[cfg(unix)]
    {
        use nix::fcntl::OFlag;
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(OFlag::O_NONBLOCK.bits());
    }
    options.open(path)
}

/// Runs until the queue is closed and empty.
pub async fn run_dispatcher(rx: CommandReceiver, dispatcher: Dispatcher) -> DispatchStats {
    let mut stats = DispatchStats::default();
    while let Ok(mut batch) = rx.recv().await {
        while batch.len() < MAX_BATCH {
            match rx.try_recv() {
                Ok(more) => batch.extend(more),
                Err(_) => break,
            }
        }

        match dispatcher.dispatch(&batch).await {
            Ok(()) => stats.written += batch.len(),
            Err(err) => {
                error!(error = %err, dropped = batch.len(), "failed to submit commands");
                stats.dropped += batch.len();
            }
        }
    }
    info!(written = stats.written, dropped = stats.dropped, "dispatcher stopped");
    stats
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{DispatchStats, DispatchTarget, Dispatcher, run_dispatcher};
    use crate::command::control_command;
    use crate::error::DispatchError;
    use crate::sink::{ExternalCommand, channel};
    use crate::types::ControlKind;
    use chrono::Utc;
    use std::io::Write;
    use std::time::Duration;

    fn reload(ts: i64) -> ExternalCommand {
        ExternalCommand {
            command: control_command(ControlKind::Reload, ts),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_newline_terminated_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[0] EXISTING").unwrap();

        let (sink, rx) = channel(8, Duration::from_millis(50));
        let dispatcher = Dispatcher::new(
            DispatchTarget::File(file.path().to_path_buf()),
            Duration::from_millis(200),
        );
        sink.submit(vec![control_command(ControlKind::Reload, 1)])
            .await
            .unwrap();
        sink.submit(vec![control_command(ControlKind::Restart, 2)])
            .await
            .unwrap();
        sink.close();

        let stats = run_dispatcher(rx, dispatcher).await;
        assert_eq!(
            stats,
            DispatchStats {
                written: 2,
                dropped: 0
            }
        );
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "[0] EXISTING\n[1] RELOAD_CONFIG\n[2] RESTART_PROGRAM\n");
    }

    #[tokio::test]
    async fn missing_command_file_exhausts_retries() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(
            DispatchTarget::File(dir.path().join("nagios.cmd")),
            Duration::from_millis(150),
        );

        let err = dispatcher.dispatch(&[reload(1)]).await.expect_err("should fail");
        assert!(matches!(err, DispatchError::RetryExhausted { .. }));
        assert!(!dir.path().join("nagios.cmd").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipe_without_reader_does_not_block() {
        use nix::sys::stat::Mode;
        use nix::unistd::mkfifo;

        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("nagios.cmd");
        mkfifo(fifo.as_path(), Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        let dispatcher = Dispatcher::new(
            DispatchTarget::File(fifo),
            Duration::from_millis(200),
        );

        let result = tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(&[reload(1)]))
            .await
            .expect("dispatch must give up within the retry window");
        assert!(matches!(result, Err(DispatchError::RetryExhausted { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipe_reader_receives_lines() {
        use nix::sys::stat::Mode;
        use nix::unistd::mkfifo;

        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("nagios.cmd");
        mkfifo(fifo.as_path(), Mode::S_IRUSR | Mode::S_IWUSR).unwrap();

        let reader_path = fifo.clone();
        let reader = std::thread::spawn(move || std::fs::read_to_string(reader_path).unwrap());

        let dispatcher = Dispatcher::new(DispatchTarget::File(fifo), Duration::from_secs(5));
        dispatcher.dispatch(&[reload(1), reload(2)]).await.unwrap();

        assert_eq!(reader.join().unwrap(), "[1] RELOAD_CONFIG\n[2] RELOAD_CONFIG\n");
    }

    #[tokio::test]
    async fn log_target_accepts_everything() {
        let (sink, rx) = channel(8, Duration::from_millis(50));
        sink.submit(vec![control_command(ControlKind::Restart, 5)])
            .await
            .unwrap();
        sink.close();
        let stats = run_dispatcher(rx, Dispatcher::new(DispatchTarget::Log, Duration::from_secs(1))).await;
        assert_eq!(stats.written, 1);
    }
}
