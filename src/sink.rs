use std::time::Duration;

use async_channel::{Receiver, Sender, bounded};
use chrono::{DateTime, Utc};
use tokio::time::timeout;
use tracing::debug;

use crate::command::Command;
use crate::error::SinkError;

/// A command together with the moment the gateway accepted it.
#[derive(Clone, Debug)]
pub struct ExternalCommand {
    pub command: Command,
    pub received_at: DateTime<Utc>,
}

/// The commands of one request. Queued and dequeued as a unit.
pub type CommandBatch = Vec<ExternalCommand>;

/// Producer side of the command queue. Cheap to clone; every request
/// handler holds one.
#[derive(Clone, Debug)]
pub struct CommandSink {
    tx: Sender<CommandBatch>,
    enqueue_timeout: Duration,
}

pub type CommandReceiver = Receiver<CommandBatch>;

/// Creates a bounded queue holding at most `capacity` pending batches.
pub fn channel(capacity: usize, enqueue_timeout: Duration) -> (CommandSink, CommandReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        CommandSink {
            tx,
            enqueue_timeout,
        },
        rx,
    )
}

impl CommandSink {
    /// Enqueues `commands` as one batch, all stamped with the same receipt
    /// time. Either the whole batch is queued or none of it is.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] once the consumer is gone and
    /// [`SinkError::Timeout`] when the queue stays full for the configured
    /// enqueue timeout.
    pub async fn submit(&self, commands: Vec<Command>) -> Result<usize, SinkError> {
        if commands.is_empty() {
            return Ok(0);
        }
        let received_at = Utc::now();
        let batch: CommandBatch = commands
            .into_iter()
            .map(|command| {
                debug!(command = %command, "enqueueing command");
                ExternalCommand {
                    command,
                    received_at,
                }
            })
            .collect();
        let count = batch.len();
        match timeout(self.enqueue_timeout, self.tx.send(batch)).await {
            Ok(Ok(())) => Ok(count),
            Ok(Err(_)) => Err(SinkError::Closed),
            Err(_) => Err(SinkError::Timeout),
        }
    }

    /// Pending batches.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Stops accepting commands; queued ones stay readable.
    pub fn close(&self) -> bool {
        self.tx.close()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::channel;
    use crate::command::control_command;
    use crate::error::SinkError;
    use crate::types::ControlKind;
    use std::time::Duration;

    #[tokio::test]
    async fn submit_preserves_order_and_receipt_time() {
        let (sink, rx) = channel(8, Duration::from_millis(50));
        let cmds = vec![
            control_command(ControlKind::Reload, 1),
            control_command(ControlKind::Restart, 2),
        ];
        assert_eq!(sink.submit(cmds).await, Ok(2));
        assert_eq!(sink.len(), 1);

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch[0].command.as_str(), "[1] RELOAD_CONFIG");
        assert_eq!(batch[1].command.as_str(), "[2] RESTART_PROGRAM");
        assert_eq!(batch[0].received_at, batch[1].received_at);
    }

    #[tokio::test]
    async fn full_queue_times_out_without_partial_enqueue() {
        let (sink, rx) = channel(1, Duration::from_millis(20));
        sink.submit(vec![control_command(ControlKind::Reload, 1)])
            .await
            .unwrap();

        let cmds = vec![
            control_command(ControlKind::Reload, 2),
            control_command(ControlKind::Reload, 3),
        ];
        assert_eq!(sink.submit(cmds).await, Err(SinkError::Timeout));

        let queued: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).flatten().collect();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].command.as_str(), "[1] RELOAD_CONFIG");
    }

    #[tokio::test]
    async fn empty_submit_queues_nothing() {
        let (sink, _rx) = channel(1, Duration::from_millis(20));
        assert_eq!(sink.submit(Vec::new()).await, Ok(0));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (sink, rx) = channel(4, Duration::from_millis(20));
        drop(rx);
        let result = sink.submit(vec![control_command(ControlKind::Reload, 1)]).await;
        assert_eq!(result, Err(SinkError::Closed));
    }
}
