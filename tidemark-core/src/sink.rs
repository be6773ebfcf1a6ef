use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::{Error, Record, Result};

/// Receives the batches of a collector, in order. Receivers must tolerate duplicates, a batch
/// pushed right before a crash is pushed again after the restart.
///
/// Collectors drive every push to completion, even once cancelled, so `push` need not be cancel
/// safe.
#[trait_variant::make(Sink: Send)]
pub trait LocalSink {
    async fn push(&mut self, records: Vec<Record>) -> Result<()>;
}

/// Hands batches over to another task through a bounded channel. A full channel suspends the
/// push until the receiver catches up.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Vec<Record>>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<Record>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    async fn push(&mut self, records: Vec<Record>) -> Result<()> {
        self.tx
            .send(records)
            .await
            .map_err(|_| Error::Sink("Batch receiver is closed".to_string()))
    }
}

/// Writes every record as one JSON line.
#[derive(Debug)]
pub struct StdoutSink<W = tokio::io::Stdout> {
    writer: W,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> StdoutSink<W> {
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Sink for StdoutSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn push(&mut self, records: Vec<Record>) -> Result<()> {
        let mut buf = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut buf, record)
                .map_err(|e| Error::Sink(format!("Failed to encode record: {e}")))?;
            buf.push(b'\n');
        }

        self.writer
            .write_all(&buf)
            .await
            .map_err(|e| Error::Sink(format!("Failed to write records: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Sink(format!("Failed to flush records: {e}")))?;

        debug!(records = records.len(), "Wrote batch");
        Ok(())
    }
}
