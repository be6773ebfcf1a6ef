//! The two kinds of collectors:
//! - [TimestampCollector] follows a continuous timestamp watermark, for listings filterable by an
//!   exact instant.
//! - [DayBucketedCollector] follows a day and an offset within that day, for listings only
//!   filterable by date.
//!
//! Both push a batch before moving their watermark past it, and persist whatever progress they
//! made even when the cycle fails, so a restart re-delivers at most the batch in flight. A push is
//! never abandoned half way, cancellation ends the cycle between two pages.

use chrono::{DateTime, SubsecRound, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::CollectorMetrics;
use crate::paginate::{PaginationStyle, Paginator, VendorClient};
use crate::poll::{CycleReport, PollTask};
use crate::sink::Sink;
use crate::watermark::{CompanyCheckpoint, Extractor, WatermarkBounds, WatermarkStore, advance};
use crate::{Error, Record, Result};

pub struct TimestampCollector<C, S> {
    key: String,
    client: C,
    sink: S,
    store: WatermarkStore,
    bounds: WatermarkBounds,
    style: PaginationStyle,
    extract: Extractor,
    metrics: CollectorMetrics,
    /// Kept across cycles so that a failed write is retried and never rewound by the next read.
    watermark: Option<DateTime<Utc>>,
}

impl<C, S> TimestampCollector<C, S>
where
    C: VendorClient,
    S: Sink,
{
    pub fn new(
        key: impl Into<String>,
        client: C,
        sink: S,
        store: WatermarkStore,
        bounds: WatermarkBounds,
        style: PaginationStyle,
        extract: Extractor,
    ) -> Self {
        let key = key.into();
        Self {
            metrics: CollectorMetrics::new(key.as_str()),
            key,
            client,
            sink,
            store,
            bounds,
            style,
            extract,
            watermark: None,
        }
    }

    /// In-memory watermark, as of the end of the last cycle.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    pub fn metrics(&self) -> &CollectorMetrics {
        &self.metrics
    }
}

impl<C, S> PollTask for TimestampCollector<C, S>
where
    C: VendorClient + Sync,
    S: Sink,
{
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport> {
        let stored = self.store.read(&self.key).await?;
        let resume = match (stored, self.watermark) {
            (Some(stored), Some(current)) => Some(stored.max(current)),
            (stored, current) => stored.or(current),
        };
        // stored watermarks keep microseconds
        let since = self.bounds.effective(resume, Utc::now()).trunc_subsecs(6);
        debug!(key = %self.key, ?stored, %since, "Starting pagination pass");

        let mut report = CycleReport::default();
        let mut watermark = since;
        let mut paginator = Paginator::new(&self.client, since, self.style, cancel.clone());

        let outcome = loop {
            let batch = match paginator.next_page().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let records = batch.len();
            self.metrics.incoming(records);
            let advanced = advance(watermark, &batch, self.extract);
            // a push runs to completion, cancellation is seen by the next page
            if let Err(e) = self.sink.push(batch).await {
                break Err(e);
            }
            self.metrics.forwarded(records);

            watermark = advanced;
            report.batches += 1;
            report.records += records;
        };

        self.watermark = Some(watermark);
        report.watermark = Some(watermark);

        if stored != Some(watermark) {
            match self.store.write(&self.key, watermark).await {
                Ok(()) => debug!(key = %self.key, %watermark, "Persisted watermark"),
                Err(e) => warn!(
                    key = %self.key,
                    %watermark,
                    error = %e,
                    "Failed to persist watermark, retrying next cycle"
                ),
            }
        }

        outcome.map(|()| report)
    }
}

/// Collects the listing of one company day by day. The checkpoint date only moves once it falls
/// out of the debounce window, in between the offset tracks what was already pushed.
pub struct DayBucketedCollector<C, S> {
    key: String,
    company_uuid: String,
    client: C,
    sink: S,
    store: WatermarkStore,
    limit: usize,
    debounce_days: u32,
    metrics: CollectorMetrics,
    checkpoint: Option<CompanyCheckpoint>,
}

impl<C, S> DayBucketedCollector<C, S>
where
    C: VendorClient,
    S: Sink,
{
    pub fn new(
        key: impl Into<String>,
        company_uuid: impl Into<String>,
        client: C,
        sink: S,
        store: WatermarkStore,
        limit: usize,
        debounce_days: u32,
    ) -> Self {
        let key = key.into();
        Self {
            metrics: CollectorMetrics::new(key.as_str()),
            key,
            company_uuid: company_uuid.into(),
            client,
            sink,
            store,
            limit,
            debounce_days,
            checkpoint: None,
        }
    }

    pub fn checkpoint(&self) -> Option<&CompanyCheckpoint> {
        self.checkpoint.as_ref()
    }

    pub fn metrics(&self) -> &CollectorMetrics {
        &self.metrics
    }
}

/// Persists `checkpoint` unless the store already holds it. A failure is only logged, the
/// in-memory checkpoint is written again on the next cycle.
async fn persist_checkpoint(
    store: &WatermarkStore,
    key: &str,
    checkpoint: &CompanyCheckpoint,
    stored: &mut Option<CompanyCheckpoint>,
) {
    if stored.as_ref() == Some(checkpoint) {
        return;
    }
    match store.write_checkpoint(key, checkpoint).await {
        Ok(()) => {
            debug!(key, ?checkpoint, "Persisted checkpoint");
            *stored = Some(checkpoint.clone());
        }
        Err(e) => warn!(key, error = %e, "Failed to persist checkpoint, retrying next cycle"),
    }
}

impl<C, S> PollTask for DayBucketedCollector<C, S>
where
    C: VendorClient + Sync,
    S: Sink,
{
    fn name(&self) -> &str {
        self.client.name()
    }

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport> {
        let mut stored = self.store.read_checkpoint(&self.key).await?;
        // this process is the only writer, what it holds is never behind the store
        let current = self
            .checkpoint
            .take()
            .or_else(|| stored.clone())
            .unwrap_or_else(|| CompanyCheckpoint::new(self.company_uuid.as_str()));

        let mut checkpoint = current.with_updated_last_seen(self.debounce_days);
        self.checkpoint = Some(checkpoint.clone());
        persist_checkpoint(&self.store, &self.key, &checkpoint, &mut stored).await;

        let since = checkpoint.since().ok_or_else(|| {
            Error::CorruptCheckpoint(format!("{}: no last seen date", self.key))
        })?;
        info!(
            key = %self.key,
            last_seen = ?checkpoint.last_seen,
            offset = ?checkpoint.offset,
            "Starting pagination pass"
        );

        let mut report = CycleReport {
            watermark: Some(since),
            ..CycleReport::default()
        };
        let mut paginator = Paginator::new(
            &self.client,
            since,
            PaginationStyle::OffsetLimit { limit: self.limit },
            cancel.clone(),
        )
        .resume_at(checkpoint.offset.unwrap_or(0));

        let outcome = loop {
            let batch: Vec<Record> = match paginator.next_page().await {
                Ok(Some(batch)) => batch,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };

            let records = batch.len();
            self.metrics.incoming(records);
            if let Err(e) = self.sink.push(batch).await {
                break Err(e);
            }
            self.metrics.forwarded(records);

            checkpoint.offset = Some(paginator.offset());
            report.batches += 1;
            report.records += records;
        };

        self.checkpoint = Some(checkpoint.clone());
        persist_checkpoint(&self.store, &self.key, &checkpoint, &mut stored).await;

        outcome.map(|()| report)
    }
}
