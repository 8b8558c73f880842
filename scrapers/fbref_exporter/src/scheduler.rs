use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{error, info};

use crate::{
    config::ExporterConfig,
    extract::StatExtractor,
    fetcher::{FetchError, Fetcher},
    metrics::Publisher,
    tables::{locate, LocateError},
    types::{CycleReport, RecordCounts},
};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Locate(#[from] LocateError),
}

/// Drives fetch -> locate -> extract -> publish, one cycle at a time.
pub struct Scheduler {
    fetcher: Fetcher,
    extractor: StatExtractor,
    publisher: Arc<Publisher>,
    url: String,
    interval: Duration,
}

impl Scheduler {
    pub fn new(config: &ExporterConfig, publisher: Arc<Publisher>) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(&config.upstream)?,
            extractor: StatExtractor::new()?,
            publisher,
            url: config.upstream.url.clone(),
            interval: config.schedule.interval(),
        })
    }

    /// Extracts and publishes one page. On error nothing is published.
    pub fn process_html(&self, html: &str) -> Result<RecordCounts, CycleError> {
        let tables = locate(html)?;
        let records = self.extractor.classify_and_extract(&tables.candidates());

        let mut cycle = self.publisher.begin_cycle();
        for record in &records {
            cycle.publish(record);
        }
        drop(cycle);

        Ok(RecordCounts::from_records(&records))
    }

    /// Runs one full cycle and folds its outcome into the health gauges.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        info!("Starting scrape of {}", self.url);

        let outcome = match self.fetcher.fetch(&self.url).await {
            Ok(page) => self.process_html(&page.html),
            Err(e) => Err(e.into()),
        };
        let duration = start.elapsed();

        let report = match outcome {
            Ok(counts) => {
                info!(
                    "Scraped {} players, {} teams, {} goalkeepers in {:.2}s",
                    counts.players,
                    counts.teams,
                    counts.goalkeepers,
                    duration.as_secs_f64()
                );
                self.publisher.end_cycle(true, duration);
                CycleReport::succeeded(duration, counts)
            }
            Err(e) => {
                error!("Scrape of {} failed: {}", self.url, e);
                self.publisher.end_cycle(false, duration);
                CycleReport::failed(duration, e.to_string())
            }
        };

        self.publisher.record_report(report.clone());
        report
    }

    /// Runs a cycle immediately, then once per interval until `shutdown` fires.
    /// A cycle in progress always completes; overruns delay the next tick.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Scheduler started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, task }
    }
}

pub struct SchedulerHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("Scheduler task ended abnormally: {}", e);
        }
    }
}
