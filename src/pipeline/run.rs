// src/pipeline/run.rs

//! Run orchestrator.
//!
//! One invocation, one attempt:
//!
//! ```text
//! Start → Locked → Fetched → RecordBuilt → Decided ─┬─ Skip/Empty ──────────────────────────────→ Done
//!                                                    └─ Publish → Formatted → Broadcast → WatermarkUpdated → Done
//! ```
//!
//! Any error moves the run to `Failed` and is returned unchanged. Nothing is
//! retried here; the next scheduled invocation is the retry.

use std::fmt;

use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::models::{BroadcastOutcome, CanonicalRecord, Config, preview};
use crate::nostr::SigningKey;
use crate::pipeline::detect::{Decision, decide};
use crate::services::{BroadcastPublisher, NoteFormatter, PostFetcher};
use crate::storage::WatermarkStore;

/// Stage reached by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Start,
    Locked,
    Fetched,
    RecordBuilt,
    Decided(Decision),
    Formatted,
    Broadcast,
    WatermarkUpdated,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Decided(decision) => write!(f, "Decided({decision})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// What one run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub decision: Option<Decision>,
    pub record_id: Option<String>,
    pub outcome: Option<BroadcastOutcome>,
    /// Rendered note, when the run got that far
    pub note: Option<String>,
    pub dry_run: bool,
}

impl RunReport {
    fn new(dry_run: bool) -> Self {
        Self {
            state: RunState::Start,
            decision: None,
            record_id: None,
            outcome: None,
            note: None,
            dry_run,
        }
    }

    fn advance(&mut self, state: RunState) {
        log::debug!("Run state: {} -> {}", self.state, state);
        self.state = state;
    }

    /// A note went out in this run.
    pub fn published(&self) -> bool {
        self.outcome.as_ref().is_some_and(BroadcastOutcome::succeeded)
    }
}

/// Wires the collaborators of one check-and-publish run.
pub struct Pipeline<'a> {
    config: &'a Config,
    fetcher: &'a dyn PostFetcher,
    store: &'a dyn WatermarkStore,
    publisher: &'a BroadcastPublisher,
    key: &'a SigningKey,
    formatter: NoteFormatter,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        fetcher: &'a dyn PostFetcher,
        store: &'a dyn WatermarkStore,
        publisher: &'a BroadcastPublisher,
        key: &'a SigningKey,
    ) -> Self {
        Self {
            config,
            fetcher,
            store,
            publisher,
            key,
            formatter: NoteFormatter::new(&config.note),
            dry_run: false,
        }
    }

    /// Stop after formatting: no broadcast, no watermark write.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Replace the note formatter.
    pub fn with_formatter(mut self, formatter: NoteFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Perform exactly one fetch-detect-publish attempt.
    pub async fn run_once(&self) -> Result<RunReport> {
        let mut report = RunReport::new(self.dry_run);
        match self.execute(&mut report).await {
            Ok(()) => {
                report.advance(RunState::Done);
                Ok(report)
            }
            Err(e) => {
                log::error!("Run failed at {}: {}", report.state, e);
                report.advance(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&self, report: &mut RunReport) -> Result<()> {
        // Held until the run ends; concurrent runs wait or fail.
        let _lease = self.store.lock().await?;
        report.advance(RunState::Locked);

        let mark = self.store.load().await?;
        match mark.last_post_id.as_deref() {
            Some(id) => log::info!("Last published post: {}", id),
            None => log::info!("Last published post: none (first run)"),
        }

        log::info!("Checking {}", self.fetcher.source());
        let posts = self.fetcher.fetch_latest().await?;
        report.advance(RunState::Fetched);

        let newest = posts
            .into_iter()
            .next()
            .map(|raw| CanonicalRecord::from_raw(raw, &self.config.source))
            .transpose()?;
        if let Some(record) = &newest {
            log::info!("Newest post {}: {}", record.id, preview(&record.text, 100));
            report.record_id = Some(record.id.clone());
        }
        report.advance(RunState::RecordBuilt);

        let decision = decide(&mark, newest.as_ref());
        report.decision = Some(decision);
        report.advance(RunState::Decided(decision));

        let record = match (decision, newest) {
            (Decision::Publish { .. }, Some(record)) => record,
            (Decision::Skip, _) => {
                log::info!("No new post detected");
                return Ok(());
            }
            _ => {
                log::info!("No posts found");
                return Ok(());
            }
        };

        let note = self.formatter.format(&record)?;
        report.note = Some(note.content.clone());
        report.advance(RunState::Formatted);

        if self.dry_run {
            log::info!("Dry run; note for {} not published:\n{}", record.id, note.content);
            return Ok(());
        }

        log::info!("New post {} detected, publishing", record.id);
        let outcome = self
            .publisher
            .publish(&note, self.key, &self.config.publish.relays)
            .await?;
        report.outcome = Some(outcome);
        report.advance(RunState::Broadcast);

        self.store.save(&record.id, Utc::now()).await?;
        report.advance(RunState::WatermarkUpdated);
        log::info!("Watermark advanced to {} ({})", record.id, self.store.location());

        Ok(())
    }
}
