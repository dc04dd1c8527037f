//! Run log: persisted JSON timeline of every action taken during a run.
//!
//! Each run produces a single `{data_dir}/runs/{kind}/{run_id}.json` file
//! containing an ordered list of events with timestamps. Orchestrators receive
//! the log as `&mut RunLog`, scoped to one run.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::collector::CollectStats;
use crate::enricher::EnrichStats;
use crate::summary::RunSummary;

// ---------------------------------------------------------------------------
// RunLog
// ---------------------------------------------------------------------------

pub struct RunLog {
    pub run_id: String,
    pub kind: String,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Debug, Serialize)]
pub struct RunEvent {
    pub seq: u32,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    FetchFailed {
        entity: String,
        query: String,
        error: String,
    },
    PostRejected {
        entity: String,
        reason: String,
    },
    EntityCollected {
        entity: String,
        fetched: u32,
        new: u32,
        duplicates: u32,
        rejected: u32,
    },
    QuarantinedRows {
        entity: String,
        dataset: String,
        count: u32,
    },
    OrphanedRows {
        entity: String,
        count: u32,
    },
    RecordSkipped {
        entity: String,
        id: String,
        error: String,
    },
    EntityEnriched {
        entity: String,
        delta: u32,
        enriched: u32,
        skipped: u32,
    },
    EntityFailed {
        entity: String,
        stage: String,
        error: String,
    },
}

impl RunLog {
    pub fn new(kind: &str) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    pub fn events(&self) -> impl Iterator<Item = &EventKind> {
        self.events.iter().map(|e| &e.kind)
    }

    /// Serialize the run log to JSON and write it under `data_dir`.
    /// Returns the file path on success.
    pub fn save(&self, data_dir: &Path, totals: &RunTotals) -> Result<PathBuf> {
        let dir = data_dir.join("runs").join(&self.kind);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));

        let output = SerializedRunLog {
            run_id: &self.run_id,
            kind: &self.kind,
            started_at: self.started_at,
            finished_at: Utc::now(),
            totals,
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Run log saved");

        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// Aggregate counts for one run, written alongside the events.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct RunTotals {
    pub entities_ok: u32,
    pub entities_failed: u32,
    pub posts_appended: u32,
    pub records_enriched: u32,
    pub records_skipped: u32,
}

impl From<&RunSummary<CollectStats>> for RunTotals {
    fn from(s: &RunSummary<CollectStats>) -> Self {
        let mut totals = RunTotals::default();
        for (_, stats) in s.succeeded() {
            totals.entities_ok += 1;
            totals.posts_appended += stats.new;
        }
        totals.entities_failed = s.failed().count() as u32;
        totals
    }
}

impl From<&RunSummary<EnrichStats>> for RunTotals {
    fn from(s: &RunSummary<EnrichStats>) -> Self {
        let mut totals = RunTotals::default();
        for (_, stats) in s.succeeded() {
            totals.entities_ok += 1;
            totals.records_enriched += stats.enriched;
            totals.records_skipped += stats.skipped;
        }
        totals.entities_failed = s.failed().count() as u32;
        totals
    }
}

// ---------------------------------------------------------------------------
// Serialization wrappers
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: &'a str,
    kind: &'a str,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    totals: &'a RunTotals,
    events: &'a [RunEvent],
}
