//! Incremental collection: fetch, fingerprint, dedup, append.

use tracing::{error, info, warn};

use tickerpulse_common::{PostRecord, TrackedEntity};
use tickerpulse_store::RecordStore;

use crate::run_log::{EventKind, RunLog};
use crate::summary::{EntityError, RunSummary};
use crate::traits::PostFetcher;

/// Counts for one entity's collection step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectStats {
    /// Candidates returned by the fetcher across all queries.
    pub fetched: u32,
    /// Rows appended this run.
    pub new: u32,
    /// Candidates already stored, or seen earlier in the same batch.
    pub duplicates: u32,
    /// Candidates that could not be turned into a record.
    pub rejected: u32,
    pub fetch_errors: u32,
    /// Rows in the dataset after the append.
    pub total: u32,
}

pub struct Collector<'a> {
    fetcher: &'a dyn PostFetcher,
    store: &'a RecordStore<PostRecord>,
    limit: u32,
}

impl<'a> Collector<'a> {
    pub fn new(fetcher: &'a dyn PostFetcher, store: &'a RecordStore<PostRecord>, limit: u32) -> Self {
        Self {
            fetcher,
            store,
            limit,
        }
    }

    /// Collect every configured entity in order. A failed entity is logged and
    /// recorded; the rest still run.
    pub async fn collect_all(
        &self,
        entities: &[TrackedEntity],
        log: &mut RunLog,
    ) -> RunSummary<CollectStats> {
        let mut summary = RunSummary::new();
        for entity in entities {
            let result = self.collect_entity(entity, log).await;
            if let Err(e) = &result {
                error!(entity = entity.name.as_str(), error = %e, "Collection failed");
                log.log(EventKind::EntityFailed {
                    entity: entity.name.clone(),
                    stage: "collect".to_string(),
                    error: e.to_string(),
                });
            }
            summary.push(&entity.name, result);
        }
        info!(%summary, "Collection run complete");
        summary
    }

    /// Fetch new posts for one entity and append the ones not stored yet.
    pub async fn collect_entity(
        &self,
        entity: &TrackedEntity,
        log: &mut RunLog,
    ) -> Result<CollectStats, EntityError> {
        let name = entity.name.as_str();
        let existing = self.store.load(name)?;
        if existing.quarantined() > 0 {
            warn!(entity = name, count = existing.quarantined(), "Quarantined raw rows");
            log.log(EventKind::QuarantinedRows {
                entity: existing.entity().to_string(),
                dataset: "raw".to_string(),
                count: existing.quarantined() as u32,
            });
        }

        let mut seen = existing.ids();
        let mut stats = CollectStats::default();
        let mut fresh = Vec::new();
        let mut last_error = None;

        for query in &entity.queries {
            let posts = match self.fetcher.fetch(query, &entity.subreddits, self.limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    warn!(entity = name, query = query.as_str(), error = %e, "Fetch failed");
                    log.log(EventKind::FetchFailed {
                        entity: name.to_string(),
                        query: query.clone(),
                        error: e.to_string(),
                    });
                    stats.fetch_errors += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            stats.fetched += posts.len() as u32;
            for raw in posts {
                let title = raw.title.clone();
                match PostRecord::from_raw(name, raw) {
                    Ok(record) if seen.insert(record.id.clone()) => fresh.push(record),
                    Ok(_) => stats.duplicates += 1,
                    Err(reason) => {
                        warn!(entity = name, title = title.as_str(), %reason, "Rejected post");
                        log.log(EventKind::PostRejected {
                            entity: name.to_string(),
                            reason: reason.to_string(),
                        });
                        stats.rejected += 1;
                    }
                }
            }
        }

        if let Some(last) = last_error {
            if stats.fetch_errors as usize == entity.queries.len() {
                return Err(EntityError::Fetch {
                    attempts: entity.queries.len(),
                    last,
                });
            }
        }

        stats.new = self.store.append(name, &fresh)? as u32;
        stats.total = existing.len() as u32 + stats.new;

        info!(
            entity = name,
            fetched = stats.fetched,
            new = stats.new,
            duplicates = stats.duplicates,
            total = stats.total,
            "Collected"
        );
        log.log(EventKind::EntityCollected {
            entity: name.to_string(),
            fetched: stats.fetched,
            new: stats.new,
            duplicates: stats.duplicates,
            rejected: stats.rejected,
        });

        Ok(stats)
    }
}
