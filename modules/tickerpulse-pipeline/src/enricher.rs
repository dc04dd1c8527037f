//! Delta enrichment: score raw rows that have no sentiment row yet.

use std::collections::HashSet;

use tracing::{error, info, warn};

use tickerpulse_common::{PostRecord, SentimentRecord, TrackedEntity};
use tickerpulse_store::Stores;

use crate::run_log::{EventKind, RunLog};
use crate::scoring::ScoringAdapter;
use crate::summary::{EntityError, RunSummary};
use crate::traits::SentimentModel;

/// Counts for one entity's enrichment step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichStats {
    pub raw_records: u32,
    pub already_enriched: u32,
    /// Raw rows (first occurrence per id) without a sentiment row.
    pub delta: u32,
    pub enriched: u32,
    /// Delta rows the model rejected; retried next run.
    pub skipped: u32,
    /// Sentiment rows whose id no longer appears in the raw dataset.
    pub orphaned: u32,
    pub quarantined: u32,
}

pub struct Enricher<'a> {
    stores: &'a Stores,
    adapter: ScoringAdapter<'a>,
}

impl<'a> Enricher<'a> {
    pub fn new(stores: &'a Stores, model: &'a dyn SentimentModel, batch_size: usize) -> Self {
        Self {
            stores,
            adapter: ScoringAdapter::new(model, batch_size),
        }
    }

    pub async fn enrich_all(
        &self,
        entities: &[TrackedEntity],
        log: &mut RunLog,
    ) -> RunSummary<EnrichStats> {
        let mut summary = RunSummary::new();
        for entity in entities {
            let result = self.enrich_entity(&entity.name, log).await;
            if let Err(e) = &result {
                error!(entity = entity.name.as_str(), error = %e, "Enrichment failed");
                log.log(EventKind::EntityFailed {
                    entity: entity.name.clone(),
                    stage: "enrich".to_string(),
                    error: e.to_string(),
                });
            }
            summary.push(&entity.name, result);
        }
        info!(%summary, "Enrichment run complete");
        summary
    }

    /// Score every raw row of `entity` not yet in the enriched dataset and
    /// append the results in raw order. If the model is unavailable nothing
    /// is written.
    pub async fn enrich_entity(
        &self,
        entity: &str,
        log: &mut RunLog,
    ) -> Result<EnrichStats, EntityError> {
        let raw = self.stores.raw.load(entity)?;
        let enriched = self.stores.enriched.load(entity)?;

        for (dataset, count) in [("raw", raw.quarantined()), ("enriched", enriched.quarantined())] {
            if count > 0 {
                log.log(EventKind::QuarantinedRows {
                    entity: raw.entity().to_string(),
                    dataset: dataset.to_string(),
                    count: count as u32,
                });
            }
        }

        let enriched_ids = enriched.ids();
        let raw_ids: HashSet<&str> = raw.records().iter().map(|r| r.id.as_str()).collect();

        let orphaned = enriched
            .records()
            .iter()
            .filter(|r| !raw_ids.contains(r.id.as_str()))
            .count() as u32;
        if orphaned > 0 {
            warn!(entity, count = orphaned, "Enriched rows without a raw row");
            log.log(EventKind::OrphanedRows {
                entity: enriched.entity().to_string(),
                count: orphaned,
            });
        }

        let mut seen = HashSet::new();
        let delta: Vec<&PostRecord> = raw
            .records()
            .iter()
            .filter(|r| !enriched_ids.contains(&r.id) && seen.insert(r.id.as_str()))
            .collect();

        let mut stats = EnrichStats {
            raw_records: raw.len() as u32,
            already_enriched: enriched.len() as u32,
            delta: delta.len() as u32,
            orphaned,
            quarantined: (raw.quarantined() + enriched.quarantined()) as u32,
            ..Default::default()
        };

        if !delta.is_empty() {
            let texts: Vec<String> = delta.iter().map(|r| r.text()).collect();
            let outcomes = self
                .adapter
                .score_batch(&texts)
                .await
                .map_err(EntityError::Scoring)?;

            let model = self.adapter.model_name();
            let mut rows = Vec::with_capacity(delta.len());
            for (post, outcome) in delta.iter().zip(outcomes) {
                match outcome {
                    Ok(scores) => rows.push(SentimentRecord::from_post(post, scores, model)),
                    Err(e) => {
                        warn!(entity, id = post.id.as_str(), error = %e, "Skipped record");
                        log.log(EventKind::RecordSkipped {
                            entity: entity.to_string(),
                            id: post.id.clone(),
                            error: e.to_string(),
                        });
                        stats.skipped += 1;
                    }
                }
            }

            stats.enriched = self.stores.enriched.append(entity, &rows)? as u32;
        }

        info!(
            entity,
            delta = stats.delta,
            enriched = stats.enriched,
            skipped = stats.skipped,
            "Enriched"
        );
        log.log(EventKind::EntityEnriched {
            entity: entity.to_string(),
            delta: stats.delta,
            enriched: stats.enriched,
            skipped: stats.skipped,
        });

        Ok(stats)
    }
}
