//! Batching and failure isolation in front of a [`SentimentModel`].

use tracing::{debug, warn};

use tickerpulse_common::{ScoringError, SentimentScores};

use crate::traits::SentimentModel;

/// Per-text result: scores, or the `ScoringError::Record` that rejected it.
pub type ScoreOutcome = Result<SentimentScores, ScoringError>;

pub struct ScoringAdapter<'a> {
    model: &'a dyn SentimentModel,
    batch_size: usize,
}

impl<'a> ScoringAdapter<'a> {
    pub fn new(model: &'a dyn SentimentModel, batch_size: usize) -> Self {
        Self {
            model,
            batch_size: batch_size.max(1),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Score `texts`, returning one outcome per input in input order.
    ///
    /// Blank texts get the neutral default without reaching the model. A chunk
    /// that fails on a bad record is retried one text at a time so only that
    /// record fails. `Err` means the model is unavailable and nothing was scored.
    pub async fn score_batch(&self, texts: &[String]) -> Result<Vec<ScoreOutcome>, ScoringError> {
        let mut outcomes: Vec<ScoreOutcome> = vec![Ok(SentimentScores::neutral_default()); texts.len()];

        let pending: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        for chunk in pending.chunks(self.batch_size) {
            let chunk_texts: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            debug!(size = chunk.len(), "Scoring chunk");

            match self.score_chunk(&chunk_texts).await {
                Ok(scores) => {
                    for (&i, s) in chunk.iter().zip(scores) {
                        outcomes[i] = Ok(s);
                    }
                }
                Err(ScoringError::Record(message)) if chunk.len() == 1 => {
                    outcomes[chunk[0]] = Err(ScoringError::Record(message));
                }
                Err(ScoringError::Record(message)) => {
                    warn!(size = chunk.len(), error = %message, "Chunk rejected, scoring texts individually");
                    for &i in chunk {
                        outcomes[i] = match self.score_chunk(std::slice::from_ref(&texts[i])).await {
                            Ok(mut scores) => Ok(scores.remove(0)),
                            Err(e @ ScoringError::Record(_)) => Err(e),
                            Err(e @ ScoringError::Unavailable(_)) => return Err(e),
                        };
                    }
                }
                Err(e @ ScoringError::Unavailable(_)) => return Err(e),
            }
        }

        Ok(outcomes)
    }

    async fn score_chunk(&self, texts: &[String]) -> Result<Vec<SentimentScores>, ScoringError> {
        let scores = self.model.score(texts).await?;
        if scores.len() != texts.len() {
            return Err(ScoringError::Unavailable(format!(
                "model returned {} results for {} texts",
                scores.len(),
                texts.len()
            )));
        }
        Ok(scores)
    }
}
