use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::fingerprint;

// --- Fetch boundary ---

/// A post as returned by the fetch capability, before identity is assigned.
/// Platform-specific clients convert their native post types into this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPost {
    /// Platform-assigned identifier, when the platform exposes one.
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub title: String,
    pub body: String,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub author: Option<String>,
    pub url: Option<String>,
}

/// Why a fetched post could not become a `PostRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingTimestamp,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingTimestamp => write!(f, "missing created_at"),
        }
    }
}

// --- Raw dataset row ---

/// One collected submission. Field order is the column order on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub entity: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub author: Option<String>,
    pub url: Option<String>,
}

impl PostRecord {
    /// Assign identity to a fetched post for `entity`.
    pub fn from_raw(entity: &str, raw: RawPost) -> Result<Self, RejectReason> {
        let created_at = raw.created_at.ok_or(RejectReason::MissingTimestamp)?;
        let id = fingerprint(entity, &raw).ok_or(RejectReason::MissingTimestamp)?;
        Ok(Self {
            id,
            entity: entity.to_string(),
            created_at,
            title: raw.title,
            body: raw.body,
            subreddit: raw.subreddit,
            score: raw.score,
            num_comments: raw.num_comments,
            author: raw.author,
            url: raw.url,
        })
    }

    /// Text handed to the sentiment scorer: title and body separated by a blank line.
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.title, self.body).trim().to_string()
    }
}

// --- Sentiment ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    /// Numeric mapping used for aggregation: negative 0, neutral 0.5, positive 1.
    pub fn numeric(self) -> f64 {
        match self {
            SentimentLabel::Negative => 0.0,
            SentimentLabel::Neutral => 0.5,
            SentimentLabel::Positive => 1.0,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Positive => write!(f, "positive"),
        }
    }
}

/// Scorer output for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScores {
    pub label: SentimentLabel,
    pub negative: f64,
    pub neutral: f64,
    pub positive: f64,
}

impl SentimentScores {
    /// Label is the argmax; ties go to the first of negative, neutral, positive.
    pub fn from_probabilities(negative: f64, neutral: f64, positive: f64) -> Self {
        let label = if negative >= neutral && negative >= positive {
            SentimentLabel::Negative
        } else if neutral >= positive {
            SentimentLabel::Neutral
        } else {
            SentimentLabel::Positive
        };
        Self {
            label,
            negative,
            neutral,
            positive,
        }
    }

    /// Result for empty or whitespace-only text.
    pub fn neutral_default() -> Self {
        Self::from_probabilities(0.0, 1.0, 0.0)
    }
}

// --- Enriched dataset row ---

/// One enrichment result, keyed by the raw record's id. Field order is the
/// column order on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub id: String,
    pub entity: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub label: SentimentLabel,
    pub score_negative: f64,
    pub score_neutral: f64,
    pub score_positive: f64,
    pub sentiment_score: f64,
    /// Model that produced the scores. Informational; never triggers re-scoring.
    #[serde(default)]
    pub model: Option<String>,
}

impl SentimentRecord {
    pub fn from_post(post: &PostRecord, scores: SentimentScores, model: &str) -> Self {
        Self {
            id: post.id.clone(),
            entity: post.entity.clone(),
            created_at: post.created_at,
            title: post.title.clone(),
            body: post.body.clone(),
            label: scores.label,
            score_negative: scores.negative,
            score_neutral: scores.neutral,
            score_positive: scores.positive,
            sentiment_score: scores.label.numeric(),
            model: Some(model.to_string()),
        }
    }
}
