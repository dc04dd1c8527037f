use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::fingerprint::entity_slug;

/// TOML-backed pipeline configuration loaded from disk.
/// Secrets (API keys) stay as env vars, see [`Secrets`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    pub entities: Vec<EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Channels searched for every entity that does not override them.
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,
    /// Per-subreddit cap on posts requested in one run.
    #[serde(default = "default_posts_per_subreddit")]
    pub posts_per_subreddit: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            subreddits: default_subreddits(),
            posts_per_subreddit: default_posts_per_subreddit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    pub name: String,
    /// Search terms. Defaults to the entity name.
    #[serde(default)]
    pub queries: Vec<String>,
    /// Overrides `[collection].subreddits` for this entity.
    #[serde(default)]
    pub subreddits: Option<Vec<String>>,
}

/// An entity with its defaults resolved, ready for the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    pub name: String,
    pub queries: Vec<String>,
    pub subreddits: Vec<String>,
}

impl TrackedEntity {
    pub fn new(name: &str, queries: &[&str], subreddits: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            queries: queries.iter().map(|s| s.to_string()).collect(),
            subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_subreddits() -> Vec<String> {
    vec!["stocks".to_string()]
}

fn default_posts_per_subreddit() -> u32 {
    20
}

fn default_batch_size() -> usize {
    16
}

fn default_model() -> String {
    "yiyanghkust/finbert-tone".to_string()
}

impl FileConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FileConfig = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Entities in configured order, with queries and subreddits defaulted.
    pub fn tracked_entities(&self) -> Vec<TrackedEntity> {
        self.entities
            .iter()
            .map(|e| TrackedEntity {
                name: e.name.trim().to_string(),
                queries: if e.queries.is_empty() {
                    vec![e.name.trim().to_string()]
                } else {
                    e.queries.clone()
                },
                subreddits: e
                    .subreddits
                    .clone()
                    .unwrap_or_else(|| self.collection.subreddits.clone()),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.entities.is_empty() {
            bail!("at least one [[entities]] entry is required");
        }
        if self.collection.posts_per_subreddit == 0 {
            bail!("collection.posts_per_subreddit must be greater than 0");
        }
        if self.enrichment.batch_size == 0 {
            bail!("enrichment.batch_size must be greater than 0");
        }

        let mut names = HashSet::new();
        let mut slugs = HashSet::new();
        for entity in self.tracked_entities() {
            if entity.name.is_empty() {
                bail!("entity names must not be blank");
            }
            if !names.insert(entity.name.clone()) {
                bail!("entity {:?} is configured twice", entity.name);
            }
            let slug = entity_slug(&entity.name);
            if slug.is_empty() {
                bail!("entity {:?} has no usable characters for a file name", entity.name);
            }
            if !slugs.insert(slug.clone()) {
                bail!(
                    "entity {:?} maps to file name {:?} already used by another entity",
                    entity.name,
                    slug
                );
            }
            if entity.queries.iter().any(|q| q.trim().is_empty()) {
                bail!("entity {:?} has a blank query", entity.name);
            }
            if entity.subreddits.is_empty() {
                bail!("entity {:?} has no subreddits to search", entity.name);
            }
        }
        Ok(())
    }
}

/// Load, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    FileConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Credentials loaded from environment variables (and `.env`, if present).
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub apify_api_key: Option<String>,
    pub hf_api_token: Option<String>,
    pub hf_inference_url: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let secrets = Self {
            apify_api_key: non_empty_env("APIFY_API_KEY"),
            hf_api_token: non_empty_env("HF_API_TOKEN"),
            hf_inference_url: non_empty_env("HF_INFERENCE_URL"),
        };
        secrets.log_keys();
        secrets
    }

    pub fn apify_api_key(&self) -> Result<&str> {
        match self.apify_api_key.as_deref() {
            Some(key) => Ok(key),
            None => bail!("APIFY_API_KEY environment variable is required for collection"),
        }
    }

    pub fn hf_api_token(&self) -> Result<&str> {
        match self.hf_api_token.as_deref() {
            Some(token) => Ok(token),
            None => bail!("HF_API_TOKEN environment variable is required for enrichment"),
        }
    }

    fn log_keys(&self) {
        tracing::info!("Secrets loaded:");
        tracing::info!("  APIFY_API_KEY: {}", preview_opt(&self.apify_api_key));
        tracing::info!("  HF_API_TOKEN: {}", preview_opt(&self.hf_api_token));
        tracing::info!("  HF_INFERENCE_URL: {}", preview_opt(&self.hf_inference_url));
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => {
            let n = v.char_indices().nth(5).map(|(i, _)| i).unwrap_or(v.len());
            format!("{}...({} chars)", &v[..n], v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
data_dir = "/var/lib/tickerpulse"

[collection]
subreddits = ["stocks", "wallstreetbets"]
posts_per_subreddit = 50

[enrichment]
batch_size = 8

[[entities]]
name = "Apple"
queries = ["Apple", "AAPL"]

[[entities]]
name = "Tesla"
subreddits = ["teslainvestorsclub"]
"#;

    #[test]
    fn bundled_config_is_valid() {
        let config = FileConfig::from_toml_str(include_str!("../../../tickerpulse.toml")).unwrap();
        let entities = config.tracked_entities();
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[2].subreddits, vec!["stocks", "nvidia"]);
    }

    #[test]
    fn parses_and_resolves_defaults() {
        let config = FileConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/tickerpulse"));
        assert_eq!(config.collection.posts_per_subreddit, 50);
        assert_eq!(config.enrichment.batch_size, 8);
        assert_eq!(config.enrichment.model, "yiyanghkust/finbert-tone");

        let entities = config.tracked_entities();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].queries, vec!["Apple", "AAPL"]);
        assert_eq!(entities[0].subreddits, vec!["stocks", "wallstreetbets"]);
        assert_eq!(entities[1].queries, vec!["Tesla"]);
        assert_eq!(entities[1].subreddits, vec!["teslainvestorsclub"]);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = FileConfig::from_toml_str("[[entities]]\nname = \"Microsoft\"\n").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.collection.posts_per_subreddit, 20);
        assert_eq!(config.enrichment.batch_size, 16);
        assert_eq!(config.tracked_entities()[0].subreddits, vec!["stocks"]);
    }

    #[test]
    fn rejects_invalid_configs() {
        assert!(FileConfig::from_toml_str("entities = []").is_err());
        assert!(FileConfig::from_toml_str(
            "[enrichment]\nbatch_size = 0\n[[entities]]\nname = \"A\"\n"
        )
        .is_err());
        assert!(FileConfig::from_toml_str(
            "[collection]\nposts_per_subreddit = 0\n[[entities]]\nname = \"A\"\n"
        )
        .is_err());
        assert!(FileConfig::from_toml_str("[[entities]]\nname = \"  \"\n").is_err());
        assert!(FileConfig::from_toml_str(
            "[[entities]]\nname = \"A\"\nsubreddits = []\n"
        )
        .is_err());
        assert!(FileConfig::from_toml_str("[[entities]]\nname = \"A\"\nbogus = 1\n").is_err());
    }

    #[test]
    fn rejects_colliding_file_names() {
        let err = FileConfig::from_toml_str(
            "[[entities]]\nname = \"Apple Inc\"\n[[entities]]\nname = \"apple-inc\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("file name"), "{err}");
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickerpulse.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(load_config(&path).unwrap().entities.len(), 2);
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn previews_hide_secrets() {
        assert_eq!(preview_opt(&Some("abcdefghij".to_string())), "abcde...(10 chars)");
        assert_eq!(preview_opt(&None), "<not set>");
    }
}
