pub mod config;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use config::{load_config, EntityConfig, FileConfig, Secrets, TrackedEntity};
pub use error::{FetchError, ScoringError};
pub use fingerprint::{entity_slug, fingerprint};
pub use types::*;
