use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use finbert_client::FinbertClient;
use tickerpulse_common::{load_config, FileConfig, Secrets, TrackedEntity};
use tickerpulse_pipeline::{Collector, Enricher, RunLog, RunTotals};
use tickerpulse_store::Stores;

#[derive(Parser)]
#[command(name = "tickerpulse")]
#[command(about = "Collect Reddit posts per entity and enrich them with FinBERT sentiment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new posts and append them to the raw datasets
    Collect(Target),

    /// Score raw posts that have no sentiment row yet
    Enrich(Target),

    /// Collect then enrich
    Run {
        #[command(flatten)]
        target: Target,

        /// Repeat every N minutes until interrupted
        #[arg(long, value_name = "MINUTES")]
        every: Option<u64>,
    },
}

#[derive(Args)]
struct Target {
    /// Path to the TOML config
    #[arg(long, default_value = "tickerpulse.toml")]
    config: PathBuf,

    /// Only process these entities (repeatable)
    #[arg(long = "entity", value_name = "NAME")]
    entities: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(2);
    }

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("tickerpulse=info".parse()?)
        .add_directive("apify_client=info".parse()?)
        .add_directive("finbert_client=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Returns whether every entity in the last cycle succeeded.
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Collect(target) => {
            let (config, entities) = load(&target)?;
            let secrets = Secrets::from_env();
            collect(&config, &entities, &secrets).await
        }
        Commands::Enrich(target) => {
            let (config, entities) = load(&target)?;
            let secrets = Secrets::from_env();
            enrich(&config, &entities, &secrets).await
        }
        Commands::Run { target, every } => {
            let (config, entities) = load(&target)?;
            let secrets = Secrets::from_env();
            loop {
                let collected = collect(&config, &entities, &secrets).await?;
                let enriched = enrich(&config, &entities, &secrets).await?;
                let ok = collected && enriched;

                let Some(minutes) = every else {
                    return Ok(ok);
                };
                info!(minutes, "Cycle finished, sleeping");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(minutes * 60)) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted, stopping");
                        return Ok(ok);
                    }
                }
            }
        }
    }
}

fn load(target: &Target) -> Result<(FileConfig, Vec<TrackedEntity>)> {
    let config = load_config(&target.config)?;
    let entities = select_entities(config.tracked_entities(), &target.entities)?;
    info!(
        config = %target.config.display(),
        data_dir = %config.data_dir.display(),
        entities = entities.len(),
        "Config loaded"
    );
    Ok((config, entities))
}

fn select_entities(all: Vec<TrackedEntity>, wanted: &[String]) -> Result<Vec<TrackedEntity>> {
    if wanted.is_empty() {
        return Ok(all);
    }
    if let Some(unknown) = wanted
        .iter()
        .find(|w| !all.iter().any(|e| e.name.eq_ignore_ascii_case(w)))
    {
        bail!("Entity {unknown:?} is not in the config");
    }
    Ok(all
        .into_iter()
        .filter(|e| wanted.iter().any(|w| e.name.eq_ignore_ascii_case(w)))
        .collect())
}

async fn collect(config: &FileConfig, entities: &[TrackedEntity], secrets: &Secrets) -> Result<bool> {
    let fetcher = ApifyClient::new(secrets.apify_api_key()?.to_string());
    let stores = Stores::open(&config.data_dir);
    let mut log = RunLog::new("collect");

    let summary = Collector::new(&fetcher, &stores.raw, config.collection.posts_per_subreddit)
        .collect_all(entities, &mut log)
        .await;

    save_log(&log, &config.data_dir, &RunTotals::from(&summary));
    Ok(!summary.has_failures())
}

async fn enrich(config: &FileConfig, entities: &[TrackedEntity], secrets: &Secrets) -> Result<bool> {
    let mut model =
        FinbertClient::new(secrets.hf_api_token()?).with_model(&config.enrichment.model);
    if let Some(url) = &secrets.hf_inference_url {
        model = model.with_base_url(url);
    }
    let stores = Stores::open(&config.data_dir);
    let mut log = RunLog::new("enrich");

    let summary = Enricher::new(&stores, &model, config.enrichment.batch_size)
        .enrich_all(entities, &mut log)
        .await;

    save_log(&log, &config.data_dir, &RunTotals::from(&summary));
    Ok(!summary.has_failures())
}

fn save_log(log: &RunLog, data_dir: &Path, totals: &RunTotals) {
    if let Err(e) = log.save(data_dir, totals) {
        warn!(error = %e, "Failed to save run log");
    }
}
