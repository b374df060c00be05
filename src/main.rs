mod candidates;
mod cli;
mod config;
mod dedup;
mod driver;
mod error;
mod extract;
mod ladder;
mod model;
mod orchestrator;
mod publish;
mod retry;
mod session;
mod store;
#[cfg(test)]
mod testing;
mod ui;

use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::candidates::{CandidateFile, CandidateProfile, CandidateResolver, DirectoryClient};
use crate::config::ScoutConfig;
use crate::dedup::DedupStore;
use crate::driver::WebDriverLauncher;
use crate::error::ScoutError;
use crate::extract::ExtractionEngine;
use crate::orchestrator::Orchestrator;
use crate::publish::{MultiSinkPublisher, PositionsApi};
use crate::retry::RetryExecutor;
use crate::session::{FeedLogin, SessionSupervisor};
use crate::store::LocalStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ScoutConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Run {
            only,
            headless,
            no_export,
            candidates,
        } => {
            if headless {
                config.headless = true;
            }
            if no_export {
                config.export_dir = None;
            }
            if let Some(path) = candidates {
                config.candidates_file = path;
            }
            run(&config, only.as_deref()).await
        }
        Command::Candidates => {
            let profiles = resolve_candidates(&config).await?;
            for profile in &profiles {
                println!(
                    "{}  enabled={}  locations={}  radii={:?}  quota={}  keywords={}",
                    profile.candidate_id,
                    profile.run_enabled,
                    profile.locations.join("|"),
                    profile.radii(),
                    profile.max_extractions_per_run,
                    profile.keywords.join("|"),
                );
            }
            Ok(())
        }
        Command::Status => {
            let store = LocalStore::open(&config.database_path)?;
            println!("database:           {}", config.database_path.display());
            println!("postings published: {}", store.count_postings()?);
            println!("job ids seen:       {}", store.count_seen()?);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "jobscout=debug" } else { "jobscout=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// File candidates first, then the remote directory.
async fn resolve_candidates(config: &ScoutConfig) -> Result<Vec<CandidateProfile>> {
    let file = CandidateFile::load(&config.candidates_file)?;
    let directory = DirectoryClient::new(
        config.directory_url.as_str(),
        config.api_token.clone(),
        config.secret_key.clone(),
    )?;
    let dynamic = directory.fetch().await;
    let profiles = CandidateResolver::new(file.settings.clone()).resolve(&file.records(), &dynamic);
    if profiles.is_empty() {
        return Err(ScoutError::NoCandidates.into());
    }
    Ok(profiles)
}

async fn run(config: &ScoutConfig, only: Option<&str>) -> Result<()> {
    let profiles = resolve_candidates(config).await?;
    if let Some(id) = only
        && !profiles.iter().any(|p| p.candidate_id == id)
    {
        warn!(candidate = id, "requested candidate not found");
    }
    info!(
        candidates = profiles.len(),
        enabled = profiles.iter().filter(|p| p.run_enabled).count(),
        "candidates resolved"
    );

    let store = Rc::new(
        LocalStore::open(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );
    let mut dedup = DedupStore::load(Rc::clone(&store))?;
    info!(seen = dedup.len(), "dedup store loaded");

    let remote = match &config.positions_api_url {
        Some(url) => {
            let api = PositionsApi::new(url.as_str())?;
            info!(url = api.url(), "positions API enabled");
            Some(api)
        }
        None => {
            info!("no positions API configured, remote sink disabled");
            None
        }
    };
    let mut publisher = MultiSinkPublisher::new(Rc::clone(&store), remote);

    let supervisor = SessionSupervisor::new(
        WebDriverLauncher::new(config.webdriver_url.as_str(), config.headless)?,
        FeedLogin::new(config.site_url.as_str(), config.locators.clone(), config.login),
        config.profiles_dir.clone(),
    );
    let engine = ExtractionEngine::new(
        config.site_url.as_str(),
        config.locators.clone(),
        config.extraction.clone(),
        RetryExecutor::new(config.retry),
    );
    let orchestrator = Orchestrator::new(supervisor, engine, config.run_limits())
        .with_progress(console::user_attended());

    let summaries = orchestrator
        .run_all(
            &profiles,
            &mut dedup,
            &mut publisher,
            config.export_dir.as_deref(),
            only,
        )
        .await;

    ui::print_totals(&summaries);
    Ok(())
}
