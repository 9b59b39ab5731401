//! Textes factorizer.
//!
//! Links every `textes_versions` row of a LEGI SQLite dump to one canonical
//! `textes` row, trying (nature, num), then nor, then titrefull_s, and merging
//! canonical rows found to be duplicates. The whole run is one transaction,
//! saved only once the operator agrees.

mod connect;
mod db;
mod error;
mod factorize;
#[cfg(test)]
mod fixtures;
mod insert;
mod keys;
mod pipeline;
mod report;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use db::Session;
use error::FactorizeError;
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "factorize",
    about = "Deduplicate textes_versions into canonical textes"
)]
struct Cli {
    /// SQLite database to work on (default: FACTORIZE_DB_PATH)
    db: Option<PathBuf>,
    /// Save without asking
    #[arg(short, long)]
    yes: bool,
    /// Run every step, then roll back
    #[arg(long, conflicts_with = "yes")]
    dry_run: bool,
    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .try_init();
}

/// Ask whether to keep the changes; only an explicit yes counts.
fn confirm(input: &mut impl BufRead, prompt: &mut impl Write) -> io::Result<bool> {
    write!(prompt, "Save changes? (o/n) ")?;
    prompt.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "o" | "oui" | "y" | "yes"
    ))
}

fn main() -> Result<()> {
    init_tracing();
    let t0 = Instant::now();
    let cli = Cli::parse();

    let settings = Settings::load().context("Failed to read FACTORIZE_* settings")?;
    let db_path = cli
        .db
        .or(settings.db_path)
        .context("No database given: pass a path or set FACTORIZE_DB_PATH")?;
    let assume_yes = cli.yes || settings.assume_yes;
    let json = cli.json || settings.json;

    let mut conn = db::connect(&db_path)?;
    info!(db = ?db_path, "database opened");

    // Dropping the session on any error below rolls the whole run back.
    let session = Session::begin(&mut conn)?;
    let report = pipeline::run(&session).context("Factorization failed, nothing was saved")?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print();
    }

    if cli.dry_run {
        session.rollback()?;
        info!("dry run, changes rolled back");
        return Ok(());
    }

    let save = assume_yes || confirm(&mut io::stdin().lock(), &mut io::stderr())?;
    if !save {
        session.rollback()?;
        warn!("changes rolled back");
        return Err(FactorizeError::OperatorDecline.into());
    }

    session.commit()?;
    info!(
        run_id = %report.run_id,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "changes saved"
    );
    Ok(())
}
