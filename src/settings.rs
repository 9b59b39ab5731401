//! Runtime settings: `FACTORIZE_*` environment variables, overridden by CLI flags.

use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite file holding `textes_versions`.
    pub db_path: Option<PathBuf>,
    /// Commit without asking.
    pub assume_yes: bool,
    /// Print the run report as JSON instead of a table.
    pub json: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix("FACTORIZE"))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
