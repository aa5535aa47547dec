use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::portal::config::{Config, Overrides, TransitStrategy};
use crate::portal::logging;

pub mod classify;
pub mod init_db;
pub mod list_regions;
pub mod place;
pub mod probe;
pub mod simulate;
pub mod survey;

#[derive(Args, Debug, Clone, Default)]
pub struct CommonOpts {
    /// JSON config file (missing fields take defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// SQLite world database (default: repo_root/worlds.db or PORTALS_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Log level (trace|debug|info|warn|error)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,
    /// Transit detection strategy (polling|event)
    #[arg(long, global = true)]
    pub strategy: Option<TransitStrategy>,
    /// Per-region placement cooldown in milliseconds (0 disables)
    #[arg(long = "cooldown-ms", global = true)]
    pub cooldown_ms: Option<u64>,
    #[arg(long = "source-world", global = true)]
    pub source_world: Option<String>,
    #[arg(long = "mirror-world", global = true)]
    pub mirror_world: Option<String>,
}

impl CommonOpts {
    fn overrides(&self) -> Overrides {
        Overrides {
            source_world: self.source_world.clone(),
            mirror_world: self.mirror_world.clone(),
            cooldown_ms: self.cooldown_ms,
            strategy: self.strategy,
            db: self.db.clone(),
            log_level: self.log_level.clone(),
            ..Overrides::default()
        }
    }

    /// Layer file, CLI and environment into a validated config and start
    /// logging at the resulting level.
    pub fn resolve(&self) -> Result<Config> {
        let cfg = Config::resolve(self.config.as_deref(), self.overrides())?;
        logging::init(cfg.log_level.as_deref());
        log::debug!("resolved config: {:?}", cfg);
        Ok(cfg)
    }
}

/// Configured database path, else the default next to the manifest.
pub fn db_path(cfg: &Config) -> PathBuf {
    cfg.db.clone().unwrap_or_else(crate::util::default_db_path)
}
