use anyhow::{Context, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::{env, fs, path::Path, path::PathBuf};

/// How actors are detected entering a gateway. Chosen once at startup.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitStrategy {
    /// Scan every loaded actor each tick; full arrival handling.
    #[default]
    Polling,
    /// React to reported moves; players only, plain teleport.
    Event,
}

impl FromStr for TransitStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" | "poll" => Ok(TransitStrategy::Polling),
            "event" | "events" => Ok(TransitStrategy::Event),
            other => anyhow::bail!("unknown transit strategy '{}' (expected polling|event)", other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_world: String,
    pub mirror_world: String,
    /// 0 disables the per-region cooldown.
    pub cooldown_ms: u64,
    /// Cooldown entries older than `sweep_factor × cooldown_ms` are swept; 0 keeps them forever.
    pub sweep_factor: u64,
    pub strategy: TransitStrategy,
    pub max_velocity: f64,
    pub tick_ms: u64,
    pub db: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_world: "world".to_string(),
            mirror_world: "world_the_end".to_string(),
            cooldown_ms: 30_000,
            sweep_factor: 4,
            strategy: TransitStrategy::Polling,
            max_velocity: 200.0,
            tick_ms: 50,
            db: None,
            log_level: None,
        }
    }
}

/// Partial configuration: every field optional, used for CLI and env layers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub source_world: Option<String>,
    pub mirror_world: Option<String>,
    pub cooldown_ms: Option<u64>,
    pub sweep_factor: Option<u64>,
    pub strategy: Option<TransitStrategy>,
    pub max_velocity: Option<f64>,
    pub tick_ms: Option<u64>,
    pub db: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Overrides {
    pub fn from_env_defaults() -> Self {
        Self {
            source_world: env::var("PORTALS_SOURCE_WORLD").ok(),
            mirror_world: env::var("PORTALS_MIRROR_WORLD").ok(),
            cooldown_ms: env::var("PORTALS_COOLDOWN_MS").ok().and_then(|s| s.trim().parse().ok()),
            sweep_factor: env::var("PORTALS_SWEEP_FACTOR").ok().and_then(|s| s.trim().parse().ok()),
            strategy: env::var("PORTALS_STRATEGY").ok().and_then(|s| s.parse().ok()),
            max_velocity: env::var("PORTALS_MAX_VELOCITY").ok().and_then(|s| s.trim().parse().ok()),
            tick_ms: env::var("PORTALS_TICK_MS").ok().and_then(|s| s.trim().parse().ok()),
            db: env::var("PORTALS_DB").ok().map(PathBuf::from),
            log_level: env::var("PORTALS_LOG_LEVEL").ok(),
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn apply(&mut self, o: Overrides) {
        if let Some(v) = o.source_world {
            self.source_world = v;
        }
        if let Some(v) = o.mirror_world {
            self.mirror_world = v;
        }
        if let Some(v) = o.cooldown_ms {
            self.cooldown_ms = v;
        }
        if let Some(v) = o.sweep_factor {
            self.sweep_factor = v;
        }
        if let Some(v) = o.strategy {
            self.strategy = v;
        }
        if let Some(v) = o.max_velocity {
            self.max_velocity = v;
        }
        if let Some(v) = o.tick_ms {
            self.tick_ms = v;
        }
        if o.db.is_some() {
            self.db = o.db;
        }
        if o.log_level.is_some() {
            self.log_level = o.log_level;
        }
    }

    /// Defaults, then the optional JSON file, then CLI, then environment
    /// (environment wins when set).
    pub fn resolve(file: Option<&Path>, cli: Overrides) -> Result<Self> {
        let mut cfg = match file {
            Some(p) => Config::from_json_file(p)?,
            None => Config::default(),
        };
        cfg.apply(cli);
        cfg.apply(Overrides::from_env_defaults());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.source_world.trim().is_empty(), "source_world must not be empty");
        anyhow::ensure!(!self.mirror_world.trim().is_empty(), "mirror_world must not be empty");
        anyhow::ensure!(
            self.max_velocity.is_finite() && self.max_velocity > 0.0,
            "max_velocity must be a positive number, got {}",
            self.max_velocity
        );
        anyhow::ensure!(self.tick_ms > 0, "tick_ms must be at least 1");
        Ok(())
    }

    /// Age after which a cooldown entry is dropped by the sweep, if enabled.
    pub fn sweep_after_ms(&self) -> Option<u64> {
        if self.cooldown_ms == 0 || self.sweep_factor == 0 {
            None
        } else {
            Some(self.cooldown_ms.saturating_mul(self.sweep_factor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_plugin_constants() {
        let c = Config::default();
        assert_eq!(c.source_world, "world");
        assert_eq!(c.mirror_world, "world_the_end");
        assert_eq!(c.cooldown_ms, 30_000);
        assert_eq!(c.max_velocity, 200.0);
        assert_eq!(c.strategy, TransitStrategy::Polling);
        assert_eq!(c.sweep_after_ms(), Some(120_000));
    }

    #[test]
    fn json_file_fills_missing_fields_with_defaults() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        write!(f, r#"{{"mirror_world": "the_end", "strategy": "event", "cooldown_ms": 0}}"#)?;
        let c = Config::from_json_file(f.path())?;
        assert_eq!(c.mirror_world, "the_end");
        assert_eq!(c.source_world, "world");
        assert_eq!(c.strategy, TransitStrategy::Event);
        assert_eq!(c.sweep_after_ms(), None);
        Ok(())
    }

    #[test]
    fn cli_overrides_apply() {
        let mut c = Config::default();
        c.apply(Overrides { cooldown_ms: Some(5), log_level: Some("debug".into()), ..Default::default() });
        assert_eq!(c.cooldown_ms, 5);
        assert_eq!(c.log_level.as_deref(), Some("debug"));
        assert_eq!(c.tick_ms, 50);
    }

    #[test]
    fn validate_rejects_bad_velocity() {
        let c = Config { max_velocity: -1.0, ..Config::default() };
        assert!(c.validate().is_err());
    }

    #[test]
    fn strategy_parses() {
        assert_eq!("Polling".parse::<TransitStrategy>().unwrap(), TransitStrategy::Polling);
        assert_eq!("event".parse::<TransitStrategy>().unwrap(), TransitStrategy::Event);
        assert!("teleport".parse::<TransitStrategy>().is_err());
    }

    #[test]
    fn test_from_env_defaults_reads_values() {
        std::env::set_var("PORTALS_SOURCE_WORLD", "overworld");
        std::env::set_var("PORTALS_COOLDOWN_MS", "1000");
        std::env::set_var("PORTALS_STRATEGY", "event");
        std::env::set_var("PORTALS_DB", "/tmp/worlds.db");

        let o = Overrides::from_env_defaults();
        assert_eq!(o.source_world.as_deref(), Some("overworld"));
        assert_eq!(o.cooldown_ms, Some(1000));
        assert_eq!(o.strategy, Some(TransitStrategy::Event));
        assert_eq!(o.db.as_ref().unwrap().to_string_lossy(), "/tmp/worlds.db");

        // cleanup
        std::env::remove_var("PORTALS_SOURCE_WORLD");
        std::env::remove_var("PORTALS_COOLDOWN_MS");
        std::env::remove_var("PORTALS_STRATEGY");
        std::env::remove_var("PORTALS_DB");
    }
}
