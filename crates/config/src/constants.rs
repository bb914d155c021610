//! Fixed names and defaults for rscoop configuration

pub const APP_DIR: &str = "rscoop";

pub const CONFIG_FILE: &str = "config.toml";
pub const WARNING_FILE: &str = "warning.toml";
pub const AUTO_UPDATE_FILE: &str = "auto_update.toml";

/// Finished operations older than this are evicted (5 minutes)
pub const DEFAULT_RETENTION_SECS: u64 = 300;
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_WARNING_THRESHOLD: u32 = 2;
