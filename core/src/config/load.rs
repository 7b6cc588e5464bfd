use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default prorab data directory: ~/.prorab
pub fn get_prorab_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".prorab"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.prorab/config.toml (highest)
    let prorab_dir = get_prorab_data_dir()?;
    let prorab_config = prorab_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if prorab_config.exists() {
        let s = std::fs::read_to_string(&prorab_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else if local_config.exists() {
        let s = std::fs::read_to_string(local_config)?;
        toml::from_str::<AppConfig>(&s)?
    } else {
        AppConfig::default()
    };

    // Update logging directory to use prorab data directory if not set
    if cfg.logging.directory.is_none()
        || cfg
            .logging
            .directory
            .as_ref()
            .map(|s| s.trim().is_empty())
            .unwrap_or(false)
    {
        let logs_dir = prorab_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    if let Ok(v) = std::env::var("PRORAB_STOREFRONT_URL") {
        if !v.trim().is_empty() {
            cfg.storefront.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("PRORAB_STOREFRONT_API_KEY") {
        if !v.trim().is_empty() {
            cfg.storefront.api_key = v;
        }
    }
    if let Ok(v) = std::env::var("PRORAB_FAST_MODEL") {
        if !v.trim().is_empty() {
            cfg.llm.fast.model = v;
        }
    }
    if let Ok(v) = std::env::var("PRORAB_FALLBACK_MODEL") {
        if !v.trim().is_empty() {
            cfg.llm.fallback.model = v;
        }
    }

    Ok(cfg)
}
