//! Configuration loader: merges .env, config.toml and environment variables.

use common::config::MinimiserConfig;
use common::{Error, Region};
use std::net::SocketAddr;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    match raw.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn parse_locations(raw: &str) -> Result<Vec<Region>, Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<Region>()
                .map_err(|e| Error::Config(format!("MINIMISER_LOCATIONS: {}", e)))
        })
        .collect()
}

fn validate_config(config: &MinimiserConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.api_base_url.trim().is_empty() {
        issues.push("api_base_url must not be empty".into());
    } else if !config.api_base_url.ends_with('/') {
        issues.push("api_base_url must end with '/'".into());
    }
    if config.locations.is_empty() {
        issues.push("locations must contain at least one region".into());
    }
    for (i, region) in config.locations.iter().enumerate() {
        if config.locations[..i].contains(region) {
            issues.push(format!("locations lists {} more than once", region));
        }
    }

    if config.cache.refresh_interval_secs == 0 {
        issues.push("cache.refresh_interval_secs must be > 0".into());
    }
    if let Some(path) = &config.cache.snapshot_path {
        if path.trim().is_empty() {
            issues.push("cache.snapshot_path must not be empty when set".into());
        }
    }

    if config.http.timeout_secs == 0 {
        issues.push("http.timeout_secs must be > 0".into());
    }
    if config.http.requests_per_sec == 0 {
        issues.push("http.requests_per_sec must be > 0".into());
    }

    if config.server.bind.parse::<SocketAddr>().is_err() {
        issues.push(format!(
            "server.bind must be a socket address, got {:?}",
            config.server.bind
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply environment overrides, reading variables through `var`.
fn apply_env_overrides(
    config: &mut MinimiserConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(url) = var("CARBON_API_BASE_URL") {
        config.api_base_url = url.trim().to_string();
    }
    if let Some(raw) = var("MINIMISER_LOCATIONS") {
        config.locations = parse_locations(&raw)?;
    }
    if let Some(raw) = var("MINIMISER_CACHE_ENABLED") {
        config.cache.enabled = parse_bool(&raw);
    }
    if let Some(raw) = var("MINIMISER_CACHE_REFRESH_SECS") {
        config.cache.refresh_interval_secs =
            parse_positive_u64(&raw, "MINIMISER_CACHE_REFRESH_SECS")?;
    }
    if let Some(raw) = var("MINIMISER_SNAPSHOT_PATH") {
        let trimmed = raw.trim();
        config.cache.snapshot_path = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    if let Some(raw) = var("MINIMISER_HTTP_TIMEOUT_SECS") {
        config.http.timeout_secs = parse_positive_u64(&raw, "MINIMISER_HTTP_TIMEOUT_SECS")?;
    }
    if let Some(raw) = var("MINIMISER_REQUESTS_PER_SEC") {
        let parsed = parse_positive_u64(&raw, "MINIMISER_REQUESTS_PER_SEC")?;
        config.http.requests_per_sec = u32::try_from(parsed).map_err(|_| {
            Error::Config("MINIMISER_REQUESTS_PER_SEC is out of range".into())
        })?;
    }
    if let Some(raw) = var("MINIMISER_BIND") {
        config.server.bind = raw.trim().to_string();
    }
    Ok(())
}

fn load_from(
    config_path: &Path,
    var: impl Fn(&str) -> Option<String>,
) -> Result<MinimiserConfig, Error> {
    let mut config = MinimiserConfig::default();

    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    apply_env_overrides(&mut config, var)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load configuration from environment and optional config file.
pub fn load_config() -> Result<MinimiserConfig, Error> {
    // .env from the working directory or a parent.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // Environment wins over config.toml, which wins over defaults.
    load_from(Path::new("config.toml"), |name| std::env::var(name).ok())
}
