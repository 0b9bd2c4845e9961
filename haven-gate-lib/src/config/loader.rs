use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{GateError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;
    parse_config(&txt)
}

pub fn parse_config(txt: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(txt)
        .map_err(|e| GateError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.upstream.address.trim().is_empty() {
        return Err(GateError::Config("upstream address cannot be empty".into()));
    }

    let rate_limit = &cfg.security.rate_limit;
    if rate_limit.limit == 0 {
        return Err(GateError::Config("security.rate_limit.limit must be > 0".into()));
    }
    if rate_limit.window_ms == 0 {
        return Err(GateError::Config("security.rate_limit.window_ms must be > 0".into()));
    }
    if rate_limit.sweep_interval_secs == 0 {
        return Err(GateError::Config(
            "security.rate_limit.sweep_interval_secs must be > 0".into(),
        ));
    }

    let mut prefixes = HashSet::new();
    for route in &cfg.routes {
        if !route.prefix.starts_with('/') {
            return Err(GateError::Config(format!(
                "Route prefix must start with '/': {}",
                route.prefix
            )));
        }
        // routes match case-insensitively
        if !prefixes.insert(route.prefix.to_ascii_lowercase()) {
            return Err(GateError::Config(format!("Duplicate route prefix: {}", route.prefix)));
        }
        if let Some(ref rl) = route.rate_limit {
            if rl.limit == Some(0) {
                return Err(GateError::Config(format!(
                    "Route {} rate_limit.limit must be > 0",
                    route.prefix
                )));
            }
            if rl.window_ms == Some(0) {
                return Err(GateError::Config(format!(
                    "Route {} rate_limit.window_ms must be > 0",
                    route.prefix
                )));
            }
        }
    }

    for token in &cfg.security.auth.tokens {
        let digest_ok =
            token.sha256.len() == 64 && token.sha256.chars().all(|c| c.is_ascii_hexdigit());
        if !digest_ok {
            return Err(GateError::Config(format!(
                "Token for subject {} must be a 64 character hex SHA-256 digest",
                token.subject
            )));
        }
    }

    Ok(())
}
