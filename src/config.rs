// config.rs - Bot Configuration
// Reads botconfig.txt (KEY=VALUE) from the usual locations, lets process
// environment variables override it, and turns the result into a typed
// BotConfig with defaults for everything except the token.
//
// Key Features:
// - Multi-path lookup: ., .., ../.., src/
// - BOM tolerant, # comments, blank lines ignored
// - Pure map -> config conversion for testing
//
// Used by: main.rs

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};
use log::{debug, info};

use crate::error::ConfigError;

pub const CONFIG_PATHS: [&str; 4] = [
    "botconfig.txt",
    "../botconfig.txt",
    "../../botconfig.txt",
    "src/botconfig.txt",
];

pub const TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

/// Keys that may be overridden from the environment.
const CONFIG_KEYS: [&str; 11] = [
    "DISCORD_TOKEN",
    "PREFIX",
    "BOT_OWNER_ID",
    "DEFAULT_MODULES",
    "LOAD_ALL_MODULES",
    "LANGUAGES_DIR",
    "DEFAULT_LANGUAGE",
    "DATA_DIR",
    "DEFAULT_TIMEZONE",
    "ENFORCE_DEFAULT_TIMEZONE",
    "RUST_LOG",
];

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub prefix: String,
    pub owner_id: Option<u64>,
    pub default_modules: Vec<String>,
    pub load_all_modules: bool,
    pub languages_dir: PathBuf,
    pub default_language: String,
    pub data_dir: PathBuf,
    pub default_timezone: FixedOffset,
    pub enforce_default_timezone: bool,
}

impl BotConfig {
    /// Build the configuration from already merged key/value pairs.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::MissingToken)?;
        if discord_token == TOKEN_PLACEHOLDER {
            return Err(ConfigError::PlaceholderToken);
        }

        let owner_id = match get("BOT_OWNER_ID") {
            Some(value) => Some(value.parse::<u64>().map_err(|_| invalid("BOT_OWNER_ID", value))?),
            None => None,
        };

        let default_modules = get("DEFAULT_MODULES")
            .unwrap_or("general,preferences")
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        let default_timezone = match get("DEFAULT_TIMEZONE") {
            Some(value) => parse_utc_offset(value).ok_or_else(|| invalid("DEFAULT_TIMEZONE", value))?,
            None => Utc.fix(),
        };

        Ok(Self {
            discord_token: discord_token.to_string(),
            prefix: get("PREFIX").unwrap_or("^").to_string(),
            owner_id,
            default_modules,
            load_all_modules: parse_flag(map, "LOAD_ALL_MODULES")?,
            languages_dir: PathBuf::from(get("LANGUAGES_DIR").unwrap_or("languages")),
            default_language: get("DEFAULT_LANGUAGE").unwrap_or("en").to_string(),
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or("data")),
            default_timezone,
            enforce_default_timezone: parse_flag(map, "ENFORCE_DEFAULT_TIMEZONE")?,
        })
    }

    /// Read botconfig.txt, apply environment overrides and validate.
    /// Returns the config together with the file it came from, if any.
    pub fn load() -> Result<(Self, Option<String>), ConfigError> {
        let (mut map, source) = match read_config_file() {
            Ok((path, map)) => (map, Some(path)),
            Err(e) if env::var("DISCORD_TOKEN").is_err() => return Err(e),
            Err(_) => (HashMap::new(), None),
        };

        for key in CONFIG_KEYS {
            if let Ok(value) = env::var(key) {
                debug!("[CONFIG] {} overridden from environment", key);
                map.insert(key.to_string(), value);
            }
        }

        let config = Self::from_map(&map)?;
        info!(
            "[CONFIG] ✅ Loaded configuration (prefix '{}', {} default module(s))",
            config.prefix,
            config.default_modules.len()
        );
        Ok((config, source))
    }

    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_id == Some(user_id)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Parse the KEY=VALUE lines of a config file.
pub fn parse_config(content: &str) -> HashMap<String, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut config = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            config.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    config
}

/// First botconfig.txt found in `CONFIG_PATHS`.
pub fn read_config_file() -> Result<(String, HashMap<String, String>), ConfigError> {
    for config_path in CONFIG_PATHS {
        match fs::read_to_string(config_path) {
            Ok(content) => return Ok((config_path.to_string(), parse_config(&content))),
            Err(_) => continue,
        }
    }
    Err(ConfigError::NotFound("., .., ../.., src/".to_string()))
}

pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_flag(map: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    match map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => parse_bool(key, value),
        None => Ok(false),
    }
}

/// Parse a fixed UTC offset such as `+05:30`, `-0300`, `+2` or `UTC`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
        return Some(Utc.fix());
    }

    let (sign, rest) = match value.chars().next()? {
        '+' => (1, &value[1..]),
        '-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => (rest, "0"),
    };
    if hours.is_empty()
        || !hours.chars().all(|c| c.is_ascii_digit())
        || !minutes.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_config_lines() {
        let config = parse_config("\u{feff}# comment\nDISCORD_TOKEN = abc\n\nPREFIX=!\nbroken line\n");
        assert_eq!(config.len(), 2);
        assert_eq!(config["DISCORD_TOKEN"], "abc");
        assert_eq!(config["PREFIX"], "!");
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_map(&map(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.prefix, "^");
        assert_eq!(config.default_modules, vec!["general", "preferences"]);
        assert!(!config.load_all_modules);
        assert_eq!(config.languages_dir, PathBuf::from("languages"));
        assert_eq!(config.default_language, "en");
        assert_eq!(config.default_timezone.local_minus_utc(), 0);
        assert!(config.owner_id.is_none());
        assert!(!config.is_owner(1));
    }

    #[test]
    fn test_token_validation() {
        assert!(matches!(
            BotConfig::from_map(&map(&[])),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            BotConfig::from_map(&map(&[("DISCORD_TOKEN", TOKEN_PLACEHOLDER)])),
            Err(ConfigError::PlaceholderToken)
        ));
    }

    #[test]
    fn test_typed_values() {
        let config = BotConfig::from_map(&map(&[
            ("DISCORD_TOKEN", "abc"),
            ("BOT_OWNER_ID", "1234"),
            ("DEFAULT_MODULES", "general, ,admin"),
            ("LOAD_ALL_MODULES", "Yes"),
            ("DEFAULT_TIMEZONE", "+03:00"),
            ("ENFORCE_DEFAULT_TIMEZONE", "on"),
        ]))
        .unwrap();
        assert!(config.is_owner(1234));
        assert_eq!(config.default_modules, vec!["general", "admin"]);
        assert!(config.load_all_modules);
        assert_eq!(config.default_timezone.local_minus_utc(), 3 * 3600);
        assert!(config.enforce_default_timezone);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = BotConfig::from_map(&map(&[("DISCORD_TOKEN", "abc"), ("LOAD_ALL_MODULES", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LOAD_ALL_MODULES"));

        let err = BotConfig::from_map(&map(&[("DISCORD_TOKEN", "abc"), ("BOT_OWNER_ID", "me")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOT_OWNER_ID"));
    }

    #[test]
    fn test_utc_offsets() {
        let secs = |v: &str| parse_utc_offset(v).map(|o| o.local_minus_utc());
        assert_eq!(secs("UTC"), Some(0));
        assert_eq!(secs("+05:30"), Some(5 * 3600 + 30 * 60));
        assert_eq!(secs("-0300"), Some(-3 * 3600));
        assert_eq!(secs("+2"), Some(2 * 3600));
        assert_eq!(secs("+15:00"), None);
        assert_eq!(secs("+-2"), None);
        assert_eq!(secs("Europe/Moscow"), None);
        assert_eq!(secs(""), None);
    }
}
