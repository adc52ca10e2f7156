use crate::i18n;
use crate::identifiers::{normalize_identifier, same_identifier};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORE_PATH: &str = "data/config.json";
const DEFAULT_SUB_CHECK_CACHE_TTL: u64 = 10;
const DEFAULT_NOTICE_REPEAT_TTL: u64 = 10;
const DEFAULT_NOTICE_DELETE_AFTER: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bot_token: String,
    /// Normalized channel list used when the store has none.
    pub required_channels: Vec<String>,
    pub chat_id: Option<i64>,
    pub sub_check_cache_ttl: Duration,
    pub notice_repeat_ttl: Duration,
    pub notice_delete_after: Duration,
    pub config_store_path: PathBuf,
    pub admin_user_ids: Vec<u64>,
    pub language: String,
    pub welcome_enabled: bool,
    pub guard_edited_messages: bool,
}

#[derive(Debug)]
pub struct ConfigError {
    pub missing_vars: Vec<String>,
    pub invalid_vars: Vec<(String, String)>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.missing_vars.is_empty() {
            writeln!(f, "Missing required environment variables:")?;
            for var in &self.missing_vars {
                writeln!(f, "  - {}", var)?;
            }
        }
        if !self.invalid_vars.is_empty() {
            writeln!(f, "Invalid environment variables:")?;
            for (var, err) in &self.invalid_vars {
                writeln!(f, "  - {}: {}", var, err)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

fn non_empty(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn get_required(name: &str, missing: &mut Vec<String>) -> Option<String> {
    let value = non_empty(name);
    if value.is_none() {
        missing.push(name.to_string());
    }
    value
}

fn get_seconds(name: &str, default: u64, invalid: &mut Vec<(String, String)>) -> Duration {
    let Some(raw) = non_empty(name) else {
        return Duration::from_secs(default);
    };

    match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => {
            invalid.push((name.to_string(), e.to_string()));
            Duration::from_secs(default)
        }
    }
}

fn get_bool(name: &str, default: bool, invalid: &mut Vec<(String, String)>) -> bool {
    let Some(raw) = non_empty(name) else {
        return default;
    };

    parse_bool(&raw).unwrap_or_else(|| {
        invalid.push((name.to_string(), format!("expected a boolean, got '{}'", raw)));
        default
    })
}

/// Splits a comma separated list of channel identifiers, normalizing each
/// and dropping blanks, duplicates and IDs out of range.
pub fn parse_channel_list(raw: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let Some(normalized) = normalize_identifier(part) else {
            tracing::warn!("Ignoring invalid channel identifier '{}'", part);
            continue;
        };
        if !channels.iter().any(|c| same_identifier(c, &normalized)) {
            channels.push(normalized);
        }
    }
    channels
}

pub fn parse_admin_ids(raw: &str) -> Result<Vec<u64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>()
                .map_err(|e| format!("'{}' is not a user ID: {}", part, e))
        })
        .collect()
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let bot_token = get_required("BOT_TOKEN", &mut missing);

        let required_channels = non_empty("REQUIRED_CHANNELS")
            .or_else(|| non_empty("REQUIRED_CHANNEL"))
            .map(|raw| parse_channel_list(&raw))
            .unwrap_or_default();

        let chat_id = non_empty("CHAT_ID").and_then(|raw| {
            raw.parse::<i64>()
                .map_err(|e| {
                    invalid.push(("CHAT_ID".into(), e.to_string()));
                })
                .ok()
        });

        let sub_check_cache_ttl =
            get_seconds("SUB_CHECK_CACHE_TTL", DEFAULT_SUB_CHECK_CACHE_TTL, &mut invalid);
        let notice_repeat_ttl =
            get_seconds("NOTICE_REPEAT_TTL", DEFAULT_NOTICE_REPEAT_TTL, &mut invalid);
        let notice_delete_after =
            get_seconds("NOTICE_DELETE_AFTER", DEFAULT_NOTICE_DELETE_AFTER, &mut invalid);

        let config_store_path = non_empty("CONFIG_STORE_PATH")
            .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string())
            .into();

        let admin_user_ids = non_empty("ADMIN_USER_IDS")
            .map(|raw| {
                parse_admin_ids(&raw).unwrap_or_else(|e| {
                    invalid.push(("ADMIN_USER_IDS".into(), e));
                    Vec::new()
                })
            })
            .unwrap_or_default();

        let language = non_empty("BOT_LANGUAGE")
            .map(|lang| lang.to_ascii_lowercase())
            .unwrap_or_else(|| i18n::DEFAULT_LANGUAGE.to_string());
        if !i18n::is_supported(&language) {
            invalid.push(("BOT_LANGUAGE".into(), format!("unsupported language '{}'", language)));
        }

        let welcome_enabled = get_bool("WELCOME_ENABLED", true, &mut invalid);
        let guard_edited_messages = get_bool("GUARD_EDITED_MESSAGES", true, &mut invalid);

        let bot_token = match bot_token {
            Some(token) if missing.is_empty() && invalid.is_empty() => token,
            _ => {
                return Err(ConfigError {
                    missing_vars: missing,
                    invalid_vars: invalid,
                })
            }
        };

        Ok(Self {
            bot_token,
            required_channels,
            chat_id,
            sub_check_cache_ttl,
            notice_repeat_ttl,
            notice_delete_after,
            config_store_path,
            admin_user_ids,
            language,
            welcome_enabled,
            guard_edited_messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_list() {
        assert_eq!(
            parse_channel_list(" chan1, @chan2 ,,https://t.me/chan3/, -1001, Chan1"),
            vec!["@chan1", "@chan2", "@chan3", "-1001"]
        );
        assert!(parse_channel_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("1, 22,,333").unwrap(), vec![1, 22, 333]);
        assert!(parse_admin_ids("").unwrap().is_empty());
        assert!(parse_admin_ids("1,abc").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_config_error_lists_everything() {
        let error = ConfigError {
            missing_vars: vec!["BOT_TOKEN".into()],
            invalid_vars: vec![("CHAT_ID".into(), "invalid digit found in string".into())],
        };

        let text = error.to_string();
        assert!(text.contains("  - BOT_TOKEN"));
        assert!(text.contains("  - CHAT_ID: invalid digit found in string"));
    }
}
