use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANGUAGE: &str = "ru";
const FALLBACK_LANGUAGE: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, Value>> = OnceLock::new();

fn load_translations() -> HashMap<String, Value> {
    let mut translations = HashMap::new();

    let ru_json = include_str!("ru.json");
    if let Ok(ru_value) = serde_json::from_str(ru_json) {
        translations.insert("ru".to_string(), ru_value);
    } else {
        tracing::error!("Failed to parse ru.json");
    }

    let en_json = include_str!("en.json");
    if let Ok(en_value) = serde_json::from_str(en_json) {
        translations.insert("en".to_string(), en_value);
    } else {
        tracing::error!("Failed to parse en.json");
    }

    translations
}

fn get_nested_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in key.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

pub fn is_supported(language: &str) -> bool {
    TRANSLATIONS
        .get_or_init(load_translations)
        .contains_key(language)
}

pub fn t(language: &str, path: &str) -> String {
    let translations = TRANSLATIONS.get_or_init(load_translations);

    let lookup = |lang: &str| {
        translations
            .get(lang)
            .and_then(|value| get_nested_value(value, path))
            .and_then(|value| value.as_str())
    };

    if let Some(translation) = lookup(language).or_else(|| lookup(FALLBACK_LANGUAGE)) {
        translation.to_string()
    } else {
        format!("Message not found: {}", path)
    }
}

pub fn t_with_args(language: &str, path: &str, args: &[&str]) -> String {
    let mut message = t(language, path);

    for arg in args {
        if message.contains("{}") {
            message = message.replacen("{}", arg, 1);
        }
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_message() {
        assert_eq!(t("ru", "admin.menu_title"), "Настройки бота");
        assert_eq!(t("en", "admin.menu_title"), "Bot settings");
    }

    #[test]
    fn test_get_message_with_args() {
        let msg = t_with_args("en", "notice.subscribe_button", &["2"]);
        assert_eq!(msg, "Subscribe 2");
    }

    #[test]
    fn test_extra_args_are_ignored() {
        let msg = t_with_args("en", "admin.target_set", &["-100", "unused"]);
        assert_eq!(msg, "Target chat assigned: -100");
    }

    #[test]
    fn test_missing_message() {
        let msg = t("ru", "nonexistent.key");
        assert!(msg.contains("Message not found"));
    }

    #[test]
    fn test_language_fallback() {
        assert_eq!(t("de", "admin.menu_closed"), "Menu closed");
        assert!(!is_supported("de"));
        assert!(is_supported(DEFAULT_LANGUAGE));
    }

    #[test]
    fn test_bundles_have_same_keys() {
        fn keys(value: &Value, prefix: &str, out: &mut Vec<String>) {
            if let Value::Object(map) = value {
                for (k, v) in map {
                    keys(v, &format!("{}{}.", prefix, k), out);
                }
            } else {
                out.push(prefix.to_string());
            }
        }

        let translations = TRANSLATIONS.get_or_init(load_translations);
        let mut ru = Vec::new();
        let mut en = Vec::new();
        keys(&translations["ru"], "", &mut ru);
        keys(&translations["en"], "", &mut en);
        ru.sort();
        en.sort();
        assert_eq!(ru, en);
    }
}
