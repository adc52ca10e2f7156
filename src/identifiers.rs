use std::fmt;

const LINK_PREFIXES: [&str; 3] = ["https://t.me/", "http://t.me/", "t.me/"];
const SUPERGROUP_PREFIX: &str = "100";

/// A required channel as the platform addresses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Id(i64),
    Username(String),
}

impl ChannelRef {
    /// Parses an identifier, normalizing it first. Returns `None` for blank
    /// input and for numeric IDs out of range.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = normalize_identifier(value)?;
        if is_numeric_id(&normalized) {
            normalized.parse::<i64>().ok().map(ChannelRef::Id)
        } else {
            Some(ChannelRef::Username(normalized))
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Id(id) => write!(f, "{}", id),
            ChannelRef::Username(name) => write!(f, "{}", name),
        }
    }
}

fn looks_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// True for a string of digits with at most one leading minus sign that
/// fits in a chat ID.
pub fn is_numeric_id(value: &str) -> bool {
    looks_numeric(value) && value.parse::<i64>().is_ok()
}

/// Canonical form of a channel identifier: numeric IDs pass through,
/// everything else becomes `@username`. Links to t.me are reduced to the
/// username. Digit strings that do not fit in a chat ID are rejected.
pub fn normalize_identifier(value: &str) -> Option<String> {
    let mut value = value.trim();
    for prefix in LINK_PREFIXES {
        if let Some(rest) = value.strip_prefix(prefix) {
            value = rest.trim_end_matches('/');
            break;
        }
    }

    if value.is_empty() || value == "@" {
        return None;
    }

    if looks_numeric(value) && !is_numeric_id(value) {
        return None;
    }

    if is_numeric_id(value) || value.starts_with('@') {
        Some(value.to_string())
    } else {
        Some(format!("@{}", value))
    }
}

/// Compares two normalized identifiers. Usernames are case-insensitive on
/// the platform, numeric IDs must match exactly.
pub fn same_identifier(a: &str, b: &str) -> bool {
    match (is_numeric_id(a), is_numeric_id(b)) {
        (true, true) => a == b,
        (false, false) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Whether two chat IDs name the same chat, accounting for the short form
/// and the "-100" prefixed form a supergroup can be known by.
pub fn chat_ids_match(a: i64, b: i64) -> bool {
    if a == b {
        return true;
    }

    let a = a.unsigned_abs().to_string();
    let b = b.unsigned_abs().to_string();

    is_supergroup_form_of(&a, &b) || is_supergroup_form_of(&b, &a)
}

fn is_supergroup_form_of(long: &str, short: &str) -> bool {
    long.strip_prefix(SUPERGROUP_PREFIX)
        .map(|rest| !rest.is_empty() && rest == short)
        .unwrap_or(false)
}

/// Checks a chat (by ID and optional public username) against a list of
/// normalized required identifiers.
pub fn is_required_chat(chat_id: i64, username: Option<&str>, required: &[String]) -> bool {
    required.iter().any(|value| match ChannelRef::parse(value) {
        Some(ChannelRef::Id(id)) => chat_ids_match(id, chat_id),
        Some(ChannelRef::Username(name)) => username
            .map(|u| name.trim_start_matches('@').eq_ignore_ascii_case(u.trim_start_matches('@')))
            .unwrap_or(false),
        None => false,
    })
}
