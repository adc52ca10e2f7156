//! Boundary between the moderation logic and the chat platform.
//!
//! Every call returns an explicit [`PlatformError`]; call sites decide
//! whether a failure is logged and skipped.

pub mod telegram;

use crate::identifiers::ChannelRef;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
}

/// A member's standing in a chat, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted { is_member: bool },
    Left,
    Banned,
}

impl MemberStatus {
    /// Whether this status counts as being subscribed.
    pub fn is_subscribed(self) -> bool {
        match self {
            MemberStatus::Owner | MemberStatus::Administrator | MemberStatus::Member => true,
            MemberStatus::Restricted { is_member } => is_member,
            MemberStatus::Left | MemberStatus::Banned => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    BadRequest(String),
    Forbidden(String),
    RateLimited(String),
    Network(String),
    Other(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::BadRequest(e) => write!(f, "Bad request: {}", e),
            PlatformError::Forbidden(e) => write!(f, "Forbidden: {}", e),
            PlatformError::RateLimited(e) => write!(f, "Rate limited: {}", e),
            PlatformError::Network(e) => write!(f, "Network error: {}", e),
            PlatformError::Other(e) => write!(f, "Platform error: {}", e),
        }
    }
}

impl std::error::Error for PlatformError {}

pub type PlatformResult<T> = Result<T, PlatformError>;

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn get_chat(&self, chat: &ChannelRef) -> PlatformResult<ChatInfo>;

    async fn get_member_status(&self, chat: &ChannelRef, user_id: u64)
        -> PlatformResult<MemberStatus>;

    async fn create_invite_link(&self, chat_id: i64) -> PlatformResult<String>;

    async fn export_invite_link(&self, chat_id: i64) -> PlatformResult<String>;

    /// Sends an HTML message, optionally with rows of link buttons, and
    /// returns the new message ID.
    async fn send_html(
        &self,
        chat_id: i64,
        text: &str,
        buttons: Vec<Vec<LinkButton>>,
    ) -> PlatformResult<i32>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> PlatformResult<()>;
}
