//! Enforces the subscription requirement in the target chat.
//!
//! [`Guard`] owns every piece of per-process moderation state: which users
//! were reminded recently, the last reminder posted for each user, and who
//! has already been greeted. Handlers call into it with plain values so it
//! can be driven without a live bot.

use crate::cache::{TtlMap, TtlSet};
use crate::config::AppConfig;
use crate::i18n::{self, t, t_with_args};
use crate::identifiers::{chat_ids_match, is_required_chat};
use crate::notice::{compose, user_mention};
use crate::observability::METRICS;
use crate::platform::ChatPlatform;
use crate::store::ConfigStore;
use crate::subscription::SubscriptionChecker;
use std::sync::Arc;
use std::time::Duration;

const NOTICE_MEMORY_TTL: Duration = Duration::from_secs(3600);
const WELCOME_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub is_bot: bool,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRef {
    pub id: i64,
    pub username: Option<String>,
    /// Group or supergroup.
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat: ChatRef,
    pub message_id: i32,
    pub from: Option<UserRef>,
    /// Join/leave service messages.
    pub is_service: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Not something the guard looks at (bots, service messages, private chats).
    Ignored,
    /// Left alone: wrong chat, no target yet, or the author is subscribed.
    Passed,
    Deleted { notice: bool },
}

#[derive(Debug, Clone)]
pub struct GuardOptions {
    /// How long a user is not reminded again after a reminder.
    pub notify_ttl: Duration,
    /// How long the last reminder's message ID is kept for cleanup.
    pub notice_memory_ttl: Duration,
    pub welcome_ttl: Duration,
    pub auto_delete_after: Duration,
    pub welcome_enabled: bool,
    pub guard_edited_messages: bool,
    pub language: String,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            notify_ttl: Duration::from_secs(10),
            notice_memory_ttl: NOTICE_MEMORY_TTL,
            welcome_ttl: WELCOME_TTL,
            auto_delete_after: Duration::from_secs(20),
            welcome_enabled: true,
            guard_edited_messages: true,
            language: i18n::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl GuardOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            notify_ttl: config.notice_repeat_ttl,
            auto_delete_after: config.notice_delete_after,
            welcome_enabled: config.welcome_enabled,
            guard_edited_messages: config.guard_edited_messages,
            language: config.language.clone(),
            ..Self::default()
        }
    }
}

type UserKey = (i64, u64);

pub struct Guard {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<ConfigStore>,
    checker: Arc<SubscriptionChecker>,
    options: GuardOptions,
    /// Keyed by the configured target chat ID.
    notices: TtlSet<UserKey>,
    /// Keyed like `notices`; holds the chat and message ID actually posted.
    last_notice: TtlMap<UserKey, (i64, i32)>,
    /// Keyed by the chat the greeting was posted in.
    welcomed: TtlSet<UserKey>,
}

impl Guard {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<ConfigStore>,
        checker: Arc<SubscriptionChecker>,
        options: GuardOptions,
    ) -> Self {
        Self {
            platform,
            store,
            checker,
            options,
            notices: TtlSet::new(),
            last_notice: TtlMap::new(),
            welcomed: TtlSet::new(),
        }
    }

    async fn target_chat_id(&self) -> Option<i64> {
        match self.store.get_chat_id().await {
            Ok(target) => target,
            Err(e) => {
                tracing::error!("Cannot read target chat, treating as unset: {}", e);
                None
            }
        }
    }

    /// Target chat ID when `chat_id` refers to it.
    async fn matching_target(&self, chat_id: i64) -> Option<i64> {
        let target = self.target_chat_id().await?;
        chat_ids_match(chat_id, target).then_some(target)
    }

    pub async fn on_message(&self, msg: &IncomingMessage) -> GuardOutcome {
        let Some(user) = msg.from.as_ref() else {
            return GuardOutcome::Ignored;
        };
        if user.is_bot || msg.is_service || !msg.chat.is_group {
            return GuardOutcome::Ignored;
        }

        let Some(target) = self.target_chat_id().await else {
            tracing::debug!("No target chat configured, skipping message in {}", msg.chat.id);
            return GuardOutcome::Passed;
        };
        if !chat_ids_match(msg.chat.id, target) {
            return GuardOutcome::Passed;
        }

        if self.options.welcome_enabled {
            self.welcome_unseen(msg.chat.id, user).await;
        }

        if self.checker.is_fully_subscribed(user.id).await {
            tracing::debug!("User {} is subscribed", user.id);
            self.clear_notice(target, user.id).await;
            return GuardOutcome::Passed;
        }

        self.delete_best_effort(msg.chat.id, msg.message_id).await;

        if self.notices.contains(&(target, user.id)) {
            METRICS.increment_notices_suppressed();
            return GuardOutcome::Deleted { notice: false };
        }

        let notice = self.send_notice(msg.chat.id, target, user).await;
        GuardOutcome::Deleted { notice }
    }

    /// Deletes edits made by non-subscribers. Never posts a reminder.
    pub async fn on_edited_message(&self, msg: &IncomingMessage) -> GuardOutcome {
        if !self.options.guard_edited_messages || !msg.chat.is_group {
            return GuardOutcome::Ignored;
        }
        let Some(user) = msg.from.as_ref().filter(|user| !user.is_bot) else {
            return GuardOutcome::Ignored;
        };

        if self.matching_target(msg.chat.id).await.is_none() {
            return GuardOutcome::Passed;
        }
        if self.checker.is_fully_subscribed(user.id).await {
            return GuardOutcome::Passed;
        }

        self.delete_best_effort(msg.chat.id, msg.message_id).await;
        GuardOutcome::Deleted { notice: false }
    }

    /// A user left some chat. When it is a required one, reminds them in the
    /// target chat. Returns whether a reminder was posted.
    pub async fn on_member_left(&self, chat: &ChatRef, user: &UserRef) -> bool {
        let channels = self.checker.required_channels().await;
        if !is_required_chat(chat.id, chat.username.as_deref(), &channels) {
            return false;
        }

        self.checker.forget(user.id);
        tracing::info!("User {} left required chat {}", user.id, chat.id);

        let Some(target) = self.target_chat_id().await else {
            return false;
        };
        if self.notices.contains(&(target, user.id)) {
            METRICS.increment_notices_suppressed();
            return false;
        }

        self.send_notice(target, target, user).await
    }

    /// A user joined some chat. When it is a required one and nothing else
    /// is missing, removes their last reminder from the target chat.
    pub async fn on_member_joined(&self, chat: &ChatRef, user: &UserRef) {
        let channels = self.checker.required_channels().await;
        if !is_required_chat(chat.id, chat.username.as_deref(), &channels) {
            return;
        }

        if !self.checker.is_fully_subscribed(user.id).await {
            return;
        }

        if let Some(target) = self.target_chat_id().await {
            self.clear_notice(target, user.id).await;
        }
    }

    /// Greets the non-bot users from a "new members" service message with
    /// a single message. Returns whether a greeting was posted.
    pub async fn on_new_members(&self, chat: &ChatRef, users: &[UserRef]) -> bool {
        if !self.options.welcome_enabled || !self.greets_in(chat).await {
            return false;
        }

        let mentions: Vec<String> = users
            .iter()
            .filter(|user| !user.is_bot)
            .map(|user| self.mention(user, "welcome.member_fallback"))
            .collect();
        if mentions.is_empty() {
            return false;
        }

        let sent = self.greet(chat.id, &mentions.join(", ")).await;
        for user in users {
            self.welcomed
                .set_until((chat.id, user.id), self.options.welcome_ttl);
        }
        sent
    }

    /// Greeting driven by a member status change, for chats where join
    /// service messages are hidden.
    pub async fn on_target_member_joined(&self, chat: &ChatRef, user: &UserRef) -> bool {
        if !self.options.welcome_enabled || user.is_bot || !self.greets_in(chat).await {
            return false;
        }
        if self.welcomed.contains(&(chat.id, user.id)) {
            return false;
        }

        let sent = self
            .greet(chat.id, &self.mention(user, "welcome.member_fallback"))
            .await;
        self.welcomed
            .set_until((chat.id, user.id), self.options.welcome_ttl);
        sent
    }

    /// Greetings go to the target chat only, or to any group before a target
    /// is assigned.
    async fn greets_in(&self, chat: &ChatRef) -> bool {
        if !chat.is_group {
            return false;
        }
        match self.target_chat_id().await {
            Some(target) => chat_ids_match(chat.id, target),
            None => true,
        }
    }

    async fn welcome_unseen(&self, chat_id: i64, user: &UserRef) {
        if self.welcomed.contains(&(chat_id, user.id)) {
            return;
        }

        if self
            .greet(chat_id, &self.mention(user, "welcome.member_fallback"))
            .await
        {
            self.welcomed
                .set_until((chat_id, user.id), self.options.welcome_ttl);
            tracing::info!("Fallback greeting sent to user {} in {}", user.id, chat_id);
        }
    }

    async fn greet(&self, chat_id: i64, mentions: &str) -> bool {
        let text = t_with_args(&self.options.language, "welcome.greeting", &[mentions]);
        match self.platform.send_html(chat_id, &text, Vec::new()).await {
            Ok(message_id) => {
                METRICS.increment_welcomes_sent();
                self.schedule_delete(chat_id, message_id);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to send greeting to {}: {}", chat_id, e);
                false
            }
        }
    }

    fn mention(&self, user: &UserRef, fallback_key: &str) -> String {
        let name = user.full_name.trim();
        if name.is_empty() {
            user_mention(user.id, &t(&self.options.language, fallback_key))
        } else {
            user_mention(user.id, name)
        }
    }

    async fn send_notice(&self, chat_id: i64, target: i64, user: &UserRef) -> bool {
        let channels = self.checker.required_channels().await;
        let mention = self.mention(user, "notice.user_fallback");
        let notice = compose(
            self.platform.as_ref(),
            &channels,
            &mention,
            &self.options.language,
        )
        .await;

        let message_id = match self
            .platform
            .send_html(chat_id, &notice.text, notice.buttons)
            .await
        {
            Ok(message_id) => message_id,
            Err(e) => {
                tracing::warn!("Failed to send notice to user {} in {}: {}", user.id, chat_id, e);
                return false;
            }
        };

        let key = (target, user.id);
        self.notices.set_until(key, self.options.notify_ttl);
        self.last_notice
            .set(key, (chat_id, message_id), self.options.notice_memory_ttl);
        METRICS.increment_notices_sent();
        tracing::info!("Notice sent to user {} in {}", user.id, chat_id);

        self.schedule_delete(chat_id, message_id);
        true
    }

    async fn clear_notice(&self, target: i64, user_id: u64) {
        let Some((chat_id, message_id)) = self.last_notice.remove(&(target, user_id)) else {
            return;
        };

        match self.platform.delete_message(chat_id, message_id).await {
            Ok(()) => {
                METRICS.increment_notices_cleaned();
                tracing::info!("Removed notice for user {} in {}", user_id, chat_id);
            }
            Err(e) => tracing::debug!("Could not remove notice {}: {}", message_id, e),
        }
    }

    async fn delete_best_effort(&self, chat_id: i64, message_id: i32) {
        match self.platform.delete_message(chat_id, message_id).await {
            Ok(()) => METRICS.increment_messages_deleted(),
            Err(e) => tracing::warn!("Failed to delete message {} in {}: {}", message_id, chat_id, e),
        }
    }

    fn schedule_delete(&self, chat_id: i64, message_id: i32) {
        let platform = Arc::clone(&self.platform);
        let delay = self.options.auto_delete_after;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match platform.delete_message(chat_id, message_id).await {
                Ok(()) => METRICS.increment_messages_deleted(),
                Err(e) => tracing::debug!("Scheduled delete of {} in {} failed: {}", message_id, chat_id, e),
            }
        });
    }
}
