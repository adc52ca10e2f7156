use super::{ChatInfo, ChatPlatform, LinkButton, MemberStatus, PlatformError, PlatformResult};
use crate::guard::{ChatRef, IncomingMessage, UserRef};
use crate::identifiers::ChannelRef;
use crate::observability::METRICS;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    Chat, ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, LinkPreviewOptions, MessageId,
    ParseMode, Recipient, User,
};
use teloxide::RequestError;
use url::Url;

/// [`ChatPlatform`] backed by the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn recipient(chat: &ChannelRef) -> Recipient {
    match chat {
        ChannelRef::Id(id) => Recipient::Id(ChatId(*id)),
        ChannelRef::Username(name) => Recipient::ChannelUsername(name.clone()),
    }
}

pub fn classify_request_error(error: &RequestError) -> PlatformError {
    match error {
        RequestError::RetryAfter(_) => PlatformError::RateLimited(error.to_string()),
        RequestError::Network(_) => PlatformError::Network(error.to_string()),
        RequestError::Api(api_error) => {
            let description = api_error.to_string();
            let lowered = description.to_lowercase();
            if lowered.contains("forbidden") || lowered.contains("blocked") {
                PlatformError::Forbidden(description)
            } else {
                PlatformError::BadRequest(description)
            }
        }
        _ => PlatformError::Other(error.to_string()),
    }
}

impl From<RequestError> for PlatformError {
    fn from(error: RequestError) -> Self {
        METRICS.increment_platform_errors();
        classify_request_error(&error)
    }
}

pub fn member_status(kind: &ChatMemberKind) -> MemberStatus {
    if kind.is_owner() {
        MemberStatus::Owner
    } else if kind.is_administrator() {
        MemberStatus::Administrator
    } else if kind.is_member() {
        MemberStatus::Member
    } else if kind.is_restricted() {
        MemberStatus::Restricted {
            is_member: kind.is_present(),
        }
    } else if kind.is_banned() {
        MemberStatus::Banned
    } else {
        MemberStatus::Left
    }
}

pub fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0,
        is_bot: user.is_bot,
        full_name: user.full_name(),
    }
}

pub fn chat_ref(chat: &Chat) -> ChatRef {
    ChatRef {
        id: chat.id.0,
        username: chat.username().map(str::to_string),
        is_group: chat.is_group() || chat.is_supergroup(),
    }
}

pub fn incoming_message(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        chat: chat_ref(&msg.chat),
        message_id: msg.id.0,
        from: msg.from.as_ref().map(user_ref),
        is_service: msg.new_chat_members().is_some() || msg.left_chat_member().is_some(),
    }
}

fn inline_keyboard(rows: Vec<Vec<LinkButton>>) -> Option<InlineKeyboardMarkup> {
    let rows: Vec<Vec<InlineKeyboardButton>> = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .filter_map(|button| match Url::parse(&button.url) {
                    Ok(url) => Some(InlineKeyboardButton::url(button.text, url)),
                    Err(e) => {
                        tracing::warn!("Skipping link button with bad url {}: {}", button.url, e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    if rows.is_empty() {
        None
    } else {
        Some(InlineKeyboardMarkup::new(rows))
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn get_chat(&self, chat: &ChannelRef) -> PlatformResult<ChatInfo> {
        let chat = self.bot.get_chat(recipient(chat)).await?;
        Ok(ChatInfo {
            id: chat.id.0,
            title: chat.title().map(str::to_string),
            username: chat.username().map(str::to_string),
        })
    }

    async fn get_member_status(
        &self,
        chat: &ChannelRef,
        user_id: u64,
    ) -> PlatformResult<MemberStatus> {
        let member = self
            .bot
            .get_chat_member(recipient(chat), UserId(user_id))
            .await?;
        Ok(member_status(&member.kind))
    }

    async fn create_invite_link(&self, chat_id: i64) -> PlatformResult<String> {
        let link = self.bot.create_chat_invite_link(ChatId(chat_id)).await?;
        Ok(link.invite_link)
    }

    async fn export_invite_link(&self, chat_id: i64) -> PlatformResult<String> {
        let link = self.bot.export_chat_invite_link(ChatId(chat_id)).await?;
        Ok(link)
    }

    async fn send_html(
        &self,
        chat_id: i64,
        text: &str,
        buttons: Vec<Vec<LinkButton>>,
    ) -> PlatformResult<i32> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(LinkPreviewOptions {
                is_disabled: true,
                url: None,
                prefer_small_media: false,
                prefer_large_media: false,
                show_above_text: false,
            });

        if let Some(keyboard) = inline_keyboard(buttons) {
            request = request.reply_markup(keyboard);
        }

        let message = request.await?;
        METRICS.increment_messages_sent();
        Ok(message.id.0)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> PlatformResult<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::ApiError;

    #[test]
    fn test_classify_forbidden() {
        let error = RequestError::Api(ApiError::BotBlocked);
        assert!(matches!(
            classify_request_error(&error),
            PlatformError::Forbidden(_)
        ));
    }

    #[test]
    fn test_classify_bad_request() {
        let error = RequestError::Api(ApiError::ChatNotFound);
        assert!(matches!(
            classify_request_error(&error),
            PlatformError::BadRequest(_)
        ));
    }

    #[test]
    fn test_classify_unknown_forbidden_description() {
        let error = RequestError::Api(ApiError::Unknown(
            "Forbidden: bot is not a member of the channel chat".to_string(),
        ));
        assert!(matches!(
            classify_request_error(&error),
            PlatformError::Forbidden(_)
        ));
    }

    #[test]
    fn test_inline_keyboard_skips_bad_urls() {
        let rows = vec![vec![
            LinkButton {
                text: "ok".into(),
                url: "https://t.me/chan1".into(),
            },
            LinkButton {
                text: "bad".into(),
                url: "not a url".into(),
            },
        ]];
        let keyboard = inline_keyboard(rows).unwrap();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);

        assert!(inline_keyboard(vec![]).is_none());
    }
}
