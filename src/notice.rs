//! Builds the reminder posted when a non-subscriber writes in the target chat.

use crate::i18n::{t, t_with_args};
use crate::identifiers::ChannelRef;
use crate::platform::{ChatPlatform, LinkButton};

const BUTTONS_PER_ROW: usize = 2;
const LINK_SEPARATOR: &str = " | ";

/// One required channel as shown in the reminder. `url` is `None` when no
/// join link could be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLink {
    pub label: String,
    pub url: Option<String>,
}

impl ChannelLink {
    fn html(&self) -> String {
        match &self.url {
            Some(url) => format!("<a href=\"{}\">{}</a>", url, self.label),
            None => self.label.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub buttons: Vec<Vec<LinkButton>>,
}

pub fn user_mention(user_id: u64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id,
        html_escape::encode_text(name)
    )
}

fn username_link(username: &str) -> ChannelLink {
    let username = username.trim_start_matches('@');
    ChannelLink {
        label: format!("@{}", username),
        url: Some(format!("https://t.me/{}", username)),
    }
}

async fn invite_link(platform: &dyn ChatPlatform, chat_id: i64) -> Option<String> {
    match platform.create_invite_link(chat_id).await {
        Ok(link) => return Some(link),
        Err(e) => tracing::debug!("create_invite_link failed for {}: {}", chat_id, e),
    }

    match platform.export_invite_link(chat_id).await {
        Ok(link) => Some(link),
        Err(e) => {
            tracing::debug!("export_invite_link failed for {}: {}", chat_id, e);
            None
        }
    }
}

/// Resolves a stored identifier to something a user can click.
///
/// Numeric chats are looked up first: a public username wins, otherwise a
/// fresh invite link, then the primary invite link, then just the title.
/// Private `t.me/c/..` links are never produced.
pub async fn resolve_channel_link(
    platform: &dyn ChatPlatform,
    identifier: &str,
    language: &str,
) -> Option<ChannelLink> {
    let chat = ChannelRef::parse(identifier)?;
    let id = match chat {
        ChannelRef::Username(ref name) => return Some(username_link(name)),
        ChannelRef::Id(id) => id,
    };

    let fallback = t(language, "notice.channel_fallback");

    let (chat_id, label) = match platform.get_chat(&chat).await {
        Ok(info) => {
            if let Some(username) = info.username.as_deref() {
                return Some(username_link(username));
            }
            let title = info.title.unwrap_or(fallback);
            (info.id, html_escape::encode_text(&title).into_owned())
        }
        Err(e) => {
            tracing::debug!("get_chat failed for {}: {}", id, e);
            (id, html_escape::encode_text(&fallback).into_owned())
        }
    };

    Some(ChannelLink {
        label,
        url: invite_link(platform, chat_id).await,
    })
}

/// Lays out one "Subscribe N" button per URL, two per row.
pub fn button_rows(urls: &[String], language: &str) -> Vec<Vec<LinkButton>> {
    urls.iter()
        .enumerate()
        .map(|(index, url)| LinkButton {
            text: t_with_args(language, "notice.subscribe_button", &[&(index + 1).to_string()]),
            url: url.clone(),
        })
        .collect::<Vec<_>>()
        .chunks(BUTTONS_PER_ROW)
        .map(|row| row.to_vec())
        .collect()
}

pub async fn compose(
    platform: &dyn ChatPlatform,
    channels: &[String],
    mention: &str,
    language: &str,
) -> Notice {
    let mut links = Vec::with_capacity(channels.len());
    for channel in channels {
        if let Some(link) = resolve_channel_link(platform, channel, language).await {
            links.push(link);
        }
    }

    let readable: Vec<String> = links.iter().map(ChannelLink::html).collect();
    let urls: Vec<String> = links.into_iter().filter_map(|link| link.url).collect();

    let text = format!(
        "{}\n{}",
        t_with_args(language, "notice.prompt", &[mention]),
        readable.join(LINK_SEPARATOR)
    );

    Notice {
        text,
        buttons: button_rows(&urls, language),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use crate::platform::ChatInfo;

    #[test]
    fn test_user_mention_escapes_name() {
        assert_eq!(
            user_mention(42, "<Bob & Co>"),
            "<a href=\"tg://user?id=42\">&lt;Bob &amp; Co&gt;</a>"
        );
    }

    #[tokio::test]
    async fn test_username_needs_no_lookup() {
        let platform = FakePlatform::new();
        let link = resolve_channel_link(&platform, "@chan1", "en").await.unwrap();

        assert_eq!(link.label, "@chan1");
        assert_eq!(link.url.as_deref(), Some("https://t.me/chan1"));
    }

    #[tokio::test]
    async fn test_numeric_with_public_username() {
        let platform = FakePlatform::new();
        platform.add_chat(
            "-1001",
            ChatInfo {
                id: -1001,
                title: Some("News".into()),
                username: Some("news".into()),
            },
        );

        let link = resolve_channel_link(&platform, "-1001", "en").await.unwrap();
        assert_eq!(link.url.as_deref(), Some("https://t.me/news"));
        assert_eq!(link.label, "@news");
    }

    #[tokio::test]
    async fn test_private_chat_uses_invite_link() {
        let platform = FakePlatform::new();
        platform.add_chat(
            "-1001",
            ChatInfo {
                id: -1001,
                title: Some("Secret <club>".into()),
                username: None,
            },
        );
        platform
            .invite_links
            .lock()
            .unwrap()
            .insert(-1001, "https://t.me/+abc".into());

        let link = resolve_channel_link(&platform, "-1001", "en").await.unwrap();
        assert_eq!(link.url.as_deref(), Some("https://t.me/+abc"));
        assert_eq!(link.label, "Secret &lt;club&gt;");
    }

    #[tokio::test]
    async fn test_private_chat_falls_back_to_exported_link() {
        let platform = FakePlatform::new();
        platform.add_chat(
            "-1001",
            ChatInfo {
                id: -1001,
                title: Some("Secret".into()),
                username: None,
            },
        );
        platform
            .exported_links
            .lock()
            .unwrap()
            .insert(-1001, "https://t.me/+primary".into());

        let link = resolve_channel_link(&platform, "-1001", "en").await.unwrap();
        assert_eq!(link.url.as_deref(), Some("https://t.me/+primary"));
    }

    #[tokio::test]
    async fn test_no_link_leaves_plain_title() {
        let platform = FakePlatform::new();
        platform.add_chat(
            "-1001",
            ChatInfo {
                id: -1001,
                title: Some("Secret".into()),
                username: None,
            },
        );

        let link = resolve_channel_link(&platform, "-1001", "en").await.unwrap();
        assert_eq!(link.url, None);
        assert_eq!(link.html(), "Secret");
    }

    #[tokio::test]
    async fn test_unknown_chat_uses_generic_label() {
        let platform = FakePlatform::new();
        platform
            .invite_links
            .lock()
            .unwrap()
            .insert(-1009, "https://t.me/+xyz".into());

        let link = resolve_channel_link(&platform, "-1009", "ru").await.unwrap();
        assert_eq!(link.label, "канал");
        assert_eq!(link.url.as_deref(), Some("https://t.me/+xyz"));
    }

    #[test]
    fn test_button_rows_two_per_row() {
        let urls: Vec<String> = (1..=5).map(|i| format!("https://t.me/c{}", i)).collect();
        let rows = button_rows(&urls, "en");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[2].len(), 1);
        assert_eq!(rows[0][1].text, "Subscribe 2");
        assert_eq!(rows[2][0].text, "Subscribe 5");
        assert_eq!(rows[2][0].url, "https://t.me/c5");
        assert!(button_rows(&[], "en").is_empty());
    }

    #[tokio::test]
    async fn test_compose_text_and_buttons() {
        let platform = FakePlatform::new();
        platform.add_chat(
            "-1001",
            ChatInfo {
                id: -1001,
                title: Some("Closed".into()),
                username: None,
            },
        );
        let channels = vec!["@chan1".to_string(), "-1001".to_string()];
        let mention = user_mention(7, "Ann");

        let notice = compose(&platform, &channels, &mention, "ru").await;

        assert_eq!(
            notice.text,
            "<a href=\"tg://user?id=7\">Ann</a>, чтобы писать в чат, необходимо подписаться на канал(ы):\n\
             <a href=\"https://t.me/chan1\">@chan1</a> | Closed"
        );
        assert_eq!(notice.buttons.len(), 1);
        assert_eq!(notice.buttons[0].len(), 1);
        assert_eq!(notice.buttons[0][0].text, "Подписаться 1");
    }
}
