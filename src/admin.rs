//! Admin settings menu: who may use it, what each picker button does and
//! how the results are reported back.

use crate::i18n::{t, t_with_args};
use crate::identifiers::ChannelRef;
use crate::platform::ChatPlatform;
use crate::store::ConfigStore;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct AdminAllowlist {
    ids: HashSet<u64>,
}

impl AdminAllowlist {
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// An empty allowlist lets anyone in, for first-time setup.
    pub fn is_authorized(&self, user_id: Option<u64>) -> bool {
        match user_id {
            None => false,
            Some(_) if self.ids.is_empty() => true,
            Some(id) => self.ids.contains(&id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Channel,
    Group,
}

impl ChatKind {
    fn key(self, suffix: &str) -> String {
        match self {
            ChatKind::Channel => format!("admin.channel_{}", suffix),
            ChatKind::Group => format!("admin.group_{}", suffix),
        }
    }

    fn fallback_label(self, language: &str) -> String {
        match self {
            ChatKind::Channel => t(language, "notice.channel_fallback"),
            ChatKind::Group => t(language, "admin.group_fallback"),
        }
    }
}

/// What a chat-picker button does with the chat the admin selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    AssignTarget,
    Add(ChatKind),
    Remove(ChatKind),
}

impl PickerAction {
    pub const ALL: [PickerAction; 5] = [
        PickerAction::AssignTarget,
        PickerAction::Add(ChatKind::Channel),
        PickerAction::Remove(ChatKind::Channel),
        PickerAction::Add(ChatKind::Group),
        PickerAction::Remove(ChatKind::Group),
    ];

    pub fn request_id(self) -> i32 {
        match self {
            PickerAction::AssignTarget => 42,
            PickerAction::Add(ChatKind::Channel) => 43,
            PickerAction::Remove(ChatKind::Channel) => 44,
            PickerAction::Add(ChatKind::Group) => 45,
            PickerAction::Remove(ChatKind::Group) => 46,
        }
    }

    pub fn from_request_id(request_id: i32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|action| action.request_id() == request_id)
    }

    /// Whether the picker only offers channels (as opposed to groups).
    pub fn picks_channel(self) -> bool {
        matches!(
            self,
            PickerAction::Add(ChatKind::Channel) | PickerAction::Remove(ChatKind::Channel)
        )
    }

    /// Channels must already have the bot, otherwise membership checks fail.
    pub fn requires_bot_member(self) -> bool {
        self.picks_channel()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminReply {
    TargetSet(i64),
    Added { kind: ChatKind, label: Option<String> },
    AlreadyPresent(ChatKind),
    Removed(ChatKind),
    NotFound(ChatKind),
    StorageError,
}

impl AdminReply {
    pub fn text(&self, language: &str) -> String {
        match self {
            AdminReply::TargetSet(chat_id) => {
                t_with_args(language, "admin.target_set", &[&chat_id.to_string()])
            }
            AdminReply::Added { kind, label } => {
                let label = label
                    .clone()
                    .unwrap_or_else(|| kind.fallback_label(language));
                t_with_args(language, &kind.key("added"), &[&label])
            }
            AdminReply::AlreadyPresent(kind) => t(language, &kind.key("exists")),
            AdminReply::Removed(kind) => t(language, &kind.key("removed")),
            AdminReply::NotFound(kind) => t(language, &kind.key("missing")),
            AdminReply::StorageError => t(language, "admin.storage_error"),
        }
    }
}

/// Applies the chat an admin picked with one of the menu's picker buttons.
pub async fn apply_picked_chat(
    platform: &dyn ChatPlatform,
    store: &ConfigStore,
    action: PickerAction,
    chat_id: i64,
) -> AdminReply {
    let result = match action {
        PickerAction::AssignTarget => store
            .set_chat_id(chat_id)
            .await
            .map(|()| AdminReply::TargetSet(chat_id)),
        PickerAction::Add(kind) => add_picked(platform, store, kind, chat_id).await,
        PickerAction::Remove(kind) => remove_picked(platform, store, kind, chat_id).await,
    };

    match result {
        Ok(reply) => {
            tracing::info!("Admin action {:?} on {}: {:?}", action, chat_id, reply);
            reply
        }
        Err(e) => {
            tracing::error!("Admin action {:?} on {} failed: {}", action, chat_id, e);
            AdminReply::StorageError
        }
    }
}

async fn add_picked(
    platform: &dyn ChatPlatform,
    store: &ConfigStore,
    kind: ChatKind,
    chat_id: i64,
) -> crate::store::StoreResult<AdminReply> {
    let info = match platform.get_chat(&ChannelRef::Id(chat_id)).await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::debug!("get_chat failed for picked chat {}: {}", chat_id, e);
            None
        }
    };

    let username = info.as_ref().and_then(|info| info.username.clone());
    let identifier = match &username {
        Some(username) => format!("@{}", username),
        None => chat_id.to_string(),
    };

    if !store.add_channel(&identifier).await? {
        return Ok(AdminReply::AlreadyPresent(kind));
    }

    let label = match username {
        Some(_) => Some(identifier),
        None => info.and_then(|info| info.title),
    };
    Ok(AdminReply::Added { kind, label })
}

async fn remove_picked(
    platform: &dyn ChatPlatform,
    store: &ConfigStore,
    kind: ChatKind,
    chat_id: i64,
) -> crate::store::StoreResult<AdminReply> {
    if store.remove_channel(&chat_id.to_string()).await? {
        return Ok(AdminReply::Removed(kind));
    }

    let username = match platform.get_chat(&ChannelRef::Id(chat_id)).await {
        Ok(info) => info.username,
        Err(e) => {
            tracing::debug!("get_chat failed for picked chat {}: {}", chat_id, e);
            None
        }
    };

    if let Some(username) = username {
        if store.remove_channel(&format!("@{}", username)).await? {
            return Ok(AdminReply::Removed(kind));
        }
    }

    Ok(AdminReply::NotFound(kind))
}

/// One bullet line per channel. Raw numeric IDs are never shown.
pub async fn describe_channels(
    platform: &dyn ChatPlatform,
    channels: &[String],
    language: &str,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(channels.len());

    for channel in channels {
        let info = match ChannelRef::parse(channel) {
            Some(chat) => platform.get_chat(&chat).await.ok(),
            None => None,
        };

        let line = match info {
            Some(info) => {
                let title = info
                    .title
                    .clone()
                    .or_else(|| info.username.clone())
                    .unwrap_or_else(|| t(language, "notice.channel_fallback"));
                match info.username {
                    Some(username) => format!("• {} (@{})", title, username),
                    None => format!("• {}", title),
                }
            }
            None if channel.starts_with('@') => format!("• {}", channel),
            None => format!("• {}", t(language, "notice.channel_fallback")),
        };
        lines.push(line);
    }

    lines
}

/// Full reply for the "list" menu item.
pub async fn channels_report(
    platform: &dyn ChatPlatform,
    store: &ConfigStore,
    language: &str,
) -> String {
    let channels = match store.list_channels().await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::error!("Cannot list channels: {}", e);
            return t(language, "admin.storage_error");
        }
    };

    if channels.is_empty() {
        return t(language, "admin.no_channels");
    }

    let lines = describe_channels(platform, &channels, language).await;
    format!("{}\n{}", t(language, "admin.channels_header"), lines.join("\n"))
}

/// Replaces stored numeric IDs with `@username` where the chat has a public
/// one. Returns how many entries changed.
pub async fn normalize_stored_channels(platform: &dyn ChatPlatform, store: &ConfigStore) -> usize {
    let channels = match store.list_channels().await {
        Ok(channels) => channels,
        Err(e) => {
            tracing::warn!("Skipping channel normalization: {}", e);
            return 0;
        }
    };

    let mut replaced = 0;
    for channel in channels {
        let Some(chat @ ChannelRef::Id(_)) = ChannelRef::parse(&channel) else {
            continue;
        };

        let username = match platform.get_chat(&chat).await {
            Ok(info) => info.username,
            Err(e) => {
                tracing::debug!("Cannot resolve {} during normalization: {}", channel, e);
                continue;
            }
        };
        let Some(username) = username else {
            continue;
        };

        let new = format!("@{}", username);
        match store.replace_channel(&channel, &new).await {
            Ok(true) => {
                tracing::info!("Normalized channel {} -> {}", channel, new);
                replaced += 1;
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to normalize {}: {}", channel, e),
        }
    }

    replaced
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTrigger {
    Close,
    List,
}

impl MenuTrigger {
    /// Matches plain-text menu buttons by their (case-insensitive) ending,
    /// so the emoji prefix does not matter.
    pub fn parse(text: &str, language: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        let ends_with = |key: &str| text.ends_with(&t(language, key).to_lowercase());

        if ends_with("admin.triggers.close") {
            Some(MenuTrigger::Close)
        } else if ends_with("admin.triggers.list") || ends_with("admin.triggers.list_short") {
            Some(MenuTrigger::List)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    pub text: String,
    pub picker: Option<PickerAction>,
}

/// Reply keyboard rows of the settings menu.
pub fn menu_layout(language: &str) -> Vec<Vec<MenuButton>> {
    let picker = |key: &str, action: PickerAction| MenuButton {
        text: t(language, key),
        picker: Some(action),
    };
    let plain = |key: &str| MenuButton {
        text: t(language, key),
        picker: None,
    };

    vec![
        vec![
            picker("admin.buttons.pick_channel", PickerAction::Add(ChatKind::Channel)),
            picker("admin.buttons.remove_channel", PickerAction::Remove(ChatKind::Channel)),
        ],
        vec![
            picker("admin.buttons.pick_group", PickerAction::Add(ChatKind::Group)),
            picker("admin.buttons.remove_group", PickerAction::Remove(ChatKind::Group)),
        ],
        vec![
            plain("admin.buttons.list"),
            picker("admin.buttons.assign_target", PickerAction::AssignTarget),
        ],
        vec![plain("admin.buttons.close")],
    ]
}
