use std::sync::Arc;
use subgate::admin::{
    apply_picked_chat, channels_report, menu_layout, AdminAllowlist, MenuButton, MenuTrigger,
    PickerAction,
};
use subgate::i18n::t;
use subgate::platform::ChatPlatform;
use subgate::store::ConfigStore;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree::{self, case};
use teloxide::filter_command;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::types::{
    ButtonRequest, ChatShared, KeyboardButton, KeyboardButtonRequestChat, KeyboardMarkup,
    ReplyMarkup, RequestId,
};
use teloxide::RequestError;

pub struct AdminMenu {
    pub platform: Arc<dyn ChatPlatform>,
    pub store: Arc<ConfigStore>,
    pub allowlist: AdminAllowlist,
    pub language: String,
}

impl AdminMenu {
    fn allows(&self, msg: &Message) -> bool {
        let user_id = msg.from.as_ref().map(|user| user.id.0);
        let authorized = self.allowlist.is_authorized(user_id);
        if !authorized {
            tracing::debug!("Ignoring admin menu request from {:?}", user_id);
        }
        authorized
    }
}

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "Shows the settings menu.")]
    Start,
    #[command(description = "Shows the settings menu.")]
    Settings,
}

fn chat_request(action: PickerAction) -> KeyboardButtonRequestChat {
    KeyboardButtonRequestChat {
        request_id: RequestId(action.request_id()),
        chat_is_channel: action.picks_channel(),
        chat_is_forum: None,
        chat_has_username: None,
        chat_is_created: None,
        user_administrator_rights: None,
        bot_administrator_rights: None,
        bot_is_member: action.requires_bot_member(),
    }
}

fn keyboard_button(button: MenuButton) -> KeyboardButton {
    KeyboardButton {
        text: button.text,
        request: button
            .picker
            .map(|action| ButtonRequest::RequestChat(chat_request(action))),
    }
}

fn settings_keyboard(language: &str) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = menu_layout(language)
        .into_iter()
        .map(|row| row.into_iter().map(keyboard_button).collect())
        .collect();

    KeyboardMarkup::new(rows)
        .resize_keyboard()
        .input_field_placeholder(t(language, "admin.placeholder"))
}

async fn show_menu(bot: Bot, msg: Message, menu: Arc<AdminMenu>) -> ResponseResult<()> {
    if !menu.allows(&msg) {
        return Ok(());
    }

    bot.send_message(msg.chat.id, t(&menu.language, "admin.menu_title"))
        .reply_markup(settings_keyboard(&menu.language))
        .await?;
    tracing::debug!("Settings menu opened in {}", msg.chat.id);
    Ok(())
}

async fn handle_trigger(
    bot: Bot,
    msg: Message,
    trigger: MenuTrigger,
    menu: Arc<AdminMenu>,
) -> ResponseResult<()> {
    if !menu.allows(&msg) {
        return Ok(());
    }

    match trigger {
        MenuTrigger::Close => {
            bot.send_message(msg.chat.id, t(&menu.language, "admin.menu_closed"))
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;
        }
        MenuTrigger::List => {
            let report = channels_report(menu.platform.as_ref(), &menu.store, &menu.language).await;
            bot.send_message(msg.chat.id, report).await?;
        }
    }

    Ok(())
}

async fn handle_shared_chat(
    bot: Bot,
    msg: Message,
    shared: ChatShared,
    menu: Arc<AdminMenu>,
) -> ResponseResult<()> {
    if !menu.allows(&msg) {
        return Ok(());
    }

    let Some(action) = PickerAction::from_request_id(shared.request_id.0) else {
        tracing::warn!("Unknown chat picker request id {}", shared.request_id.0);
        return Ok(());
    };

    let reply = apply_picked_chat(
        menu.platform.as_ref(),
        &menu.store,
        action,
        shared.chat_id.0,
    )
    .await;

    bot.send_message(msg.chat.id, reply.text(&menu.language))
        .await?;
    Ok(())
}

/// Message branch for the private-chat settings menu. Anything it does not
/// recognize falls through to the guard.
pub fn schema() -> UpdateHandler<RequestError> {
    dptree::filter(|msg: Message| msg.chat.is_private())
        .branch(
            filter_command::<Command, _>()
                .branch(case![Command::Start].endpoint(show_menu))
                .branch(case![Command::Settings].endpoint(show_menu)),
        )
        .branch(
            dptree::filter_map(|msg: Message| msg.shared_chat().cloned())
                .endpoint(handle_shared_chat),
        )
        .branch(
            dptree::filter_map(|msg: Message, menu: Arc<AdminMenu>| {
                msg.text()
                    .and_then(|text| MenuTrigger::parse(text, &menu.language))
            })
            .endpoint(handle_trigger),
        )
}
