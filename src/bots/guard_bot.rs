use crate::bots::admin_menu::{self, AdminMenu};
use std::sync::Arc;
use subgate::guard::{Guard, GuardOutcome};
use subgate::platform::telegram::{chat_ref, incoming_message, user_ref};
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatMemberUpdated};
use teloxide::update_listeners::Polling;

async fn handle_message(msg: Message, guard: Arc<Guard>) -> ResponseResult<()> {
    if let Some(members) = msg.new_chat_members() {
        let users: Vec<_> = members.iter().map(user_ref).collect();
        guard.on_new_members(&chat_ref(&msg.chat), &users).await;
        return Ok(());
    }

    let outcome = guard.on_message(&incoming_message(&msg)).await;
    if outcome != GuardOutcome::Ignored {
        tracing::debug!("Message {} in {}: {:?}", msg.id.0, msg.chat.id, outcome);
    }
    Ok(())
}

async fn handle_edited_message(msg: Message, guard: Arc<Guard>) -> ResponseResult<()> {
    guard.on_edited_message(&incoming_message(&msg)).await;
    Ok(())
}

async fn handle_chat_member(update: ChatMemberUpdated, guard: Arc<Guard>) -> ResponseResult<()> {
    let was_present = update.old_chat_member.kind.is_present();
    let is_present = update.new_chat_member.kind.is_present();
    let chat = chat_ref(&update.chat);
    let user = user_ref(&update.new_chat_member.user);

    match (was_present, is_present) {
        (true, false) => {
            guard.on_member_left(&chat, &user).await;
        }
        (false, true) => {
            guard.on_member_joined(&chat, &user).await;
            guard.on_target_member_joined(&chat, &user).await;
        }
        _ => {}
    }

    Ok(())
}

async fn handle_my_chat_member(update: ChatMemberUpdated) -> ResponseResult<()> {
    let was_present = update.old_chat_member.kind.is_present();
    let is_present = update.new_chat_member.kind.is_present();

    if !was_present && is_present {
        tracing::info!("Bot added to chat {} by {}", update.chat.id, update.from.id);
    } else if was_present && !is_present {
        tracing::info!("Bot removed from chat {}", update.chat.id);
    }

    Ok(())
}

pub async fn run_bot(bot: Bot, guard: Arc<Guard>, menu: Arc<AdminMenu>) {
    tracing::info!("Starting subscription guard bot...");

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(admin_menu::schema())
                .branch(dptree::endpoint(handle_message)),
        )
        .branch(Update::filter_edited_message().endpoint(handle_edited_message))
        .branch(Update::filter_chat_member().endpoint(handle_chat_member))
        .branch(Update::filter_my_chat_member().endpoint(handle_my_chat_member));

    // chat_member updates are only delivered when requested explicitly.
    let listener = Polling::builder(bot.clone())
        .allowed_updates(vec![
            AllowedUpdate::Message,
            AllowedUpdate::EditedMessage,
            AllowedUpdate::ChatMember,
            AllowedUpdate::MyChatMember,
        ])
        .build();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![guard, menu])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    tracing::info!("Closing bot... Goodbye!");
}
