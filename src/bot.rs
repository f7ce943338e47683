//! Telegram transport: teloxide dispatcher wiring around [`Engine`].
//!
//! This is the handler boundary: every error coming out of the engine is
//! logged here and, when a chat is known, turned into a short apology so no
//! failure ever reaches the dispatcher.

use std::sync::Arc;
use std::time::Instant;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tracing::{error, info, warn};

use crate::credentials::UserProfile;
use crate::engine::{ChatTransport, Engine};
use crate::menu::Menu;
use crate::{metrics, Result};

const GENERIC_FAILURE: &str = "⚠️ Something went wrong, please try again.";

/// [`ChatTransport`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl ChatTransport for TelegramTransport {
    async fn send_message(&self, chat_id: ChatId, text: &str, menu: Option<Menu>) -> Result<MessageId> {
        let mut req = self.bot.send_message(chat_id, text.to_string());
        if let Some(menu) = menu {
            req = req.reply_markup(menu.markup());
        }
        let sent = req.await?;
        Ok(sent.id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: Option<Menu>,
    ) -> Result<()> {
        let mut req = self
            .bot
            .edit_message_text(chat_id, message_id, text.to_string());
        if let Some(markup) = menu.and_then(Menu::inline_markup) {
            req = req.reply_markup(markup);
        }
        req.await?;

        // Reply keyboards cannot ride on an edit; send them separately.
        if let Some(menu) = menu.filter(|m| !m.is_inline()) {
            self.bot
                .send_message(chat_id, "Choose an option below.")
                .reply_markup(menu.markup())
                .await?;
        }
        Ok(())
    }
}

async fn on_message(bot: Bot, msg: Message, engine: Arc<Engine>) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let profile = UserProfile::from(user);
    let chat_id = msg.chat.id;

    metrics::record_handler_start("message");
    let started = Instant::now();
    let transport = TelegramTransport::new(bot);
    let result = engine
        .handle_message(&transport, chat_id, &profile, text)
        .await;
    metrics::record_handler_result("message", started.elapsed(), result.is_ok());

    if let Err(err) = result {
        if err.is_recoverable() {
            warn!(user_id = profile.id, error = %err, "Message handler failed");
        } else {
            error!(user_id = profile.id, error = %err, "Message handler failed");
        }
        report_failure(&transport, chat_id).await;
    }
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, engine: Arc<Engine>) -> Result<()> {
    // Clear the button spinner whatever happens next.
    if let Err(err) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %err, "Failed to answer callback");
    }

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };
    let profile = UserProfile::from(&q.from);
    let chat_id = message.chat.id;

    metrics::record_handler_start("callback");
    let started = Instant::now();
    let transport = TelegramTransport::new(bot);
    let result = engine
        .handle_callback(&transport, chat_id, message.id, &profile, data)
        .await;
    metrics::record_handler_result("callback", started.elapsed(), result.is_ok());

    if let Err(err) = result {
        if err.is_recoverable() {
            warn!(user_id = profile.id, data, error = %err, "Callback handler failed");
        } else {
            error!(user_id = profile.id, data, error = %err, "Callback handler failed");
        }
        report_failure(&transport, chat_id).await;
    }
    Ok(())
}

async fn report_failure(transport: &TelegramTransport, chat_id: ChatId) {
    if let Err(err) = transport.send_message(chat_id, GENERIC_FAILURE, None).await {
        warn!(error = %err, "Failed to report handler failure");
    }
}

/// Poll Telegram until interrupted.
pub async fn run(bot: Bot, engine: Arc<Engine>) {
    info!("Starting Adsterra Statistics Bot...");

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint({
            let engine = engine.clone();
            move |bot: Bot, q: CallbackQuery| on_callback(bot, q, engine.clone())
        }))
        .branch(Update::filter_message().endpoint({
            let engine = engine.clone();
            move |bot: Bot, msg: Message| on_message(bot, msg, engine.clone())
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
