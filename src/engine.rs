//! Conversation engine.
//!
//! Resolves inbound chat events (text messages and inline-button taps) into
//! outbound messages. The engine owns the session, onboarding and credential
//! stores plus the Adsterra client; it talks to Telegram only through
//! [`ChatTransport`], so the whole conversation can be driven in tests.

use std::future::Future;

use chrono::NaiveDate;
use teloxide::types::{ChatId, MessageId};
use tracing::{debug, info, warn};

use crate::callback::CallbackToken;
use crate::credentials::{CredentialStore, UserProfile};
use crate::daterange::{self, GroupBy, RangeOption};
use crate::integrations::AdsterraClient;
use crate::menu::Menu;
use crate::onboarding::{OnboardingStage, OnboardingStore};
use crate::report;
use crate::session::{ConversationKey, SessionStore};
use crate::{Error, Result};

const WELCOME: &str = "Welcome to Adsterra Statistics Bot!";
const ASK_KEY: &str = "Please Enter Your API KEY ?";
const ASK_NEW_KEY: &str = "Please provide a new API key:";
const INVALID_KEY: &str =
    "Invalid API key. Please enter a valid key (32 lowercase hexadecimal characters):";
const NEEDS_SETUP: &str = "Please set up your Adsterra API key first with /setup_api.";
const NO_KEY_STORED: &str = "No API key stored. Use /setup_api to add one.";

/// Outbound side of the chat, as seen by the engine.
pub trait ChatTransport: Send + Sync {
    /// Send a new message and return its id.
    fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        menu: Option<Menu>,
    ) -> impl Future<Output = Result<MessageId>> + Send;

    /// Replace the text (and inline menu) of an existing message.
    fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        menu: Option<Menu>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Text commands the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    SetupApi,
    DeveloperInfo,
    Statistics,
    Websites,
    DirectLinks,
    Balance,
}

impl Command {
    /// Slash commands match on the first word (`/start@MyBot` included);
    /// menu labels match anywhere in the text so emoji prefixes are fine.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('/') {
            let word = rest.split_whitespace().next().unwrap_or("");
            let name = word.split('@').next().unwrap_or("");
            return match name {
                "start" => Some(Command::Start),
                "setup_api" => Some(Command::SetupApi),
                "developer_info" => Some(Command::DeveloperInfo),
                _ => None,
            };
        }

        [
            ("Statistics", Command::Statistics),
            ("Websites", Command::Websites),
            ("Direct Links", Command::DirectLinks),
            ("Balance", Command::Balance),
        ]
        .into_iter()
        .find(|(label, _)| text.contains(label))
        .map(|(_, command)| command)
    }
}

fn key_view(api_key: &str) -> String {
    format!("Your Api Key\n{}", api_key)
}

fn developer_info() -> String {
    format!(
        "Info\n\n\
         Bot Name: Adsterra Statistics\n\
         About: This bot helps you track Adsterra statistics and manage your account efficiently.\n\n\
         Key Features:\n\
         - Fetch statistics for your Adsterra account\n\
         - View direct links and websites\n\
         - Set up your Adsterra API key for personalized data\n\n\
         Version: {}",
        env!("CARGO_PKG_VERSION")
    )
}

pub struct Engine {
    client: AdsterraClient,
    credentials: CredentialStore,
    sessions: SessionStore,
    onboarding: OnboardingStore,
    today: fn() -> NaiveDate,
}

impl Engine {
    pub fn new(client: AdsterraClient, credentials: CredentialStore, sessions: SessionStore) -> Self {
        Self {
            client,
            credentials,
            sessions,
            onboarding: OnboardingStore::new(),
            today: daterange::today,
        }
    }

    /// Override the clock used for date-range computation.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn onboarding(&self) -> &OnboardingStore {
        &self.onboarding
    }

    /// Entry point for text messages.
    pub async fn handle_message<T: ChatTransport>(
        &self,
        transport: &T,
        chat_id: ChatId,
        user: &UserProfile,
        text: &str,
    ) -> Result<()> {
        match Command::parse(text) {
            Some(command) => {
                debug!(user_id = user.id, ?command, "Handling command");
                self.handle_command(transport, chat_id, user, command).await
            }
            None if self.onboarding.is_awaiting_key(user.id).await => {
                self.submit_key(transport, chat_id, user, text).await?;
                Ok(())
            }
            None => {
                debug!(user_id = user.id, "Ignoring free text");
                Ok(())
            }
        }
    }

    pub async fn handle_command<T: ChatTransport>(
        &self,
        transport: &T,
        chat_id: ChatId,
        user: &UserProfile,
        command: Command,
    ) -> Result<()> {
        match command {
            Command::Start => self.start(transport, chat_id, user.id).await,
            Command::SetupApi => self.setup(transport, chat_id, user.id).await,
            Command::DeveloperInfo => {
                transport
                    .send_message(chat_id, &developer_info(), None)
                    .await?;
                Ok(())
            }
            Command::Statistics => self.statistics(transport, chat_id, user.id).await,
            Command::Websites => self.websites(transport, chat_id, user.id).await,
            Command::DirectLinks => self.direct_links(transport, chat_id, user.id).await,
            Command::Balance => {
                if self.api_key_or_prompt(transport, chat_id, user.id).await?.is_some() {
                    transport
                        .send_message(chat_id, "Coming Soon...", None)
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn start<T: ChatTransport>(&self, transport: &T, chat_id: ChatId, user_id: u64) -> Result<()> {
        if self.credentials.has_key(user_id).await {
            let text = format!("{}\nPlease interact with button below.", WELCOME);
            transport.send_message(chat_id, &text, Some(Menu::Main)).await?;
        } else {
            let text = format!(
                "{}\nPlease set up your Adsterra API key to get started. Send /setup_api to continue.",
                WELCOME
            );
            transport.send_message(chat_id, &text, Some(Menu::Guest)).await?;
        }
        Ok(())
    }

    /// Show the stored key, or start onboarding when there is none.
    async fn setup<T: ChatTransport>(&self, transport: &T, chat_id: ChatId, user_id: u64) -> Result<()> {
        match self.credentials.get(user_id).await {
            Some(api_key) => {
                transport
                    .send_message(chat_id, &key_view(&api_key), Some(Menu::KeyManagement))
                    .await?;
            }
            None => {
                self.onboarding.begin(user_id).await;
                info!(user_id, "Onboarding started");
                transport.send_message(chat_id, ASK_KEY, None).await?;
            }
        }
        Ok(())
    }

    async fn api_key_or_prompt<T: ChatTransport>(
        &self,
        transport: &T,
        chat_id: ChatId,
        user_id: u64,
    ) -> Result<Option<String>> {
        let api_key = self.credentials.get(user_id).await;
        if api_key.is_none() {
            transport
                .send_message(chat_id, NEEDS_SETUP, Some(Menu::Guest))
                .await?;
        }
        Ok(api_key)
    }

    /// Idle → AwaitingDateRange.
    async fn statistics<T: ChatTransport>(&self, transport: &T, chat_id: ChatId, user_id: u64) -> Result<()> {
        if self.api_key_or_prompt(transport, chat_id, user_id).await?.is_none() {
            return Ok(());
        }

        let message_id = transport
            .send_message(chat_id, "Please select a date range:", Some(Menu::DateRange))
            .await?;
        self.sessions
            .open(ConversationKey::new(chat_id, message_id))
            .await;
        Ok(())
    }

    async fn websites<T: ChatTransport>(&self, transport: &T, chat_id: ChatId, user_id: u64) -> Result<()> {
        let Some(api_key) = self.api_key_or_prompt(transport, chat_id, user_id).await? else {
            return Ok(());
        };

        let loading = transport.send_message(chat_id, "🔎 Searching...", None).await?;
        let text = match self.client.list_websites(&api_key).await {
            Ok(websites) => report::format_websites(&websites),
            Err(err) => err.to_string(),
        };
        transport
            .edit_message(chat_id, loading, &report::fit_message(text), None)
            .await
    }

    async fn direct_links<T: ChatTransport>(&self, transport: &T, chat_id: ChatId, user_id: u64) -> Result<()> {
        let Some(api_key) = self.api_key_or_prompt(transport, chat_id, user_id).await? else {
            return Ok(());
        };

        let loading = transport.send_message(chat_id, "🔎 Searching...", None).await?;
        let text = match self.client.list_direct_links(&api_key).await {
            Ok(links) => report::format_direct_links(&links),
            Err(err) => err.to_string(),
        };
        transport
            .edit_message(chat_id, loading, &report::fit_message(text), None)
            .await
    }

    /// Validate `text` as the user's pending key, probe it and persist it on
    /// success. Returns the stage the flow ended in.
    pub async fn submit_key<T: ChatTransport>(
        &self,
        transport: &T,
        chat_id: ChatId,
        user: &UserProfile,
        text: &str,
    ) -> Result<OnboardingStage> {
        let candidate = match self.onboarding.receive(user.id, text).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                // Another message already took the pending flow.
                debug!(user_id = user.id, "No key pending; ignoring text");
                return Ok(OnboardingStage::AwaitingKey);
            }
            Err(Error::InvalidApiKey) => {
                transport.send_message(chat_id, INVALID_KEY, None).await?;
                return Ok(OnboardingStage::AwaitingKey);
            }
            Err(err) => return Err(err),
        };

        let progress = transport
            .send_message(chat_id, "👀 Testing API on Adsterra Server...", None)
            .await?;
        let probe = self.client.probe_status(&candidate).await;
        let stage = match self.onboarding.resolve(user.id, &probe).await {
            Ok(stage) => stage,
            Err(err) => {
                warn!(user_id = user.id, error = %err, "API key not accepted");
                OnboardingStage::Failed
            }
        };

        if stage == OnboardingStage::Complete {
            self.credentials
                .set(user.id, &candidate, Some(user.clone()))
                .await?;
            info!(user_id = user.id, "API key registered");
            transport
                .edit_message(chat_id, progress, "✅ Status Code 200 ✅", None)
                .await?;
            transport
                .send_message(chat_id, "API key successfully integrated!", Some(Menu::Main))
                .await?;
        } else {
            transport
                .edit_message(chat_id, progress, "❌ Bad Status Code Detected! ❌", None)
                .await?;
            transport
                .send_message(chat_id, "something went wrong!", Some(Menu::Guest))
                .await?;
        }

        Ok(stage)
    }

    /// Entry point for inline-button taps on message `message_id`.
    pub async fn handle_callback<T: ChatTransport>(
        &self,
        transport: &T,
        chat_id: ChatId,
        message_id: MessageId,
        user: &UserProfile,
        data: &str,
    ) -> Result<()> {
        let Some(token) = CallbackToken::parse(data) else {
            debug!(data, "Ignoring unknown callback payload");
            return Ok(());
        };
        let key = ConversationKey::new(chat_id, message_id);

        match token {
            CallbackToken::Range(option) => self.select_range(transport, key, option).await,
            CallbackToken::GroupBy(group_by) => {
                match self.select_group_by(transport, key, user.id, group_by).await {
                    Err(Error::MissingSession) => {
                        warn!(?key, "Group-by tap without a remembered date range");
                        Ok(())
                    }
                    other => other,
                }
            }
            CallbackToken::EditKey => {
                self.onboarding.begin(user.id).await;
                info!(user_id = user.id, "Key edit started");
                transport
                    .edit_message(chat_id, message_id, ASK_NEW_KEY, None)
                    .await
            }
            CallbackToken::DeleteKey => {
                if self.credentials.has_key(user.id).await {
                    transport
                        .edit_message(
                            chat_id,
                            message_id,
                            "🤨 Are you sure you want to delete?",
                            Some(Menu::ConfirmDelete),
                        )
                        .await
                } else {
                    transport
                        .edit_message(chat_id, message_id, NO_KEY_STORED, None)
                        .await
                }
            }
            CallbackToken::ConfirmDelete => {
                if !self.credentials.remove(user.id).await? {
                    return transport
                        .edit_message(chat_id, message_id, NO_KEY_STORED, None)
                        .await;
                }
                self.onboarding.cancel(user.id).await;
                transport
                    .edit_message(chat_id, message_id, "🗑️ API key deleted.", None)
                    .await?;
                transport
                    .send_message(chat_id, "Use /setup_api to register a new key.", Some(Menu::Guest))
                    .await?;
                Ok(())
            }
            CallbackToken::CancelDelete => match self.credentials.get(user.id).await {
                Some(api_key) => {
                    transport
                        .edit_message(
                            chat_id,
                            message_id,
                            &key_view(&api_key),
                            Some(Menu::KeyManagement),
                        )
                        .await
                }
                None => {
                    transport
                        .edit_message(chat_id, message_id, NO_KEY_STORED, None)
                        .await
                }
            },
        }
    }

    /// AwaitingDateRange → AwaitingGroupBy.
    pub async fn select_range<T: ChatTransport>(
        &self,
        transport: &T,
        key: ConversationKey,
        option: RangeOption,
    ) -> Result<()> {
        let range = option.range((self.today)());
        debug!(?key, start = %range.start, end = %range.end, "Date range selected");
        self.sessions.select_range(key, range).await;

        let text = format!("You selected: {}. Now select group by:", option.label());
        transport
            .edit_message(key.chat_id, key.message_id, &text, Some(Menu::GroupBy))
            .await
    }

    /// AwaitingGroupBy → Idle: fetch and render the report. Fails with
    /// [`Error::MissingSession`] before any network call when no range is
    /// remembered for `key`.
    pub async fn select_group_by<T: ChatTransport>(
        &self,
        transport: &T,
        key: ConversationKey,
        user_id: u64,
        group_by: GroupBy,
    ) -> Result<()> {
        let range = self.sessions.take_range(key).await?;

        let Some(api_key) = self.credentials.get(user_id).await else {
            return transport
                .edit_message(key.chat_id, key.message_id, NO_KEY_STORED, None)
                .await;
        };

        transport
            .edit_message(key.chat_id, key.message_id, "Loading.....", None)
            .await?;

        match self.client.get_statistics(&range, group_by, &api_key).await {
            Ok(rows) => {
                info!(user_id, rows = rows.len(), group_by = %group_by, "Statistics delivered");
                let text = format!(
                    "Your Statistics:\n{} to {} Group by: {}\n\n{}",
                    range.start_param(),
                    range.end_param(),
                    group_by,
                    report::format_statistics(&rows)
                );
                transport
                    .edit_message(key.chat_id, key.message_id, &report::fit_message(text), None)
                    .await
            }
            Err(err) => {
                // Back to AwaitingGroupBy so the user can tap again.
                self.sessions.select_range(key, range).await;
                let text = format!("{}\n\nSelect group by to try again:", err);
                transport
                    .edit_message(key.chat_id, key.message_id, &text, Some(Menu::GroupBy))
                    .await
            }
        }
    }
}
