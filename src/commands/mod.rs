//! Transport-agnostic interpreter for the chat commands that edit a watch
//!
//! A chat front-end feeds every inbound text message through
//! [`CommandHandler::handle`] together with the sender's [`Session`] and relays
//! the returned reply. Keyboard buttons ("Set Site", "Set Price", ...) put the
//! session into an awaiting state; the next plain message is then read as the
//! requested value.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::MonitorError;
use crate::models::{PriceRange, UserWatch, WatchEdit};
use crate::traits::WatchStore;

/// What the next plain message from a user is expected to contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingAction {
    #[default]
    None,
    AwaitingSite,
    AwaitingKeyword,
    AwaitingPrice,
}

/// Conversation state for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub pending: PendingAction,
}

/// Sessions of every user currently talking to the bot.
///
/// Each user has their own lock, so a slow store call for one user never
/// holds up another user's messages.
#[derive(Clone, Default)]
pub struct Sessions {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<Session>>>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the handler against the user's session, creating it on first contact.
    pub async fn handle(&self, handler: &CommandHandler, user_id: &str, text: &str) -> String {
        let session = {
            let mut sessions = self.inner.lock().await;
            sessions.entry(user_id.to_string()).or_default().clone()
        };

        let mut session = session.lock().await;
        handler.handle(user_id, &mut session, text).await
    }
}

/// Parsed form of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    SetSite,
    SetKeyword,
    SetPrice,
    ShowConfig,
    ClearSites,
    Pause,
    Resume,
    AddSite(String),
    Keyword(String),
    Price(String),
    Text(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lower = text.to_lowercase();

        match lower.as_str() {
            "/start" | "/help" => return Self::Start,
            "set site" | "/site" => return Self::SetSite,
            "set keyword" | "/keyword" => return Self::SetKeyword,
            "set price" | "/price" => return Self::SetPrice,
            "show config" | "/config" => return Self::ShowConfig,
            "clear sites" | "/clear" => return Self::ClearSites,
            "pause" | "/pause" => return Self::Pause,
            "resume" | "/resume" => return Self::Resume,
            _ => {}
        }

        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Self::AddSite(text.to_string());
        }
        if let Some(rest) = strip_command(text, "keyword ") {
            return Self::Keyword(rest);
        }
        if let Some(rest) = strip_command(text, "price ") {
            return Self::Price(rest);
        }

        Self::Text(text.to_string())
    }
}

fn strip_command(text: &str, prefix: &str) -> Option<String> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| text[prefix.len()..].trim().to_string())
}

/// Parses `"<min> <max>"`; `"any"`, `"none"` or `"reset"` restores the no-filter range.
pub fn parse_price_range(text: &str) -> Result<Option<PriceRange>, String> {
    let text = text.trim();
    if matches!(text.to_lowercase().as_str(), "any" | "none" | "reset") {
        return Ok(None);
    }

    let parts: Vec<&str> = text.split_whitespace().collect();
    let [min, max] = parts.as_slice() else {
        return Err("Send two numbers: <min> <max>, e.g. 0 100000".to_string());
    };

    let min: i64 = min.parse().map_err(|_| format!("Not a number: {min}"))?;
    let max: i64 = max.parse().map_err(|_| format!("Not a number: {max}"))?;

    PriceRange::new(min, max)
        .map(Some)
        .map_err(|e| e.to_string())
}

pub struct CommandHandler {
    store: Arc<dyn WatchStore>,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn WatchStore>) -> Self {
        Self { store }
    }

    /// Interprets one message and returns the reply to send back.
    pub async fn handle(&self, user_id: &str, session: &mut Session, text: &str) -> String {
        let command = match (session.pending, Command::parse(text)) {
            (PendingAction::AwaitingSite, Command::Text(value)) => Command::AddSite(value),
            (PendingAction::AwaitingKeyword, Command::Text(value)) => Command::Keyword(value),
            (PendingAction::AwaitingPrice, Command::Text(value)) => Command::Price(value),
            (_, command) => command,
        };

        match self.execute(user_id, session, command).await {
            Ok(reply) => reply,
            Err(MonitorError::Config(e)) => format!("Not saved: {e}"),
            Err(e) => {
                warn!(user_id = %user_id, "Command failed: {}", e);
                "Something went wrong, please try again later.".to_string()
            }
        }
    }

    async fn execute(
        &self,
        user_id: &str,
        session: &mut Session,
        command: Command,
    ) -> Result<String, MonitorError> {
        let reply = match command {
            Command::Start => {
                session.pending = PendingAction::None;
                self.store.update_watch(user_id, WatchEdit::SetActive(true)).await?;
                "Monitoring is on. Choose: Set Site, Set Keyword, Set Price, Show Config.".to_string()
            }
            Command::SetSite => {
                session.pending = PendingAction::AwaitingSite;
                "Send the URL of the listing page to watch.".to_string()
            }
            Command::SetKeyword => {
                session.pending = PendingAction::AwaitingKeyword;
                "Send the keyword(s); every word must appear in a listing.".to_string()
            }
            Command::SetPrice => {
                session.pending = PendingAction::AwaitingPrice;
                "Send the price range as: <min> <max> (or \"any\").".to_string()
            }
            Command::ShowConfig => {
                session.pending = PendingAction::None;
                let watch = self
                    .store
                    .get_watch(user_id)
                    .await?
                    .unwrap_or_else(|| UserWatch::new(user_id));
                describe(&watch)
            }
            Command::ClearSites => {
                session.pending = PendingAction::None;
                self.store.update_watch(user_id, WatchEdit::ClearSites).await?;
                "All sites removed.".to_string()
            }
            Command::Pause => {
                session.pending = PendingAction::None;
                self.store.update_watch(user_id, WatchEdit::SetActive(false)).await?;
                "Monitoring paused.".to_string()
            }
            Command::Resume => {
                session.pending = PendingAction::None;
                self.store.update_watch(user_id, WatchEdit::SetActive(true)).await?;
                "Monitoring resumed.".to_string()
            }
            Command::AddSite(url) => {
                let watch = self.store.update_watch(user_id, WatchEdit::AddSite(url)).await?;
                session.pending = PendingAction::None;
                info!("{} now watches {} sites", user_id, watch.sites.len());
                format!("Site saved ({} watched).", watch.sites.len())
            }
            Command::Keyword(keyword) => {
                self.store
                    .update_watch(user_id, WatchEdit::SetKeyword(keyword))
                    .await?;
                session.pending = PendingAction::None;
                "Keyword saved.".to_string()
            }
            Command::Price(raw) => {
                let edit = match parse_price_range(&raw) {
                    Ok(Some(range)) => WatchEdit::SetPriceRange(range),
                    Ok(None) => WatchEdit::ResetPriceRange,
                    Err(message) => return Ok(message),
                };
                self.store.update_watch(user_id, edit).await?;
                session.pending = PendingAction::None;
                "Price range saved.".to_string()
            }
            Command::Text(_) => "Unknown command. Send /start to see the options.".to_string(),
        };

        Ok(reply)
    }
}

fn describe(watch: &UserWatch) -> String {
    let sites = if watch.sites.is_empty() {
        "(none)".to_string()
    } else {
        watch
            .sites
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let keyword = if watch.keyword.is_empty() {
        "(any)"
    } else {
        watch.keyword.as_str()
    };
    let price = if watch.price.is_unbounded() {
        "(any)".to_string()
    } else {
        format!("{} - {}", watch.price.min, watch.price.max)
    };

    format!(
        "Config:\nSites:\n{}\nKeyword: {}\nPrice: {}\nActive: {}",
        sites,
        keyword,
        price,
        if watch.active { "yes" } else { "no" }
    )
}
