//! Data models for watches, extracted listings and Telegram payloads

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Default cap on the number of sites a single watch may follow.
pub const DEFAULT_MAX_SITES: usize = 5;

/// Inclusive price bounds. The default value is the "no filter" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

impl PriceRange {
    pub const UNBOUNDED: Self = Self {
        min: 0,
        max: i64::MAX,
    };

    pub fn new(min: i64, max: i64) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidPriceRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }

    pub fn contains(&self, price: i64) -> bool {
        self.min <= price && price <= self.max
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// A user's monitoring configuration, read fresh at the start of every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWatch {
    pub user_id: String,
    pub sites: Vec<String>,
    pub keyword: String,
    pub price: PriceRange,
    pub active: bool,
}

impl UserWatch {
    /// The watch a user gets before editing anything.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            sites: Vec::new(),
            keyword: String::new(),
            price: PriceRange::UNBOUNDED,
            active: true,
        }
    }

    /// Applies one edit, leaving the watch untouched when the edit is rejected.
    pub fn apply(&mut self, edit: &WatchEdit, max_sites: usize) -> Result<(), ConfigError> {
        match edit {
            WatchEdit::AddSite(site) => {
                let site = validate_site_url(site)?;
                if self.sites.contains(&site) {
                    return Ok(());
                }
                if self.sites.len() >= max_sites {
                    return Err(ConfigError::TooManySites { max: max_sites });
                }
                self.sites.push(site);
            }
            WatchEdit::RemoveSite(index) => {
                if *index >= self.sites.len() {
                    return Err(ConfigError::NoSuchSite(*index));
                }
                self.sites.remove(*index);
            }
            WatchEdit::ClearSites => self.sites.clear(),
            WatchEdit::SetKeyword(keyword) => self.keyword = keyword.trim().to_string(),
            WatchEdit::SetPriceRange(range) => {
                self.price = PriceRange::new(range.min, range.max)?;
            }
            WatchEdit::ResetPriceRange => self.price = PriceRange::UNBOUNDED,
            WatchEdit::SetActive(active) => self.active = *active,
        }
        Ok(())
    }
}

/// A single mutation requested by the command layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEdit {
    AddSite(String),
    RemoveSite(usize),
    ClearSites,
    SetKeyword(String),
    SetPriceRange(PriceRange),
    ResetPriceRange,
    SetActive(bool),
}

/// Parses a site URL and rejects anything that is not http or https.
pub fn validate_site_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url.to_string()),
        _ => Err(ConfigError::InvalidSiteUrl(trimmed.to_string())),
    }
}

/// One candidate item extracted from a page during a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub site: String,
    pub title: String,
    pub url: String,
    /// Visible text of the link's enclosing element, excluding the link's own
    /// text; prices usually live here.
    pub context: String,
    pub price: Option<i64>,
}

/// A qualifying listing, ready to be rendered for the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub user_id: String,
    pub title: String,
    pub price: Option<i64>,
    pub site: String,
    pub url: String,
}

impl NotificationEvent {
    pub fn from_listing(user_id: &str, listing: &Listing) -> Self {
        Self {
            user_id: user_id.to_string(),
            title: listing.title.clone(),
            price: listing.price,
            site: listing.site.clone(),
            url: listing.url.clone(),
        }
    }

    pub fn render(&self) -> String {
        let price = self
            .price
            .map_or_else(|| "unknown".to_string(), |p| p.to_string());

        format!(
            "{}\n\nPrice: {}\nSite: {}\nLink: {}",
            self.title, price, self.site, self.url
        )
    }
}

/// Telegram `sendMessage` request body
#[derive(Debug, Serialize)]
pub struct TelegramMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub disable_web_page_preview: bool,
}

/// Envelope every Telegram Bot API response is wrapped in
#[derive(Debug, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    pub description: Option<String>,
}
