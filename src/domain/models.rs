//! Domain models for marketplace data.
//!
//! These mirror the backend's listing, user and message resources, plus the
//! client-side filter state and the cursor-paginated `Page`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::{AppError, Result};

/// Physical condition of a listed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "Factory New")]
    FactoryNew,
    #[serde(rename = "Minimal Wear")]
    MinimalWear,
    #[serde(rename = "Fair")]
    Fair,
    #[serde(rename = "Well Worn")]
    WellWorn,
    #[serde(rename = "Refurbished")]
    Refurbished,
}

impl Condition {
    /// Wire value used by the backend and in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FactoryNew => "Factory New",
            Self::MinimalWear => "Minimal Wear",
            Self::Fair => "Fair",
            Self::WellWorn => "Well Worn",
            Self::Refurbished => "Refurbished",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "factorynew" | "new" => Ok(Self::FactoryNew),
            "minimalwear" => Ok(Self::MinimalWear),
            "fair" => Ok(Self::Fair),
            "wellworn" => Ok(Self::WellWorn),
            "refurbished" => Ok(Self::Refurbished),
            _ => Err(format!(
                "Unknown condition: {s}. Use: factory-new, minimal-wear, fair, well-worn, refurbished"
            )),
        }
    }
}

/// Ordering accepted by the listings endpoint's `ordering` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOption {
    PriceAsc,
    PriceDesc,
    TitleAsc,
    TitleDesc,
    MostLiked,
    LeastDisliked,
    Newest,
    Oldest,
}

impl SortOption {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price",
            Self::PriceDesc => "-price",
            Self::TitleAsc => "title",
            Self::TitleDesc => "-title",
            Self::MostLiked => "-likes",
            Self::LeastDisliked => "dislikes",
            Self::Newest => "-created_at",
            Self::Oldest => "created_at",
        }
    }
}

impl std::fmt::Display for SortOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "price" => Ok(Self::PriceAsc),
            "-price" => Ok(Self::PriceDesc),
            "title" => Ok(Self::TitleAsc),
            "-title" => Ok(Self::TitleDesc),
            "-likes" => Ok(Self::MostLiked),
            "dislikes" => Ok(Self::LeastDisliked),
            "-created_at" => Ok(Self::Newest),
            "created_at" => Ok(Self::Oldest),
            _ => Err(format!(
                "Unknown sort option: {s}. Use: price, -price, title, -title, -likes, dislikes, -created_at, created_at"
            )),
        }
    }
}

/// Search, price, condition and sort state for the listings page.
///
/// An immutable snapshot; query building borrows it and never mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub search_term: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub condition: Option<Condition>,
    pub sort_option: Option<SortOption>,
}

impl FilterState {
    #[must_use]
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    #[must_use]
    pub const fn with_min_price(mut self, price: f64) -> Self {
        self.min_price = Some(price);
        self
    }

    #[must_use]
    pub const fn with_max_price(mut self, price: f64) -> Self {
        self.max_price = Some(price);
        self
    }

    #[must_use]
    pub const fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub const fn with_sort(mut self, sort: SortOption) -> Self {
        self.sort_option = Some(sort);
        self
    }

    /// Non-empty fields as `(key, value)` query pairs, in a fixed key order.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(5);
        if let Some(term) = self.search_term.as_deref().map(str::trim) {
            if !term.is_empty() {
                pairs.push(("search", term.to_string()));
            }
        }
        if let Some(min) = self.min_price {
            pairs.push(("min_price", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("max_price", max.to_string()));
        }
        if let Some(condition) = self.condition {
            pairs.push(("condition", condition.as_str().to_string()));
        }
        if let Some(sort) = self.sort_option {
            pairs.push(("ordering", sort.as_str().to_string()));
        }
        pairs
    }

    /// True when no field contributes a query parameter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }
}

/// Opaque pagination link issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a cursor-paginated result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Cursor>,
    pub previous: Option<Cursor>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    pub title: String,
    pub condition: Condition,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author_id: Option<u64>,
}

/// Body for creating a listing.
#[derive(Debug, Clone, Serialize)]
pub struct NewListing {
    pub title: String,
    pub condition: Condition,
    pub description: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl NewListing {
    /// Check the field limits the backend enforces.
    ///
    /// # Errors
    /// Returns `AppError::Validation` describing the first violated limit.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(validation("title must not be empty"));
        }
        if self.title.chars().count() > 50 {
            return Err(validation("title must be at most 50 characters"));
        }
        if self.description.chars().count() > 500 {
            return Err(validation("description must be at most 500 characters"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(validation("price must be a non-negative number"));
        }
        Ok(())
    }
}

/// A marketplace user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// Body for registering an account.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl NewUser {
    /// # Errors
    /// Returns `AppError::Validation` for an empty or over-long username,
    /// or an empty password.
    pub fn validate(&self) -> Result<()> {
        let len = self.username.chars().count();
        if len == 0 || len > 50 {
            return Err(validation("username must be 1-50 characters"));
        }
        if self.password.is_empty() {
            return Err(validation("password must not be empty"));
        }
        Ok(())
    }
}

/// Partial profile update; only `Some` fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.location.is_none()
    }
}

/// Maximum message length accepted by the backend.
pub const MAX_MESSAGE_LEN: usize = 200;

/// A direct message between users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(alias = "message_id")]
    pub id: u64,
    #[serde(alias = "sender_id")]
    pub sender: u64,
    /// Not revealed by the inbox endpoint; zero when absent.
    #[serde(alias = "receiver_id", default)]
    pub receiver: u64,
    pub content: String,
}

/// Whether the current user has blocked another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockStatus {
    Blocked,
    NotBlocked,
}

impl BlockStatus {
    /// Decode the backend's `detail` sentence.
    ///
    /// # Errors
    /// Returns `AppError::InvalidResponse` for any other sentence.
    pub fn from_detail(detail: &str) -> Result<Self> {
        match detail {
            "User is blocked." => Ok(Self::Blocked),
            "User is not blocked." => Ok(Self::NotBlocked),
            other => Err(AppError::InvalidResponse {
                message: format!("unexpected block status detail: {other:?}"),
            }),
        }
    }

    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// The status after a block/unblock toggle.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Blocked => Self::NotBlocked,
            Self::NotBlocked => Self::Blocked,
        }
    }
}

impl std::fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocked => write!(f, "Blocked"),
            Self::NotBlocked => write!(f, "Not blocked"),
        }
    }
}

/// Listing page detail: the listing, its seller and the block relation.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    pub listing: Listing,
    pub author: Option<User>,
    pub block_status: Option<BlockStatus>,
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS[.f]` form
/// SQLite stores; naive values are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn validation(message: &str) -> AppError {
    AppError::Validation {
        message: message.to_string(),
    }
}
