//! Seams between the use cases and the outside world.
//!
//! The application layer only talks to these traits; `infrastructure`
//! provides the SQLite and HTTP implementations, tests provide fakes.

use async_trait::async_trait;

use super::error::Result;
use super::models::{
    BlockStatus, Listing, Message, NewListing, NewUser, Page, ProfileUpdate, User,
};
use super::session::{RefreshedTokens, TokenPair};

/// Key-value persistence for session tokens.
pub trait TokenStore: Send + Sync {
    /// # Errors
    /// Returns error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    /// Returns error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove every stored token.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written.
    fn clear(&self) -> Result<()>;
}

/// Source of wall-clock time, in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Token endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for an access/refresh pair.
    async fn obtain_tokens(&self, username: &str, password: &str) -> Result<TokenPair>;

    /// Exchange a refresh token for a new access token.
    async fn refresh_access(&self, refresh_token: &str) -> Result<RefreshedTokens>;
}

/// Marketplace resource endpoints.
#[async_trait]
pub trait MarketApi: Send + Sync {
    /// GET a listings page. `url` may be relative to the API base or a full
    /// cursor URL issued by the server.
    async fn fetch_listings(&self, url: &str) -> Result<Page<Listing>>;

    async fn fetch_listing(&self, listing_id: u64) -> Result<Listing>;

    async fn create_listing(&self, listing: &NewListing) -> Result<Listing>;

    async fn favorite_listing(&self, listing_id: u64) -> Result<()>;

    async fn remove_favorite_listing(&self, listing_id: u64) -> Result<()>;

    async fn list_favorites(&self) -> Result<Vec<Listing>>;

    async fn fetch_user(&self, user_id: u64) -> Result<User>;

    async fn register_user(&self, user: &NewUser) -> Result<User>;

    async fn update_user(&self, user_id: u64, update: &ProfileUpdate) -> Result<()>;

    async fn block_user(&self, user_id: u64) -> Result<()>;

    async fn unblock_user(&self, user_id: u64) -> Result<()>;

    async fn block_status(&self, user_id: u64) -> Result<BlockStatus>;

    async fn list_messages(&self) -> Result<Vec<Message>>;

    async fn send_message(&self, receiver_id: u64, content: &str) -> Result<()>;
}
