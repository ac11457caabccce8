//! Marketplace use cases: listing detail, favorites, blocking, messages and
//! the signed-in user's profile.
//!
//! Reads go through the retry wrapper. Writes are sent once so a
//! non-idempotent request is never repeated behind the caller's back.

use std::sync::Arc;

use crate::domain::{
    AppError, BlockStatus, Listing, ListingDetail, MarketApi, Message, NewListing, NewUser,
    ProfileUpdate, Result, TokenStore, User, ACCESS_TOKEN_KEY, MAX_MESSAGE_LEN,
};

use super::retry::{retry_with_backoff, RetryPolicy};
use super::token::decode_claims;

/// Marketplace operations on behalf of the stored session.
pub struct MarketplaceService {
    api: Arc<dyn MarketApi>,
    store: Arc<dyn TokenStore>,
    retry: RetryPolicy,
}

impl MarketplaceService {
    #[must_use]
    pub fn new(api: Arc<dyn MarketApi>, store: Arc<dyn TokenStore>, retry: RetryPolicy) -> Self {
        Self { api, store, retry }
    }

    /// Listing with its seller and, when signed in, the block relation.
    ///
    /// A missing seller or an unreadable block status does not fail the
    /// whole detail view.
    ///
    /// # Errors
    /// Returns error if the listing itself cannot be loaded.
    pub async fn listing_detail(&self, listing_id: u64) -> Result<ListingDetail> {
        let listing = retry_with_backoff(&self.retry, || self.api.fetch_listing(listing_id)).await?;

        let Some(author_id) = listing.author_id else {
            return Ok(ListingDetail {
                listing,
                author: None,
                block_status: None,
            });
        };

        let author = match retry_with_backoff(&self.retry, || self.api.fetch_user(author_id)).await
        {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(author_id, error = %err, "Failed to load seller");
                None
            }
        };

        let block_status = if self.is_signed_in() {
            match self.block_status(author_id).await {
                Ok(status) => Some(status),
                Err(err) => {
                    tracing::warn!(author_id, error = %err, "Failed to load block status");
                    None
                }
            }
        } else {
            None
        };

        Ok(ListingDetail {
            listing,
            author,
            block_status,
        })
    }

    /// Add a listing to the user's favorites.
    ///
    /// # Errors
    /// `Client { status: 409 }` if already saved, `401` if not signed in.
    pub async fn save_listing(&self, listing_id: u64) -> Result<()> {
        self.api.favorite_listing(listing_id).await?;
        tracing::info!(listing_id, "Listing saved to favorites");
        Ok(())
    }

    /// # Errors
    /// Returns the backend error unchanged.
    pub async fn remove_saved_listing(&self, listing_id: u64) -> Result<()> {
        self.api.remove_favorite_listing(listing_id).await?;
        tracing::info!(listing_id, "Listing removed from favorites");
        Ok(())
    }

    /// # Errors
    /// Returns the error left after retries.
    pub async fn saved_listings(&self) -> Result<Vec<Listing>> {
        retry_with_backoff(&self.retry, || self.api.list_favorites()).await
    }

    /// # Errors
    /// Returns the error left after retries.
    pub async fn block_status(&self, user_id: u64) -> Result<BlockStatus> {
        retry_with_backoff(&self.retry, || self.api.block_status(user_id)).await
    }

    /// Block the user if not blocked, otherwise unblock. Returns the new
    /// status.
    ///
    /// # Errors
    /// Returns error if the current status cannot be read or the change is
    /// rejected.
    pub async fn toggle_block(&self, user_id: u64) -> Result<BlockStatus> {
        let current = self.block_status(user_id).await?;
        match current {
            BlockStatus::Blocked => self.api.unblock_user(user_id).await?,
            BlockStatus::NotBlocked => self.api.block_user(user_id).await?,
        }
        let updated = current.toggled();
        tracing::info!(user_id, status = %updated, "Block status changed");
        Ok(updated)
    }

    /// # Errors
    /// Returns the error left after retries.
    pub async fn inbox(&self) -> Result<Vec<Message>> {
        retry_with_backoff(&self.retry, || self.api.list_messages()).await
    }

    /// Send a direct message.
    ///
    /// # Errors
    /// `Validation` for empty or over-long content, before any request.
    pub async fn send_message(&self, receiver_id: u64, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation {
                message: "message must not be empty".into(),
            });
        }
        if content.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation {
                message: format!("message must be at most {MAX_MESSAGE_LEN} characters"),
            });
        }
        self.api.send_message(receiver_id, content).await?;
        tracing::info!(receiver_id, "Message sent");
        Ok(())
    }

    /// Id of the signed-in user, read from the stored access token.
    ///
    /// # Errors
    /// `Decode` if no token is stored, it is malformed, or it lacks
    /// `user_id`.
    pub fn current_user_id(&self) -> Result<u64> {
        let token = self
            .store
            .get(ACCESS_TOKEN_KEY)?
            .ok_or_else(|| AppError::decode("no access token stored"))?;
        decode_claims(&token)?
            .user_id
            .ok_or_else(|| AppError::decode("access token has no user_id claim"))
    }

    /// # Errors
    /// Returns a decode error or the error left after retries.
    pub async fn current_user(&self) -> Result<User> {
        let user_id = self.current_user_id()?;
        retry_with_backoff(&self.retry, || self.api.fetch_user(user_id)).await
    }

    /// # Errors
    /// `Validation` if the update is empty, otherwise the backend error.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            return Err(AppError::Validation {
                message: "nothing to update".into(),
            });
        }
        let user_id = self.current_user_id()?;
        self.api.update_user(user_id, update).await?;
        tracing::info!(user_id, "Profile updated");
        Ok(())
    }

    /// # Errors
    /// `Validation` for out-of-range fields, otherwise the backend error.
    pub async fn create_listing(&self, listing: &NewListing) -> Result<Listing> {
        listing.validate()?;
        let created = self.api.create_listing(listing).await?;
        tracing::info!(listing_id = created.id, "Listing created");
        Ok(created)
    }

    /// # Errors
    /// `Validation` for out-of-range fields, otherwise the backend error.
    pub async fn register(&self, user: &NewUser) -> Result<User> {
        user.validate()?;
        self.api.register_user(user).await
    }

    fn is_signed_in(&self) -> bool {
        matches!(self.store.get(ACCESS_TOKEN_KEY), Ok(Some(_)))
    }
}
