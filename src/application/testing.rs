//! In-memory `MarketApi` used by the use-case tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    AppError, BlockStatus, Condition, Listing, MarketApi, Message, NewListing, NewUser, Page,
    ProfileUpdate, Result, User,
};

pub fn sample_listing(id: u64) -> Listing {
    Listing {
        id,
        title: format!("Listing {id}"),
        condition: Condition::Fair,
        description: String::new(),
        price: 20.0,
        image: None,
        likes: 0,
        dislikes: 0,
        tags: None,
        created_at: None,
        author_id: Some(2),
    }
}

pub fn sample_user(id: u64) -> User {
    User {
        id,
        username: format!("user{id}"),
        location: Some("North Campus".into()),
        email: None,
        image: None,
    }
}

/// Scripted marketplace backend that records the calls made to it.
#[derive(Default)]
pub struct FakeMarket {
    listing_pages: Mutex<VecDeque<Result<Page<Listing>>>>,
    urls: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    blocked: Mutex<HashMap<u64, bool>>,
    favorites: Mutex<Vec<u64>>,
    messages: Mutex<Vec<Message>>,
    transient_reads: Mutex<u32>,
}

impl FakeMarket {
    pub fn push_listings(&self, response: Result<Page<Listing>>) {
        self.listing_pages.lock().unwrap().push_back(response);
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_blocked(&self, user_id: u64, blocked: bool) {
        self.blocked.lock().unwrap().insert(user_id, blocked);
    }

    /// Fail the next `count` single-resource reads with a 503.
    pub fn fail_reads(&self, count: u32) {
        *self.transient_reads.lock().unwrap() = count;
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn read_gate(&self) -> Result<()> {
        let mut remaining = self.transient_reads.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(AppError::from_status(503, "unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketApi for FakeMarket {
    async fn fetch_listings(&self, url: &str) -> Result<Page<Listing>> {
        self.urls.lock().unwrap().push(url.to_string());
        self.listing_pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(Page {
                    items: Vec::new(),
                    next: None,
                    previous: None,
                })
            })
    }

    async fn fetch_listing(&self, listing_id: u64) -> Result<Listing> {
        self.record(format!("fetch_listing {listing_id}"));
        self.read_gate()?;
        if listing_id == 404 {
            return Err(AppError::from_status(404, "Listing with that id not found."));
        }
        Ok(sample_listing(listing_id))
    }

    async fn create_listing(&self, listing: &NewListing) -> Result<Listing> {
        self.record(format!("create_listing {}", listing.title));
        let mut created = sample_listing(100);
        created.title.clone_from(&listing.title);
        created.condition = listing.condition;
        created.price = listing.price;
        Ok(created)
    }

    async fn favorite_listing(&self, listing_id: u64) -> Result<()> {
        self.record(format!("favorite {listing_id}"));
        let mut favorites = self.favorites.lock().unwrap();
        if favorites.contains(&listing_id) {
            return Err(AppError::from_status(409, "Listing already favorited."));
        }
        favorites.push(listing_id);
        Ok(())
    }

    async fn remove_favorite_listing(&self, listing_id: u64) -> Result<()> {
        self.record(format!("unfavorite {listing_id}"));
        self.favorites.lock().unwrap().retain(|id| *id != listing_id);
        Ok(())
    }

    async fn list_favorites(&self) -> Result<Vec<Listing>> {
        self.record("list_favorites".into());
        self.read_gate()?;
        Ok(self
            .favorites
            .lock()
            .unwrap()
            .iter()
            .map(|id| sample_listing(*id))
            .collect())
    }

    async fn fetch_user(&self, user_id: u64) -> Result<User> {
        self.record(format!("fetch_user {user_id}"));
        self.read_gate()?;
        Ok(sample_user(user_id))
    }

    async fn register_user(&self, user: &NewUser) -> Result<User> {
        self.record(format!("register {}", user.username));
        let mut created = sample_user(50);
        created.username.clone_from(&user.username);
        Ok(created)
    }

    async fn update_user(&self, user_id: u64, _update: &ProfileUpdate) -> Result<()> {
        self.record(format!("update_user {user_id}"));
        Ok(())
    }

    async fn block_user(&self, user_id: u64) -> Result<()> {
        self.record(format!("block {user_id}"));
        self.set_blocked(user_id, true);
        Ok(())
    }

    async fn unblock_user(&self, user_id: u64) -> Result<()> {
        self.record(format!("unblock {user_id}"));
        self.set_blocked(user_id, false);
        Ok(())
    }

    async fn block_status(&self, user_id: u64) -> Result<BlockStatus> {
        self.record(format!("block_status {user_id}"));
        self.read_gate()?;
        let blocked = self
            .blocked
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(false);
        Ok(if blocked {
            BlockStatus::Blocked
        } else {
            BlockStatus::NotBlocked
        })
    }

    async fn list_messages(&self) -> Result<Vec<Message>> {
        self.record("list_messages".into());
        self.read_gate()?;
        Ok(self.messages.lock().unwrap().clone())
    }

    async fn send_message(&self, receiver_id: u64, content: &str) -> Result<()> {
        self.record(format!("send_message {receiver_id}"));
        let mut messages = self.messages.lock().unwrap();
        let id = u64::try_from(messages.len()).unwrap() + 1;
        messages.push(Message {
            id,
            sender: 3,
            receiver: receiver_id,
            content: content.to_string(),
        });
        Ok(())
    }
}
