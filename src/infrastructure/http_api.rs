//! HTTP adapter for the marketplace backend.
//!
//! One `reqwest::Client` serves both the token endpoints and the resource
//! endpoints. Requests to the configured API origin carry the stored access
//! token as a bearer credential when one exists; other hosts never see it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::domain::{
    AppConfig, AppError, AuthApi, BlockStatus, Cursor, Listing, MarketApi, Message, NewListing,
    NewUser, Page, ProfileUpdate, RefreshedTokens, Result, TokenPair, TokenStore, User,
    ACCESS_TOKEN_KEY,
};

const TOKEN_PATH: &str = "/api/token/";
const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";

/// `{results, links: {next, previous}}` listing envelope.
#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    results: Vec<Listing>,
    #[serde(default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    previous: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FavoritesEnvelope {
    favorites: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct DetailBody {
    detail: String,
}

/// Marketplace backend over HTTP.
pub struct HttpApi {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
}

impl HttpApi {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// Returns `AppError::Config` if the URL is invalid or the client cannot
    /// be built.
    pub fn new(base_url: &str, timeout: Duration, store: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AppError::Config {
            message: format!("Invalid API base URL {base_url:?}: {e}"),
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    /// # Errors
    /// See [`HttpApi::new`].
    pub fn from_config(config: &AppConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        Self::new(&config.api.base_url, config.request_timeout(), store)
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URLs (server-issued cursors) are used as given; anything else
    /// is joined onto the base URL.
    fn resolve(&self, target: &str) -> Result<Url> {
        Url::parse(target)
            .or_else(|_| self.base_url.join(target))
            .map_err(|e| AppError::Validation {
                message: format!("Invalid request URL {target:?}: {e}"),
            })
    }

    /// Build a request; the access token is only attached when `target`
    /// resolves to the configured API origin.
    fn request(&self, method: Method, target: &str) -> Result<RequestBuilder> {
        let url = self.resolve(target)?;
        if url.origin() != self.base_url.origin() {
            tracing::warn!(url = %url, "Request leaves the API origin, sending without credentials");
            return Ok(self.http.request(method, url));
        }
        let builder = self.http.request(method, url);
        Ok(match self.store.get(ACCESS_TOKEN_KEY)? {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| AppError::TransientNetwork {
            message: e.to_string(),
            source: Some(e),
        })?;
        Self::ensure_success(response).await
    }

    /// Checks HTTP response status; returns the response on success or a
    /// `Client`/`Server` error carrying the backend's explanation.
    async fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        tracing::debug!(status = status.as_u16(), %detail, "Request failed");
        Err(AppError::from_status(status.as_u16(), detail))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.text().await.map_err(|e| AppError::TransientNetwork {
            message: format!("Failed to read response body: {e}"),
            source: Some(e),
        })?;
        serde_json::from_str(&body).map_err(AppError::json_parse)
    }

    async fn get_json<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        let response = Self::send(self.request(Method::GET, target)?).await?;
        Self::read_json(response).await
    }

    async fn post_empty(&self, target: &str) -> Result<()> {
        Self::send(self.request(Method::POST, target)?).await?;
        Ok(())
    }
}

/// Pull `detail` or `error` out of a JSON error body, else the raw text.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn obtain_tokens(&self, username: &str, password: &str) -> Result<TokenPair> {
        let builder = self
            .http
            .post(self.resolve(TOKEN_PATH)?)
            .json(&json!({ "username": username, "password": password }));
        let response = Self::send(builder).await?;
        Self::read_json(response).await
    }

    async fn refresh_access(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        let builder = self
            .http
            .post(self.resolve(TOKEN_REFRESH_PATH)?)
            .json(&json!({ "refresh": refresh_token }));
        let response = Self::send(builder).await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl MarketApi for HttpApi {
    async fn fetch_listings(&self, url: &str) -> Result<Page<Listing>> {
        let envelope: ListingEnvelope = self.get_json(url).await?;
        Ok(Page {
            items: envelope.results,
            next: envelope.links.next.map(Cursor::new),
            previous: envelope.links.previous.map(Cursor::new),
        })
    }

    async fn fetch_listing(&self, listing_id: u64) -> Result<Listing> {
        self.get_json(&format!("/api/listings/{listing_id}/")).await
    }

    async fn create_listing(&self, listing: &NewListing) -> Result<Listing> {
        let builder = self.request(Method::POST, "/api/listings/")?.json(listing);
        Self::read_json(Self::send(builder).await?).await
    }

    async fn favorite_listing(&self, listing_id: u64) -> Result<()> {
        self.post_empty(&format!("/api/listings/{listing_id}/favorite_listing/"))
            .await
    }

    async fn remove_favorite_listing(&self, listing_id: u64) -> Result<()> {
        let target = format!("/api/listings/{listing_id}/remove_favorite_listing/");
        Self::send(self.request(Method::DELETE, &target)?).await?;
        Ok(())
    }

    async fn list_favorites(&self) -> Result<Vec<Listing>> {
        let envelope: FavoritesEnvelope = self
            .get_json("/api/listings/list_favorite_listings/")
            .await?;
        Ok(envelope.favorites)
    }

    async fn fetch_user(&self, user_id: u64) -> Result<User> {
        self.get_json(&format!("/api/users/{user_id}/")).await
    }

    async fn register_user(&self, user: &NewUser) -> Result<User> {
        let builder = self.request(Method::POST, "/api/users/")?.json(user);
        Self::read_json(Self::send(builder).await?).await
    }

    async fn update_user(&self, user_id: u64, update: &ProfileUpdate) -> Result<()> {
        let target = format!("/api/users/{user_id}/");
        Self::send(self.request(Method::PATCH, &target)?.json(update)).await?;
        Ok(())
    }

    async fn block_user(&self, user_id: u64) -> Result<()> {
        self.post_empty(&format!("/api/users/{user_id}/block_user/"))
            .await
    }

    async fn unblock_user(&self, user_id: u64) -> Result<()> {
        self.post_empty(&format!("/api/users/{user_id}/unblock_user/"))
            .await
    }

    async fn block_status(&self, user_id: u64) -> Result<BlockStatus> {
        let body: DetailBody = self
            .get_json(&format!("/api/users/{user_id}/is_user_blocked/"))
            .await?;
        BlockStatus::from_detail(&body.detail)
    }

    async fn list_messages(&self) -> Result<Vec<Message>> {
        self.get_json("/api/messages/").await
    }

    async fn send_message(&self, receiver_id: u64, content: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, "/api/messages/")?
            .json(&json!({ "receiver_id": receiver_id, "content": content }));
        Self::send(builder).await?;
        Ok(())
    }
}
