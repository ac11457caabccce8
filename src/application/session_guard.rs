//! Session guard: access-token validity, refresh and background upkeep.
//!
//! The guard resolves every auth-path failure into an [`AuthState`]; nothing
//! here returns an error to the code deciding whether to show protected
//! content. Refreshes are single-flight: concurrent callers share the one
//! outstanding request and observe its result.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::{
    Access, AppConfig, AppError, AuthApi, AuthState, Clock, Result, SystemClock, TokenClaims,
    TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};

use super::retry::{retry_with_backoff, RetryPolicy};
use super::token::decode_claims;

/// Floor for the background check period.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

type InFlightRefresh = Shared<BoxFuture<'static, AuthState>>;

/// Timing and retry settings for a [`SessionGuard`].
#[derive(Debug, Clone, Copy)]
pub struct GuardSettings {
    /// Period of the background check.
    pub check_interval: Duration,
    /// Refresh when less than this much validity remains.
    pub refresh_threshold: Duration,
    /// Retry policy for the refresh call.
    pub retry: RetryPolicy,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            refresh_threshold: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl GuardSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            check_interval: config.check_interval(),
            refresh_threshold: Duration::from_secs(config.session.refresh_threshold_secs),
            retry: RetryPolicy::from_config(&config.retry),
        }
    }
}

/// Point-in-time view of the stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
    /// Decoded access token claims; `None` if absent or malformed.
    pub claims: Option<TokenClaims>,
    pub state: AuthState,
}

/// Gate for protected operations. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

struct GuardInner {
    store: Arc<dyn TokenStore>,
    auth: Arc<dyn AuthApi>,
    clock: Arc<dyn Clock>,
    settings: GuardSettings,
    state: watch::Sender<AuthState>,
    in_flight: Mutex<Option<InFlightRefresh>>,
}

impl SessionGuard {
    /// Create a guard using the system clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn TokenStore>,
        auth: Arc<dyn AuthApi>,
        settings: GuardSettings,
    ) -> Self {
        Self::with_clock(store, auth, settings, Arc::new(SystemClock))
    }

    /// Create a guard with an explicit clock.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn TokenStore>,
        auth: Arc<dyn AuthApi>,
        settings: GuardSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        Self {
            inner: Arc::new(GuardInner {
                store,
                auth,
                clock,
                settings,
                state,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Current authorization state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        *self.inner.state.borrow()
    }

    /// Gate decision for the current state.
    #[must_use]
    pub fn access(&self) -> Access {
        self.state().access()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Check the stored access token, refreshing it once if expired.
    pub async fn check_authorized(&self) -> AuthState {
        let token = match self.inner.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("No access token stored");
                return self.inner.resolve(AuthState::Unauthorized);
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read access token");
                return self.inner.resolve(AuthState::Unauthorized);
            }
        };

        match decode_claims(&token) {
            Err(err) => {
                tracing::warn!(error = %err, "Stored access token is malformed");
                self.inner.resolve(AuthState::Unauthorized)
            }
            Ok(claims) if claims.is_expired(self.inner.clock.now_epoch_secs()) => {
                tracing::info!("Access token expired, refreshing");
                self.refresh().await
            }
            Ok(_) => self.inner.resolve(AuthState::Authorized),
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// If a refresh is already running, waits for it instead of issuing a
    /// second request. Stored tokens are never cleared here.
    pub async fn refresh(&self) -> AuthState {
        let refresh = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = slot.as_ref() {
                tracing::debug!("Joining in-flight token refresh");
                existing.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let fresh = async move { inner.perform_refresh().await }.boxed().shared();
                *slot = Some(fresh.clone());
                fresh
            }
        };

        let state = refresh.clone().await;

        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
            *slot = None;
        }
        state
    }

    /// Log in with credentials and store the issued tokens.
    ///
    /// # Errors
    /// Returns `AppError::Auth` for rejected credentials, or the underlying
    /// network/storage error.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let tokens = self
            .inner
            .auth
            .obtain_tokens(username, password)
            .await
            .map_err(|err| match err {
                AppError::Client {
                    status: 400 | 401, ..
                } => AppError::Auth {
                    message: "invalid username or password".into(),
                },
                other => other,
            })?;

        decode_claims(&tokens.access)?;
        self.inner.store.set(ACCESS_TOKEN_KEY, &tokens.access)?;
        self.inner.store.set(REFRESH_TOKEN_KEY, &tokens.refresh)?;
        self.inner.resolve(AuthState::Authorized);

        tracing::info!(username, "Logged in");
        Ok(())
    }

    /// Clear every stored token.
    ///
    /// # Errors
    /// Returns error if the token store cannot be cleared.
    pub fn logout(&self) -> Result<()> {
        self.inner.store.clear()?;
        self.inner.resolve(AuthState::Unauthorized);
        tracing::info!("Logged out");
        Ok(())
    }

    /// Describe the stored session without touching the network.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let access = self.inner.store.get(ACCESS_TOKEN_KEY).ok().flatten();
        let has_refresh_token = matches!(self.inner.store.get(REFRESH_TOKEN_KEY), Ok(Some(_)));
        SessionSnapshot {
            has_access_token: access.is_some(),
            has_refresh_token,
            claims: access.as_deref().and_then(|token| decode_claims(token).ok()),
            state: self.state(),
        }
    }

    /// Start the periodic background check.
    ///
    /// The first check runs one interval after the call. The returned task
    /// must be kept alive for as long as the session should be maintained;
    /// dropping it stops the timer.
    #[must_use]
    pub fn start(&self) -> RefreshTask {
        let guard = self.clone();
        // `interval_at` panics on a zero period.
        let period = self.inner.settings.check_interval.max(MIN_CHECK_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                guard.on_tick().await;
            }
        });
        tracing::debug!(interval_ms = period.as_millis(), "Session upkeep started");
        RefreshTask { handle }
    }

    /// Start upkeep, then resolve the initial check.
    ///
    /// The task is created before the check so it is released on every exit
    /// path, including cancellation of this future.
    pub async fn mount(&self) -> (AuthState, RefreshTask) {
        let task = self.start();
        let state = self.check_authorized().await;
        (state, task)
    }

    async fn on_tick(&self) {
        if self.state() == AuthState::Unauthorized {
            return;
        }

        let token = match self.inner.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read access token");
                return;
            }
        };

        match decode_claims(&token) {
            Ok(claims) => {
                let remaining = claims.remaining_secs(self.inner.clock.now_epoch_secs());
                let threshold =
                    i64::try_from(self.inner.settings.refresh_threshold.as_secs()).unwrap_or(i64::MAX);
                if remaining < threshold {
                    tracing::debug!(remaining_secs = remaining, "Refreshing access token ahead of expiry");
                    self.refresh().await;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Stored access token is malformed");
                self.inner.resolve(AuthState::Unauthorized);
            }
        }
    }
}

impl GuardInner {
    fn resolve(&self, state: AuthState) -> AuthState {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Session state changed");
        }
        state
    }

    async fn perform_refresh(&self) -> AuthState {
        match self.try_refresh().await {
            Ok(()) => self.resolve(AuthState::Authorized),
            Err(err) => {
                tracing::warn!(error = %err, "Token refresh failed");
                self.resolve(AuthState::Unauthorized)
            }
        }
    }

    async fn try_refresh(&self) -> Result<()> {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)?
            .ok_or_else(|| AppError::Auth {
                message: "no refresh token stored".into(),
            })?;

        let tokens = retry_with_backoff(&self.settings.retry, || {
            self.auth.refresh_access(&refresh_token)
        })
        .await?;

        decode_claims(&tokens.access)?;
        self.store.set(ACCESS_TOKEN_KEY, &tokens.access)?;
        if let Some(rotated) = tokens.refresh.as_deref() {
            self.store.set(REFRESH_TOKEN_KEY, rotated)?;
        }

        tracing::info!("Access token refreshed");
        Ok(())
    }
}

/// Handle to the background check started by [`SessionGuard::start`].
///
/// Dropping the handle cancels the timer.
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Cancel the background check.
    pub fn stop(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("Session upkeep stopped");
    }
}
