//! Application layer - use cases and orchestration.
//!
//! This layer contains the session guard, listing query composition, the
//! retry wrapper and the marketplace use cases built on top of them.

pub mod formatter;
pub mod marketplace;
pub mod query;
pub mod retry;
pub mod session_guard;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use formatter::{
    format_json, format_listing_detail, format_listing_page, format_messages, format_session,
    format_user, OutputFormat,
};
pub use marketplace::MarketplaceService;
pub use query::{build_query, PageRequest, QueryComposer, LISTINGS_PATH};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use session_guard::{GuardSettings, RefreshTask, SessionGuard, SessionSnapshot};
pub use token::decode_claims;
