//! Domain layer - core types, errors and ports.
//!
//! This layer holds the marketplace models, session state and the traits
//! the use cases depend on, without any I/O of its own.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod session;

pub use config::{AppConfig, CursorPolicy};
pub use error::{AppError, Result};
pub use models::{
    BlockStatus, Condition, Cursor, FilterState, Listing, ListingDetail, Message, NewListing,
    NewUser, Page, ProfileUpdate, SortOption, User, MAX_MESSAGE_LEN,
};
pub use ports::{AuthApi, Clock, MarketApi, SystemClock, TokenStore};
pub use session::{
    Access, AuthState, RefreshedTokens, TokenClaims, TokenPair, ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
};
