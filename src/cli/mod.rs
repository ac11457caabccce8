//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;
use crate::domain::{Condition, FilterState, SortOption};

/// Campus Market - browse and trade on the campus marketplace from a terminal.
///
/// Quick start: campus-market login <name> | listings --max-price 20 | show <id>
#[derive(Parser, Debug)]
#[command(name = "campus-market")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: markdown, json, or table.
    #[arg(short, long, default_value = "markdown", global = true)]
    pub format: String,

    /// Marketplace API base URL (overrides the config file).
    #[arg(long, env = "CAMPUS_MARKET_API_URL", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session tokens.
    Login {
        username: String,

        /// Account password.
        #[arg(long, env = "CAMPUS_MARKET_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session.
    Logout,

    /// Check the stored session, refreshing it if expired.
    Status,

    /// Keep the session fresh in the foreground until Ctrl-C.
    Watch,

    /// Browse listings with optional filters.
    Listings {
        #[command(flatten)]
        filters: FilterArgs,

        /// Only listings by this seller.
        #[arg(long)]
        author: Option<u64>,

        /// Follow a next/previous link printed by an earlier page.
        #[arg(long, conflicts_with = "author")]
        cursor: Option<String>,
    },

    /// Show a listing with its seller.
    Show {
        /// Listing ID.
        id: u64,
    },

    /// Add a listing to your favorites.
    Save { id: u64 },

    /// Remove a listing from your favorites.
    Unsave { id: u64 },

    /// List your favorite listings.
    Saved,

    /// Block a user, or unblock them if already blocked.
    Block { user_id: u64 },

    /// Show your inbox.
    Messages,

    /// Send a direct message.
    Send {
        user_id: u64,

        /// Message text (at most 200 characters).
        content: String,
    },

    /// Show your profile and your listings.
    Profile,

    /// Update your profile.
    ProfileUpdate {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        location: Option<String>,
    },

    /// Post a new listing.
    Create {
        #[arg(long)]
        title: String,

        /// Factory New, Minimal Wear, Fair, Well Worn, or Refurbished.
        #[arg(long)]
        condition: Condition,

        #[arg(long)]
        price: f64,

        #[arg(long, default_value = "")]
        description: String,

        /// Comma-separated tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Create an account.
    Register {
        username: String,

        #[arg(long, env = "CAMPUS_MARKET_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        location: Option<String>,
    },

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Listing filter flags.
#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Search titles and descriptions.
    #[arg(short, long)]
    pub search: Option<String>,

    #[arg(long)]
    pub min_price: Option<f64>,

    #[arg(long)]
    pub max_price: Option<f64>,

    /// Factory New, Minimal Wear, Fair, Well Worn, or Refurbished.
    #[arg(long)]
    pub condition: Option<Condition>,

    /// price, -price, title, -title, -likes, dislikes, -created_at, created_at.
    #[arg(long, allow_hyphen_values = true)]
    pub sort: Option<SortOption>,
}

impl FilterArgs {
    /// Convert the flags into filter state.
    #[must_use]
    pub fn to_filters(&self) -> FilterState {
        FilterState {
            search_term: self.search.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            condition: self.condition,
            sort_option: self.sort,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration file if none exists.
    Init,
    /// Print the effective configuration.
    Show,
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}
