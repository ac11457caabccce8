//! Output formatting for marketplace data.
//!
//! Supports multiple output formats: Markdown, JSON, and table view.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{AuthState, Listing, ListingDetail, Message, Page, User};

use super::session_guard::SessionSnapshot;

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable Markdown format.
    #[default]
    Markdown,
    /// JSON format for programmatic use.
    Json,
    /// Compact table listing.
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => Err(format!("Unknown format: {s}. Use: markdown, json, table")),
        }
    }
}

/// Formats any serializable value as pretty JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Formats a page of listings, followed by the pagination cursors.
pub fn format_listing_page(page: &Page<Listing>, format: OutputFormat) -> Result<String, serde_json::Error> {
    let body = match format {
        OutputFormat::Json => return format_json(page),
        OutputFormat::Table => format_listings_table(&page.items),
        OutputFormat::Markdown => format_listings_markdown(&page.items),
    };

    let mut out = body;
    if let Some(previous) = &page.previous {
        out.push_str(&format!("\n{} {}", "◀ Previous:".dimmed(), previous));
    }
    if let Some(next) = &page.next {
        out.push_str(&format!("\n{} {}", "▶ Next:".dimmed(), next));
    }
    Ok(out)
}

/// Formats listings as a compact table.
pub fn format_listings_table(listings: &[Listing]) -> String {
    if listings.is_empty() {
        return "No Listings found.".to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Title", "Price", "Condition", "Likes", "Posted"]);

    for listing in listings {
        let posted = listing.created_at.map_or_else(
            || "-".to_string(),
            |dt| dt.format("%Y-%m-%d").to_string(),
        );

        table.add_row(vec![
            listing.id.to_string(),
            truncate(&listing.title, 35),
            format_price(listing.price),
            listing.condition.to_string(),
            listing.likes.to_string(),
            posted,
        ]);
    }

    table.to_string()
}

/// Formats listings as a Markdown list.
pub fn format_listings_markdown(listings: &[Listing]) -> String {
    if listings.is_empty() {
        return "No Listings found.".to_string();
    }

    let mut out = String::new();
    for listing in listings {
        out.push_str(&format!(
            "- **{}** (#{}) {} · {}\n",
            listing.title,
            listing.id,
            format_price(listing.price),
            listing.condition
        ));
    }
    out
}

/// Formats the single-listing page.
pub fn format_listing_detail(detail: &ListingDetail) -> String {
    let listing = &detail.listing;
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", listing.title));
    out.push_str(&format!("**Price:** {}\n", format_price(listing.price)));
    out.push_str(&format!("**Condition:** {}\n", listing.condition));
    out.push_str(&format!(
        "**Likes:** {} / **Dislikes:** {}\n",
        listing.likes, listing.dislikes
    ));

    if let Some(dt) = listing.created_at {
        out.push_str(&format!("**Posted:** {}\n", dt.format("%Y-%m-%d %H:%M UTC")));
    }

    if let Some(tags) = listing.tags.as_ref().filter(|t| !t.is_empty()) {
        out.push_str(&format!("**Tags:** {}\n", tags.join(", ")));
    }

    if !listing.description.is_empty() {
        out.push_str(&format!("\n{}\n", listing.description));
    }

    out.push_str("\n## About the Seller\n\n");
    match &detail.author {
        Some(author) => {
            out.push_str(&format!("**Name:** {}\n", author.username));
            out.push_str(&format!(
                "**Location:** {}\n",
                author.location.as_deref().filter(|l| !l.is_empty()).unwrap_or("Not given")
            ));
            if let Some(status) = detail.block_status {
                out.push_str(&format!("**Status:** {status}\n"));
            }
        }
        None => out.push_str("Author details not available.\n"),
    }

    out
}

/// Formats the inbox.
pub fn format_messages(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "Inbox is empty.".to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "From", "To", "Message"]);

    for message in messages {
        table.add_row(vec![
            message.id.to_string(),
            message.sender.to_string(),
            message.receiver.to_string(),
            truncate(&message.content, 60),
        ]);
    }

    table.to_string()
}

/// Formats a user profile header.
pub fn format_user(user: &User) -> String {
    format!(
        "{}\n  Username: {}\n  Email: {}\n  Location: {}",
        "👤 Profile".bold(),
        user.username.cyan(),
        user.email.as_deref().unwrap_or("-"),
        user.location.as_deref().filter(|l| !l.is_empty()).unwrap_or("Not given"),
    )
}

/// Formats session status for display.
pub fn format_session(snapshot: &SessionSnapshot, now_epoch_secs: i64) -> String {
    let state = match snapshot.state {
        AuthState::Authorized => "authorized".green(),
        AuthState::Unauthorized => "not logged in".red(),
        AuthState::Unknown => "unknown".yellow(),
    };

    let expiry = snapshot.claims.as_ref().map_or_else(
        || "-".to_string(),
        |claims| {
            let remaining = claims.remaining_secs(now_epoch_secs);
            if remaining < 0 {
                format!("expired {}s ago", -remaining)
            } else {
                format!("in {remaining}s")
            }
        },
    );

    format!(
        "{}\n  State: {}\n  Access token: {}\n  Refresh token: {}\n  Access expires: {}",
        "🔐 Session".bold(),
        state,
        yes_no(snapshot.has_access_token),
        yes_no(snapshot.has_refresh_token),
        expiry
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "stored"
    } else {
        "none"
    }
}

/// Formats a price without a trailing `.0` for whole amounts.
fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("${price:.0}")
    } else {
        format!("${price:.2}")
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{cut}...")
    }
}
