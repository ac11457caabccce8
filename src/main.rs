//! Campus Market - browse and trade on the campus marketplace from a terminal.
//!
//! QUICK START:
//!   campus-market login sam --password ...        # Store a session
//!   campus-market listings --max-price 20 -f table # Browse
//!   campus-market listings --cursor <next-link>    # Next page
//!   campus-market show 12                          # Listing with seller
//!   campus-market watch                            # Keep the session fresh

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campus_market::application::{
    format_json, format_listing_detail, format_listing_page, format_messages, format_session,
    format_user, GuardSettings, MarketplaceService, OutputFormat, PageRequest, QueryComposer,
    RetryPolicy, SessionGuard,
};
use campus_market::cli::{Cli, Commands, ConfigAction};
use campus_market::domain::{
    AppConfig, AppError, AuthState, Clock, Cursor, FilterState, Listing, MarketApi, NewListing,
    NewUser, Page, ProfileUpdate, Result, SystemClock, TokenStore,
};
use campus_market::infrastructure::{
    ensure_config_exists, load_config, HttpApi, SqliteTokenStore,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::debug!(error = %e, "Command failed");
        eprintln!("{} {}", "Error:".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Wired-up services for one invocation.
struct App {
    guard: SessionGuard,
    composer: QueryComposer,
    market: MarketplaceService,
    format: OutputFormat,
}

impl App {
    fn build(config: &AppConfig, format: OutputFormat) -> Result<Self> {
        let store: Arc<dyn TokenStore> = Arc::new(SqliteTokenStore::open(&config.session_db_path())?);
        let api = Arc::new(HttpApi::from_config(config, Arc::clone(&store))?);
        let market_api: Arc<dyn MarketApi> = api.clone();

        tracing::debug!(base_url = %api.base_url(), "Using marketplace API");

        Ok(Self {
            guard: SessionGuard::new(Arc::clone(&store), api, GuardSettings::from_config(config)),
            composer: QueryComposer::from_config(Arc::clone(&market_api), config),
            market: MarketplaceService::new(
                market_api,
                store,
                RetryPolicy::from_config(&config.retry),
            ),
            format,
        })
    }

    /// Gate for protected commands.
    async fn require_session(&self) -> Result<()> {
        match self.guard.check_authorized().await {
            AuthState::Authorized => Ok(()),
            _ => Err(AppError::Auth {
                message: "not logged in".into(),
            }),
        }
    }
}

/// Main application logic.
async fn run(cli: Cli) -> Result<()> {
    let format = cli
        .output_format()
        .map_err(|e| AppError::Config { message: e })?;

    let mut config = load_config()?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    config.validate()?;

    if let Commands::Config { action } = &cli.command {
        return cmd_config(action, &config, format);
    }

    let app = App::build(&config, format)?;

    match cli.command {
        Commands::Login { username, password } => cmd_login(&app, &username, &password).await?,
        Commands::Logout => cmd_logout(&app)?,
        Commands::Status => cmd_status(&app).await?,
        Commands::Watch => cmd_watch(&app).await?,
        Commands::Listings {
            filters,
            author,
            cursor,
        } => {
            let filters = filters.to_filters();
            let request = match (cursor, author) {
                (Some(cursor), _) => PageRequest::Follow {
                    cursor: Cursor::new(cursor),
                    filters,
                },
                (None, Some(author_id)) => PageRequest::ByAuthor { author_id, filters },
                (None, None) => PageRequest::Fresh { filters },
            };
            cmd_listings(&app, &request).await?;
        }
        Commands::Show { id } => cmd_show(&app, id).await?,
        Commands::Save { id } => {
            app.require_session().await?;
            app.market.save_listing(id).await?;
            println!("{} Listing #{id} saved to favorites", "✓".green().bold());
        }
        Commands::Unsave { id } => {
            app.require_session().await?;
            app.market.remove_saved_listing(id).await?;
            println!("{} Listing #{id} removed from favorites", "✓".green().bold());
        }
        Commands::Saved => cmd_saved(&app).await?,
        Commands::Block { user_id } => {
            app.require_session().await?;
            let status = app.market.toggle_block(user_id).await?;
            println!("{} User #{user_id}: {status}", "✓".green().bold());
        }
        Commands::Messages => cmd_messages(&app).await?,
        Commands::Send { user_id, content } => {
            app.require_session().await?;
            app.market.send_message(user_id, &content).await?;
            println!("{} Message sent to user #{user_id}", "✓".green().bold());
        }
        Commands::Profile => cmd_profile(&app).await?,
        Commands::ProfileUpdate {
            username,
            email,
            location,
        } => {
            app.require_session().await?;
            app.market
                .update_profile(&ProfileUpdate {
                    username,
                    email,
                    location,
                })
                .await?;
            println!("{} Profile updated", "✓".green().bold());
        }
        Commands::Create {
            title,
            condition,
            price,
            description,
            tags,
        } => {
            app.require_session().await?;
            let listing = NewListing {
                title,
                condition,
                description,
                price,
                tags,
            };
            let created = app.market.create_listing(&listing).await?;
            println!(
                "{} Created listing #{} {}",
                "✓".green().bold(),
                created.id,
                created.title.cyan()
            );
        }
        Commands::Register {
            username,
            password,
            email,
            location,
        } => {
            let user = app
                .market
                .register(&NewUser {
                    username,
                    password,
                    email,
                    location,
                })
                .await?;
            println!(
                "{} Account {} created. Log in with: campus-market login {}",
                "✓".green().bold(),
                user.username.cyan(),
                user.username
            );
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn cmd_login(app: &App, username: &str, password: &str) -> Result<()> {
    app.guard.login(username, password).await?;
    println!("{} Logged in as {}", "✓".green().bold(), username.cyan());
    Ok(())
}

fn cmd_logout(app: &App) -> Result<()> {
    app.guard.logout()?;
    println!("{} Logged out", "✓".green().bold());
    Ok(())
}

/// Check the session and print its state.
async fn cmd_status(app: &App) -> Result<()> {
    app.guard.check_authorized().await;
    let snapshot = app.guard.snapshot();

    match app.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "state": snapshot.state.to_string(),
                "has_access_token": snapshot.has_access_token,
                "has_refresh_token": snapshot.has_refresh_token,
                "expires_at": snapshot.claims.as_ref().map(|c| c.exp),
                "user_id": snapshot.claims.as_ref().and_then(|c| c.user_id),
            });
            println!("{}", format_json(&value).map_err(AppError::json_parse)?);
        }
        OutputFormat::Markdown | OutputFormat::Table => {
            println!("{}", format_session(&snapshot, SystemClock.now_epoch_secs()));
        }
    }
    Ok(())
}

/// Keep the session alive until Ctrl-C.
async fn cmd_watch(app: &App) -> Result<()> {
    let mut changes = app.guard.subscribe();
    let (initial, task) = app.guard.mount().await;

    if initial != AuthState::Authorized {
        task.stop();
        return Err(AppError::Auth {
            message: "not logged in".into(),
        });
    }

    println!(
        "{} Session active. Watching for expiry (Ctrl-C to stop)...",
        "🔐".bold()
    );

    let outcome = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(|e| AppError::io("Failed to listen for Ctrl-C", e));
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *changes.borrow_and_update();
                tracing::info!(%state, "Session state changed");
                if state == AuthState::Unauthorized {
                    break Err(AppError::Auth {
                        message: "session expired".into(),
                    });
                }
            }
        }
    };

    task.stop();
    outcome?;
    println!("{} Stopped watching", "✓".green().bold());
    Ok(())
}

async fn cmd_listings(app: &App, request: &PageRequest) -> Result<()> {
    let page = app.composer.fetch(request).await?;
    print_page(&page, app.format)
}

async fn cmd_show(app: &App, id: u64) -> Result<()> {
    let detail = app.market.listing_detail(id).await?;

    let output = match app.format {
        OutputFormat::Json => format_json(&detail).map_err(AppError::json_parse)?,
        OutputFormat::Markdown | OutputFormat::Table => format_listing_detail(&detail),
    };
    println!("{output}");
    Ok(())
}

async fn cmd_saved(app: &App) -> Result<()> {
    app.require_session().await?;
    let favorites = app.market.saved_listings().await?;
    let page = Page {
        items: favorites,
        next: None,
        previous: None,
    };
    print_page(&page, app.format)
}

async fn cmd_messages(app: &App) -> Result<()> {
    app.require_session().await?;
    let messages = app.market.inbox().await?;

    let output = match app.format {
        OutputFormat::Json => format_json(&messages).map_err(AppError::json_parse)?,
        OutputFormat::Markdown | OutputFormat::Table => format_messages(&messages),
    };
    println!("{output}");
    Ok(())
}

/// Profile header plus the user's own listings.
async fn cmd_profile(app: &App) -> Result<()> {
    app.require_session().await?;
    let user = app.market.current_user().await?;
    let listings = app
        .composer
        .fetch(&PageRequest::ByAuthor {
            author_id: user.id,
            filters: FilterState::default(),
        })
        .await?;

    if matches!(app.format, OutputFormat::Json) {
        let value = serde_json::json!({ "user": user, "listings": listings });
        println!("{}", format_json(&value).map_err(AppError::json_parse)?);
        return Ok(());
    }

    println!("{}", format_user(&user));
    println!();
    print_page(&listings, app.format)
}

fn print_page(page: &Page<Listing>, format: OutputFormat) -> Result<()> {
    let output = format_listing_page(page, format).map_err(AppError::json_parse)?;
    println!("{output}");
    Ok(())
}

fn cmd_config(action: &ConfigAction, config: &AppConfig, format: OutputFormat) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = ensure_config_exists()?;
            println!("{} Configuration at {}", "✓".green().bold(), path.display());
        }
        ConfigAction::Show => {
            let output = match format {
                OutputFormat::Json => format_json(config).map_err(AppError::json_parse)?,
                OutputFormat::Markdown | OutputFormat::Table => {
                    toml::to_string_pretty(config).map_err(|e| AppError::Config {
                        message: format!("Failed to serialize config: {e}"),
                    })?
                }
            };
            println!("{output}");
        }
    }
    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
