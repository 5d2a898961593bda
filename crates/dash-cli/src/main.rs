//! Command-line front-end for stockdash
//!
//! # Usage
//!
//! ```bash
//! # Point at the backend (or set DASH_API_BASE_URL)
//! stockdash --api-url http://localhost:8000/api login --email me@example.com --password '...'
//!
//! stockdash show AAPL --timeframe 1M
//! stockdash watch add NVDA
//! stockdash chat send "How did semis do this week?" --symbol NVDA --symbol AMD
//! ```

mod output;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dash_api::{ApiConfig, NewsApi, ProfileUpdate};
use dash_app::{
    AuthStatus, Dashboard, DashboardConfig, FetchOutcome, RegistrationForm, Timeframe,
};
use dash_core::{FileStore, Notice, NoticeLevel, NoticeSink, Route, RouteTracker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "stockdash")]
#[command(about = "Stock dashboard in the terminal", long_about = None)]
struct Cli {
    /// Backend base URL (default: $DASH_API_BASE_URL or http://localhost:8000/api)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// File keeping the session token and preferences (default: ~/.stockdash/state.json)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Write logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and keep the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the session token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Create an account
    Register(RegisterArgs),
    /// Request a password reset link
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Change profile fields
    UpdateProfile(ProfileArgs),
    /// Quote, price history, fundamentals, and news for a symbol
    Show {
        /// Symbol to show (default: $DASH_DEFAULT_SYMBOL or IBM)
        symbol: Option<String>,
        /// One of 1D, 1W, 1M, 3M, 1Y, ALL
        #[arg(short, long, default_value = "1D")]
        timeframe: Timeframe,
        /// Number of price points to print
        #[arg(long, default_value_t = 10)]
        points: usize,
    },
    /// Find symbols by name or ticker
    Search { query: String },
    /// List popular symbols
    Popular,
    /// Manage the watchlist
    #[command(subcommand)]
    Watch(WatchCommand),
    /// Browse news
    News(NewsArgs),
    /// Talk to the financial assistant
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Toggle the dark-mode preference
    DarkMode,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    /// Defaults to --password
    #[arg(long)]
    confirm_password: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    /// Accept the terms and conditions
    #[arg(long)]
    agree_terms: bool,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum WatchCommand {
    /// Show the watchlist with quotes
    List,
    Add { symbol: String },
    Remove { symbol: String },
}

#[derive(Args, Debug)]
struct NewsArgs {
    /// Articles about one symbol
    #[arg(long, conflicts_with_all = ["query", "trending", "id"])]
    symbol: Option<String>,
    /// Full-text search
    #[arg(long, conflicts_with_all = ["trending", "id"])]
    query: Option<String>,
    /// Trending articles
    #[arg(long, conflicts_with = "id")]
    trending: bool,
    /// Show one article
    #[arg(long)]
    id: Option<String>,
    #[arg(long, default_value_t = 10)]
    limit: u32,
    #[arg(long, default_value_t = 0)]
    offset: u32,
}

#[derive(Subcommand, Debug)]
enum ChatCommand {
    /// Send a message, continuing a session if one is given
    Send {
        message: String,
        #[arg(long)]
        session: Option<String>,
        /// Attach up to three symbols as context
        #[arg(long = "symbol")]
        symbols: Vec<String>,
    },
    /// List sessions
    Sessions,
    /// Print a session's transcript
    History { session: String },
    /// Start a new session
    New {
        #[arg(long)]
        title: Option<String>,
    },
    Rename { session: String, title: String },
    Delete { session: String },
}

/// Prints notices for the user on stderr
struct ConsoleNotices;

impl NoticeSink for ConsoleNotices {
    fn notify(&self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{tag}] {}", notice.message);
    }
}

fn state_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.state_file {
        Some(path) => Ok(path.clone()),
        None => dirs::home_dir()
            .map(|home| home.join(".stockdash").join("state.json"))
            .context("Could not determine the home directory; pass --state-file"),
    }
}

fn build_dashboard(cli: &Cli, default_symbol: Option<&str>) -> Result<Dashboard> {
    let path = state_path(cli)?;
    let store = FileStore::open(&path)
        .with_context(|| format!("Failed to open state file {}", path.display()))?;

    let mut api = ApiConfig::builder();
    if let Some(url) = &cli.api_url {
        api = api.base_url(url);
    }

    let mut config = DashboardConfig::builder();
    if let Some(symbol) = default_symbol {
        config = config.default_symbol(symbol);
    }

    let dashboard = Dashboard::builder()
        .api_config(api.with_env().build()?)
        .config(config.with_env().build()?)
        .store(Arc::new(store))
        .navigator(Arc::new(RouteTracker::new(Route::Dashboard)))
        .notices(Arc::new(ConsoleNotices))
        .build()?;
    Ok(dashboard)
}

/// Resolve the stored session; commands that need a user call this first
async fn require_login(dashboard: &Dashboard) -> Result<()> {
    match dashboard.auth().check_auth().await {
        AuthStatus::Authenticated(user) => {
            debug!(user = %user.username, "Session active");
            Ok(())
        }
        _ => bail!("Not logged in; run `stockdash login` first"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let default_symbol = match &cli.command {
        Command::Show { symbol, .. } => symbol.clone(),
        _ => None,
    };
    let dashboard = build_dashboard(&cli, default_symbol.as_deref())?;

    match cli.command {
        Command::Login { email, password } => {
            let user = dashboard.auth().login(&email, &password).await?;
            println!("Logged in as {} <{}>", user.username, user.email);
        }
        Command::Logout => dashboard.auth().logout(),
        Command::Whoami => match dashboard.auth().check_auth().await {
            AuthStatus::Authenticated(user) => println!("{}", output::user(&user)),
            _ => println!("Not logged in"),
        }
        Command::Register(args) => {
            let form = RegistrationForm {
                confirm_password: args.confirm_password.unwrap_or_else(|| args.password.clone()),
                username: args.username,
                email: args.email,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
                agree_to_terms: args.agree_terms,
            };
            let user = dashboard.auth().register(&form).await?;
            println!("Registered {}", user.username);
        }
        Command::ResetPassword { email } => {
            dashboard.auth().request_password_reset(&email).await?;
        }
        Command::UpdateProfile(args) => {
            require_login(&dashboard).await?;
            let update = ProfileUpdate {
                email: args.email,
                username: args.username,
                first_name: args.first_name,
                last_name: args.last_name,
                password: args.password,
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let user = dashboard.auth().update_profile(&update).await?;
            println!("{}", output::user(&user));
        }
        Command::Show { timeframe, points, .. } => {
            dashboard.auth().check_auth().await;
            let stocks = dashboard.stocks();
            stocks.load_watchlist().await;
            if stocks.set_timeframe(timeframe).await? == FetchOutcome::Unchanged {
                stocks.fetch_all().await?;
            }

            let snapshot = stocks.state().snapshot.context("No stock data")?;
            println!("{}", output::snapshot(&snapshot, &stocks.chart_series(), points));
            if stocks.is_in_watchlist(&snapshot.symbol) {
                println!("\n{} is on your watchlist", snapshot.symbol);
            }
        }
        Command::Search { query } => {
            let results = dashboard.stocks().search_stocks(&query).await;
            if results.is_empty() {
                println!("No symbols match '{query}'");
            } else {
                println!("{}", output::symbols(&results));
            }
        }
        Command::Popular => {
            let stocks = dashboard.stocks();
            let symbols = stocks.load_popular_symbols().await;
            let quotes = stocks.popular_quotes().await;
            if quotes.is_empty() {
                println!("{}", output::symbols(&symbols));
            } else {
                println!("{}", output::quotes(&quotes));
            }
        }
        Command::Watch(command) => watch(&dashboard, command).await?,
        Command::News(args) => news(&dashboard, args).await?,
        Command::Chat(command) => chat(&dashboard, command).await?,
        Command::DarkMode => {
            let enabled = dashboard.stocks().toggle_dark_mode()?;
            println!("Dark mode {}", if enabled { "on" } else { "off" });
        }
    }

    Ok(())
}

async fn watch(dashboard: &Dashboard, command: WatchCommand) -> Result<()> {
    require_login(dashboard).await?;
    let stocks = dashboard.stocks();
    stocks.load_watchlist().await;

    match command {
        WatchCommand::List => {
            let quotes = stocks.watchlist_quotes().await;
            if !quotes.is_empty() {
                println!("{}", output::quotes(&quotes));
            } else if stocks.state().watchlist.is_empty() {
                println!("Your watchlist is empty");
            } else {
                for symbol in stocks.state().watchlist {
                    println!("{symbol}");
                }
            }
        }
        WatchCommand::Add { symbol } => {
            if stocks.is_in_watchlist(&symbol) {
                println!("{} is already on your watchlist", symbol.to_uppercase());
            } else {
                stocks.add_to_watchlist(&symbol).await?;
            }
        }
        WatchCommand::Remove { symbol } => stocks.remove_from_watchlist(&symbol).await?,
    }
    Ok(())
}

async fn news(dashboard: &Dashboard, args: NewsArgs) -> Result<()> {
    let client = dashboard.client();

    if let Some(id) = args.id {
        let article = client.article(&id).await?;
        println!("{}", output::article(&article));
        return Ok(());
    }

    let articles = if args.trending {
        dashboard.stocks().load_trending_news().await
    } else if let Some(query) = args.query {
        NewsApi::search(client, &query, args.limit).await?
    } else if let Some(symbol) = args.symbol {
        client.by_symbol(&symbol.to_uppercase(), args.limit).await?
    } else {
        client.latest(args.limit, args.offset).await?
    };

    if articles.is_empty() {
        println!("No articles");
    } else {
        println!("{}", output::news(&articles));
    }
    Ok(())
}

async fn chat(dashboard: &Dashboard, command: ChatCommand) -> Result<()> {
    let chat = dashboard.chat();

    match command {
        ChatCommand::Send {
            message,
            session,
            symbols,
        } => {
            dashboard.auth().check_auth().await;
            if let Some(id) = session {
                chat.switch_session(&id).await?;
            }
            for symbol in &symbols {
                if !chat.attach_context_symbol(symbol) {
                    bail!("At most 3 symbols can be attached to a message");
                }
            }

            let Some(reply) = chat.send_message(&message).await else {
                bail!("Message is empty");
            };
            println!("{}", output::message(&reply));
            if reply.is_error {
                bail!("The assistant could not answer");
            }
            if let Some(id) = chat.active().id() {
                info!(session = %id, "Chat session");
                println!("(session {id})");
            }
        }
        ChatCommand::Sessions => {
            require_login(dashboard).await?;
            let sessions = chat.list_sessions().await;
            if sessions.is_empty() {
                println!("No conversations yet");
            } else {
                println!("{}", output::sessions(&sessions, &chat.active()));
            }
        }
        ChatCommand::History { session } => {
            require_login(dashboard).await?;
            chat.switch_session(&session).await?;
            for message in chat.state().messages {
                println!("{}", output::message(&message));
            }
        }
        ChatCommand::New { title } => {
            dashboard.auth().check_auth().await;
            match chat.create_session(title.as_deref()).await? {
                dash_app::ActiveSession::Persisted(id) => println!("Started session {id}"),
                dash_app::ActiveSession::Draft => println!("Started a draft conversation"),
            }
        }
        ChatCommand::Rename { session, title } => {
            require_login(dashboard).await?;
            chat.list_sessions().await;
            let renamed = chat.rename_session(&session, &title).await?;
            println!("Renamed {} to '{}'", renamed.id, renamed.title);
        }
        ChatCommand::Delete { session } => {
            require_login(dashboard).await?;
            chat.delete_session(&session).await?;
            println!("Deleted {session}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app = dash_utils::Config::from_env();
    if cli.json_logs {
        dash_utils::init_json_tracing();
    } else if app.is_production() {
        dash_utils::init_tracing_with("warn");
    } else {
        dash_utils::init_tracing_with("warn,dash_app=info");
    }
    debug!(app = %app.app_name, environment = %app.environment, "Starting");

    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_show_with_timeframe() {
        let cli = Cli::try_parse_from(["stockdash", "show", "aapl", "-t", "3m"]).unwrap();
        let Command::Show { symbol, timeframe, points } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(symbol.as_deref(), Some("aapl"));
        assert_eq!(timeframe, Timeframe::ThreeMonths);
        assert_eq!(points, 10);
    }

    #[test]
    fn test_parse_rejects_unknown_timeframe() {
        assert!(Cli::try_parse_from(["stockdash", "show", "-t", "5Y"]).is_err());
    }

    #[test]
    fn test_parse_chat_symbols() {
        let cli = Cli::try_parse_from([
            "stockdash",
            "--api-url",
            "http://example.com/api",
            "chat",
            "send",
            "hello",
            "--symbol",
            "AAPL",
            "--symbol",
            "MSFT",
        ])
        .unwrap();

        assert_eq!(cli.api_url.as_deref(), Some("http://example.com/api"));
        let Command::Chat(ChatCommand::Send { symbols, session, .. }) = cli.command else {
            panic!("expected chat send");
        };
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(session, None);
    }

    #[test]
    fn test_explicit_state_file_wins() {
        let cli = Cli::try_parse_from(["stockdash", "--state-file", "/tmp/s.json", "logout"]).unwrap();
        assert_eq!(state_path(&cli).unwrap(), PathBuf::from("/tmp/s.json"));
    }
}
