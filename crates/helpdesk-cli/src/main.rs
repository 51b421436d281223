//! Helpdesk CLI - Command-line client for the helpdesk backend.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::Context;
use helpdesk_api_client::ApiError;
use helpdesk_config_and_utils::{init_logging, Config, Paths};
use output::OutputFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, warn};

/// Exit code for a session that must be re-established with `login`.
const EXIT_SESSION_EXPIRED: u8 = 2;

/// Helpdesk CLI - Manage tickets, knowledge base and support chat.
#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Command-line client for the helpdesk backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Backend base URL, overriding the configuration file
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Base directory for credentials, config and logs. Defaults to ~/.helpdesk
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username and password
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },

    /// Logout and clear stored credentials
    Logout,

    /// Show the stored session
    Status {
        /// Also check the session against the backend
        #[arg(long)]
        check: bool,
    },

    /// Manage tickets
    Tickets {
        #[command(subcommand)]
        command: TicketCommands,
    },

    /// Search the knowledge base
    Kb {
        #[command(subcommand)]
        command: KbCommands,
    },

    /// Ask the support chatbot
    Chat {
        /// Message to send
        message: String,
    },

    /// Comment on a ticket
    Comment {
        /// Ticket ID
        ticket_id: i64,
        /// Comment text
        text: String,
    },

    /// Send an authenticated request to any endpoint
    Request {
        /// HTTP method
        method: String,
        /// Path under the base URL, e.g. /api/faqs/
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum TicketCommands {
    /// List tickets
    List,
    /// Show ticket details
    Show {
        /// Ticket ID
        id: i64,
    },
    /// Open a ticket
    Create {
        #[arg(short, long)]
        subject: String,
        #[arg(short, long)]
        description: String,
        /// Queue ID
        #[arg(long)]
        queue: Option<i64>,
        /// Priority ID
        #[arg(long)]
        priority: Option<i64>,
    },
    /// Close a ticket
    Close {
        /// Ticket ID
        id: i64,
    },
    /// Delete a ticket
    Delete {
        /// Ticket ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum KbCommands {
    /// Full-text search
    Search {
        query: String,
    },
    /// Suggest article titles
    Suggest {
        query: String,
    },
}

async fn run(cli: Cli, ctx: &Context) -> anyhow::Result<()> {
    match cli.command {
        Commands::Login { username } => commands::login(ctx, username).await,
        Commands::Register {
            username,
            email,
            first_name,
            last_name,
        } => commands::register(ctx, username, email, first_name, last_name).await,
        Commands::Logout => commands::logout(ctx).await,
        Commands::Status { check } => commands::status(ctx, check).await,
        Commands::Tickets { command } => match command {
            TicketCommands::List => commands::tickets_list(ctx).await,
            TicketCommands::Show { id } => commands::tickets_show(ctx, id).await,
            TicketCommands::Create {
                subject,
                description,
                queue,
                priority,
            } => commands::tickets_create(ctx, subject, description, queue, priority).await,
            TicketCommands::Close { id } => commands::tickets_close(ctx, id).await,
            TicketCommands::Delete { id } => commands::tickets_delete(ctx, id).await,
        },
        Commands::Kb { command } => match command {
            KbCommands::Search { query } => commands::kb_search(ctx, &query).await,
            KbCommands::Suggest { query } => commands::kb_suggest(ctx, &query).await,
        },
        Commands::Chat { message } => commands::chat(ctx, &message).await,
        Commands::Comment { ticket_id, text } => commands::comment(ctx, ticket_id, &text).await,
        Commands::Request { method, path, body } => {
            commands::raw_request(ctx, &method, &path, body.as_deref()).await
        }
    }
}

fn setup(cli: &Cli) -> anyhow::Result<(Paths, Config)> {
    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let mut config = Config::load(&paths)?;
    if let Some(api_url) = &cli.api_url {
        config.api_base_url = api_url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok((paths, config))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = cli.format;

    let (paths, config) = match setup(&cli) {
        Ok(setup) => setup,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &format);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.log_level, Some(&paths.log_file()));
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    let ctx = match Context::new(&paths, &config, format) {
        Ok(ctx) => ctx,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &format);
            return ExitCode::FAILURE;
        }
    };

    let Err(e) = run(cli, &ctx).await else {
        return ExitCode::SUCCESS;
    };

    match e.downcast_ref::<ApiError>() {
        Some(api_error) if api_error.is_auth_expired() => {
            if let Err(clear_error) = ctx.session.end_if_expired(api_error) {
                warn!(error = %clear_error, "Failed to clear expired session");
            }
            output::print_error(
                &format!("{}. Run `helpdesk login` to sign in again.", e),
                &format,
            );
            ExitCode::from(EXIT_SESSION_EXPIRED)
        }
        _ => {
            output::print_error(&format!("{:#}", e), &format);
            ExitCode::FAILURE
        }
    }
}
