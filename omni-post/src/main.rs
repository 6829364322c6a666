//! omni-post - Queue posts and publish on demand
//!
//! Unix-style front end to the Omnipost queue. The `omni-send` daemon does
//! the actual scheduled publishing; this tool puts posts into the queue,
//! adjusts them, and can publish to one platform immediately.

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use libomnipost::logging::LoggingConfig;
use libomnipost::scheduling::parse_schedule;
use libomnipost::service::OmnipostService;
use libomnipost::{Config, PlatformWindow, Post, Result};

#[derive(Parser, Debug)]
#[command(name = "omni-post")]
#[command(version)]
#[command(about = "Queue posts and publish on demand")]
#[command(long_about = "\
omni-post - Queue posts and publish on demand

DESCRIPTION:
    omni-post manages the Omnipost queue. Scheduled posts are published by
    the omni-send daemon when they come due; trigger publishes right away
    without touching the queue.

COMMANDS:
    trigger     Publish content to one platform now
    schedule    Queue a post for later
    show        Show a queued post
    cancel      Return a queued post to draft
    reschedule  Move a queued post to a new time
    windows     List or change per-platform publish windows

USAGE EXAMPLES:
    # Publish immediately
    omni-post trigger discord \"Deploy finished\"

    # Queue for later
    omni-post schedule \"Launch day!\" --platform twitter --platform linkedin --at \"in 2h\"
    omni-post schedule \"Photo drop\" -p instagram -m https://cdn.example.com/a.jpg --at tomorrow

    # Move or cancel
    omni-post reschedule <POST_ID> --at 2030-06-01T10:00:00Z
    omni-post cancel <POST_ID>

    # Windows
    omni-post windows list
    omni-post windows set linkedin 9 17 --gap 90

TIME FORMATS:
    now, durations (\"90m\", \"in 1h 30m\"), RFC 3339, or phrases such as
    \"tomorrow\" and \"friday 8pm\"

CONFIGURATION:
    Configuration file: ~/.config/omnipost/config.toml (or $OMNIPOST_CONFIG)
    Database location:  ~/.local/share/omnipost/posts.db (or $OMNIPOST_DB_PATH)

EXIT CODES:
    0 - Success
    1 - Publish or storage failure
    2 - Configuration error
    3 - Invalid input (bad post ID, time, window violation, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish content to one platform immediately
    Trigger {
        /// Target platform (e.g. discord, twitter)
        platform: String,

        /// Content to publish
        content: String,

        /// Media URL to attach (repeatable)
        #[arg(short, long = "media")]
        media: Vec<String>,
    },

    /// Queue a post for scheduled publishing
    Schedule {
        /// Content to publish
        content: String,

        /// Target platform (repeatable)
        #[arg(short, long = "platform", required = true)]
        platforms: Vec<String>,

        /// Media URL to attach (repeatable)
        #[arg(short, long = "media")]
        media: Vec<String>,

        /// When to publish (e.g. "in 2h", "tomorrow", RFC 3339)
        #[arg(long)]
        at: String,
    },

    /// Show a post
    Show {
        post_id: String,
    },

    /// Return a queued post to draft
    Cancel {
        post_id: String,
    },

    /// Move a post to a new time
    Reschedule {
        post_id: String,

        /// New publish time
        #[arg(long)]
        at: String,
    },

    /// Per-platform publish windows
    Windows {
        #[command(subcommand)]
        command: WindowCommands,
    },
}

#[derive(Subcommand, Debug)]
enum WindowCommands {
    /// List configured windows
    List,

    /// Create or replace a platform's window
    Set {
        platform: String,

        /// First allowed hour (0-23)
        start_hour: u8,

        /// Last allowed hour (0-23, inclusive)
        end_hour: u8,

        /// Minimum minutes between posts on this platform
        #[arg(long, default_value_t = 0)]
        gap: u32,

        /// Store the window but do not enforce it
        #[arg(long)]
        disabled: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if std::env::var(libomnipost::logging::LEVEL_ENV).is_err() {
        // Keep the terminal quiet unless asked
        logging.level = "error".to_string();
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let service = OmnipostService::from_config(config).await?;
    let format = cli.format;

    match cli.command {
        Commands::Trigger {
            platform,
            content,
            media,
        } => {
            let receipt = service
                .publishing()
                .trigger(&platform, &content, media)
                .await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "platform": platform.to_lowercase(),
                    "external_id": receipt.external_id,
                })),
                OutputFormat::Text => {
                    println!("{}:{}", platform.to_lowercase(), receipt.external_id)
                }
            }
        }
        Commands::Schedule {
            content,
            platforms,
            media,
            at,
        } => {
            let at = parse_schedule(&at, Utc::now())?;
            let post = service
                .queue()
                .schedule(&content, platforms, media, at)
                .await?;
            output_post(&post, format);
        }
        Commands::Show { post_id } => {
            let post = service.queue().get(&post_id).await?;
            output_post(&post, format);
        }
        Commands::Cancel { post_id } => {
            let post = service.queue().cancel(&post_id).await?;
            output_post(&post, format);
        }
        Commands::Reschedule { post_id, at } => {
            let at = parse_schedule(&at, Utc::now())?;
            let post = service.queue().reschedule(&post_id, at).await?;
            output_post(&post, format);
        }
        Commands::Windows { command } => match command {
            WindowCommands::List => {
                let windows = service.queue().windows().await?;
                output_windows(&windows, format);
            }
            WindowCommands::Set {
                platform,
                start_hour,
                end_hour,
                gap,
                disabled,
            } => {
                let mut window = PlatformWindow::new(&platform, start_hour, end_hour, gap);
                window.enabled = !disabled;
                service.queue().set_window(window.clone()).await?;
                output_windows(&[window], format);
            }
        },
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to render JSON: {}", e),
    }
}

fn output_post(post: &Post, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "id": post.id,
            "content": post.content,
            "status": post.status,
            "platforms": post.platforms(),
            "media_urls": post.media_urls,
            "scheduled_at": post.scheduled_at.to_rfc3339(),
            "retry_count": post.retry_count,
            "last_error": post.last_error,
        })),
        OutputFormat::Text => println!(
            "{} | {} | {} | {} | {}",
            post.id,
            post.status,
            post.platforms().join(","),
            post.scheduled_at.to_rfc3339(),
            truncate_content(&post.content, 50)
        ),
    }
}

fn output_windows(windows: &[PlatformWindow], format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_value(windows) {
            Ok(value) => print_json(&value),
            Err(e) => eprintln!("Error: failed to render JSON: {}", e),
        },
        OutputFormat::Text => {
            for w in windows {
                println!(
                    "{} | {:02}-{:02} | gap {}m{}",
                    w.platform_id,
                    w.start_hour,
                    w.end_hour,
                    w.min_gap_minutes,
                    if w.enabled { "" } else { " | disabled" }
                );
            }
        }
    }
}

/// Truncate content to max chars with ellipsis
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let prefix: String = content.chars().take(max_chars).collect();
        format!("{}...", prefix)
    }
}
