//! LivSync CLI
//!
//! Terminal view over the LivSync client core:
//! - Chat with the health assistant
//! - Show and clear the session's chat history and notifications
//! - Listen for realtime AI suggestions
//! - Show profile, insights, today's events and a day suggestion

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use livsync::config::{generate_default_config, Config, LoadedConfig};
use livsync::models::{CalendarEvent, ChatMessage, PushNotification};
use livsync::realtime::{ChannelState, TerminalNotifier};
use livsync::toast::{ToastReceiver, ToastVariant};
use livsync::{AppContext, Loadable, Toast};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "livsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LivSync wellness assistant in your terminal")]
#[command(long_about = "LivSync keeps your notification panel and assistant chat for the session.\nChat with the health assistant, follow AI suggestions live, and check your day.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: searched in the usual locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overrides config and environment
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message to the health assistant
    Chat {
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Show the chat history of this session
    History {
        /// Clear the history instead
        #[arg(long)]
        clear: bool,
    },

    /// Show the notification panel
    Notifications {
        /// Clear all notifications instead
        #[arg(long)]
        clear: bool,
    },

    /// Listen for AI suggestions until Ctrl-C
    Listen,

    /// Show the signed-in user's profile
    Profile,

    /// Show health insights
    Insights,

    /// Show today's calendar events
    Events,

    /// Ask for a suggestion for the rest of the day
    Suggest,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_ref());
    }

    let loaded = match &cli.config {
        Some(path) => LoadedConfig {
            config: Config::load_with_env(path)?,
            source: Some(path.clone()),
            skipped: Vec::new(),
        },
        None => Config::discover(),
    };
    let LoadedConfig {
        mut config,
        source,
        skipped,
    } = loaded;
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    // Config discovery is logged once the subscriber exists
    init_logging(&config);
    for (path, error) in &skipped {
        tracing::warn!("Failed to load config from {:?}: {}", path, error);
    }
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    let (context, mut toasts) =
        AppContext::from_config(config).context("Failed to start session")?;

    match cli.command {
        Commands::Chat { text } => {
            let text = text.join(" ");
            let chat = match context.chat() {
                Ok(chat) => chat,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };
            match chat.send(&text).await {
                Ok(Some(reply)) => match cli.format {
                    OutputFormat::Json => print_json(&reply)?,
                    OutputFormat::Table => println!("{}", reply.content),
                },
                Ok(None) => {
                    eprintln!("Nothing to send.");
                }
                Err(e) => {
                    eprintln!("{}", e);
                    if e.is_retryable() {
                        eprintln!("Your message was kept in the history; try again in a moment.");
                    }
                    drain_toasts(&mut toasts);
                    std::process::exit(1);
                }
            }
        }

        Commands::History { clear } => {
            if clear {
                context.store().clear_chat_messages();
                println!("Chat history cleared.");
            } else {
                let messages = context.store().chat_messages();
                match cli.format {
                    OutputFormat::Json => print_json(&messages)?,
                    OutputFormat::Table => print_history(&messages),
                }
            }
        }

        Commands::Notifications { clear } => {
            if clear {
                context.store().clear_notifications();
                println!("Notifications cleared.");
            } else {
                let notifications = context.store().notifications();
                match cli.format {
                    OutputFormat::Json => print_json(&notifications)?,
                    OutputFormat::Table => print_notifications(&notifications),
                }
            }
        }

        Commands::Listen => {
            listen(&context, toasts).await?;
            return Ok(());
        }

        Commands::Profile => {
            let profile = ready_or_exit(context.user_profile().await, "profile", &mut toasts);
            match cli.format {
                OutputFormat::Json => print_json(&profile)?,
                OutputFormat::Table => {
                    println!("{:<16} {}", "Name", profile.full_name);
                    println!("{:<16} {}", "Email", profile.email);
                    if let Some(dob) = profile.dob {
                        println!("{:<16} {}", "Date of birth", dob);
                    }
                    println!("{:<16} {}", "Gender", or_dash(&profile.gender));
                    println!("{:<16} {:.1}", "Weight", profile.weight);
                    println!("{:<16} {:.1}", "Height", profile.height);
                    println!("{:<16} {}", "Activity level", or_dash(&profile.activity_level));
                    println!("{:<16} {}", "Step goal", profile.step_goal);
                    println!("{:<16} {}", "Goals", or_dash(&profile.custom_goals));
                }
            }
        }

        Commands::Insights => {
            let insights = ready_or_exit(context.health_insights().await, "insights", &mut toasts);
            match cli.format {
                OutputFormat::Json => print_json(&insights)?,
                OutputFormat::Table => println!("{}", insights.response_text),
            }
        }

        Commands::Events => {
            let events = ready_or_exit(context.today_events().await, "events", &mut toasts);
            match cli.format {
                OutputFormat::Json => print_json(&events)?,
                OutputFormat::Table => print_events(&events),
            }
        }

        Commands::Suggest => {
            let suggestion =
                ready_or_exit(context.event_day_suggestion().await, "suggestion", &mut toasts);
            match cli.format {
                OutputFormat::Json => print_json(&suggestion)?,
                OutputFormat::Table => {
                    println!("{}", suggestion.title.as_deref().unwrap_or("No suggestion"));
                    if let Some(description) = &suggestion.description {
                        println!("  {}", description);
                    }
                    if let Some(rationale) = &suggestion.rationale {
                        println!("  ({})", rationale);
                    }
                }
            }
        }

        Commands::Config { .. } => {}
    }

    drain_toasts(&mut toasts);
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("livsync={}", config.logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn listen(context: &AppContext, mut toasts: ToastReceiver) -> anyhow::Result<()> {
    let toast_printer = tokio::spawn(async move {
        while let Some(toast) = toasts.recv().await {
            print_toast(&toast);
        }
    });

    let subscription = context
        .start_realtime(Arc::new(TerminalNotifier::stdout()))
        .await
        .context("Failed to subscribe to realtime suggestions")?;

    println!("Listening for suggestions (Ctrl-C to stop)...");

    let mut state = subscription.watch_state();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow();
                match current {
                    ChannelState::Reconnecting { attempt } => {
                        eprintln!("Connection lost, reconnecting (attempt {})...", attempt);
                    }
                    ChannelState::Joined => eprintln!("Reconnected."),
                    ChannelState::Closed => {
                        eprintln!("Realtime connection closed.");
                        break;
                    }
                }
            }
        }
    }

    subscription.unsubscribe().await;
    toast_printer.abort();

    println!(
        "{} notifications ({} unread)",
        context.store().notifications().len(),
        context.store().unread_count()
    );
    Ok(())
}

fn write_default_config(output: Option<&PathBuf>) -> anyhow::Result<()> {
    let config = generate_default_config();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &config)
                .with_context(|| format!("Failed to write {:?}", path))?;
            println!("Config written to {:?}", path);
        }
        None => {
            print!("{}", config);
        }
    }
    Ok(())
}

/// Unwrap a fetch for display, exiting with the typed failure otherwise
fn ready_or_exit<T>(loadable: Loadable<T>, what: &str, toasts: &mut ToastReceiver) -> T {
    match loadable {
        Loadable::Ready(value) => value,
        Loadable::Failed { message, retryable } => {
            eprintln!("Failed to load {}: {}", what, message);
            if retryable {
                eprintln!("This looks temporary; try again in a moment.");
            }
            drain_toasts(toasts);
            std::process::exit(1);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_toast(toast: &Toast) {
    let marker = match toast.variant {
        ToastVariant::Default => "*",
        ToastVariant::Destructive => "!",
    };
    eprintln!("[{}] {}: {}", marker, toast.title, toast.description);
}

fn drain_toasts(toasts: &mut ToastReceiver) {
    while let Ok(toast) = toasts.try_recv() {
        print_toast(&toast);
    }
}

fn print_history(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("No messages yet.");
        println!();
        println!("Start a conversation with:");
        println!("  livsync chat How did I sleep last night?");
        return;
    }

    for message in messages {
        println!("{:>9}: {}", message.role.to_string(), message.content);
    }
}

fn print_notifications(notifications: &[PushNotification]) {
    if notifications.is_empty() {
        println!("No notifications.");
        return;
    }

    println!("{:<3} {:<12} {:<30} {}", "", "Type", "Title", "Message");
    println!("{}", "-".repeat(72));

    for notification in notifications {
        println!(
            "{:<3} {:<12} {:<30} {}",
            if notification.read { "" } else { "*" },
            notification.kind.as_str(),
            notification.title,
            notification.message
        );
    }
}

fn print_events(events: &[CalendarEvent]) {
    if events.is_empty() {
        println!("No events today.");
        return;
    }

    println!("{:<13} {:<30} {}", "Time", "Title", "Location");
    println!("{}", "-".repeat(60));

    for event in events {
        let when = event.when.as_ref();
        let start = when.and_then(|w| w.start_time.as_ref()).map(format_time);
        let end = when.and_then(|w| w.end_time.as_ref()).map(format_time);
        let time = match (start, end) {
            (Some(start), Some(end)) => format!("{}-{}", start, end),
            (Some(start), None) => start,
            _ => "all day".to_string(),
        };

        println!(
            "{:<13} {:<30} {}",
            time,
            event.display_title(),
            event.location.as_deref().unwrap_or("-")
        );
    }
}

/// Event times arrive as unix seconds or as preformatted strings
fn format_time(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.with_timezone(&chrono::Local).format("%H:%M").to_string())
            .unwrap_or_else(|| n.to_string()),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
