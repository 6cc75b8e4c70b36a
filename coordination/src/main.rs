//! Jarvis coordination demo
//!
//! Starts an [`AssistantCore`] and wires a two-stage handler chain:
//! every line read from stdin is published as `speech.input`, a router turns
//! it into `intent.detected`, and a recorder appends the exchange to the
//! user's conversation history. Runs until Ctrl-C or end of input.
//!
//! # Usage
//!
//! ```bash
//! # Defaults
//! jarvis-coordination
//!
//! # Config file plus overrides (flags > env > file > defaults)
//! JARVIS_CONTEXT_MAX_HISTORY=50 jarvis-coordination --config jarvis.toml --history-capacity 200
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use jarvis_coordination::context::{ContextManager, ContextScope};
use jarvis_coordination::events::{event_types, Event, EventBus, EventPriority, FnHandler};
use jarvis_coordination::{AssistantCore, CoordinationConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file with [event_bus] and [context] tables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between context expiration sweeps (overrides JARVIS_CONTEXT_CLEANUP_INTERVAL_SECS)
    #[arg(long)]
    cleanup_interval_secs: Option<u64>,

    /// Events kept in bus history (overrides JARVIS_EVENT_HISTORY_CAPACITY)
    #[arg(long)]
    history_capacity: Option<usize>,

    /// User id attached to stdin input
    #[arg(long, default_value = "local")]
    user: String,
}

fn load_config(args: &Args) -> Result<CoordinationConfig> {
    let mut config = match &args.config {
        Some(path) => CoordinationConfig::from_file(path)?,
        None => CoordinationConfig::default(),
    };
    config.apply_env();

    if let Some(secs) = args.cleanup_interval_secs {
        config.context.cleanup_interval = Duration::from_secs(secs);
    }
    if let Some(capacity) = args.history_capacity {
        config.bus.history_capacity = capacity;
    }
    Ok(config)
}

/// Very small keyword intent detector for the demo chain
fn detect_intent(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    if lower.contains("weather") {
        "weather"
    } else if lower.contains("time") {
        "time"
    } else if lower.contains("look") || lower.contains("see") {
        "vision"
    } else {
        "chat"
    }
}

async fn wire_demo_handlers(core: &AssistantCore) {
    let bus = core.bus();

    // Weak so the bus does not keep itself alive through its own subscribers.
    let bus_ref: Weak<EventBus> = Arc::downgrade(&bus);
    let context = core.context();
    let router = FnHandler::new("speech_router", move |event: Event| {
        let bus_ref = Weak::clone(&bus_ref);
        let context = Arc::clone(&context);
        async move {
            let text = event
                .get_str("text")
                .context("speech.input without text")?
                .to_string();
            let session_id = event.get_str("session_id");

            context
                .try_set_context(
                    "last_utterance",
                    json!(text),
                    ContextScope::Session,
                    session_id,
                    Some(chrono::Duration::minutes(5)),
                    None,
                )
                .await?;

            let Some(bus) = bus_ref.upgrade() else {
                return Ok::<_, anyhow::Error>(());
            };
            let mut intent = Event::empty(event_types::INTENT_DETECTED)
                .with_field("intent", detect_intent(&text))
                .with_field("text", text)
                .with_priority(EventPriority::High)
                .with_source("speech_router");
            if let Some(user_id) = event.get("user_id") {
                intent = intent.with_field("user_id", user_id.clone());
            }
            if let Some(correlation_id) = &event.correlation_id {
                intent = intent.with_correlation_id(correlation_id.clone());
            }
            bus.try_publish(intent).await?;
            Ok::<_, anyhow::Error>(())
        }
    });
    bus.subscribe(event_types::SPEECH_INPUT, router.shared()).await;

    let context = core.context();
    let recorder = FnHandler::new("conversation_recorder", move |event: Event| {
        let context = Arc::clone(&context);
        async move { record_exchange(&context, &event).await }
    });
    bus.subscribe(event_types::INTENT_DETECTED, recorder.shared()).await;
}

async fn record_exchange(context: &ContextManager, event: &Event) -> Result<()> {
    let user_id = event
        .get_str("user_id")
        .context("intent.detected without user_id")?;
    let intent = event.get_str("intent").unwrap_or("chat");

    context
        .add_to_conversation_history(
            user_id,
            json!({
                "role": "user",
                "text": event.get("text"),
                "intent": intent,
            }),
        )
        .await;
    info!(user_id, intent, "Intent detected");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jarvis_coordination=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    info!(?config, "Loaded configuration");

    let core = AssistantCore::new(config);
    core.start().await;
    wire_demo_handlers(&core).await;

    let context = core.context();
    let session_id = context.create_session(&args.user).await;

    let bus = core.bus();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("End of input, shutting down");
                    break;
                };
                let text = line.trim();
                if text.is_empty() {
                    continue;
                }
                let event = Event::empty(event_types::SPEECH_INPUT)
                    .with_field("text", text)
                    .with_field("user_id", args.user.as_str())
                    .with_field("session_id", session_id.as_str())
                    .with_correlation_id(Event::new_correlation_id())
                    .with_source("stdin");
                if !bus.publish(event).await {
                    warn!("Dropped input line");
                }
            }
        }
    }

    // Let in-flight events drain before stopping the loops.
    tokio::time::sleep(Duration::from_millis(100)).await;
    context.end_session(&session_id).await;

    let history = context.get_conversation_history(&args.user, 0).await;
    info!(
        messages = history.len(),
        stats = ?bus.get_stats().await,
        "Session summary"
    );

    core.stop().await;
    Ok(())
}
