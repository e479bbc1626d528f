//! Knowledge terminal client - composition root.
//!
//! 1. Parse flags and load configuration from TOML
//! 2. Build the resolver, chat session and speech bridge
//! 3. Print conversation and speech events from background tasks
//! 4. Read commands and questions from stdin until /quit or Ctrl-C

mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use knowledge_chat::{build_resolver, render_transcript, render_turn, ChatError, ChatSession};
use knowledge_core::config::{ChatConfig, KnowledgeConfig};
use knowledge_core::events::{ConversationEvent, SpeechEvent};
use knowledge_speech::SpeechBridge;

use cli::CliArgs;
use repl::{Command, HELP_TEXT};

/// Print each turn once it settles.
async fn conversation_printer(session: Arc<ChatSession>, chat_config: ChatConfig) {
    let mut rx = session.subscribe();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Conversation printer lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            ConversationEvent::TurnResolved { turn_id, .. }
            | ConversationEvent::TurnFailed { turn_id, .. } => {
                let turns = session.turns();
                let found = turns.iter().enumerate().find(|(_, t)| t.id() == turn_id);
                if let Some((index, turn)) = found {
                    println!("\n{}", render_turn(index + 1, turn, &chat_config).trim_end());
                }
            }
            ConversationEvent::StaleResolutionDiscarded { turn_id, stale_attempt, .. } => {
                tracing::debug!(turn_id = %turn_id, stale_attempt, "Stale answer ignored");
            }
            _ => {}
        }
    }
}

/// Print speech notices as transient notifications.
async fn speech_printer(bridge: Arc<SpeechBridge>) {
    let mut rx = bridge.subscribe();
    loop {
        match rx.recv().await {
            Ok(SpeechEvent::Notice { message }) => println!("  ~ {message}"),
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

fn report(err: &ChatError) {
    match err {
        ChatError::InvalidInput => println!("Please enter a question."),
        ChatError::Busy => println!("Still answering your last question, please wait."),
        other => println!("{other}"),
    }
}

fn handle_command(
    command: Command,
    session: &Arc<ChatSession>,
    bridge: &Arc<SpeechBridge>,
    chat_config: &ChatConfig,
) -> bool {
    match command {
        Command::Empty => {}
        Command::Help => println!("{HELP_TEXT}"),
        Command::Invalid(message) => println!("{message} (try /help)"),
        Command::Quit => return false,
        Command::Ask(text) => match session.submit(&text) {
            Ok(_) => println!("  thinking..."),
            Err(e) => report(&e),
        },
        Command::Regenerate(n) => match session.turn_at(n - 1) {
            Some(turn) => match session.regenerate(turn.id()) {
                Ok(_) => println!("  thinking..."),
                Err(e) => report(&e),
            },
            None => println!("There is no question {n}."),
        },
        Command::Speak(n) => match session.turn_at(n - 1) {
            Some(turn) => match session.display_text(&turn) {
                Some(text) => {
                    let bridge = Arc::clone(bridge);
                    tokio::spawn(async move {
                        if let Err(e) = bridge.speak(&text).await {
                            tracing::debug!(error = %e, "Speech unavailable");
                        }
                    });
                }
                None => println!("That answer is not ready yet."),
            },
            None => println!("There is no question {n}."),
        },
        Command::Stop => {
            let stopped = bridge.cancel_speech() | bridge.stop_listening();
            if !stopped {
                println!("Nothing to stop.");
            }
        }
        Command::Listen => {
            let bridge = Arc::clone(bridge);
            let session = Arc::clone(session);
            tokio::spawn(async move {
                // Failures are surfaced through speech notices.
                let Ok(transcript) = bridge.listen().await else {
                    return;
                };
                let submitted = session
                    .collector()
                    .from_transcript(&transcript)
                    .and_then(|query| session.submit_query(query));
                match submitted {
                    Ok(_) => println!("You asked: {transcript}\n  thinking..."),
                    Err(e) => report(&e),
                }
            });
        }
        Command::History => print!("{}", render_transcript(&session.turns(), chat_config)),
        Command::New => {
            bridge.cancel_speech();
            session.clear();
            print!("{}", render_transcript(&[], chat_config));
        }
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing starts so its log level can apply.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = if config_file.exists() {
        match KnowledgeConfig::load(&config_file) {
            Ok(config) => (config, None),
            Err(e) => (KnowledgeConfig::default(), Some(e)),
        }
    } else {
        (KnowledgeConfig::default(), None)
    };
    args.apply_overrides(&mut config);

    // Tracing. RUST_LOG wins over flags and config.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Knowledge v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config. Using defaults."
        ),
        None => tracing::info!(path = %config_file.display(), "Configuration resolved"),
    }
    config.validate()?;

    let resolver = build_resolver(&config.resolver)?;
    let session = Arc::new(ChatSession::new(resolver, &config.chat));
    let bridge = Arc::new(SpeechBridge::from_config(&config.speech));
    tracing::info!(policy = ?session.policy(), "Chat session ready");

    tokio::spawn(conversation_printer(Arc::clone(&session), config.chat.clone()));
    tokio::spawn(speech_printer(Arc::clone(&bridge)));

    print!("{}", render_transcript(&[], &config.chat));
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_command(Command::parse(&line), &session, &bridge, &config.chat) {
                    break;
                }
            }
        }
    }

    bridge.cancel_speech();
    bridge.stop_listening();
    session.clear();
    tracing::info!("Knowledge shut down");
    Ok(())
}
