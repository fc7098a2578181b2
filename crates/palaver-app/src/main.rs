//! Palaver application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing (stderr, so it never mixes with the conversation)
//! 3. Build the backend and speech devices from config
//! 4. Run the line-oriented conversation loop on stdin/stdout

mod cli;
mod repl;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use palaver_chat::{ChatError, ConversationSession, HttpChatBackend, SubmitOutcome};
use palaver_core::config::PalaverConfig;
use palaver_core::SessionEvent;
use palaver_core::types::SessionState;
use palaver_voice::{
    CaptureEvent, CommandRecognizer, CommandSynthesizer, SilentSynthesizer, SpeechRecognizer,
    SpeechSynthesizer, UnsupportedRecognizer, VoiceError, VoiceInputController,
    VoiceOutputController,
};

use crate::cli::CliArgs;
use crate::repl::Command;

/// Build the speech devices named in config, falling back to inert ones.
fn build_devices(config: &PalaverConfig) -> (Arc<dyn SpeechRecognizer>, Arc<dyn SpeechSynthesizer>) {
    let recognizer: Arc<dyn SpeechRecognizer> = match &config.voice.stt_command {
        Some(cmd) => {
            tracing::info!(program = %cmd.program, "Speech capture via external command");
            Arc::new(CommandRecognizer::new(cmd.clone()))
        }
        None => {
            tracing::info!("No speech-to-text command configured; voice input unavailable");
            Arc::new(UnsupportedRecognizer)
        }
    };
    let synthesizer: Arc<dyn SpeechSynthesizer> = match &config.voice.tts_command {
        Some(cmd) => {
            tracing::info!(program = %cmd.program, "Speech playback via external command");
            Arc::new(CommandSynthesizer::new(cmd.clone()))
        }
        None => Arc::new(SilentSynthesizer),
    };
    (recognizer, synthesizer)
}

/// Run a submission in the background so commands stay responsive.
fn spawn_submit(session: &Arc<ConversationSession>, text: Option<String>) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        let outcome = match text {
            Some(text) => session.submit(&text).await,
            None => session.submit_draft().await,
        };
        if let SubmitOutcome::Ignored(ChatError::ConcurrentSubmission) = outcome {
            println!("Still waiting for the previous reply.");
        }
    });
}

fn print_active_thread(session: &ConversationSession) {
    println!("--- chat {} ---", session.active_thread().short());
    println!("{}", repl::render_messages(&session.messages()));
}

/// Handle one parsed command. Returns `false` when the loop should exit.
fn handle_command(
    command: Command,
    session: &Arc<ConversationSession>,
    input: &VoiceInputController,
) -> bool {
    match command {
        Command::Send(text) => spawn_submit(session, Some(text)),
        Command::SendDraft => {
            if !session.draft().trim().is_empty() {
                spawn_submit(session, None);
            }
        }
        Command::New => {
            let id = session.new_thread();
            println!("Started new chat {}", id.short());
        }
        Command::Threads => println!("{}", repl::render_threads(&session.threads())),
        Command::Switch(arg) => match repl::resolve_thread(&arg, &session.threads()) {
            Some(id) => match session.switch_thread(id) {
                Ok(()) => print_active_thread(session),
                Err(e) => println!("{}", e),
            },
            None => println!("No chat matches '{}'. Use /threads to list chats.", arg),
        },
        Command::History => println!("{}", repl::render_history(&session.history())),
        Command::Listen => match input.start() {
            Ok(()) => println!("Listening..."),
            Err(VoiceError::Unsupported) => {
                println!("Speech capture is not available. Set [voice.stt_command] in the config.")
            }
            Err(e) => println!("Could not start listening: {}", e),
        },
        Command::Stop => {
            if input.stop().is_err() {
                println!("Not listening.");
            }
        }
        Command::Voice(enabled) => {
            session.voice_output().set_enabled(enabled);
            println!("Spoken replies {}", if enabled { "on" } else { "off" });
        }
        Command::Help => println!("{}", repl::HELP),
        Command::Quit => return false,
    }
    true
}

fn handle_session_event(event: SessionEvent, session: &ConversationSession) {
    match event {
        SessionEvent::MessageAppended { thread_id, message } => {
            if thread_id == session.active_thread() {
                println!("{}", repl::render_message(&message));
            } else {
                println!("(new reply in chat {})", thread_id.short());
            }
        }
        SessionEvent::StateChanged {
            to: SessionState::AwaitingResponse,
            ..
        } => println!("Thinking..."),
        SessionEvent::BannerRaised { text } => println!("{}", text),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = if config_exists {
        PalaverConfig::load(&config_file)?
    } else {
        PalaverConfig::default()
    };
    config.backend.base_url = args.resolve_api_url(&config.backend.base_url);
    config.validate()?;

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Palaver v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::info!(path = %config_file.display(), "No config file, using defaults");
    }

    // Backend and voice.
    let backend = HttpChatBackend::from_config(&config.backend)?;
    tracing::info!(url = %backend.url(), "Assistant backend configured");

    let (recognizer, synthesizer) = build_devices(&config);
    let voice_output = Arc::new(VoiceOutputController::new(
        synthesizer,
        config.voice.locale.clone(),
        args.resolve_voice_output(config.voice.output_enabled),
    ));
    let voice_input = VoiceInputController::new(recognizer, config.voice.locale.clone());

    let session = Arc::new(ConversationSession::new(
        Arc::new(backend),
        Arc::clone(&voice_output),
        config.display.time_format.clone(),
    ));

    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
    voice_input.on_capture(Arc::new(move |event| {
        let _ = capture_tx.send(event);
    }));

    let mut events = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Palaver - chat {}. Type /help for commands.", session.active_thread().short());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => break,
                };
                match repl::parse_line(&line) {
                    Ok(command) => {
                        if !handle_command(command, &session, &voice_input) {
                            break;
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            Some(event) = capture_rx.recv() => match event {
                CaptureEvent::Recognized(text) => {
                    session.accept_transcript(&text);
                    if config.voice.auto_submit_transcripts {
                        println!("Heard: {}", text);
                        spawn_submit(&session, None);
                    } else {
                        println!("Heard: {} (press Enter to send)", text);
                    }
                }
                CaptureEvent::Failed(e) => println!("Voice input stopped: {}", e),
                CaptureEvent::Ended => tracing::debug!("Capture ended"),
            },
            event = events.recv() => match event {
                Ok(event) => handle_session_event(event, &session),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Session event renderer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if voice_input.is_capturing() {
        let _ = voice_input.stop();
    }
    voice_output.cancel();
    tracing::info!("Palaver exiting");
    Ok(())
}
