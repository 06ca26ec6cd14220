//! LunatiX assistant binary.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Build the HTTP chat backend and the conversation pipeline
//! 3. Wire a speech recognizer into the voice session controller
//! 4. Run the interactive console until `/quit` or end of input

mod cli;
mod console;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use lunatix_chat::{ConversationPipeline, HttpChatBackend, PipelineSink};
use lunatix_core::config::{LunatixConfig, VoiceConfig};
use lunatix_core::{LunatixError, Result};
use lunatix_voice::{
    ScriptedRecognizer, SpeechRecognizer, UnavailableRecognizer, VoiceSessionController,
};

use cli::CliArgs;

/// Pick the recognizer backing `/listen`.
///
/// There is no microphone integration in the binary; a voice script replays
/// its non-blank lines as recognized utterances, spaced by the configured
/// pause so each one can be answered before the next arrives.
fn build_recognizer(
    script: Option<&Path>,
    voice: &VoiceConfig,
    utterances_per_session: usize,
) -> Result<Arc<dyn SpeechRecognizer>> {
    let Some(path) = script else {
        return Ok(Arc::new(UnavailableRecognizer));
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        LunatixError::Config(format!(
            "failed to read voice script {}: {}",
            path.display(),
            e
        ))
    })?;
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    tracing::info!(
        path = %path.display(),
        utterances = lines.len(),
        utterances_per_session,
        pause_ms = voice.utterance_pause_ms,
        "Loaded voice script"
    );

    Ok(Arc::new(
        ScriptedRecognizer::new(lines, utterances_per_session)
            .with_interim_results(voice.interim_results)
            .with_utterance_pause(Duration::from_millis(voice.utterance_pause_ms)),
    ))
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let mut config = LunatixConfig::load_or_default(&config_path);
    if let Some(url) = args.resolve_backend_url() {
        config.chat.backend_url = url;
    }

    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting LunatiX v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration resolved");

    let backend = HttpChatBackend::from_config(&config.chat);
    tracing::info!(endpoint = %backend.endpoint(), "Chat backend configured");

    let pipeline = Arc::new(
        ConversationPipeline::new(Arc::new(backend))
            .with_fallback_message(config.chat.fallback_message.clone()),
    );
    tracing::info!(session_id = %pipeline.session().session_id, "Chat session created");

    let recognizer = build_recognizer(
        args.voice_script.as_deref(),
        &config.voice,
        args.resolve_utterances_per_session(config.voice.utterances_per_session),
    )?;
    let sink = Arc::new(PipelineSink::new(pipeline.clone()));
    let controller = Arc::new(VoiceSessionController::new(recognizer, sink));
    let signal_loop = controller.spawn_signal_loop();

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    console::run(stdin, pipeline.clone(), controller.clone()).await?;

    controller.stop();
    if let Some(handle) = signal_loop {
        handle.abort();
    }

    tracing::info!(messages = pipeline.len(), "LunatiX stopped");
    Ok(())
}
