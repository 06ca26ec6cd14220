//! Interactive chat console.
//!
//! Reads lines from stdin. Plain text is submitted to the conversation
//! pipeline; lines starting with `/` are commands. Transcript entries and
//! voice status changes are printed by background tasks as they happen.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::{JoinHandle, JoinSet};

use lunatix_chat::{ConversationPipeline, DropReason, Message};
use lunatix_core::types::Role;
use lunatix_voice::{VoiceSessionController, VoiceStatus};

pub const HELP: &str = "Commands: /listen  /stop  /status  /history  /help  /quit\n\
                        Anything else is sent to the assistant.";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text for the assistant.
    Say(String),
    Listen,
    Stop,
    Status,
    History,
    Help,
    Quit,
    Unknown(String),
    Blank,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Blank;
    }
    if !line.starts_with('/') {
        return Command::Say(line.to_string());
    }
    let name = line.split_whitespace().next().unwrap_or(line);
    match name.to_ascii_lowercase().as_str() {
        "/listen" | "/mic" => Command::Listen,
        "/stop" => Command::Stop,
        "/status" => Command::Status,
        "/history" => Command::History,
        "/help" | "/?" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(name.to_string()),
    }
}

/// Render one transcript entry for the terminal.
pub fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("{}> {}", speaker, message.content);
    if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("\n    sources: {}", sources.join(", ")));
    }
    out
}

pub fn format_status(status: &VoiceStatus) -> String {
    match &status.last_error {
        Some(error) => format!("[voice] {} ({})", status.status, error),
        None => format!("[voice] {}", status.status),
    }
}

pub fn format_session(pipeline: &ConversationPipeline) -> String {
    let session = pipeline.session();
    format!(
        "[chat] session {} started {}, {} messages{}",
        session.session_id,
        session.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        pipeline.len(),
        if pipeline.is_busy() { ", waiting for reply" } else { "" }
    )
}

/// Prints transcript entries that have not been printed yet.
///
/// The transcript only grows, so a cursor into it is enough.
#[derive(Clone)]
pub struct TranscriptPrinter {
    pipeline: Arc<ConversationPipeline>,
    printed: Arc<Mutex<usize>>,
}

impl TranscriptPrinter {
    pub fn new(pipeline: Arc<ConversationPipeline>) -> Self {
        Self {
            pipeline,
            printed: Arc::new(Mutex::new(0)),
        }
    }

    /// Formatted entries added since the last call.
    pub fn take_new(&self) -> Vec<String> {
        let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
        let transcript = self.pipeline.transcript();
        let fresh: Vec<String> = transcript
            .iter()
            .skip(*printed)
            .map(format_message)
            .collect();
        *printed = transcript.len();
        fresh
    }

    pub fn flush(&self) {
        for line in self.take_new() {
            println!("{}", line);
        }
    }

    /// Flush on every transcript revision until the pipeline is dropped.
    pub fn spawn(&self) -> JoinHandle<()> {
        let printer = self.clone();
        let mut revisions = self.pipeline.subscribe();
        tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                printer.flush();
            }
        })
    }
}

/// Print voice status changes as they are published.
pub fn spawn_status_printer(controller: &VoiceSessionController) -> JoinHandle<()> {
    let mut updates = controller.subscribe();
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().clone();
            println!("{}", format_status(&status));
        }
    })
}

/// Run the console until `/quit` or end of input.
///
/// Typed messages still waiting on the backend are awaited before
/// returning so their replies are printed.
pub async fn run<R>(
    input: R,
    pipeline: Arc<ConversationPipeline>,
    controller: Arc<VoiceSessionController>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let printer = TranscriptPrinter::new(pipeline.clone());
    let transcript_task = printer.spawn();
    let status_task = spawn_status_printer(&controller);
    let mut submissions = JoinSet::new();

    println!("{}", HELP);

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Blank => {}
            Command::Say(text) => match pipeline.admit_utterance(&text) {
                Ok(admitted) => {
                    submissions.spawn(admitted.exchange());
                }
                Err(DropReason::Busy) => println!("(still waiting on the previous answer)"),
                Err(_) => {}
            },
            Command::Listen => {
                if !controller.start() && controller.is_listening() {
                    println!("(already listening)");
                }
            }
            Command::Stop => controller.stop(),
            Command::Status => {
                println!("{}", format_status(&controller.snapshot()));
                println!("{}", format_session(&pipeline));
            }
            Command::History => {
                for message in pipeline.transcript() {
                    println!("{}", format_message(&message));
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
            Command::Unknown(name) => println!("Unknown command {}. {}", name, HELP),
        }
    }

    controller.stop();
    while submissions.join_next().await.is_some() {}
    transcript_task.abort();
    status_task.abort();
    printer.flush();
    Ok(())
}
