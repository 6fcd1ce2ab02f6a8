use std::io::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use research_api::{CancellationSignal, ResearchApiClient, ResearchDepth};
use research_chat::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use research_chat::config::EnvConfig;
use research_chat::logging::init_logging;
use research_chat::providers::backend_from_config;
use research_chat::{ChatMessage, Session, SessionController, SessionObserver, SubmissionOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

const LIST_PAGE_SIZE: u32 = 20;

#[tokio::main]
async fn main() -> io::Result<()> {
    let config = EnvConfig::from_env().map_err(io::Error::other)?;
    init_logging(config.log_json);

    let backend = backend_from_config(&config).map_err(io::Error::other)?;
    let client = backend.client.clone();
    let mut controller = SessionController::new(backend.transport, backend.store, backend.tokens);
    let mut depth = config.default_depth;
    let mut include_academic = config.include_academic;

    tracing::info!(provider = %config.provider, "research chat started");
    println!("Research chat ({} provider). {HELP_TEXT}", config.provider);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let Some(command) = parse_slash_command(input) else {
            run_research(&mut controller, input, depth, include_academic).await;
            continue;
        };

        match command {
            SlashCommand::Help => println!("{HELP_TEXT}"),
            SlashCommand::New => match controller.new_conversation() {
                Ok(()) => println!("Started a new conversation."),
                Err(error) => println!("{}", error.user_message()),
            },
            SlashCommand::List => match controller.list_conversations(LIST_PAGE_SIZE, 0).await {
                Ok(conversations) if conversations.is_empty() => println!("No saved conversations."),
                Ok(conversations) => {
                    for summary in conversations {
                        println!(
                            "  #{} {} [{}] {} messages, {}",
                            summary.id,
                            summary.topic,
                            summary.depth,
                            summary.message_count,
                            summary.created_at
                        );
                    }
                }
                Err(error) => println!("{}", error.user_message()),
            },
            SlashCommand::Load(id) => match controller.load_conversation(id).await {
                Ok(()) => print_transcript(controller.session()),
                Err(error) => println!("{}", error.user_message()),
            },
            SlashCommand::Delete(id) => match controller.delete_conversation(id).await {
                Ok(()) => println!("Deleted conversation #{id}."),
                Err(error) => println!("{}", error.user_message()),
            },
            SlashCommand::Depth(None) => println!("Research depth: {}", depth.as_str()),
            SlashCommand::Depth(Some(next)) => {
                depth = next;
                println!("Research depth set to {}.", depth.as_str());
            }
            SlashCommand::Academic(value) => {
                include_academic = value.unwrap_or(!include_academic);
                println!(
                    "Academic sources {}.",
                    if include_academic { "on" } else { "off" }
                );
            }
            SlashCommand::Health => print_health(client.as_deref()).await,
            SlashCommand::Quit => break,
            SlashCommand::Invalid { command, usage } => {
                println!("Invalid arguments for {command}. Usage: {usage}")
            }
            SlashCommand::Unknown(command) => {
                println!("Unknown command {command}. Type /help for commands.")
            }
        }
    }

    controller.flush_persistence().await;
    tracing::info!("research chat stopped");
    Ok(())
}

async fn run_research(
    controller: &mut SessionController,
    topic: &str,
    depth: ResearchDepth,
    include_academic: bool,
) {
    let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
    let watcher = {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Release);
            }
        })
    };

    let mut printer = PlaceholderPrinter::default();
    let outcome = controller
        .submit(topic, depth, include_academic, &cancel, &mut printer)
        .await;
    watcher.abort();

    if outcome == SubmissionOutcome::Ignored {
        println!("Research is already running.");
        return;
    }
    printer.print_final(controller.session());
}

/// Prints the streaming placeholder whenever its text changes.
#[derive(Default)]
struct PlaceholderPrinter {
    placeholder_id: Option<String>,
    last_printed: Option<String>,
}

impl PlaceholderPrinter {
    fn print_if_changed(&mut self, message: &ChatMessage) {
        let unchanged = self.last_printed.as_deref() == Some(message.content.as_str());
        if message.content.is_empty() || unchanged {
            return;
        }
        print_message(message);
        self.last_printed = Some(message.content.clone());
    }

    /// Pre-stream failures finalize the placeholder without a visible update.
    fn print_final(&mut self, session: &Session) {
        let Some(id) = self.placeholder_id.clone() else {
            return;
        };
        if let Some(message) = session.messages().iter().find(|message| message.id == id) {
            self.print_if_changed(message);
        }
    }
}

impl SessionObserver for PlaceholderPrinter {
    fn on_session_changed(&mut self, session: &Session) {
        if let Some(message) = session.placeholder() {
            self.placeholder_id = Some(message.id.clone());
            self.print_if_changed(message);
        }
    }
}

fn print_message(message: &ChatMessage) {
    println!("[{}] {}", message.role.as_str(), message.content);
    if let Some(result) = message.result() {
        for (index, source) in result.sources.iter().enumerate() {
            println!("  {}. {} <{}>", index + 1, source.title, source.url);
        }
        println!(
            "  ({:.1}s, {})",
            result.total_time_seconds, result.model_used
        );
    }
}

fn print_transcript(session: &Session) {
    for message in session.messages() {
        print_message(message);
    }
}

async fn print_health(client: Option<&ResearchApiClient>) {
    let Some(client) = client else {
        println!("Health checks are unavailable with the mock provider.");
        return;
    };

    match client.health().await {
        Ok(health) if health.is_healthy() => println!("Research service is healthy."),
        Ok(health) => println!("Research service status: {}", health.status),
        Err(error) => {
            println!("{}", error.user_message());
            return;
        }
    }
    match client.llm_health().await {
        Ok(llm) => println!("LLM {} ({}): {}", llm.model, llm.provider, llm.status),
        Err(error) => tracing::warn!(%error, "llm health check failed"),
    }
}
