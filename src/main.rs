//! Qwen Chat command line entry point.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use qwen_chat::models::settings::PerformanceProfile;
use qwen_chat::services::{ClientEvent, GenerationRequest};
use qwen_chat::storage::ConfigService;
use qwen_chat::utils::init_logging;
use qwen_chat::AppState;
use qwen_chat_llm::Message;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, help = "Path to config.toml (defaults to ~/.qwen-chat/config.toml)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Model to use instead of the configured one")]
    model: Option<String>,

    #[arg(long, help = "Performance profile: fast, balanced, or quality")]
    profile: Option<PerformanceProfile>,

    #[arg(long, help = "Print the full answer at the end instead of streaming it")]
    no_stream: bool,

    #[arg(long, help = "Check the backend and list its models")]
    health: bool,

    #[arg(help = "Prompt to send; reads prompts from stdin when omitted")]
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let service = match &args.config {
        Some(path) => ConfigService::open(path),
        None => ConfigService::new(),
    }
    .context("failed to load configuration")?;

    let mut config = service.get_config().clone();
    if let Some(model) = &args.model {
        config.backend.model = model.clone();
    }
    if let Some(profile) = args.profile {
        config.generation.profile = profile;
    }
    init_logging(&config.log_level);
    tracing::debug!("Using config {}", service.path().display());

    let state = AppState::new(config)?;

    if args.health {
        let models = state.health().await.context("backend is not reachable")?;
        println!("Backend OK ({})", state.config().backend.base_url);
        for model in models {
            println!("  {}", model);
        }
        return Ok(());
    }

    let stream = !args.no_stream;
    let prompt = args.prompt.join(" ");
    if !prompt.trim().is_empty() {
        respond(&state, vec![Message::user(prompt)], stream).await?;
        return Ok(());
    }

    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/exit" | "/quit") {
            break;
        }

        history.push(Message::user(line));
        if let Some(answer) = respond(&state, history.clone(), stream).await? {
            history.push(Message::assistant(answer));
        } else {
            history.pop();
        }
    }
    Ok(())
}

/// Run one request, printing as it goes. Returns the answer, or None if the
/// request failed or was interrupted.
async fn respond(
    state: &AppState,
    messages: Vec<Message>,
    stream_output: bool,
) -> anyhow::Result<Option<String>> {
    let mut events = state.orchestrator().start(GenerationRequest::new(messages));
    let mut answer = String::new();
    let mut stdout = std::io::stdout();

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                events.cancel();
                eprintln!("\n[interrupted]");
                return Ok(None);
            }
            event = events.next() => event,
        };
        let Some(event) = event else {
            break;
        };

        match event {
            ClientEvent::PartialText { content } | ClientEvent::Completion { content } => {
                if stream_output {
                    write!(stdout, "{}", content)?;
                    stdout.flush()?;
                }
                answer.push_str(&content);
            }
            ClientEvent::Error { message } => {
                eprintln!("{}", message);
                return Ok(None);
            }
        }
    }

    if stream_output {
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "{}", answer)?;
    }
    Ok(Some(answer))
}
