use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write as IoWrite;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tracing_subscriber::EnvFilter;

use lochat_application::{ConversationController, TurnProgress};
use lochat_core::transcript::MessageRole;
use lochat_infrastructure::{ConfigService, JsonHistoryRepository, UserService};
use lochat_interaction::{ModelClient, OllamaClient};

/// Models offered when the endpoint cannot be queried.
const FALLBACK_MODELS: &[&str] = &["llama3", "mistral"];

const COMMANDS: &[&str] = &[
    "/new",
    "/history",
    "/load",
    "/delete",
    "/clear-history",
    "/models",
    "/model",
    "/system",
    "/attach",
    "/detach",
    "/help",
    "/quit",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// A parsed REPL input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    NewChat,
    History,
    Load(usize),
    Delete(usize),
    ClearHistory,
    Models,
    Model(String),
    System(Option<String>),
    Attach(String),
    Detach,
    Help,
    Quit,
    /// Anything that is not a slash command is a chat submission.
    Say(String),
    Unknown(String),
}

impl Command {
    fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return Self::Say(trimmed.to_string());
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };

        match name {
            "/new" => Self::NewChat,
            "/history" => Self::History,
            "/load" => match rest.parse() {
                Ok(index) => Self::Load(index),
                Err(_) => Self::Unknown(trimmed.to_string()),
            },
            "/delete" => match rest.parse() {
                Ok(index) => Self::Delete(index),
                Err(_) => Self::Unknown(trimmed.to_string()),
            },
            "/clear-history" => Self::ClearHistory,
            "/models" => Self::Models,
            "/model" if !rest.is_empty() => Self::Model(rest.to_string()),
            "/system" => Self::System((!rest.is_empty()).then(|| rest.to_string())),
            "/attach" if !rest.is_empty() => Self::Attach(rest.to_string()),
            "/detach" => Self::Detach,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            _ => Self::Unknown(trimmed.to_string()),
        }
    }
}

fn print_help() {
    println!("{}", "Commands:".bright_black());
    println!("{}", "  /new              start a fresh conversation".bright_black());
    println!("{}", "  /history          list saved conversations".bright_black());
    println!("{}", "  /load N           continue saved conversation N".bright_black());
    println!("{}", "  /delete N         delete saved conversation N".bright_black());
    println!("{}", "  /clear-history    delete all saved conversations".bright_black());
    println!("{}", "  /models           list models on the endpoint".bright_black());
    println!("{}", "  /model NAME       switch model".bright_black());
    println!("{}", "  /system [TEXT]    show or set the system prompt".bright_black());
    println!("{}", "  /attach PATH      attach a file's text to the next message".bright_black());
    println!("{}", "  /detach           drop the attached file text".bright_black());
    println!("{}", "  /quit             exit".bright_black());
    println!("{}", "Ctrl-C during a response stops generating.".bright_black());
}

fn print_history(controller: &ConversationController) {
    let transcripts = controller.transcripts();
    if transcripts.is_empty() {
        println!("{}", "No chat history yet.".bright_black());
        return;
    }
    for (index, transcript) in transcripts.iter().enumerate() {
        let marker = if controller.context().active == Some(index) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {} {} {}",
            marker,
            format!("[{}]", index).bright_cyan(),
            transcript.title,
            format!("({} messages, {})", transcript.messages.len(), transcript.model)
                .bright_black(),
        );
    }
}

/// Outcome of waiting for either turn progress or a Ctrl-C.
enum StreamStep {
    Progress(Option<TurnProgress>),
    Stopped,
}

/// Consumes the current turn's stream, printing fragments as they arrive.
/// Ctrl-C stops generation and keeps the partial response.
async fn stream_response(controller: &mut ConversationController) {
    loop {
        let step = tokio::select! {
            progress = controller.next_event() => StreamStep::Progress(progress),
            _ = tokio::signal::ctrl_c() => StreamStep::Stopped,
        };

        let progress = match step {
            StreamStep::Progress(progress) => progress,
            StreamStep::Stopped => {
                println!();
                println!("{}", "Stopped.".yellow());
                controller.stop_generation().await
            }
        };

        match progress {
            Some(TurnProgress::Fragment(fragment)) => {
                print!("{}", fragment);
                let _ = std::io::stdout().flush();
            }
            Some(TurnProgress::Completed { persist_error, .. }) => {
                println!();
                if let Some(error) = persist_error {
                    eprintln!("{}", format!("Warning: {}", error).yellow());
                }
                return;
            }
            Some(TurnProgress::Failed { partial, error }) => {
                if !partial.is_empty() {
                    println!();
                }
                eprintln!("{}", format!("Error: {}", error).red());
                return;
            }
            None => return,
        }
    }
}

async fn list_models_with_fallback(client: &OllamaClient) -> Vec<String> {
    match client.list_models().await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => {
            println!("{}", "No models installed on the endpoint.".yellow());
            FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
        }
        Err(e) => {
            println!(
                "{}",
                format!("Could not list models ({}); assuming defaults.", e).yellow()
            );
            FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // ===== Backend Initialization =====
    let config = ConfigService::new()
        .context("Failed to locate configuration")?
        .get_config();

    let user_id = UserService::new()
        .context("Failed to locate user identity")?
        .user_id()
        .context("Failed to establish user identity")?;

    let history = match &config.history_dir {
        Some(dir) => JsonHistoryRepository::new(dir),
        None => JsonHistoryRepository::default_location(),
    }
    .context("Failed to open history store")?;

    let client = OllamaClient::new(&config.endpoint);

    let models = list_models_with_fallback(&client).await;
    let model = if models.contains(&config.default_model) {
        config.default_model.clone()
    } else {
        models[0].clone()
    };

    let mut controller = ConversationController::new(
        Arc::new(history),
        Arc::new(client.clone()),
        &config,
        user_id,
    )
    .await;
    controller.set_model(model.as_str());

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Lochat ===".bright_magenta().bold());
    println!(
        "{}",
        format!("Endpoint {} | model {}", config.endpoint, model).bright_black()
    );
    println!(
        "{}",
        "Type a message to chat, '/help' for commands, '/quit' to exit.".bright_black()
    );
    println!();

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match Command::parse(trimmed) {
                    Command::Say(input) => {
                        controller.begin_turn(&input).await;
                        stream_response(&mut controller).await;
                        println!();
                    }
                    Command::NewChat => {
                        controller.new_chat();
                        println!("{}", "Started a new chat.".bright_black());
                    }
                    Command::History => print_history(&controller),
                    Command::Load(index) => match controller.load_chat(index) {
                        Ok(()) => {
                            if let Some(transcript) = controller.active_transcript() {
                                println!(
                                    "{}",
                                    format!("Loaded '{}'.", transcript.title).bright_black()
                                );
                                for message in &transcript.messages {
                                    let label = match message.role {
                                        MessageRole::User => ">>".green().to_string(),
                                        _ => "<<".bright_blue().to_string(),
                                    };
                                    println!("{} {}", label, message.content);
                                }
                            }
                        }
                        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                    },
                    Command::Delete(index) => match controller.delete_chat(index).await {
                        Ok(()) => println!("{}", "Deleted.".bright_black()),
                        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                    },
                    Command::ClearHistory => match controller.clear_history().await {
                        Ok(()) => println!("{}", "History cleared.".bright_black()),
                        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                    },
                    Command::Models => {
                        for name in list_models_with_fallback(&client).await {
                            let marker = if name == controller.context().model {
                                "*"
                            } else {
                                " "
                            };
                            println!("{} {}", marker, name);
                        }
                    }
                    Command::Model(name) => {
                        println!("{}", format!("Using model {}.", name).bright_black());
                        controller.set_model(name);
                    }
                    Command::System(None) => {
                        println!("{}", controller.context().system_prompt.bright_black());
                    }
                    Command::System(Some(prompt)) => {
                        controller.set_system_prompt(prompt);
                        println!("{}", "System prompt updated.".bright_black());
                    }
                    Command::Attach(path) => match controller.attach_file(Path::new(&path)) {
                        Ok(chars) => println!(
                            "{}",
                            format!(
                                "Extracted {} characters; they attach to your next message.",
                                chars
                            )
                            .bright_black()
                        ),
                        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                    },
                    Command::Detach => {
                        controller.clear_file_context();
                        println!("{}", "File context cleared.".bright_black());
                    }
                    Command::Help => print_help(),
                    Command::Quit => {
                        println!("{}", "Goodbye!".bright_green());
                        break;
                    }
                    Command::Unknown(input) => {
                        println!(
                            "{}",
                            format!("Unknown command: {} (try /help)", input).bright_black()
                        );
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type '/quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_is_submission() {
        assert_eq!(
            Command::parse("hello there"),
            Command::Say("hello there".to_string())
        );
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/new"), Command::NewChat);
        assert_eq!(Command::parse("/load 2"), Command::Load(2));
        assert_eq!(Command::parse("/model mistral"), Command::Model("mistral".to_string()));
        assert_eq!(Command::parse("/system"), Command::System(None));
        assert_eq!(
            Command::parse("/system Be terse."),
            Command::System(Some("Be terse.".to_string()))
        );
        assert_eq!(
            Command::parse("/attach notes.txt"),
            Command::Attach("notes.txt".to_string())
        );
        assert_eq!(Command::parse("/quit"), Command::Quit);
    }

    #[test]
    fn test_parse_bad_index_is_unknown() {
        assert_eq!(
            Command::parse("/load two"),
            Command::Unknown("/load two".to_string())
        );
    }
}
