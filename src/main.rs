use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wedding_sync::backend::Backend;
use wedding_sync::entities::Table;
use wedding_sync::viewmodels::{AddOutcome, Notice, ReserveOutcome, SubmitOutcome};
use wedding_sync::{AppState, Config, Connector, MemoryBackend};

const HELP: &str = "\
commands:
  gifts                                  list the registry
  reserve <id>                           reserve a gift
  add <name>                             suggest a gift
  rsvp <attendance> <name> [| message]   attendance: attending, not_attending, maybe
  guests                                 list the confirmations
  quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Gifts,
    Reserve(i64),
    Add(String),
    Rsvp {
        attendance: String,
        name: String,
        message: Option<String>,
    },
    Guests,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match word {
            "gifts" => Ok(Command::Gifts),
            "guests" => Ok(Command::Guests),
            "help" | "" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "reserve" => rest
                .parse()
                .map(Command::Reserve)
                .map_err(|_| format!("not a gift id: {rest:?}")),
            "add" => Ok(Command::Add(rest.to_string())),
            "rsvp" => {
                let (attendance, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let (name, message) = match tail.split_once('|') {
                    Some((name, message)) => (name, Some(message.trim().to_string())),
                    None => (tail, None),
                };
                Ok(Command::Rsvp {
                    attendance: attendance.to_string(),
                    name: name.trim().to_string(),
                    message,
                })
            }
            other => Err(format!("unknown command {other:?}, try `help`")),
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env();
    config.log_summary();

    if std::env::args().any(|arg| arg == "--memory") {
        info!("Using the in-memory backend");
        let backend = Arc::new(MemoryBackend::new());
        backend
            .seed(
                Table::Gifts,
                vec![
                    json!({ "name": "Stand mixer" }),
                    json!({ "name": "Bath towels" }),
                    json!({ "name": "Cast iron pan" }),
                ],
            )
            .await?;
        run(backend).await
    } else {
        let connector = Arc::new(Connector::from_config(&config));
        if connector.is_configured() && config.is_development() {
            if let Err(e) = connector.probe().await {
                warn!(error = %e, "Continuing without a verified connection");
            }
        }
        run(connector).await
    }
}

async fn run<B: Backend>(backend: Arc<B>) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(backend);
    let mut listener = state.mount().await;
    print_gifts(&state);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };
        match command {
            Command::Gifts => print_gifts(&state),
            Command::Guests => print_guests(&state),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Reserve(id) => match state.gifts.reserve(id).await {
                ReserveOutcome::Reserved => println!("Reserved."),
                ReserveOutcome::AlreadyTaken => println!("That gift is already reserved."),
                _ => print_gift_error(&state),
            },
            Command::Add(name) => match state.gifts.add_custom(&name).await {
                AddOutcome::Added(gift) => println!("Added \"{}\".", gift.name),
                _ => print_gift_error(&state),
            },
            Command::Rsvp {
                attendance,
                name,
                message,
            } => {
                let outcome = state
                    .rsvp
                    .submit(&name, &attendance, message.as_deref())
                    .await;
                if let SubmitOutcome::Failed(kind) = outcome {
                    error!(?kind, "RSVP failed");
                }
                match state.rsvp.snapshot().notice {
                    Some(Notice::Success(msg)) | Some(Notice::Error(msg)) => println!("{msg}"),
                    None => {}
                }
            }
        }
    }

    listener.teardown().await;
    info!("Bye");
    Ok(())
}

fn print_gifts<B: Backend>(state: &AppState<B>) {
    let snapshot = state.gifts.snapshot();
    if let Some(err) = &snapshot.error {
        println!("! {err}");
    }
    if snapshot.is_empty() {
        println!("The registry is empty.");
        return;
    }
    let stats = snapshot.stats();
    println!("{} available, {} reserved", stats.available, stats.reserved);
    for gift in &snapshot.gifts {
        let mark = if gift.is_taken { "x" } else { " " };
        println!("  [{mark}] #{} {}", gift.id, gift.name);
    }
}

fn print_gift_error<B: Backend>(state: &AppState<B>) {
    if let Some(err) = state.gifts.snapshot().error {
        println!("! {err}");
    }
}

fn print_guests<B: Backend>(state: &AppState<B>) {
    let snapshot = state.rsvp.snapshot();
    if let Some(err) = &snapshot.list_error {
        println!("! {err}");
        return;
    }
    let summary = snapshot.summary();
    println!(
        "{} attending, {} not attending, {} maybe",
        summary.attending, summary.not_attending, summary.maybe
    );
    for confirmation in &snapshot.confirmations {
        match &confirmation.message {
            Some(message) => println!("  {} ({}): {message}", confirmation.name, confirmation.attendance),
            None => println!("  {} ({})", confirmation.name, confirmation.attendance),
        }
    }
}
