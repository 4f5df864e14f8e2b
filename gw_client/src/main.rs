//! Interactive shell for a gamewire bridge.
//!
//! Connects over WebSocket, optionally logs in, then reads commands from
//! stdin until `quit` or end of input.

use anyhow::{Context, Result};
use gamewire::{Body, Registration, opcode};
use gw_client::{
    commands::{self, Command},
    config::ClientConfig,
    session::GameSession,
};
use log::warn;
use pico_args::Arguments;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "\
Talk to a game server through a gamewire bridge

USAGE:
  gw_client [OPTIONS]

OPTIONS:
  --url URL             Bridge URL  [default: env BRIDGE_URL or ws://localhost:8080]
  --email EMAIL         Log in on startup
  --password PASS       Password for --email

FLAGS:
  -h, --help            Print help information

ENVIRONMENT:
  REQUEST_TIMEOUT_MS    Per-request timeout (default 15000)
  OPEN_TIMEOUT_MS       WebSocket handshake timeout (default 5000)
  CORRELATION_MODE      'sequence' (default) or 'category'
  SESSION_ID            Session token to resume on connect
  RUST_LOG              Log filter (default warn)
";

struct Args {
    url: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut pargs = Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        url: pargs.opt_value_from_str("--url")?,
        email: pargs.opt_value_from_str("--email")?,
        password: pargs.opt_value_from_str("--password")?,
    };

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let config = ClientConfig::from_env(args.url)?;
    config.validate()?;

    let session = GameSession::new(config);
    let _notifications = print_notifications(&session);

    println!("Connecting to {}...", session.connection().config().url);
    session.connect().await.context("Failed to connect")?;
    println!("Connected ({}).", session.connection().state());

    if let (Some(email), Some(password)) = (args.email, args.password) {
        match session.login(&email, &password).await {
            Ok(_) => println!("Logged in as {email}."),
            Err(e) => println!("Login failed: {e}"),
        }
    }

    println!("Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match commands::parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        if !execute(&session, command).await {
            break;
        }
    }

    session.close();
    println!("Disconnected.");
    Ok(())
}

/// Run one command; returns `false` when the shell should exit.
async fn execute(session: &GameSession, command: Command) -> bool {
    match command {
        Command::Login { email, password } => match session.login(&email, &password).await {
            Ok(body) => println!("Logged in: {body}"),
            Err(e) => println!("Login failed: {e}"),
        },
        Command::Register {
            email,
            password,
            name,
        } => match session.register(&email, &password, &name).await {
            Ok(body) => println!("Registered: {body}"),
            Err(e) => println!("Registration failed: {e}"),
        },
        Command::Heartbeat => match session.heartbeat().await {
            Ok(rtt) => println!("Heartbeat OK in {rtt:?}"),
            Err(e) => println!("Heartbeat failed: {e}"),
        },
        Command::Logout => match session.logout().await {
            Ok(()) => println!("Logged out."),
            Err(e) => println!("Logout failed: {e}"),
        },
        Command::Raw { opcode: op, body } => {
            let body = body.map_or(Body::Empty, Body::Json);
            match session.request_raw(op, body).await {
                Ok(reply) => println!(
                    "{} seq={}: {:?}",
                    opcode::describe(reply.opcode),
                    reply.sequence,
                    reply.body
                ),
                Err(e) => println!("{} failed: {e}", opcode::describe(op)),
            }
        }
        Command::State => println!(
            "{} ({} pending, session {})",
            session.connection().state(),
            session.connection().pending_count(),
            if session.connection().session_token().is_some() {
                "stored"
            } else {
                "none"
            }
        ),
        Command::Help => println!("{}", commands::USAGE),
        Command::Quit => return false,
    }
    true
}

/// Print server notifications as they arrive.
fn print_notifications(session: &GameSession) -> Vec<Registration> {
    (opcode::NTF_PLAYER_JOINED..=opcode::NTF_ROOM_CLOSED)
        .filter(|&op| opcode::name(op).is_some())
        .map(|op| {
            session.registry().register(op, move |envelope| {
                match envelope.body.as_json() {
                    Some(body) => println!("\n[{}] {body}", opcode::describe(op)),
                    None => warn!("{} without a JSON body", opcode::describe(op)),
                }
                Ok(())
            })
        })
        .collect()
}
