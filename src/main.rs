//! # purrtainer
//!
//! Command-line client for Portainer-compatible container management
//! servers: list environments, containers and stacks, drive container
//! lifecycle, read logs, run one-off commands, and attach an interactive
//! terminal to a running container.
//!
//! ## Architecture
//!
//! ```text
//! main.rs        — CLI parsing, tracing setup, subcommand dispatch
//! client.rs      — REST client (reqwest)
//! terminal/      — attach session: controller, decoder, filter, scrollback
//! credentials.rs — stored server address and tokens
//! prefs.rs       — hidden stacks
//! config.rs      — TOML + env configuration
//! ```
//!
//! Diagnostics go to stderr (`RUST_LOG` or `[logging] level`); stdout carries
//! only command output.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use purrtainer::client::ContainerAction;
use purrtainer::filter::{search_containers, stack_containers, visible_stacks};
use purrtainer::terminal::dispatch::submit;
use purrtainer::terminal::{AttachTarget, Cursor, Notice, WsConnector};
use purrtainer::{Config, CredentialStore, HiddenStacks, PortainerClient, SessionController};

/// Portainer from the terminal.
#[derive(Parser)]
#[command(name = "purrtainer", version)]
struct Cli {
    /// Path to TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and store the session token.
    Login {
        /// Server base address, e.g. http://192.168.1.10:9000
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: String,
        /// Read from PURRTAINER_PASSWORD, else prompted on stdin.
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        api_key: String,
    },
    /// Forget stored tokens (the server address is kept).
    Logout,
    /// List environments.
    Envs,
    /// List containers in an environment.
    Containers {
        env: String,
        /// Only containers whose name or image contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one container.
    Inspect { env: String, id: String },
    Start { env: String, id: String },
    Stop { env: String, id: String },
    Restart { env: String, id: String },
    Kill { env: String, id: String },
    /// Print the last lines of a container's output.
    Logs {
        env: String,
        id: String,
        #[arg(long, default_value_t = 100)]
        tail: u32,
    },
    /// Run a command through /bin/sh in a container.
    Exec {
        env: String,
        id: String,
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// List stacks in an environment.
    Stacks {
        env: u64,
        /// Include hidden stacks.
        #[arg(long)]
        all: bool,
    },
    /// Show a stack and its containers.
    Stack { env: String, id: u64 },
    /// Hide a stack from `stacks`.
    HideStack { id: u64 },
    /// Show a previously hidden stack again.
    ShowStack { id: u64 },
    /// Attach an interactive terminal to a container. EOF (Ctrl-D) detaches.
    Attach { env: String, id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("purrtainer: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("purrtainer: {e}");
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn open_credentials(config: &Config) -> Result<CredentialStore, Box<dyn std::error::Error>> {
    Ok(CredentialStore::open(config.storage.credentials_path())?)
}

fn client(config: &Config) -> Result<PortainerClient, Box<dyn std::error::Error>> {
    let store = open_credentials(config)?;
    let mut credentials = store.credentials().clone();
    credentials.apply_env();
    Ok(PortainerClient::from_credentials(&credentials, &config.http)?)
}

fn read_password() -> std::io::Result<String> {
    if let Ok(password) = std::env::var("PURRTAINER_PASSWORD") {
        return Ok(password);
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[allow(clippy::too_many_lines)]
async fn run(command: Commands, config: &Config) -> CliResult {
    match command {
        Commands::Login {
            url,
            username,
            password,
            api_key,
        } => {
            let password = match password {
                Some(p) => p,
                None => read_password()?,
            };
            let jwt = PortainerClient::new(&url, None, &config.http)?
                .authenticate(&username, &password, &api_key)
                .await?;
            let mut store = open_credentials(config)?;
            store.login(&url, Some(&api_key), &jwt)?;
            info!("Stored credentials at {}", store.path().display());
            println!("Logged in to {}", url.trim_end_matches('/'));
        }
        Commands::Logout => {
            let mut store = open_credentials(config)?;
            store.logout()?;
            println!("Logged out");
        }
        Commands::Envs => {
            for e in client(config)?.endpoints().await? {
                println!(
                    "{:>4}  {:<24} {:<10} {:<4}  {}",
                    e.id,
                    e.name,
                    e.kind_label(),
                    e.status_label(),
                    e.url
                );
            }
        }
        Commands::Containers { env, search } => {
            let containers = client(config)?.containers(&env, true).await?;
            for c in search_containers(&containers, search.as_deref().unwrap_or("")) {
                println!(
                    "{}  {:<28} {:<32} {:<10} {}",
                    c.short_id(),
                    c.display_name(),
                    c.image,
                    c.state,
                    c.status
                );
            }
        }
        Commands::Inspect { env, id } => {
            let d = client(config)?.container(&env, &id).await?;
            println!("Name:     {}", d.display_name());
            println!("Id:       {}", d.id);
            println!("Image:    {}", d.config.image);
            println!("Status:   {}", d.state.status);
            println!("Created:  {}", d.created);
            println!("Started:  {}", d.state.started_at);
            println!("Restarts: {}", d.restart_count);
            if !d.state.running {
                println!("Exit:     {}", d.state.exit_code);
            }
            if let Some(cmd) = &d.config.cmd {
                println!("Command:  {}", cmd.join(" "));
            }
        }
        Commands::Start { env, id } => action(config, &env, &id, ContainerAction::Start).await?,
        Commands::Stop { env, id } => action(config, &env, &id, ContainerAction::Stop).await?,
        Commands::Restart { env, id } => {
            action(config, &env, &id, ContainerAction::Restart).await?;
        }
        Commands::Kill { env, id } => action(config, &env, &id, ContainerAction::Kill).await?,
        Commands::Logs { env, id, tail } => {
            let logs = client(config)?.container_logs(&env, &id, tail).await?;
            if logs.is_empty() {
                eprintln!("No logs found.");
            }
            print!("{logs}");
        }
        Commands::Exec { env, id, command } => {
            let output = client(config)?.exec(&env, &id, &command.join(" ")).await?;
            if output.is_empty() {
                eprintln!("(no output)");
            }
            print!("{output}");
        }
        Commands::Stacks { env, all } => {
            let stacks = client(config)?.stacks(env).await?;
            let hidden = HiddenStacks::open(config.storage.hidden_stacks_path())?;
            let shown = if all {
                stacks.iter().collect()
            } else {
                visible_stacks(&stacks, &hidden)
            };
            for s in shown {
                let marker = if hidden.is_hidden(s.id) { " (hidden)" } else { "" };
                println!(
                    "{:>4}  {:<28} {:<8} {}{marker}",
                    s.id,
                    s.name,
                    s.kind_label(),
                    if s.is_active() { "active" } else { "inactive" }
                );
            }
        }
        Commands::Stack { env, id } => {
            let client = client(config)?;
            let stack = client.stack(id).await?;
            println!(
                "{} ({}, {})",
                stack.name,
                stack.kind_label(),
                if stack.is_active() { "active" } else { "inactive" }
            );
            let containers = client.containers(&env, true).await?;
            for c in stack_containers(&containers, &stack) {
                println!(
                    "  {}  {:<28} {:<10} {}",
                    c.short_id(),
                    c.display_name(),
                    c.state,
                    c.status
                );
            }
        }
        Commands::HideStack { id } => {
            HiddenStacks::open(config.storage.hidden_stacks_path())?.hide(id)?;
        }
        Commands::ShowStack { id } => {
            HiddenStacks::open(config.storage.hidden_stacks_path())?.show(id)?;
        }
        Commands::Attach { env, id } => attach(config, env, id).await?,
    }
    Ok(())
}

async fn action(config: &Config, env: &str, id: &str, action: ContainerAction) -> CliResult {
    client(config)?.container_action(env, id, action).await?;
    println!("{id}: {}", action.as_str());
    Ok(())
}

/// Interactive attach: stdin lines go out through the dispatcher, scrollback
/// is streamed to stdout, notices go to stderr. Returns on close or EOF.
async fn attach(config: &Config, env: String, id: String) -> CliResult {
    let store = open_credentials(config)?;
    let mut credentials = store.credentials().clone();
    credentials.apply_env();

    let connector = WsConnector::new(config.terminal.deferred_decode_threshold);
    let mut controller = SessionController::new(connector, config.terminal.connect_timeout());
    controller.attach(&credentials, AttachTarget::new(env, id))?;

    let mut cursor = Cursor::default();
    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(cursor.advance(controller.scrollback()).as_bytes())?;
        stdout.flush()?;

        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    controller.session_mut().set_input(line);
                    if let Err(e) = submit(&mut controller) {
                        eprintln!("\npurrtainer: {e}");
                    }
                }
                Ok(None) => {
                    debug!("stdin closed, detaching");
                    break;
                }
                Err(e) => {
                    eprintln!("\npurrtainer: failed to read input: {e}");
                    break;
                }
            },
            notice = controller.next_notice() => match notice {
                Some(Notice::Error(e)) => eprintln!("\npurrtainer: {e}"),
                Some(Notice::Closed { .. }) | None => {
                    stdout.write_all(cursor.advance(controller.scrollback()).as_bytes())?;
                    writeln!(stdout)?;
                    break;
                }
                Some(Notice::Opened | Notice::Output) => {}
            },
        }
    }

    controller.detach();
    Ok(())
}
