//! CLI for the simlink session client.
//!
//! Drives a client against the in-process simulated host so the connection
//! loop, reconnects and sampling can be watched without a real simulator.

mod demo;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use simlink::provider::{Sample, Value};
use simlink::simulated::SimulatedHost;
use simlink::{ClientConfig, Schema, SimClient};
use tracing_subscriber::EnvFilter;

use crate::demo::{Control, Engine, Position};

/// simlink: resilient session client for a simulation host.
#[derive(Parser)]
#[command(name = "simlink", version, about)]
struct Cli {
    /// Path to a JSON client config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Client name, overriding the config file.
    #[arg(long, global = true)]
    client_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a demo client against the simulated host and print its values.
    Run {
        /// How long to run, in seconds.
        #[arg(long, default_value = "10")]
        duration: u64,

        /// Time between printed snapshots, in milliseconds.
        #[arg(long, default_value = "1000")]
        print_interval: u64,

        /// Number of connection attempts the host refuses before accepting.
        #[arg(long, default_value = "0")]
        fail_first: u32,

        /// End the host session after this many seconds to show a reconnect.
        #[arg(long)]
        quit_after: Option<u64>,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective client configuration as JSON.
    Config,
}

/// Output format for snapshots.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_ref(), cli.client_name).and_then(|config| {
        match cli.command {
            Commands::Run {
                duration,
                print_interval,
                fail_first,
                quit_after,
                format,
            } => cmd_run(
                config,
                Duration::from_secs(duration),
                Duration::from_millis(print_interval),
                fail_first,
                quit_after.map(Duration::from_secs),
                &format,
            ),
            Commands::Config => cmd_config(&config),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(
    path: Option<&PathBuf>,
    client_name: Option<String>,
) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(name) = client_name {
        config.client_name = name;
    }
    config.validate()?;
    Ok(config)
}

/// Implements `simlink config`.
fn cmd_config(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Implements `simlink run`.
fn cmd_run(
    config: ClientConfig,
    duration: Duration,
    print_interval: Duration,
    fail_first: u32,
    quit_after: Option<Duration>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if print_interval.is_zero() {
        return Err("print interval must be non-zero".into());
    }

    let host = SimulatedHost::new();
    host.fail_next_opens(fail_first);
    host.set_sample(
        Engine::ID,
        Sample::new(vec![
            Value::Float64(2350.0),
            Value::Int32(1),
            Value::Text("Cessna 172".to_string()),
        ]),
    );

    let client = SimClient::new(host.provider(), config)?;
    client.register_schema::<Position>()?;
    client.register_schema::<Engine>()?;
    client.register_event_set::<Control>()?;
    client.start()?;

    let started = Instant::now();
    let mut quit_pending = quit_after;
    let mut strobes = false;

    while started.elapsed() < duration {
        std::thread::sleep(print_interval);

        if let Some(after) = quit_pending
            && started.elapsed() >= after
        {
            tracing::info!("ending host session");
            host.quit_session();
            quit_pending = None;
        }

        print_snapshot(&client, started.elapsed(), format);

        strobes = !strobes;
        if strobes {
            client.send_event(Control::Strobes);
        } else {
            client.send_event_with_data(Control::ParkingBrakes, 1);
        }
    }

    client.dispose();
    client.join();

    let sessions = host.sessions();
    let transmitted: usize = sessions.iter().map(|s| s.transmitted.len()).sum();
    println!();
    println!("Connection attempts: {}", host.open_attempts().len());
    println!("Sessions: {}", sessions.len());
    println!("Events transmitted: {transmitted}");
    for (i, session) in sessions.iter().enumerate() {
        println!(
            "  Session {i}: position requests={}, engine requests={}",
            session.request_count(Position::ID),
            session.request_count(Engine::ID),
        );
    }

    Ok(())
}

fn print_snapshot(client: &SimClient, elapsed: Duration, format: &OutputFormat) {
    let position = client.get::<Position>();
    let engine = client.get::<Engine>();

    match format {
        OutputFormat::Text => {
            println!(
                "[{:>6.1}s] {:<12} lat={:.4} lon={:.4} alt={:.0}ft rpm={:.0} aircraft={}",
                elapsed.as_secs_f64(),
                format!("{:?}", client.state()),
                position.latitude,
                position.longitude,
                position.altitude,
                engine.rpm,
                if engine.aircraft.is_empty() { "-" } else { engine.aircraft.as_str() },
            );
        }
        OutputFormat::Json => {
            let line = serde_json::json!({
                "elapsed_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "connected": client.is_connected(),
                "state": format!("{:?}", client.state()),
                "position": position.to_json(),
                "engine": engine.to_json(),
            });
            println!("{line}");
        }
    }
}
