//! jackpropsd: inspect and drive the client property cache.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use jackprops::windows::WindowCandidate;
use jackprops::{Config, PropertyCache};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "jackpropsd", about = "Session-managed JACK client property cache")]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Seconds between two reconciliation cycles
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Session-manager control program
    #[arg(long, default_value = "ray_control")]
    control_program: String,

    /// Window lookup tool keyed by pid
    #[arg(long, default_value = "getwindidbypid")]
    pid_window_program: String,

    /// Window lookup tool keyed by title regex
    #[arg(long, default_value = "getwindidbyregexp")]
    title_window_program: String,

    /// Switch-to-or-launch tool
    #[arg(long, default_value = "switchto")]
    switch_program: String,

    /// Title prefix of the session manager's own windows
    #[arg(long, default_value = "RaySession")]
    session_label: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keep the cache synchronised until interrupted
    Watch,
    /// Print one property of a client
    Property {
        name: String,
        /// name, windowtitle, layer, guitoload, with_gui, clienttype,
        /// sessionname, clientid, port or pid
        property: String,
    },
    /// List window candidates of a client
    Windows {
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Search windows by owning pid and/or title pattern
    Search {
        #[arg(long)]
        pid: Option<u32>,
        #[arg(long)]
        title: Option<String>,
        /// many-titles or single-title
        #[arg(long, default_value = "many-titles")]
        option: String,
        #[arg(long)]
        json: bool,
    },
    /// Switch to a client's window, or launch its GUI
    Activate {
        name: String,
        #[arg(long)]
        window_id: Option<String>,
    },
    /// List every cached client
    Clients {
        #[arg(long)]
        json: bool,
    },
    /// List every layer seen
    Layers,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("JACKPROPS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            refresh_interval: Duration::from_secs(self.interval),
            control_program: self.control_program.clone(),
            pid_window_program: self.pid_window_program.clone(),
            title_window_program: self.title_window_program.clone(),
            switch_program: self.switch_program.clone(),
            session_manager_label: self.session_label.clone(),
            ..Config::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cache = match PropertyCache::with_command_gateway(cli.config()) {
        Ok(cache) => cache,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            eprintln!("jackpropsd: {e}");
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command;
    if !matches!(command, Command::Watch | Command::Search { .. }) {
        if let Some(report) = cache.refresh_now() {
            info!(?report, "initial reconciliation");
        }
    }

    match command {
        Command::Watch => return watch(cache),
        Command::Property { name, property } => match cache.get_property_named(&name, &property) {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => {}
            Err(e) => {
                eprintln!("jackpropsd: {e}");
                return ExitCode::FAILURE;
            }
        },
        Command::Windows { name, json } => {
            return print_windows(&cache.find_windows(&name), json);
        }
        Command::Search {
            pid,
            title,
            option,
            json,
        } => match cache.search_windows(pid, title.as_deref(), &option) {
            Ok(candidates) => return print_windows(&candidates, json),
            Err(e) => {
                eprintln!("jackpropsd: {e}");
                return ExitCode::FAILURE;
            }
        },
        Command::Activate { name, window_id } => {
            let activation = cache.activate(&name, window_id.as_deref());
            info!(%name, ?activation, "activate");
        }
        Command::Clients { json } => {
            let records = cache.records();
            if json {
                return print_json(&records);
            }
            for record in records {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.name,
                    record.port,
                    record.session_name.as_deref().unwrap_or("-"),
                    record.layer.as_deref().unwrap_or("-"),
                );
            }
        }
        Command::Layers => {
            for layer in cache.layers() {
                println!("{layer}");
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_windows(candidates: &[WindowCandidate], json: bool) -> ExitCode {
    if json {
        return print_json(&candidates);
    }
    for candidate in candidates {
        println!(
            "{}\t{}",
            candidate.window_id.as_deref().unwrap_or("-"),
            candidate.title
        );
    }
    ExitCode::SUCCESS
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("jackpropsd: {e}");
            ExitCode::FAILURE
        }
    }
}

fn watch(mut cache: PropertyCache) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("jackpropsd: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        cache.spawn_reconciler();
        info!("watching sessions, press Ctrl-C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to wait for Ctrl-C");
        }
        cache.shutdown().await;
        info!(clients = cache.records().len(), "stopped");
    });
    ExitCode::SUCCESS
}
