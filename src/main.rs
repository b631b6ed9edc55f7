use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dnsmasq_supervisor::{Config, DnsmasqSupervisor, Lease, Result};

const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "dnsmasq-supervisor")]
#[command(author, version, about = "Runs dnsmasq for a bridge and reads its leases", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run dnsmasq until Ctrl-C; SIGHUP reloads the config and restarts it
    Run,
    ShowConfig,
    /// Print the arguments dnsmasq would be started with
    ShowArgs,
    ListLeases,
}

/// SIGHUP on unix; never fires elsewhere.
struct Hangup(#[cfg(unix)] tokio::signal::unix::Signal);

impl Hangup {
    fn new() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self(signal(SignalKind::hangup())?))
        }
        #[cfg(not(unix))]
        {
            Ok(Self())
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        {
            self.0.recv().await;
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = Config::load_or_create(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!("Starting dnsmasq with config: {:?}", cli.config);
            let mut supervisor = DnsmasqSupervisor::new(config);
            supervisor.start()?;

            let mut hangup = Hangup::new()?;
            let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);

            loop {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        result?;
                        info!("Received shutdown signal, stopping dnsmasq...");
                        return supervisor.stop();
                    }
                    _ = hangup.recv() => {
                        info!("Received SIGHUP, reloading {:?} and restarting dnsmasq", cli.config);
                        match Config::load_or_create(&cli.config) {
                            Ok(config) => supervisor.set_config(config),
                            Err(error) => warn!("Keeping previous config: {}", error),
                        }
                        supervisor.restart()?;
                    }
                    _ = liveness.tick() => {
                        if !supervisor.is_running() {
                            warn!("dnsmasq is no longer running, exiting");
                            return Ok(());
                        }
                    }
                }
            }
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::ShowArgs => {
            let supervisor = DnsmasqSupervisor::new(config);
            for arg in supervisor.args()? {
                println!("{}", arg);
            }
            Ok(())
        }
        Commands::ListLeases => {
            let supervisor = DnsmasqSupervisor::new(config);
            let leases = supervisor.read_leases()?;

            if leases.is_empty() {
                println!("No leases.");
            } else {
                println!(
                    "{:<18} {:<16} {:<20} {:<24} {:<24} {:<10}",
                    "MAC Address", "IP Address", "Hostname", "Client ID", "Expires At", "Remaining"
                );
                println!("{}", "-".repeat(117));

                for lease in leases {
                    print_lease(&lease);
                }
            }

            Ok(())
        }
    }
}

fn print_lease(lease: &Lease) {
    let expires = match lease.expires_at() {
        Some(expires_at) => expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    };
    let remaining = match lease.remaining_seconds() {
        None => "infinite".to_string(),
        Some(0) => "expired".to_string(),
        Some(seconds) => format!("{}s", seconds),
    };

    println!(
        "{:<18} {:<16} {:<20} {:<24} {:<24} {:<10}",
        lease.mac_address,
        lease.ip_address,
        lease.known_hostname().unwrap_or("-"),
        lease.known_client_id().unwrap_or("-"),
        expires,
        remaining
    );
}
