use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use roster_core::record::recipients;
use roster_core::{CoreError, Directory, LdapDirectory, OfflineDirectory, Roster, RosterConfig};

#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Search people and groups in an LDAP directory and add members to groups"
)]
struct Cli {
    /// Path to config file (default: ~/.config/roster/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve requests from an LDIF file instead of a live server
    #[arg(long, value_name = "LDIF")]
    offline: Option<PathBuf>,

    /// LDAP URL (overrides config)
    #[arg(short = 'H', long)]
    url: Option<String>,

    /// Base DN for people searches (overrides config)
    #[arg(long)]
    user_base_dn: Option<String>,

    /// Base DN for group searches (overrides config)
    #[arg(long)]
    group_base_dn: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search people. Quote a term to match it as a whole word.
    Users {
        query: Vec<String>,

        /// Print a `; `-separated recipients line instead of records
        #[arg(long)]
        emails: bool,
    },
    /// Search POSIX and Active Directory groups
    Groups { query: Vec<String> },
    /// Add people to a POSIX group
    Add {
        /// Group id (its cn)
        #[arg(short, long)]
        group: String,

        #[arg(required = true)]
        users: Vec<String>,

        /// Only report who is already a member; change nothing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("roster={}", level).parse()?)
                .add_directive(format!("roster_core={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut overrides: Vec<(&str, &str)> = Vec::new();
    if let Some(url) = cli.url.as_deref() {
        overrides.push(("ldap.url", url));
    }
    if let Some(dn) = cli.user_base_dn.as_deref() {
        overrides.push(("user_base_dn", dn));
    }
    if let Some(dn) = cli.group_base_dn.as_deref() {
        overrides.push(("group_base_dn", dn));
    }
    let config = RosterConfig::load(cli.config.as_deref(), &overrides).map_err(report)?;
    debug!("config: {:?}", config);

    match cli.offline {
        Some(path) => {
            info!("using offline directory {}", path.display());
            let directory = OfflineDirectory::from_ldif_file(&path).map_err(report)?;
            run(Roster::from_config(directory, &config).map_err(report)?, cli.command).await
        }
        None => {
            let directory = LdapDirectory::new(config.ldap.clone()).map_err(report)?;
            run(Roster::from_config(directory, &config).map_err(report)?, cli.command).await
        }
    }
}

async fn run<D: Directory>(roster: Roster<D>, command: Command) -> Result<()> {
    match command {
        Command::Users { query, emails } => {
            let users = roster.search_users(&query.join(" ")).await.map_err(report)?;
            if emails {
                println!("{}", recipients(&users));
            } else {
                print_json(&users)?;
            }
        }
        Command::Groups { query } => {
            let groups = roster.search_groups(&query.join(" ")).await.map_err(report)?;
            print_json(&groups)?;
        }
        Command::Add {
            group,
            users,
            dry_run: true,
        } => {
            let split = roster
                .preview_membership(&group, &users)
                .await
                .map_err(report)?;
            print_json(&split)?;
        }
        Command::Add { group, users, .. } => {
            let receipt = roster.submit_membership(&group, &users).await.map_err(report)?;
            print_json(&receipt)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prefix an error with its caller-facing kind.
fn report(err: CoreError) -> anyhow::Error {
    anyhow!("{}: {}", err.kind(), err)
}
