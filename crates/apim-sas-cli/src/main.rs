//! apim-sas - print management tokens, git clone URLs and admin SSO links
//!
//! Reads `instances.json` from a configuration directory and prints exactly one
//! line to stdout. Diagnostics go to stderr through `env_logger` (`RUST_LOG`).
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::debug;

use apim_sas_client::{ClientConfig, ManagementClient};
use apim_sas_common::InstanceRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing instances.json
    config_dir: PathBuf,

    /// What to print
    #[arg(value_enum, default_value_t = Operation::Sas)]
    operation: Operation,

    /// Instance name to use from the registry
    #[arg(long, default_value = "apim")]
    instance: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    /// Management API `Authorization` header value
    Sas,
    /// Ready to use `git clone` command line
    Git,
    /// One-time administrator SSO URL
    Adminurl,
}

async fn run(args: &Args) -> Result<String> {
    let registry = InstanceRegistry::from_config_dir(&args.config_dir)
        .with_context(|| format!("Failed to load registry from '{}'", args.config_dir.display()))?;
    debug!(
        "Loaded {} instance(s): {}",
        registry.len(),
        registry.names().collect::<Vec<_>>().join(", ")
    );

    let client = ManagementClient::new(registry, ClientConfig::default().with_timeout(args.timeout))?;
    let instance = args.instance.as_str();

    let line = match args.operation {
        Operation::Sas => client.management_token(instance)?,
        Operation::Git => {
            let url = client
                .git_clone_url_for(instance)
                .await
                .context("Failed to obtain git credentials")?;
            format!("git clone {url}")
        }
        Operation::Adminurl => client
            .admin_sso_link(instance)
            .await
            .context("Failed to generate administrator SSO URL")?,
    };

    Ok(line)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let line = run(&args).await?;
    println!("{line}");
    Ok(())
}
