//! KraftCloud instance CLI.
//!
//! This is the entry point for the `kcinstance` binary. It drives the
//! reconciliation engine against the live API and prints state records as
//! JSON.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kraftcloud_client::{HttpInstanceClient, ProviderConfig};
use kraftcloud_resource::{
    InstanceConfig, InstanceDataSource, InstanceId, InstanceLifecycle, InstanceResource,
    InstancesDataSource, ResourceError, ServiceConfig, ServiceGroupConfig,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Manage KraftCloud instances.
#[derive(Parser, Debug)]
#[command(name = "kcinstance")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API endpoint.
    #[arg(long, env = "KRAFTCLOUD_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// API user, for accounts that authenticate with user and token.
    #[arg(long, env = "KRAFTCLOUD_USER", global = true)]
    user: Option<String>,

    /// API token.
    #[arg(long, env = "KRAFTCLOUD_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an instance and print its state.
    Create(CreateArgs),
    /// Print the server's view of an instance.
    Get {
        /// Instance UUID.
        uuid: InstanceId,
    },
    /// Build a state record for an existing instance.
    Import {
        /// Instance UUID.
        uuid: String,
    },
    /// List instances.
    List,
    /// Delete an instance.
    Delete {
        /// Instance UUID.
        uuid: InstanceId,
    },
}

#[derive(clap::Args, Debug)]
struct CreateArgs {
    /// Image reference.
    #[arg(long)]
    image: String,

    /// Public port.
    #[arg(long)]
    port: Option<i64>,

    /// Port inside the instance; defaults to the public port.
    #[arg(long, requires = "port")]
    destination_port: Option<i64>,

    /// Protocol handler (tls, http, redirect); may be repeated.
    #[arg(long = "handler", requires = "port")]
    handlers: Vec<String>,

    /// Memory in megabytes.
    #[arg(long)]
    memory_mb: Option<i64>,

    /// Startup argument; may be repeated.
    #[arg(long = "arg", allow_hyphen_values = true)]
    args: Vec<String>,

    /// Start the instance on incoming traffic.
    #[arg(long)]
    autostart: bool,
}

impl CreateArgs {
    fn to_config(&self) -> InstanceConfig {
        let service_group = self.port.map(|port| ServiceGroupConfig {
            services: vec![ServiceConfig {
                port,
                destination_port: self.destination_port,
                handlers: (!self.handlers.is_empty())
                    .then(|| self.handlers.iter().cloned().collect::<BTreeSet<_>>()),
            }],
        });

        InstanceConfig {
            image: self.image.clone(),
            args: (!self.args.is_empty()).then(|| self.args.clone()),
            memory_mb: self.memory_mb,
            autostart: self.autostart.then_some(true),
            service_group,
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,kraftcloud=debug"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    // Flags were already merged with the environment by clap; the provider
    // layer fills in anything still unset.
    let provider = ProviderConfig {
        endpoint: args.endpoint,
        user: args.user,
        token: args.token,
    };
    let config = provider.resolve().context("invalid connection configuration")?;
    let client = Arc::new(HttpInstanceClient::new(config)?);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            canceller.cancel();
        }
    });

    let resource = InstanceResource::new(Arc::clone(&client));

    match args.command {
        Command::Create(create) => match resource.create(&token, &create.to_config()).await {
            Ok(state) => print_json(&state)?,
            Err(ResourceError::PartialCreate {
                uuid,
                partial_state,
                source,
            }) => {
                print_json(&partial_state)?;
                anyhow::bail!(
                    "instance {uuid} was created but its status could not be fetched ({source}); \
                     run `kcinstance import {uuid}` once the API is reachable"
                );
            }
            Err(e) => return Err(e.into()),
        },
        Command::Get { uuid } => {
            let state = InstanceDataSource::new(client).read(&token, &uuid).await?;
            print_json(&state)?;
        }
        Command::Import { uuid } => {
            let state = resource.import(&token, &uuid).await?;
            print_json(&state)?;
        }
        Command::List => {
            let instances = InstancesDataSource::new(client).read(&token).await?;
            print_json(&instances)?;
        }
        Command::Delete { uuid } => {
            resource.delete(&token, &uuid).await?;
            tracing::info!(uuid = %uuid, "Done");
        }
    }

    Ok(())
}
