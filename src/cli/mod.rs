pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::error::Result;
use crate::games::GameRegistry;
use crate::http::ApiState;
use crate::provider::ec2::Ec2Gateway;
use crate::provider::ssm::ParameterStore;
use crate::provider::CloudGateway;
use crate::provisioner::Provisioner;
use crate::reconciler::Reconciler;
use crate::state::{ServerState, SnapshotState};

#[derive(Parser)]
#[command(name = "gscp")]
#[command(version)]
#[command(about = "A multi-tenant control plane for ephemeral game servers")]
#[command(long_about = "Launch, pause, resume, and snapshot dedicated game servers on cloud VMs.\n\nMultiple control-plane hosts can share one fleet: state converges through cloud tags and a shared parameter store, not through a single database.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch a new server
    Launch {
        /// Registered game name (e.g. factorio, lgsm-vhserver)
        game: String,

        #[arg(short, long)]
        region: Option<String>,

        #[arg(long)]
        instance_type: Option<String>,

        #[arg(short, long)]
        name: Option<String>,

        /// Config override, key=value, may be repeated
        #[arg(short = 'c', long = "config", value_name = "KEY=VALUE")]
        config: Vec<String>,

        /// JSON file of config overrides
        #[arg(long)]
        config_file: Option<PathBuf>,

        /// Upload a local file into the container, local:remote, may be repeated
        #[arg(long = "upload", value_name = "LOCAL:REMOTE")]
        upload: Vec<String>,

        /// Restore from a snapshot instead of a fresh image
        #[arg(long)]
        from_snapshot: Option<String>,

        /// Allocate and associate an elastic IP at launch
        #[arg(long)]
        pin_ip: bool,
    },

    /// Permanently terminate a server
    Destroy {
        id: String,
    },

    /// Terminate every known server
    DestroyAll,

    /// Stop the underlying VM
    Pause {
        id: String,
    },

    /// Start the underlying VM and restart its container
    Resume {
        id: String,
    },

    /// Stop the container without stopping the VM
    Stop {
        id: String,
    },

    /// Allocate and associate an elastic IP
    PinIp {
        id: String,
    },

    /// Release a pinned elastic IP
    UnpinIp {
        id: String,
    },

    /// Run a command on a server's host, or print the ssh invocation
    Ssh {
        id: String,

        #[arg(short, long)]
        exec: Option<String>,
    },

    /// List servers, or describe one in detail
    Status {
        id: Option<String>,

        #[arg(short, long)]
        detailed: bool,
    },

    /// Force a reconcile pass against the cloud
    Reconcile,

    /// Run the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },

    /// Snapshot management
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Snapshot a server's root volume
    Create {
        server_id: String,
    },
    /// List snapshots
    List,
    /// Delete a snapshot
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Set a configuration key
    Set {
        key: String,
        value: String,
    },
    /// Open the configuration file in $EDITOR
    Edit,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        // Config-only subcommands never need to talk to the cloud.
        if let Commands::Config { command } = self.command {
            return match command {
                ConfigCommands::Show => commands::config::show().await,
                ConfigCommands::Set { key, value } => commands::config::set(key, value).await,
                ConfigCommands::Edit => commands::config::edit().await,
            };
        }

        let config = AppConfig::load()?;
        let state_dir = config.state_dir()?;
        std::fs::create_dir_all(&state_dir)?;

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let gateway: Arc<dyn CloudGateway> = Arc::new(Ec2Gateway::new(sdk_config.clone()));
        let params = Arc::new(ParameterStore::new(&sdk_config));
        let servers = Arc::new(ServerState::open(&state_dir)?);
        let snapshots = Arc::new(SnapshotState::open(&state_dir)?);
        let games = Arc::new(GameRegistry::load_default(&state_dir));
        let reconciler = Arc::new(Reconciler::new(
            gateway.clone(),
            params.clone(),
            servers.clone(),
            snapshots.clone(),
            config.tool_name.clone(),
            config.extra_regions.clone(),
            &state_dir,
        ));
        let provisioner = Arc::new(Provisioner::new(
            config.clone(),
            gateway.clone(),
            params.clone(),
            servers.clone(),
            snapshots.clone(),
            games.clone(),
            reconciler.clone(),
        ));

        match self.command {
            Commands::Config { .. } => unreachable!("handled above"),

            Commands::Launch {
                game,
                region,
                instance_type,
                name,
                config: overrides,
                config_file,
                upload,
                from_snapshot,
                pin_ip,
            } => {
                commands::launch::execute(
                    &provisioner,
                    game,
                    region,
                    instance_type,
                    name,
                    overrides,
                    config_file,
                    upload,
                    from_snapshot,
                    pin_ip,
                )
                .await
            }

            Commands::Destroy { id } => commands::server::destroy(&provisioner, &id).await,
            Commands::DestroyAll => commands::server::destroy_all(&provisioner).await,
            Commands::Pause { id } => commands::server::pause(&provisioner, &id).await,
            Commands::Resume { id } => commands::server::resume(&provisioner, &id).await,
            Commands::Stop { id } => commands::server::stop(&provisioner, &id).await,
            Commands::PinIp { id } => commands::server::pin_ip(&provisioner, &id).await,
            Commands::UnpinIp { id } => commands::server::unpin_ip(&provisioner, &id).await,

            Commands::Ssh { id, exec } => {
                commands::ssh::execute(&config, &servers, &reconciler, &id, exec.as_deref()).await
            }

            Commands::Status { id, detailed } => {
                commands::status::execute(&servers, &reconciler, id.as_deref(), detailed).await
            }

            Commands::Reconcile => commands::reconcile::execute(&reconciler).await,

            Commands::Serve { port } => {
                let api_state = Arc::new(ApiState {
                    provisioner: provisioner.clone(),
                    servers: servers.clone(),
                    snapshots: snapshots.clone(),
                    reconciler: reconciler.clone(),
                });
                commands::serve::execute(api_state, port).await
            }

            Commands::Snapshot { command } => match command {
                SnapshotCommands::Create { server_id } => commands::snapshot::create(&provisioner, &server_id).await,
                SnapshotCommands::List => commands::snapshot::list(&snapshots).await,
                SnapshotCommands::Delete { id } => commands::snapshot::delete(&provisioner, &id).await,
            },
        }
    }
}
