// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use shipwright::output::OutputMode;
use shipwright::types::{EnvironmentName, ServiceName};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(about = "Plan, lock and release services across environments")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a shipwright.yml template in the current directory
    Init {
        /// Project name
        #[arg(long)]
        project: Option<String>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Manage environments
    #[command(subcommand)]
    Env(EnvCommands),

    /// Build and release services into an environment
    Deploy {
        /// Target environment
        #[arg(short, long)]
        environment: EnvironmentName,

        /// Release every plan without prompting
        #[arg(short = 'y', long)]
        yes: bool,

        /// Services to deploy (default: all)
        services: Vec<ServiceName>,
    },

    /// Release images from one environment into another
    Promote {
        /// Source environment
        #[arg(long)]
        from: EnvironmentName,

        /// Target environment
        #[arg(long)]
        to: EnvironmentName,

        /// Release every plan without prompting
        #[arg(short = 'y', long)]
        yes: bool,

        /// Services to promote (default: all)
        services: Vec<ServiceName>,
    },

    /// Show persisted services of an environment
    Status {
        #[arg(short, long)]
        environment: EnvironmentName,
    },
}

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Register a READY environment in the local backend
    Create {
        name: EnvironmentName,

        #[command(flatten)]
        gcp: GcpArgs,

        #[command(flatten)]
        aws: AwsArgs,
    },
}

#[derive(Args)]
pub struct GcpArgs {
    /// GCP project id
    #[arg(long, requires_all = ["gcp_region", "gcp_bucket"])]
    pub gcp_project: Option<String>,

    #[arg(long, requires = "gcp_project")]
    pub gcp_region: Option<String>,

    #[arg(long, requires = "gcp_project")]
    pub gcp_bucket: Option<String>,
}

#[derive(Args)]
pub struct AwsArgs {
    /// AWS account id
    #[arg(long, requires_all = ["aws_region", "aws_bucket"])]
    pub aws_account: Option<String>,

    #[arg(long, requires = "aws_account")]
    pub aws_region: Option<String>,

    #[arg(long, requires = "aws_account")]
    pub aws_bucket: Option<String>,
}
