// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "armada")]
#[command(about = "Zero-downtime fleet deployment for autoscaling groups across regions")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a template armada.yml manifest
    Init {
        /// Stack name to seed the template with
        #[arg(short, long)]
        stack: Option<String>,

        /// Overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },

    /// Deploy every stack of the manifest
    Deploy {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Tear down every resource the manifest's stacks own
    Delete {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Manifest path (defaults to discovery from the working directory)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Restrict execution to one region
    #[arg(long)]
    pub region: Option<String>,

    /// Restrict execution to one stack
    #[arg(long)]
    pub stack: Option<String>,

    /// Deadline for every polling loop, in seconds
    #[arg(long, default_value = "3600", value_name = "SECONDS")]
    pub timeout: u64,

    /// Sleep between polling queries, in seconds
    #[arg(long = "polling-interval", default_value = "30", value_name = "SECONDS")]
    pub polling_interval: u64,

    /// Always apply the manifest-declared capacity, regardless of strategy
    #[arg(long)]
    pub force_manifest_capacity: bool,

    /// Complete a previously started canary instead of starting one
    #[arg(long)]
    pub complete_canary: bool,

    /// Skip metrics collection and persistence
    #[arg(long)]
    pub disable_metrics: bool,

    /// Run against the in-memory provider instead of a real cloud
    #[arg(long)]
    pub rehearse: bool,
}
