// ABOUTME: Entry point for the armada CLI application.
// ABOUTME: Parses arguments, dispatches commands, and owns the panic boundary.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use armada::callbacks::{CallbackContext, CallbackPoint, CallbackRunner};
use armada::cloud::memory::MemoryFleet;
use armada::config::{self, Manifest, RunContext, RunMode, RunOptions, Stack};
use armada::error::{Error, Result};
use armada::metrics::LogMetrics;
use armada::notify::LogNotifier;
use armada::pipeline::Pipeline;
use armada::types::RegionId;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // The run executes on a spawned task so a panicking pipeline worker
    // crosses exactly one boundary: it is logged here and mapped to a
    // dedicated exit code instead of being swallowed or reused as control
    // flow.
    let outcome = tokio::spawn(run(cli)).await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                let payload = join_error.into_panic();
                payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string())
            } else {
                join_error.to_string()
            };
            tracing::error!(reason = reason.as_str(), "run aborted abnormally");
            eprintln!("Fatal: {reason}");
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { stack, force } => {
            let cwd = env::current_dir().expect("Failed to get current directory");
            config::init_manifest(&cwd, stack.as_deref(), force)
        }
        Commands::Deploy { run } => execute(RunMode::Deploy, run).await,
        Commands::Delete { run } => execute(RunMode::Delete, run).await,
    }
}

async fn execute(mode: RunMode, args: RunArgs) -> Result<()> {
    let cwd = env::current_dir().expect("Failed to get current directory");

    let manifest = match &args.manifest {
        Some(path) => Manifest::load(path)?,
        None => Manifest::discover(&cwd)?,
    };

    // Apply the stack filter before anything touches a provider
    let manifest = if let Some(stack) = &args.stack {
        manifest.for_stack(stack)?
    } else {
        manifest
    };

    let region = args
        .region
        .as_deref()
        .map(|r| RegionId::new(r).map_err(|e| Error::InvalidOptions(e.to_string())))
        .transpose()?;

    let options = RunOptions {
        region,
        stack: args.stack.clone(),
        timeout: Duration::from_secs(args.timeout),
        poll_interval: Duration::from_secs(args.polling_interval),
        force_manifest_capacity: args.force_manifest_capacity,
        complete_canary: args.complete_canary,
        disable_metrics: args.disable_metrics,
    };

    let callbacks = Arc::new(CallbackRunner::new(&cwd));
    let ctx = RunContext::new(
        mode,
        &options,
        Arc::new(LogNotifier),
        Arc::new(LogMetrics),
        None,
    )?
    .with_callbacks(callbacks.clone());
    ctx.validate_against(&manifest)?;

    // Real provider bindings are embedded by library consumers; the binary
    // itself only carries the in-memory provider for rehearsal runs.
    if !args.rehearse {
        return Err(Error::ProviderUnavailable);
    }

    // Run pre-deploy callback for each stack before anything touches a
    // provider
    for stack in manifest.stacks.iter() {
        let context = callback_context(stack, &manifest.env, mode);

        if let Some(result) = callbacks.run(CallbackPoint::PreDeploy, &context).await
            && !result.success
        {
            eprintln!("Pre-deploy callback failed for {}", stack.name);
            if !result.stderr.is_empty() {
                eprintln!("{}", result.stderr);
            }
            return Err(Error::Callback("pre-deploy callback failed".to_string()));
        }
    }

    println!(
        "Rehearsing {} of {} stack(s) against the in-memory provider",
        ctx.mode.as_str(),
        manifest.stacks.len()
    );

    let fleet = MemoryFleet::new();
    let pipeline = Pipeline::build(&manifest, |region| Ok(fleet.client(region)))?;

    if let Err(e) = pipeline.run(&ctx).await {
        for stack in manifest.stacks.iter() {
            let context = callback_context(stack, &manifest.env, mode);

            if let Some(result) = callbacks.run(CallbackPoint::OnError, &context).await
                && !result.success
            {
                eprintln!("Warning: on-error callback failed for {}", stack.name);
            }
        }
        return Err(e.into());
    }

    // Run post-deploy callback for each stack
    for stack in manifest.stacks.iter() {
        let context = callback_context(stack, &manifest.env, mode);

        if let Some(result) = callbacks.run(CallbackPoint::PostDeploy, &context).await
            && !result.success
        {
            eprintln!("Warning: post-deploy callback failed for {}", stack.name);
        }
    }

    println!("{} complete!", ctx.mode.as_str());
    Ok(())
}

fn callback_context(stack: &Stack, env: &str, mode: RunMode) -> CallbackContext {
    CallbackContext {
        stack: stack.name.clone(),
        env: env.to_string(),
        mode: mode.as_str().to_string(),
        regions: stack
            .regions
            .iter()
            .map(|r| r.region.to_string())
            .collect(),
        new_version: None,
    }
}
