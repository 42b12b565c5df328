//! clusterprobe - cluster capability probes for end-to-end suites
//!
//! The `clusterprobe` command exposes the core library to shell-driven test
//! harnesses.
//!
//! ## Commands
//!
//! - `poll` / `assert`: re-run a command until stdout contains a marker
//! - `facts`: print the credential mode, infra platform and auth issuer
//! - `classify`: evaluate a named capability predicate
//! - `is-aws-sts` / `is-azure-wif`: evaluate a predicate over given facts
//! - `platform`: run a single-query platform probe
//! - `capture` / `restore`: fixture state bookkeeping
//!
//! Exit status is 0 for true/success, 1 for false/exhausted and 2 when a
//! predicate name is not registered.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use clusterprobe_core::{
    check_aws_sts, check_azure_wif, AdminCli, ClusterClassifier, PlatformProbe, ProbeConfig,
    ResourceRef, RestoreAction, RestoreContext, RetryOptions, RetryOutcome, RetryPoller,
    ShellCommandRunner,
};

const EXIT_FALSE: u8 = 1;
const EXIT_UNKNOWN_PREDICATE: u8 = 2;

#[derive(Parser)]
#[command(name = "clusterprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Poll and classify a cluster through its CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Admin kubeconfig appended to every cluster command
    #[arg(long, global = true, env = "KUBECONFIG_PATH")]
    kubeconfig: Option<PathBuf>,

    /// Cluster CLI binary (overrides CLUSTERPROBE_CLI)
    #[arg(long, global = true)]
    cli: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-run a command until its stdout contains EXPECTED
    Poll {
        /// Shell command line to run
        command: String,

        /// Literal, case-sensitive stdout marker
        expected: String,

        /// Retries after the first attempt (default: CLUSTERPROBE_RETRIES or 3)
        #[arg(short, long)]
        retries: Option<u32>,

        /// Milliseconds between attempts (default: CLUSTERPROBE_RETRY_INTERVAL_MS or 10000)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Like `poll`, but fail with a descriptive error when retries run out
    Assert {
        command: String,
        expected: String,
        #[arg(short, long)]
        retries: Option<u32>,
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Print the cluster facts used by the capability predicates (JSON)
    Facts,

    /// Evaluate a registered capability predicate against the cluster
    Classify {
        /// Predicate name, e.g. isAWSSTSCluster
        #[arg(required_unless_present = "list")]
        name: Option<String>,

        /// List registered predicate names instead
        #[arg(long, conflicts_with = "name")]
        list: bool,
    },

    /// Is this an AWS STS cluster? Evaluated over the given facts
    IsAwsSts {
        credential_mode: String,
        infra_platform: String,
        #[arg(default_value = "")]
        auth_issuer: String,
    },

    /// Is this an Azure Workload Identity cluster? Evaluated over the given facts
    IsAzureWif {
        credential_mode: String,
        infra_platform: String,
        #[arg(default_value = "")]
        auth_issuer: String,
    },

    /// Run a single-query platform probe
    Platform {
        #[arg(value_enum)]
        probe: ProbeArg,
    },

    /// Record a resource's current state before a test changes it
    Capture {
        /// Restore state file
        #[arg(short, long)]
        state: PathBuf,

        /// Resource kind, e.g. configmap
        kind: String,

        /// Resource name
        name: String,

        #[arg(short, long)]
        namespace: Option<String>,

        /// Mark the resource as modified (the test is about to change it)
        #[arg(short, long)]
        modified: bool,
    },

    /// Put every modified resource recorded in the state file back
    Restore {
        /// Restore state file
        #[arg(short, long)]
        state: PathBuf,

        /// Directory for re-applied manifests (default: next to the state file)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Keep the state file after restoring
        #[arg(long)]
        keep_state: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProbeArg {
    Edge,
    Nmstate,
    Ipi,
    Windows,
}

impl From<ProbeArg> for PlatformProbe {
    fn from(arg: ProbeArg) -> Self {
        match arg {
            ProbeArg::Edge => PlatformProbe::Edge,
            ProbeArg::Nmstate => PlatformProbe::NmState,
            ProbeArg::Ipi => PlatformProbe::Ipi,
            ProbeArg::Windows => PlatformProbe::WindowsNode,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    clusterprobe_core::init_tracing(cli.json, level);

    let config = load_config(&cli).context("Failed to read clusterprobe configuration")?;
    let runner = config.admin_runner();

    match cli.command {
        Commands::Poll {
            command,
            expected,
            retries,
            interval_ms,
        } => {
            let options = retry_options(&config, retries, interval_ms);
            cmd_poll(&runner, &config, &command, &expected, options).await
        }
        Commands::Assert {
            command,
            expected,
            retries,
            interval_ms,
        } => {
            let options = retry_options(&config, retries, interval_ms);
            cmd_assert(&runner, &config, &command, &expected, options).await
        }
        Commands::Facts => cmd_facts(&runner, &config).await,
        Commands::Classify { name, list } => match name {
            Some(name) if !list => cmd_classify(&runner, &config, &name).await,
            _ => cmd_list_predicates(&runner, &config),
        },
        Commands::IsAwsSts {
            credential_mode,
            infra_platform,
            auth_issuer,
        } => Ok(verdict(check_aws_sts(
            &credential_mode,
            &infra_platform,
            &auth_issuer,
        ))),
        Commands::IsAzureWif {
            credential_mode,
            infra_platform,
            auth_issuer,
        } => Ok(verdict(check_azure_wif(
            &credential_mode,
            &infra_platform,
            &auth_issuer,
        ))),
        Commands::Platform { probe } => cmd_platform(&runner, &config, probe.into()).await,
        Commands::Capture {
            state,
            kind,
            name,
            namespace,
            modified,
        } => {
            let resource = match namespace {
                Some(ns) => ResourceRef::namespaced(&kind, &name, &ns),
                None => ResourceRef::new(&kind, &name),
            };
            cmd_capture(&runner, &config, &state, resource, modified).await
        }
        Commands::Restore {
            state,
            work_dir,
            keep_state,
        } => cmd_restore(&runner, &state, work_dir.as_deref(), keep_state).await,
    }
}

/// Environment configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<ProbeConfig> {
    let mut config = ProbeConfig::from_env()?;
    if let Some(kubeconfig) = &cli.kubeconfig {
        config.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(binary) = &cli.cli {
        config.cli_binary = binary.clone();
    }
    Ok(config)
}

fn retry_options(
    config: &ProbeConfig,
    retries: Option<u32>,
    interval_ms: Option<u64>,
) -> RetryOptions {
    RetryOptions::new(
        retries.unwrap_or(config.retry.retries),
        interval_ms.unwrap_or(config.retry.interval_ms),
    )
}

fn verdict(matched: bool) -> ExitCode {
    println!("{matched}");
    if matched {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FALSE)
    }
}

type Runner = AdminCli<ShellCommandRunner>;

fn classifier<'a>(runner: &'a Runner, config: &ProbeConfig) -> ClusterClassifier<&'a Runner> {
    ClusterClassifier::from_config(runner, config)
}

/// Poll until the marker shows up; exit 1 when retries run out.
async fn cmd_poll(
    runner: &Runner,
    config: &ProbeConfig,
    command: &str,
    expected: &str,
    options: RetryOptions,
) -> Result<ExitCode> {
    let poller = RetryPoller::new(runner).with_command_timeout_ms(config.command_timeout_ms);

    match poller.run(command, expected, options).await {
        RetryOutcome::Success { attempts } => {
            println!("matched after {} attempt(s)", attempts);
            Ok(ExitCode::SUCCESS)
        }
        RetryOutcome::Exhausted {
            attempts,
            last_result,
        } => {
            println!(
                "no match after {} attempt(s); last exit code {}",
                attempts, last_result.exit_code
            );
            if !last_result.stdout.is_empty() {
                println!("{}", last_result.stdout.trim_end());
            }
            Ok(ExitCode::from(EXIT_FALSE))
        }
    }
}

async fn cmd_assert(
    runner: &Runner,
    config: &ProbeConfig,
    command: &str,
    expected: &str,
    options: RetryOptions,
) -> Result<ExitCode> {
    RetryPoller::new(runner)
        .with_command_timeout_ms(config.command_timeout_ms)
        .assert(command, expected, options)
        .await?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_facts(runner: &Runner, config: &ProbeConfig) -> Result<ExitCode> {
    let facts = classifier(runner, config).gather_facts().await;
    println!("{}", serde_json::to_string_pretty(&facts)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_classify(runner: &Runner, config: &ProbeConfig, name: &str) -> Result<ExitCode> {
    match classifier(runner, config).classify(name).await {
        Some(matched) => Ok(verdict(matched)),
        None => {
            eprintln!("Unknown predicate '{}'; try `clusterprobe classify --list`", name);
            Ok(ExitCode::from(EXIT_UNKNOWN_PREDICATE))
        }
    }
}

fn cmd_list_predicates(runner: &Runner, config: &ProbeConfig) -> Result<ExitCode> {
    for name in classifier(runner, config).registry().names() {
        println!("{}", name);
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_platform(
    runner: &Runner,
    config: &ProbeConfig,
    probe: PlatformProbe,
) -> Result<ExitCode> {
    Ok(verdict(classifier(runner, config).probe(probe).await))
}

/// Capture into the state file, creating it on first use.
async fn cmd_capture(
    runner: &Runner,
    config: &ProbeConfig,
    state: &Path,
    resource: ResourceRef,
    modified: bool,
) -> Result<ExitCode> {
    let mut ctx = RestoreContext::load_if_exists(state)
        .with_context(|| format!("Failed to read restore state {}", state.display()))?
        .unwrap_or_else(|| RestoreContext::new(&config.cli_binary));

    let snapshot = ctx
        .capture(runner, resource.clone())
        .await
        .with_context(|| format!("Failed to capture {}", resource))?;
    println!(
        "{} {}",
        resource,
        if snapshot.existed { "exists" } else { "absent" }
    );

    if modified {
        ctx.mark_modified(&resource)?;
    }

    ctx.save(state)
        .with_context(|| format!("Failed to write restore state {}", state.display()))?;
    Ok(ExitCode::SUCCESS)
}

/// Restore everything recorded in the state file.
async fn cmd_restore(
    runner: &Runner,
    state: &Path,
    work_dir: Option<&Path>,
    keep_state: bool,
) -> Result<ExitCode> {
    let Some(ctx) = RestoreContext::load_if_exists(state)
        .with_context(|| format!("Failed to read restore state {}", state.display()))?
    else {
        println!("Nothing to restore ({} not found)", state.display());
        return Ok(ExitCode::SUCCESS);
    };

    let default_work_dir = state
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("restore-manifests");
    let work_dir = work_dir.unwrap_or(&default_work_dir);

    let steps = ctx.restore(runner, work_dir).await?;

    let mut failed = 0usize;
    for step in &steps {
        match (&step.action, &step.result) {
            (RestoreAction::Skip, _) | (_, None) => {
                println!("{:<8} {}", step.action.to_string(), step.resource);
            }
            (_, Some(result)) => {
                println!(
                    "{:<8} {} (exit {})",
                    step.action.to_string(),
                    step.resource,
                    result.exit_code
                );
                if !result.succeeded() {
                    failed += 1;
                }
            }
        }
    }

    if failed > 0 {
        // The state file is the only copy of the original manifests.
        info!(
            failed = failed,
            state = %state.display(),
            "restore finished with failed steps; state kept for a rerun"
        );
        return Ok(ExitCode::from(EXIT_FALSE));
    }

    if !keep_state {
        std::fs::remove_file(state)
            .with_context(|| format!("Failed to remove restore state {}", state.display()))?;
    }
    Ok(ExitCode::SUCCESS)
}
