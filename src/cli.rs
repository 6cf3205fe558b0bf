use crate::config::launch::LaunchSpec;
use crate::config::mains::MainsEntry;
use crate::config::settings::SupervisorConfig;
use crate::core::supervisor::{supervisor_for, Supervisor};
use crate::core::types::{ContextSummary, RunOutcome};
use crate::demo;
use crate::logging::isolating;
use crate::namespace::{BaseNamespace, Policy};
use crate::observability::metrics::get_metrics;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum PolicyArg {
    /// Private namespace and property scope per guest
    Isolated,
    /// One namespace and one property scope for all guests
    Shared,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Isolated => Policy::Isolated,
            PolicyArg::Shared => Policy::SharedExtended,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one guest and wait for it
    Run {
        /// Isolation policy (overrides the config file)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Supervisor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Launch command line: [-cp LOCS] [-Dk=v]... (ENTRY | -jar LOC) [ARGS]...
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        launch: Vec<String>,
    },
    /// Run every guest listed in a mains file side by side
    Batch {
        /// File with one launch command line per line
        #[arg(long)]
        mains: PathBuf,
        /// Isolation policy (overrides the config file)
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Supervisor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the code locations and units the binary knows about
    List,
}

fn init_logging() -> Result<()> {
    let fallback = env_logger::Builder::from_default_env().build();
    isolating::install(Box::new(fallback), LevelFilter::Trace)?;
    Ok(())
}

fn load_config(path: Option<PathBuf>, policy: Option<PolicyArg>) -> Result<SupervisorConfig> {
    let mut config = match path {
        Some(path) => SupervisorConfig::load_from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SupervisorConfig::default(),
    };
    if let Some(policy) = policy {
        config = config.with_policy(policy.into());
    }
    Ok(config)
}

fn build_supervisor(config: SupervisorConfig) -> Box<dyn Supervisor> {
    log::info!("Starting {} supervisor", config.policy);
    supervisor_for(
        config,
        Arc::new(demo::demo_catalog()),
        Arc::new(BaseNamespace::builtin()),
    )
}

pub fn run() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            policy,
            config,
            launch,
        } => {
            let supervisor = build_supervisor(load_config(config, policy)?);
            let spec = LaunchSpec::parse_args(&launch)?;
            let outcome = supervisor.run_sync(&spec)?;
            if let RunOutcome::Failed(failure) = &outcome {
                eprintln!("{}", failure);
            }
            let code = outcome.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Batch {
            mains,
            policy,
            config,
        } => {
            let supervisor = build_supervisor(load_config(config, policy)?);
            let code = run_batch(supervisor.as_ref(), &mains)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::List => {
            let catalog = demo::demo_catalog();
            for location in catalog.locations() {
                println!("{}", location);
                if let Some(library) = catalog.get(&location) {
                    if let Some(main) = library.main() {
                        println!("  main: {}", main);
                    }
                    for name in library.names() {
                        let kind = library.get(name).map(|unit| unit.kind()).unwrap_or("?");
                        println!("  {:<24} {}", name, kind);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Launches every line of `mains`, waits for all guests and prints one
/// summary per guest. Returns the worst exit code.
fn run_batch(supervisor: &dyn Supervisor, mains: &Path) -> Result<i32> {
    let entries = MainsEntry::parse_file(mains)?;
    let mut worst = 0;
    let (tx, rx) = crossbeam_channel::unbounded::<(usize, ContextSummary)>();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                eprintln!("Skipping: {}", e);
                worst = worst.max(1);
                continue;
            }
        };
        match entry {
            MainsEntry::Sleep { duration, .. } => thread::sleep(duration),
            MainsEntry::Launch { line, words } => {
                let launched = LaunchSpec::parse_args(&words)
                    .map_err(anyhow::Error::from)
                    .and_then(|spec| supervisor.launch(&spec).map_err(anyhow::Error::from));
                let context = match launched {
                    Ok(context) => context,
                    Err(e) => {
                        eprintln!("Line {}: {:#}", line, e);
                        worst = worst.max(1);
                        continue;
                    }
                };
                let tx = tx.clone();
                thread::spawn(move || {
                    let outcome = RunOutcome::from(context.join());
                    let summary = ContextSummary {
                        id: context.id(),
                        label: context.label().to_string(),
                        outcome: match &outcome {
                            RunOutcome::Completed => "completed".to_string(),
                            RunOutcome::Failed(failure) => failure.to_string(),
                        },
                        exit_code: outcome.exit_code(),
                    };
                    let _ = tx.send((line, summary));
                });
            }
        }
    }
    drop(tx);

    let mut summaries: Vec<(usize, ContextSummary)> = rx.iter().collect();
    summaries.sort_by_key(|(line, _)| *line);
    for (line, summary) in &summaries {
        worst = worst.max(summary.exit_code);
        println!("line {:>3}: {}", line, serde_json::to_string(summary)?);
    }
    eprintln!("{}", serde_json::to_string(&get_metrics().summary())?);
    Ok(worst)
}
