//! keytuner - key finding and key-finder parameter search
//!
//! Subcommands:
//! - `keytuner find <input>` - Global (and optionally local) key of one file
//! - `keytuner evaluate --dataset <manifest>` - Score one pair on a dataset
//! - `keytuner optimize` - Genetic search for the best pair
//! - `keytuner params [profiles|transitions] [NAME]` - Inspect the bundled library
//! - `keytuner config` - Print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use keyconf::KeyConfig;
use keyfinder::{KeyFinder, ParameterRegistry};
use keytuner::{telemetry, Dataset, Evaluator, Optimizer, Registries};
use pitch_slices::{FileSource, Observation, ObservationSource};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Exit code when the generation cap ended a search that had not converged.
const EXIT_CAPPED: u8 = 2;

#[derive(Parser)]
#[command(name = "keytuner")]
#[command(about = "Two-pass HMM key finding and genetic parameter search")]
#[command(version)]
struct Cli {
    /// Configuration file, replacing ./keytuner.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the key of one music file
    Find {
        /// MIDI or pitch-class text file (or a sequence with --sequence)
        input: String,

        /// Read the input as comma-separated pitch classes
        #[arg(long)]
        sequence: bool,

        /// Also print one local key per slice
        #[arg(long)]
        local: bool,

        /// Key profile used for emissions
        #[arg(short, long, default_value = "sapp")]
        profile: String,

        /// Take the minor half from this profile instead
        #[arg(long)]
        minor_profile: Option<String>,

        /// Key transition between local keys
        #[arg(short, long, default_value = "ktg_exponential10")]
        transition: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Score one (profile, transition) pair against a dataset
    Evaluate {
        /// Dataset manifest (defaults to evaluation.dataset)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        #[arg(short, long, default_value = "sapp")]
        profile: String,

        #[arg(short, long, default_value = "ktg_exponential10")]
        transition: String,

        /// Worker threads (defaults to evaluation.workers)
        #[arg(short, long)]
        workers: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Search for the key profile and key transition that fit a dataset best
    Optimize {
        /// Dataset manifest (defaults to evaluation.dataset)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        #[arg(long)]
        population_size: Option<usize>,

        /// Rejected generations tolerated before switching axis
        #[arg(long)]
        swap_threshold: Option<u32>,

        /// Stop after this many generations
        #[arg(long)]
        max_generations: Option<u64>,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        workers: Option<usize>,

        /// Seed key profiles
        #[arg(long, value_delimiter = ',')]
        profiles: Option<Vec<String>>,

        /// Seed key transitions
        #[arg(long, value_delimiter = ',')]
        transitions: Option<Vec<String>>,

        /// Only score the initial populations
        #[arg(long)]
        just_evaluate: bool,

        #[arg(long)]
        json: bool,
    },

    /// List the bundled parameters or print one of them
    Params {
        #[arg(value_enum, default_value = "profiles")]
        kind: ParamKind,

        /// Print this entry's values
        name: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParamKind {
    Profiles,
    Transitions,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (mut config, sources) = KeyConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Commands::Optimize {
        population_size,
        swap_threshold,
        max_generations,
        seed,
        workers,
        profiles,
        transitions,
        ..
    } = &cli.command
    {
        let opt = &mut config.optimizer;
        if let Some(n) = population_size {
            opt.population_size = *n;
        }
        if let Some(n) = swap_threshold {
            opt.evolution_swap_threshold = *n;
        }
        if let Some(n) = max_generations {
            opt.max_generations = Some(*n);
        }
        if let Some(n) = seed {
            opt.seed = Some(*n);
        }
        if let Some(names) = profiles {
            opt.initial_key_profiles = names.clone();
        }
        if let Some(names) = transitions {
            opt.initial_key_transitions = names.clone();
        }
        if let Some(n) = workers {
            config.evaluation.workers = *n;
        }
    }
    config.validate().context("Invalid configuration")?;

    telemetry::init(&config.telemetry.log_level)?;
    tracing::debug!(files = ?sources.files, env = ?sources.env_overrides, "configuration loaded");

    match cli.command {
        Commands::Find {
            input,
            sequence,
            local,
            profile,
            minor_profile,
            transition,
            json,
        } => {
            find(&input, sequence, local, &profile, minor_profile.as_deref(), &transition, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Evaluate {
            dataset,
            profile,
            transition,
            workers,
            json,
        } => {
            let manifest = dataset_path(dataset, &config)?;
            let dataset = Dataset::load(&manifest, &FileSource)?;
            let evaluator = Evaluator::new(&dataset, workers.unwrap_or(config.evaluation.workers))?;
            let registries = Registries::defaults()?;
            evaluate(&evaluator, &registries, &profile, &transition, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Optimize {
            dataset,
            just_evaluate,
            json,
            ..
        } => {
            let manifest = dataset_path(dataset, &config)?;
            let dataset = Dataset::load(&manifest, &FileSource)?;
            let evaluator = Evaluator::new(&dataset, config.evaluation.workers)?;
            let mut registries = Registries::defaults()?;

            let outcome = Optimizer::new(config.optimizer.clone(), &evaluator)?
                .just_evaluate(just_evaluate)
                .run(&mut registries)?;

            let profile_values = registries.profiles.get_as_text(&outcome.key_profile)?;
            let transition_values = registries.transitions.get_as_text(&outcome.key_transition)?;
            if json {
                let report = json!({
                    "outcome": outcome,
                    "key_profile_values": profile_values,
                    "key_transition_values": transition_values,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("key_profile\t{}", outcome.key_profile);
                println!("key_transition\t{}", outcome.key_transition);
                println!("error\t{}", outcome.error);
                println!(
                    "generations\t{} profile, {} transition",
                    outcome.profile_generations, outcome.transition_generations
                );
                println!("{}\t{}", outcome.key_profile, profile_values);
                println!("{}\t{}", outcome.key_transition, transition_values);
            }

            if outcome.converged || just_evaluate {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_CAPPED))
            }
        }
        Commands::Params { kind, name } => {
            let registries = Registries::defaults()?;
            let registry = match kind {
                ParamKind::Profiles => &registries.profiles,
                ParamKind::Transitions => &registries.transitions,
            };
            params(registry, name.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            for file in &sources.files {
                eprintln!("# loaded {}", file.display());
            }
            print!("{}", config.to_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn dataset_path(cli_path: Option<PathBuf>, config: &KeyConfig) -> Result<PathBuf> {
    cli_path
        .or_else(|| config.evaluation.dataset.clone())
        .context("No dataset: pass --dataset or set evaluation.dataset")
}

fn find(
    input: &str,
    sequence: bool,
    local: bool,
    profile: &str,
    minor_profile: Option<&str>,
    transition: &str,
    json: bool,
) -> Result<()> {
    let observation = if sequence {
        Observation::from_sequence(input).context("Invalid pitch-class sequence")?
    } else {
        FileSource
            .parse(Path::new(input))
            .with_context(|| format!("Failed to read {input}"))?
    };

    let mut registries = Registries::defaults()?;
    let profile = match minor_profile {
        Some(minor) => registries.profiles.mix(profile, minor)?,
        None => profile.to_string(),
    };
    let finder = KeyFinder::from_registries(
        &registries.profiles,
        &registries.transitions,
        &profile,
        transition,
    )?;
    let analysis = finder.find(&observation)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("{}", analysis.global_key);
    if local {
        for (slice, key) in analysis.slice_keys().iter().enumerate() {
            match key {
                Some(key) => println!("{slice}\t{key}"),
                None => println!("{slice}\t-"),
            }
        }
    }
    Ok(())
}

fn evaluate(
    evaluator: &Evaluator<'_>,
    registries: &Registries,
    profile: &str,
    transition: &str,
    json: bool,
) -> Result<()> {
    let outcomes = evaluator.evaluate_files(registries, profile, transition);
    let total: f64 = outcomes.iter().map(|o| o.error).sum();

    if json {
        let report = json!({
            "key_profile": profile,
            "key_transition": transition,
            "error": total,
            "files": outcomes,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let show = |key: Option<keyfinder::Key>| key.map_or_else(|| "-".to_string(), |k| k.to_string());
    for outcome in &outcomes {
        println!(
            "{}\t{}\t{}\t{:.1}",
            outcome.path.display(),
            show(outcome.truth),
            show(outcome.guess),
            outcome.score
        );
    }
    println!("error\t{total}");
    Ok(())
}

fn params(registry: &ParameterRegistry, name: Option<&str>) -> Result<()> {
    match name {
        Some(name) => println!("{}", registry.get_as_text(name)?),
        None => {
            for name in registry.names() {
                match registry.ratio(&name) {
                    Some(ratio) => println!("{name}\tratio {ratio}"),
                    None => println!("{name}"),
                }
            }
        }
    }
    Ok(())
}
