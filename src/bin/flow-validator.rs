//! # Intake Flow Validator
//!
//! Command-line tool for checking flow definitions and intake configuration
//! before they are deployed, and for walking a definition with a set of
//! answers to see which segments a respondent would be shown.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use intake_flow::config::ConfigManager;
use intake_flow::definition::FlowDefinitionSpec;
use intake_flow::fields::FieldValue;
use intake_flow::flow::{IntakeFlow, NavigationOutcome};
use intake_flow::FlowDefinition;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "flow-validator")]
#[command(about = "Validate intake flow definitions and configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a flow definition and report its structure
    Check {
        /// Definition file (.toml or .json)
        definition: PathBuf,
    },

    /// Answer a flow from a JSON object of field values and report the path taken
    Walk {
        definition: PathBuf,

        /// JSON file mapping field names to answers
        #[arg(short, long)]
        answers: PathBuf,

        /// Assemble and submit to an in-process store once the flow completes
        #[arg(long)]
        submit: bool,
    },

    /// Load and validate intake configuration
    Config {
        /// Configuration file (defaults to INTAKE_CONFIG_PATH)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Environment name (defaults to INTAKE_ENV)
        #[arg(short, long)]
        environment: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match cli.command {
        Commands::Check { definition } => check(&definition),
        Commands::Walk {
            definition,
            answers,
            submit,
        } => walk(&definition, &answers, submit).await,
        Commands::Config { path, environment } => check_config(path, environment),
    };

    if let Err(e) = result {
        error!("Validation failed: {e:#}");
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn load_definition(path: &Path) -> Result<FlowDefinition> {
    let spec = FlowDefinitionSpec::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    spec.build()
        .with_context(|| format!("building {}", path.display()))
}

fn check(path: &Path) -> Result<()> {
    let definition = load_definition(path)?;

    println!("Flow: {}", definition.name());
    println!("Fields: {}", definition.schema().len());
    println!("Segments:");
    for (index, segment) in definition.graph().segments().iter().enumerate() {
        let rules: usize = segment
            .field_names
            .iter()
            .map(|field| definition.validation().rules_for(field).len())
            .sum();
        println!(
            "  {index:>2}. {:<24} fields={} rules={} skip_rules={}{}",
            segment.id.as_str(),
            segment.field_names.len(),
            rules,
            segment.skip_rules.len(),
            if segment.is_conditional { " (conditional)" } else { "" }
        );
    }
    println!(
        "Disqualification rules: {}",
        definition.eligibility().rules().len()
    );
    println!("Derived rules: {}", definition.derived().rules().len());
    println!("OK");
    Ok(())
}

async fn walk(path: &Path, answers_path: &Path, submit: bool) -> Result<()> {
    let definition = Arc::new(load_definition(path)?);
    let raw = std::fs::read_to_string(answers_path)
        .with_context(|| format!("reading {}", answers_path.display()))?;
    let answers: BTreeMap<String, FieldValue> =
        serde_json::from_str(&raw).context("answers must be a JSON object")?;

    let config = intake_flow::config::IntakeConfig::default();
    let mut flow = IntakeFlow::from_config(Arc::clone(&definition), &config)?;
    flow.start()?;
    for (name, value) in answers {
        flow.set_field(&name, value)
            .with_context(|| format!("setting field {name}"))?;
    }

    let mut path_taken = vec![0];
    loop {
        match flow.next()? {
            NavigationOutcome::Advanced { to, .. } => path_taken.push(to),
            NavigationOutcome::Blocked(validation) => {
                println!("Blocked on segment {}:", validation.segment_id);
                for error in &validation.errors {
                    println!("  {}: {}", error.field, error.message);
                }
                bail!("answers do not complete the flow");
            }
            NavigationOutcome::Ineligible { segment_id, reason } => {
                println!("Ineligible at segment {segment_id}: {reason}");
                break;
            }
            NavigationOutcome::ReadyToSubmit => {
                println!("Ready to submit");
                break;
            }
            NavigationOutcome::Retreated { .. } | NavigationOutcome::Unchanged => break,
        }
    }

    let segments = definition.graph().segments();
    let names: Vec<&str> = path_taken
        .iter()
        .filter_map(|&index| segments.get(index).map(|s| s.id.as_str()))
        .collect();
    println!("Path: {}", names.join(" -> "));

    if submit && flow.state().is_active() {
        let receipt = flow.submit().await?;
        println!("{}", serde_json::to_string_pretty(&receipt.payload)?);
    }
    Ok(())
}

fn check_config(path: Option<PathBuf>, environment: Option<String>) -> Result<()> {
    let path = path.or_else(|| std::env::var("INTAKE_CONFIG_PATH").ok().map(PathBuf::from));
    let environment = environment.unwrap_or_else(ConfigManager::detect_environment);

    let manager = ConfigManager::load_with_env(path.as_deref(), &environment)?;
    println!("Environment: {}", manager.environment());
    println!("{}", serde_json::to_string_pretty(manager.config())?);
    println!("OK");
    Ok(())
}
