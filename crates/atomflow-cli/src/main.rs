//! atomflow - validate and compile primitive-based workflow plans.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use atomflow_core::{
    Category, Plan, PrimitiveId, PrimitiveKind, PrimitiveStatus, Severity, Toolchain,
    ValidationReport, Violation,
};

#[derive(Parser)]
#[command(name = "atomflow", version, about = "Primitive-based workflow toolchain")]
struct Cli {
    /// Primitives directory (discovered when omitted)
    #[arg(long, global = true)]
    primitives: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Particle,
    Atom,
    Molecule,
    Organism,
}

impl From<KindArg> for PrimitiveKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Particle => Self::Particle,
            KindArg::Atom => Self::Atom,
            KindArg::Molecule => Self::Molecule,
            KindArg::Organism => Self::Organism,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List primitives from the registry index
    List {
        #[arg(long)]
        kind: Option<KindArg>,
        /// Category name (data, transform, control, ...)
        #[arg(long)]
        category: Option<String>,
        /// Lifecycle status; defaults to stable, `any` lifts the filter
        #[arg(long, default_value = "stable")]
        status: String,
    },
    /// Show one primitive's definition
    Show { id: String },
    /// Keyword search over the catalog
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Validate a plan file (YAML or JSON)
    Validate { plan: PathBuf },
    /// Validate a plan and compile it for a target engine
    Compile {
        plan: PathBuf,
        #[arg(long, default_value = "n8n")]
        target: String,
        /// Write the workflow here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let toolchain = Toolchain::new(cli.primitives.clone())?;

    match cli.command {
        Command::List {
            kind,
            category,
            status,
        } => {
            let category = category.as_deref().map(parse_category).transpose()?;
            let status = parse_status(&status)?;
            let entries =
                toolchain
                    .registry()
                    .list_with_status(kind.map(Into::into), category, status)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    let category = entry
                        .category
                        .map(|c| format!("{c:?}").to_lowercase())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{}  {:<20} {:<13} {}",
                        entry.id.as_str().cyan(),
                        entry.name,
                        category,
                        entry.description.as_deref().unwrap_or("")
                    );
                }
                println!("{} primitive(s)", entries.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => {
            let id: PrimitiveId = id.parse()?;
            let primitive = toolchain.registry().get(&id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&*primitive)?);
            } else {
                let meta = &primitive.metadata;
                println!(
                    "{} {} v{} ({:?}, {:?})",
                    meta.id.as_str().cyan().bold(),
                    meta.name.bold(),
                    meta.version,
                    meta.kind,
                    meta.status,
                );
                println!("  {}", meta.description);
                if !primitive.interface.inputs.is_empty() {
                    println!("  {}", "inputs:".bold());
                    for input in &primitive.interface.inputs {
                        let required = if input.required { " (required)" } else { "" };
                        println!(
                            "    {:<16} {}{}",
                            input.name,
                            input.field_type.name(),
                            required.dimmed()
                        );
                    }
                }
                if !primitive.interface.outputs.is_empty() {
                    println!("  {}", "outputs:".bold());
                    for output in &primitive.interface.outputs {
                        println!("    {:<16} {}", output.name, output.field_type.name());
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Search { query, limit } => {
            let hits = toolchain.registry().search(&query, limit)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("no matches for '{query}'");
            } else {
                for hit in &hits {
                    println!(
                        "{:>4}  {}  {:<20} {}",
                        hit.score,
                        hit.id.as_str().cyan(),
                        hit.name,
                        hit.description
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { plan } => {
            let plan = read_plan(&plan)?;
            let report = toolchain.validate(&plan);
            print_report(&report, cli.json)?;
            Ok(if report.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Compile {
            plan,
            target,
            output,
        } => {
            let plan = read_plan(&plan)?;
            let outcome = toolchain.check_and_compile(&plan, &target)?;
            if !outcome.report.valid {
                print_report(&outcome.report, cli.json)?;
                return Ok(ExitCode::FAILURE);
            }
            for warning in &outcome.report.warnings {
                if !cli.json {
                    print_violation(warning);
                }
            }
            let workflow = outcome
                .workflow
                .context("valid plan must produce a workflow")?;
            let rendered = serde_json::to_string_pretty(&workflow)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    if !cli.json {
                        println!("{} wrote {}", "ok:".green().bold(), path.display());
                    }
                }
                None => println!("{rendered}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_category(raw: &str) -> Result<Category> {
    serde_yaml::from_str(raw).with_context(|| format!("unknown category '{raw}'"))
}

fn parse_status(raw: &str) -> Result<Option<PrimitiveStatus>> {
    if raw.eq_ignore_ascii_case("any") {
        return Ok(None);
    }
    let status =
        serde_yaml::from_str(raw).with_context(|| format!("unknown status '{raw}'"))?;
    Ok(Some(status))
}

/// Parse a plan document, choosing the format by file extension.
fn read_plan(path: &Path) -> Result<Plan> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let plan = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Plan::from_json_str(&text)?,
        _ => Plan::from_yaml_str(&text)?,
    };
    Ok(plan)
}

fn print_report(report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for violation in &report.violations {
        print_violation(violation);
    }
    for warning in &report.warnings {
        print_violation(warning);
    }
    if report.valid {
        println!("{} plan is valid", "ok:".green().bold());
    } else {
        println!(
            "{} {} violation(s)",
            "invalid:".red().bold(),
            report.violations.len()
        );
    }
    Ok(())
}

fn print_violation(violation: &Violation) {
    let label = match violation.level {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue().bold(),
    };
    let location = violation
        .node_id
        .as_deref()
        .map(|n| format!(" [{n}]"))
        .unwrap_or_default();
    println!("{label} {}{location}: {}", violation.code.dimmed(), violation.message);
}
