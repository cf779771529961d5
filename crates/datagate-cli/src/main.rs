mod logging;
mod output;
mod settings;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use datagate_check::{
    CheckError, FieldRef, IntegrityReport, Replacements, remove_foreign_key_failures,
    replace_data_type_failures,
};
use datagate_core::{
    DataSet, Error as CoreError, RawData, Schema, SchemaDocument, Value, document_json_schema,
    validate_document_json,
};
use logging::init_logging;
use output::write_json_atomic;
use settings::{Settings, load_or_default};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("check error: {0}")]
    Check(#[from] CheckError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings error: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid schema document: {0}")]
    InvalidDocument(String),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("integrity check found {0} problem(s)")]
    Problems(usize),
}

#[derive(Parser, Debug)]
#[command(name = "datagate", version, about = "Datagate integrity checker")]
struct Cli {
    /// Settings file (defaults to ./datagate.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every integrity check and print the problems.
    Check(CheckArgs),
    /// Replace type failures, drop orphaned rows and write the result.
    Repair(RepairArgs),
    /// Describe a schema document.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Schema interchange document (JSON).
    #[arg(long, value_name = "PATH")]
    schema: PathBuf,
    /// Dataset: an object of tables, each a list of row objects or arrays.
    #[arg(long, value_name = "PATH")]
    data: PathBuf,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Print the report as JSON instead of markdown.
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Fail when any problem is found.
    #[arg(long, default_value_t = false)]
    strict: bool,
    /// Stop each scan after this many failures.
    #[arg(long)]
    max_failures: Option<usize>,
}

#[derive(Args, Debug)]
struct RepairArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output path for the repaired dataset.
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
    /// Replacement for failing cells, as TABLE.FIELD=VALUE (VALUE is JSON or text).
    #[arg(long = "replace", value_name = "TABLE.FIELD=VALUE")]
    replacements: Vec<String>,
    /// Remove only the first batch of foreign key failures.
    #[arg(long, default_value_t = false)]
    no_propagate: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Schema interchange document (JSON).
    #[arg(long, value_name = "PATH", required_unless_present = "emit_json_schema")]
    schema: Option<PathBuf>,
    /// Print the JSON Schema of the interchange document and exit.
    #[arg(long, default_value_t = false)]
    emit_json_schema: bool,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = load_or_default(cli.config.as_deref())?;
    init_logging(settings.log_file.as_deref())?;

    match cli.command {
        Command::Check(args) => run_check(args, settings),
        Command::Repair(args) => run_repair(args, &settings),
        Command::Inspect(args) => run_inspect(args),
    }
}

fn run_check(args: CheckArgs, mut settings: Settings) -> Result<(), CliError> {
    if args.max_failures.is_some() {
        settings.max_failures = args.max_failures;
    }
    let strict = args.strict || settings.strict;

    let schema = load_schema(&args.input.schema)?;
    let raw = load_raw(&args.input.data)?;
    let data = DataSet::from_raw(&schema, &raw)?;

    tracing::info!(event = "check_started", tables = schema.table_names().len());
    let report = IntegrityReport::run(&schema, &data, Some(&raw), &settings.check_options())?;
    let problems = report.problem_count();
    tracing::info!(event = "check_finished", problems);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json()?)?);
    } else {
        println!("{}", report.render_markdown(settings.max_report_rows));
    }

    if strict && problems > 0 {
        return Err(CliError::Problems(problems));
    }
    Ok(())
}

fn run_repair(args: RepairArgs, settings: &Settings) -> Result<(), CliError> {
    let schema = load_schema(&args.input.schema)?;
    let raw = load_raw(&args.input.data)?;
    let mut data = DataSet::from_raw(&schema, &raw)?;
    let replacements = parse_replacements(&args.replacements)?;

    let replaced = replace_data_type_failures(&schema, &mut data, &replacements)?;
    let removed = remove_foreign_key_failures(&schema, &mut data, !args.no_propagate)?;
    tracing::info!(
        event = "repair_finished",
        replaced,
        removed = removed.values().sum::<usize>()
    );

    write_json_atomic(&args.out, &data.to_json(&schema)?)?;
    println!("replaced {replaced} cell(s)");
    for (table, count) in &removed {
        println!("removed {count} row(s) from {table}");
    }
    println!("wrote {}", args.out.display());

    let remaining = IntegrityReport::run(&schema, &data, None, &settings.check_options())?;
    if !remaining.is_clean() {
        tracing::warn!(
            event = "problems_remaining",
            problems = remaining.problem_count()
        );
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<(), CliError> {
    if args.emit_json_schema {
        println!("{}", serde_json::to_string_pretty(&document_json_schema())?);
        return Ok(());
    }
    let path = args
        .schema
        .ok_or_else(|| CliError::InvalidConfig("--schema is required".to_string()))?;
    let schema = load_schema(&path)?;

    println!("| table | primary key | data fields | predicates |");
    println!("| --- | --- | --- | --- |");
    for table in schema.table_names() {
        let layout = if schema.is_generic(table)? {
            ("*".to_string(), "*".to_string())
        } else {
            (
                schema.primary_key_fields(table)?.join(", "),
                schema.data_fields(table)?.join(", "),
            )
        };
        println!(
            "| {} | {} | {} | {} |",
            table,
            layout.0,
            layout.1,
            schema.row_predicates(table)?.len()
        );
    }

    let graph = schema.foreign_key_graph();
    println!();
    println!(
        "foreign keys: {} across {} table(s)",
        graph.summary.edges, graph.summary.nodes
    );
    match (&graph.topo_order, &graph.cycle) {
        (Some(order), _) => println!("load order: {}", order.join(" -> ")),
        (None, Some(cycle)) => println!("circular references among: {}", cycle.join(", ")),
        (None, None) => {}
    }
    Ok(())
}

fn load_schema(path: &Path) -> Result<Schema, CliError> {
    let content = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;

    let issues = validate_document_json(&json)?;
    if let Some(first) = issues.first() {
        return Err(CliError::InvalidDocument(format!(
            "{} issue(s), first at {}: {}",
            issues.len(),
            first.path,
            first.message
        )));
    }

    let document: SchemaDocument = serde_json::from_value(json)?;
    Ok(Schema::create_from_full_schema(&document)?)
}

fn load_raw(path: &Path) -> Result<RawData, CliError> {
    let content = std::fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    Ok(RawData::from_json(&json)?)
}

fn parse_replacements(specs: &[String]) -> Result<Replacements, CliError> {
    let mut replacements = Replacements::new();
    for spec in specs {
        let (target, value) = spec.split_once('=').ok_or_else(|| {
            CliError::InvalidConfig(format!(
                "replacement '{spec}' must look like TABLE.FIELD=VALUE"
            ))
        })?;
        let (table, field) = target.split_once('.').ok_or_else(|| {
            CliError::InvalidConfig(format!("replacement target '{target}' must be TABLE.FIELD"))
        })?;
        let value = match serde_json::from_str::<serde_json::Value>(value) {
            Ok(json) => Value::from(&json),
            Err(_) => Value::from(value),
        };
        replacements.insert(FieldRef::new(table, field), value);
    }
    Ok(replacements)
}
