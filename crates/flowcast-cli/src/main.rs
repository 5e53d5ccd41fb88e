//! Flowcast CLI - evaluate and export financial models

mod model_file;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flowcast::prelude::*;
use flowcast::{
    is_blank_formula, parse_formula, period_labels, scan_references, CsvWriteOptions, ReferenceKey,
};
use model_file::ModelFile;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowcast")]
#[command(author, version, about = "Financial model evaluation and spreadsheet export")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a model and print its results
    Eval {
        /// Model file (JSON)
        model: PathBuf,

        /// Input series CSV, one `key,v0,v1,...` row per reference
        #[arg(short, long)]
        inputs: Option<PathBuf>,

        /// Display periods
        #[arg(short, long, value_enum, default_value_t = GranularityArg::Monthly)]
        granularity: GranularityArg,

        /// Only print this calculation (e.g. R4)
        #[arg(short, long)]
        calc: Option<String>,
    },

    /// Export a model as spreadsheet formulas (CSV grid)
    Export {
        /// Model file (JSON)
        model: PathBuf,

        /// Input series CSV
        #[arg(short, long)]
        inputs: Option<PathBuf>,

        /// Sheet holding the calculation rows
        #[arg(short, long, default_value = "Calculations")]
        sheet: String,

        /// Sheet holding the input rows
        #[arg(long, default_value = "Inputs")]
        input_sheet: String,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the references a formula uses
    Refs {
        formula: String,
    },

    /// Check whether a formula parses and converts to a spreadsheet formula
    Check {
        formula: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GranularityArg {
    Monthly,
    Quarterly,
    Annual,
    Fiscal,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Eval {
            model,
            inputs,
            granularity,
            calc,
        } => eval(&model, inputs.as_deref(), granularity, calc.as_deref()),
        Commands::Export {
            model,
            inputs,
            sheet,
            input_sheet,
            output,
        } => export(&model, inputs.as_deref(), &sheet, &input_sheet, output.as_deref()),
        Commands::Refs { formula } => refs(&formula),
        Commands::Check { formula } => check(&formula),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load a model file, bind extra inputs and recompute
fn load(path: &Path, inputs: Option<&Path>) -> Result<(Model, Option<u32>)> {
    let file = ModelFile::load(path)?;
    let fiscal_end = file.timeline.fiscal_year_end_month;
    let mut model = file.into_model()?;

    if let Some(inputs) = inputs {
        let changed = model
            .load_inputs(inputs)
            .with_context(|| format!("Failed to read inputs '{}'", inputs.display()))?;
        tracing::info!(changed, "inputs loaded");
    }

    let stats = model.recompute_all();
    if stats.errors > 0 {
        eprintln!(
            "Evaluated {} calculations ({} errors)",
            stats.calculations, stats.errors
        );
    }
    Ok((model, fiscal_end))
}

fn eval(
    path: &Path,
    inputs: Option<&Path>,
    granularity: GranularityArg,
    calc: Option<&str>,
) -> Result<()> {
    let (model, fiscal_end) = load(path, inputs)?;

    let selected = match calc {
        Some(label) => {
            let key = ReferenceKey::parse(label.trim())
                .with_context(|| format!("Invalid calculation reference '{}'", label))?;
            let Some(id) = key.calculation_id() else {
                bail!("'{}' is not a calculation reference", label);
            };
            if model.calculation(CalculationId(id)).is_none() {
                bail!("Calculation {} not found", label);
            }
            Some(CalculationId(id))
        }
        None => None,
    };

    let groups = model.timeline().groupings(match granularity {
        GranularityArg::Monthly => Granularity::Monthly,
        GranularityArg::Quarterly => Granularity::Quarterly,
        GranularityArg::Annual => Granularity::Annual,
        GranularityArg::Fiscal => Granularity::FiscalYear {
            end_month: fiscal_end.unwrap_or(12),
        },
    });

    let mut stdout = io::stdout().lock();
    let header: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
    writeln!(stdout, "key\tname\t{}\ttotal", header.join("\t"))?;

    for calculation in model.calculations() {
        if selected.is_some_and(|id| id != calculation.id) {
            continue;
        }
        let aggregation = model.aggregate(calculation.id, &groups)?;
        let values: Vec<String> = aggregation.values().iter().map(|v| format_number(*v)).collect();
        writeln!(
            stdout,
            "{}\t{}\t{}\t{}",
            calculation.id,
            calculation.name,
            values.join("\t"),
            format_number(aggregation.total)
        )?;
    }

    for diagnostic in model.diagnostics()? {
        if selected.is_some_and(|id| id != diagnostic.id) {
            continue;
        }
        eprintln!(
            "{} ({}): {} error: {}",
            diagnostic.label, diagnostic.name, diagnostic.kind, diagnostic.message
        );
    }

    Ok(())
}

fn export(
    path: &Path,
    inputs: Option<&Path>,
    sheet: &str,
    input_sheet: &str,
    output: Option<&Path>,
) -> Result<()> {
    let (model, _) = load(path, inputs)?;
    let layout = export_layout(&model, sheet, input_sheet);

    let stats = match output {
        Some(output) => model
            .save_export(output, &layout)
            .with_context(|| format!("Failed to write '{}'", output.display()))?,
        None => {
            let plan = model.export(&layout)?;
            CsvWriter::write_export(
                &plan,
                &period_labels(model.timeline()),
                io::stdout().lock(),
                &CsvWriteOptions::default(),
            )
            .context("Failed to write to stdout")?;
            plan.stats
        }
    };

    eprintln!(
        "Exported {} calculations: {} formula cells, {} static cells ({:.1}% formulas, {} degraded)",
        stats.calculations,
        stats.formula_cells,
        stats.static_cells,
        stats.formula_coverage() * 100.0,
        stats.degraded_calculations
    );
    Ok(())
}

/// Inputs and `T.` constants on `input_sheet`, calculations on `sheet`
fn export_layout(model: &Model, sheet: &str, input_sheet: &str) -> SheetLayout {
    let mut builder = SheetLayout::builder();
    for key in model.references().keys() {
        builder = builder.place(key.clone(), input_sheet);
    }
    for calculation in model.calculations() {
        builder = builder.place(calculation.reference_key(), sheet);
    }
    builder.build()
}

fn refs(formula: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    for key in scan_references(formula) {
        writeln!(stdout, "{}\t{:?}", key, key.kind())?;
    }
    Ok(())
}

fn check(formula: &str) -> Result<()> {
    println!("{}", check_verdict(formula));
    Ok(())
}

fn check_verdict(formula: &str) -> String {
    if is_blank_formula(formula) {
        return "convertible: blank formula exports as =0".to_string();
    }
    if let Err(error) = parse_formula(formula) {
        return format!("invalid: {}", error);
    }
    if can_convert(formula) {
        "convertible".to_string()
    } else {
        "not convertible: exported as static values".to_string()
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{:.4}", n)
    }
}
