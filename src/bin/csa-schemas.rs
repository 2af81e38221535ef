//! Connected Systems schema CLI
//!
//! Command-line interface for normalizing, checking and bundling the schemas.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use csa_schemas::{
    normalize_str, populate_registry, read_source, reference_check, run, BuildConfig,
    BuildReport, CheckResult, SchemaSource, Severity, Status,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csa-schemas")]
#[command(about = "Normalize and bundle Connected Systems JSON Schemas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Options shared by every command that reads the source tree.
#[derive(clap::Args)]
struct SourceArgs {
    /// Configuration file (built-in defaults if not specified)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding one sub-directory per namespace
    #[arg(long)]
    source: Option<PathBuf>,

    /// Canonical base URL of every schema
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize, sanitize and bundle every configured entry point
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory the bundles are written to
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format of the report
        #[arg(long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print one normalized source document
    Normalize {
        /// Namespace directory, e.g. part1/sensorml
        namespace: String,

        /// File name inside the namespace
        file: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check that every reference of the source tree resolves
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Output format of the report
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            source,
            output,
            format,
        } => run_build(&source, output, format),
        Commands::Normalize {
            namespace,
            file,
            source,
            pretty,
        } => run_normalize(&namespace, &file, &source, pretty),
        Commands::Check {
            source,
            format,
            strict,
        } => run_check(&source, format, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_config(args: &SourceArgs) -> Result<BuildConfig, u8> {
    let mut config = match &args.config {
        Some(path) => BuildConfig::load(path).map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?,
        None => BuildConfig::default(),
    };

    if let Some(source) = &args.source {
        config.source_dir = source.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    Ok(config)
}

fn run_build(args: &SourceArgs, output: Option<PathBuf>, format: Format) -> Result<(), u8> {
    let mut config = load_config(args)?;
    if let Some(output) = output {
        config.output_dir = output;
    }

    let report = run(&config).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    match format {
        Format::Json => print_json(&report)?,
        Format::Text => print_build_report(&report),
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_normalize(
    namespace: &str,
    file: &str,
    args: &SourceArgs,
    pretty: bool,
) -> Result<(), u8> {
    let config = load_config(args)?;
    let base = config.base();

    let source = SchemaSource::new(namespace, file);
    let normalized = read_source(&config.source_dir, &source)
        .and_then(|content| normalize_str(&base, &source, &content))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let json = if pretty {
        serde_json::to_string_pretty(&normalized.document)
    } else {
        serde_json::to_string(&normalized.document)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", json);
    Ok(())
}

fn run_check(args: &SourceArgs, format: Format, strict: bool) -> Result<(), u8> {
    let config = load_config(args)?;
    let (registry, mut report) = populate_registry(&config);
    report.check = reference_check(&registry, &config.base(), &report.files);

    match format {
        Format::Json => print_json(&report)?,
        Format::Text => {
            print_sources(&report);
            print_check(&report.check);
        }
    }

    let sources_ok = report.namespaces.iter().all(|n| n.status == Status::Ok)
        && report.files_failed() == 0;
    if sources_ok && report.check.is_ok() && (!strict || report.check.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}

fn print_json(report: &BuildReport) -> Result<(), u8> {
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        eprintln!("Error serializing report: {}", e);
        2u8
    })?;
    println!("{}", json);
    Ok(())
}

fn print_build_report(report: &BuildReport) {
    print_sources(report);
    println!(
        "Sanitized: {} read-only properties removed from required",
        report.sanitized
    );
    print_check(&report.check);

    println!("\nBundles:");
    for bundle in &report.bundles {
        match bundle.status {
            Status::Ok => println!(
                "  \x1b[32m✓\x1b[0m {} -> {} ({} schemas)",
                bundle.name,
                bundle.output.display(),
                bundle.members
            ),
            Status::Failed => println!(
                "  \x1b[31m✗\x1b[0m {}: {}",
                bundle.name,
                bundle.error.as_deref().unwrap_or("failed")
            ),
        }
    }

    println!();
    let failed = report.bundles_failed();
    if report.is_success() {
        println!(
            "\x1b[32m✓ {} bundles written\x1b[0m",
            report.bundles.len()
        );
    } else {
        println!(
            "\x1b[31m✗ {} bundles: {} written, {} failed; {} source files failed\x1b[0m",
            report.bundles.len(),
            report.bundles.len() - failed,
            failed,
            report.files_failed()
        );
    }
}

fn print_sources(report: &BuildReport) {
    println!("Sources:");
    for namespace in &report.namespaces {
        match namespace.status {
            Status::Ok => println!(
                "  \x1b[32m✓\x1b[0m {} ({} files)",
                namespace.namespace, namespace.files
            ),
            Status::Failed => println!(
                "  \x1b[31m✗\x1b[0m {}: {}",
                namespace.namespace,
                namespace.error.as_deref().unwrap_or("failed")
            ),
        }
    }
    for file in report.files.iter().filter(|f| f.status == Status::Failed) {
        println!(
            "    \x1b[31m✗\x1b[0m {}/{}: {}",
            file.namespace,
            file.file,
            file.error.as_deref().unwrap_or("failed")
        );
    }
}

fn print_check(check: &CheckResult) {
    for diag in &check.diagnostics {
        let (color, label) = match diag.severity {
            Severity::Error => ("\x1b[31m", "error"),
            Severity::Warning => ("\x1b[33m", "warning"),
        };
        println!(
            "  {}{}[{}]\x1b[0m: {} {} - {}",
            color, label, diag.code, diag.uri, diag.path, diag.message
        );
    }
    println!(
        "References: {} checked in {} schemas ({} errors, {} warnings)",
        check.references_checked, check.documents_checked, check.errors, check.warnings
    );
}
