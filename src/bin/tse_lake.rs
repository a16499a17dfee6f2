use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use tse_lakehouse::config::{ConfigLoader, ResolvedConfig};
use tse_lakehouse::domain::{ElectionYear, Jurisdiction};
use tse_lakehouse::error::PipelineError;
use tse_lakehouse::ingest::{IngestOutcome, IngestReport, resolve_link};
use tse_lakehouse::output::{JsonOutput, OutputMode};
use tse_lakehouse::pipeline::{Pipeline, RunSummary, open_store};
use tse_lakehouse::stage::StageReport;
use tse_lakehouse::tse::TseHttpClient;

#[derive(Parser)]
#[command(name = "tse-lake")]
#[command(about = "Medallion ETL for TSE electoral results (raw -> bronze -> silver -> gold)")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ingest one archive, then refine every layer")]
    Run(TargetArgs),
    #[command(about = "Download the archive for a year and UF into the raw layer")]
    Ingest(TargetArgs),
    #[command(about = "Convert raw archives to bronze parquet")]
    Bronze,
    #[command(about = "Clean bronze tables into silver")]
    Silver,
    #[command(about = "Aggregate silver tables into gold")]
    Gold,
    #[command(about = "Print the download link for a year and UF without downloading")]
    Resolve(TargetArgs),
}

#[derive(Args, Clone)]
struct TargetArgs {
    #[arg(long, default_value = "2022")]
    year: ElectionYear,

    #[arg(long, default_value = "CE")]
    uf: Jurisdiction,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PipelineError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PipelineError) -> u8 {
    match error {
        PipelineError::MissingConfig
        | PipelineError::ConfigRead(_)
        | PipelineError::ConfigParse(_) => 2,
        PipelineError::Store(_)
        | PipelineError::StoreHttp(_)
        | PipelineError::StoreStatus { .. }
        | PipelineError::Filesystem(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Log
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve(target) => run_resolve(&config, target, output_mode),
        command => run_pipeline_command(&config, command, output_mode),
    }
}

fn run_resolve(
    config: &ResolvedConfig,
    target: TargetArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let client = TseHttpClient::new(&config.listing_base_url)?;
    let link = resolve_link(&client, target.year, &target.uf)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_link(link.as_ref()).into_diagnostic(),
        OutputMode::Log => {
            match link {
                Some(link) => println!("{} ({})", link.url, link.file_name),
                None => println!("no resource found for {} in {}", target.uf, target.year),
            }
            Ok(())
        }
    }
}

fn run_pipeline_command(
    config: &ResolvedConfig,
    command: Commands,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let store = open_store(&config.store)?;
    let client = TseHttpClient::new(&config.listing_base_url)?;
    let pipeline = Pipeline::new(&client, store.as_ref(), config);

    match command {
        Commands::Run(target) => {
            let summary = pipeline.run(target.year, &target.uf);
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&summary).into_diagnostic(),
                OutputMode::Log => {
                    print_run_summary(&summary);
                    Ok(())
                }
            }
        }
        Commands::Ingest(target) => {
            let report = pipeline.ingest(target.year, &target.uf)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_ingest(&report).into_diagnostic(),
                OutputMode::Log => {
                    print_ingest(&report);
                    Ok(())
                }
            }
        }
        Commands::Bronze => finish_stage(pipeline.bronze()?, output_mode),
        Commands::Silver => finish_stage(pipeline.silver()?, output_mode),
        Commands::Gold => finish_stage(pipeline.gold()?, output_mode),
        Commands::Resolve(target) => run_resolve(config, target, output_mode),
    }
}

fn finish_stage(report: StageReport, output_mode: OutputMode) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => JsonOutput::print_stage(&report).into_diagnostic(),
        OutputMode::Log => {
            print_stage(&report);
            Ok(())
        }
    }
}

fn print_run_summary(summary: &RunSummary) {
    if let Some(report) = &summary.ingestion {
        print_ingest(report);
    }
    for report in &summary.stages {
        print_stage(report);
    }
    for failure in &summary.failures {
        println!("{:<7} failed: {}", failure.stage.as_str(), failure.error);
    }
}

fn print_ingest(report: &IngestReport) {
    match &report.outcome {
        IngestOutcome::Uploaded { id, parts, bytes } => println!(
            "raw     {} uploaded ({bytes} bytes in {parts} parts, id {id})",
            report.link.file_name
        ),
        IngestOutcome::AlreadyPresent { existing_id } => println!(
            "raw     {} already present (id {existing_id})",
            report.link.file_name
        ),
    }
}

fn print_stage(report: &StageReport) {
    println!(
        "{:<7} processed {}, skipped {}, failed {}, ignored {}",
        report.stage.as_str(),
        report.processed.len(),
        report.skipped.len(),
        report.failed.len(),
        report.ignored.len()
    );
    for failed in &report.failed {
        println!("        {}: {}", failed.input, failed.error);
    }
}
