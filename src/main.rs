//! CLI entry point for `mailtally`.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailtally::config::{self, Config, ReportFormat};
use mailtally::export::csv::render_csv;
use mailtally::export::json::render_json;
use mailtally::export::output::{write_report, OutputTarget};
use mailtally::model::address::HostMatch;
use mailtally::model::report::AggregateReport;
use mailtally::parser::extract::RecordExtractor;
use mailtally::pipeline::pool::WorkerPool;
use mailtally::pipeline::{Pipeline, RunStats};
use mailtally::queue::{LineBatchQueue, RecordBatchQueue};

#[derive(Parser)]
#[command(
    name = "mailtally",
    version,
    about = "Per-partner mail traffic statistics from Sophos SMTP logs",
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// SMTP log files (plain or .gz)
    #[arg(value_name = "LOGFILE", required = true)]
    files: Vec<PathBuf>,

    #[command(flatten)]
    run: RunArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Options shared by every command that runs the pipeline.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Host part treated as internal (repeatable, replaces the configured list)
    #[arg(short = 'i', long = "internal-host", value_name = "HOST")]
    internal_hosts: Vec<String>,

    /// Treat subdomains of internal hosts as internal too
    #[arg(long)]
    suffix_match: bool,

    /// CPUs to leave free for other programs
    #[arg(long, value_name = "N")]
    spare_cpus: Option<usize>,

    /// Explicit number of concurrent batches
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Log lines per batch
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Reject mails whose subject is empty
    #[arg(long)]
    strict_subject: bool,
}

#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Omit the CSV header line
    #[arg(long)]
    no_csv_header: bool,

    /// Write the detailed JSON report instead of CSV
    #[arg(short = 'J', long)]
    json: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// Gzip-compress the output file
    #[arg(short = 'Z', long, requires = "outfile")]
    compress_outfile: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print run statistics instead of the report
    Summary {
        #[arg(value_name = "LOGFILE", required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration; a broken file is reported once logging is up
    let (mut config, config_error) = match config::load_config() {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);
    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
    }

    match cli.command {
        Some(Commands::Summary { files, run, json }) => {
            apply_run_args(&mut config, &run);
            cmd_summary(&files, &config, json)
        }
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => {
            apply_run_args(&mut config, &cli.run);
            cmd_report(&cli.files, &config, &cli.output)
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailtally.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Command-line flags win over the config file.
fn apply_run_args(config: &mut Config, args: &RunArgs) {
    if !args.internal_hosts.is_empty() {
        config.classification.internal_hosts = args.internal_hosts.clone();
    }
    if args.suffix_match {
        config.classification.host_match = HostMatch::Suffix;
    }
    if let Some(spare) = args.spare_cpus {
        config.pipeline.spare_cpus = spare;
    }
    if args.workers.is_some() {
        config.pipeline.workers = args.workers;
    }
    if let Some(size) = args.batch_size {
        config.pipeline.batch_size = size;
    }
    if args.strict_subject {
        config.pipeline.strict_subject = true;
    }
}

fn build_pipeline(config: &Config) -> Pipeline {
    let extractor = RecordExtractor::new(
        config.classification.classifier(),
        config.pipeline.strict_subject,
    );
    let pool = match config.pipeline.workers {
        Some(n) => WorkerPool::new(n, config.pipeline.batch_size),
        None => WorkerPool::for_this_machine(config.pipeline.spare_cpus, config.pipeline.batch_size),
    };
    Pipeline::new(extractor, pool)
}

fn progress_style(label: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(&format!(
            "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
        ))
        .expect("valid template")
        .progress_chars("#>-")
}

/// Scan, extract and aggregate `files`.
///
/// Returns `None` after telling the user why when there is nothing to report.
fn collect(files: &[PathBuf], config: &Config) -> anyhow::Result<Option<(AggregateReport, RunStats)>> {
    let pipeline = build_pipeline(config);
    let lines = LineBatchQueue::new();
    let records = RecordBatchQueue::new();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(progress_style("Scanning"));
    let scan = pipeline.scan_files(
        files,
        &lines,
        Some(&|done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }),
    );
    pb.finish_and_clear();

    if scan.files_ok == 0 {
        anyhow::bail!("none of the {} log file(s) could be read", files.len());
    }
    if lines.is_empty() {
        eprintln!("No delivered-mail lines found in {} file(s)", scan.files_ok);
        return Ok(None);
    }

    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(progress_style("Extracting"));
    let pool = pipeline.extract(
        &lines,
        &records,
        Some(&|done, total| {
            pb.set_length(total);
            pb.set_position(done);
        }),
    );
    pb.finish_and_clear();

    if records.is_empty() {
        eprintln!(
            "No parsable mail records in {} matching line(s)",
            scan.lines_accepted
        );
        return Ok(None);
    }

    let report = pipeline.aggregate(&records, chrono::Local::now().fixed_offset());
    let stats = RunStats {
        scan,
        pool,
        partners: report.partner_count(),
    };
    Ok(Some((report, stats)))
}

/// Render the report and write it to stdout or the requested file.
fn cmd_report(files: &[PathBuf], config: &Config, output: &OutputArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let Some((report, stats)) = collect(files, config)? else {
        return Ok(());
    };

    let format = if output.json {
        ReportFormat::Json
    } else {
        config.output.format
    };
    let content = match format {
        ReportFormat::Csv => render_csv(&report, config.output.csv_header && !output.no_csv_header),
        ReportFormat::Json => render_json(&report)?,
    };

    let target = match (&output.outfile, output.compress_outfile) {
        (Some(path), true) => OutputTarget::Gzip(path, config.output.compression_level),
        (Some(path), false) => OutputTarget::File(path),
        (None, _) => OutputTarget::Stdout,
    };
    write_report(target, &content)?;

    tracing::info!(
        partners = stats.partners,
        records = stats.pool.extracted,
        failed = stats.pool.failed,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Report complete"
    );
    Ok(())
}

/// Show run statistics for a set of log files.
fn cmd_summary(files: &[PathBuf], config: &Config, json: bool) -> anyhow::Result<()> {
    let start = Instant::now();
    let Some((report, stats)) = collect(files, config)? else {
        return Ok(());
    };
    let elapsed = start.elapsed();

    if json {
        print_summary_json(&report, &stats, elapsed)
    } else {
        print_summary_table(&report, &stats, elapsed);
        Ok(())
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailtally", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn print_summary_table(report: &AggregateReport, stats: &RunStats, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Files", stats.scan.files_ok);
    if stats.scan.files_failed > 0 {
        println!("  {:<20} {}", "Files skipped", stats.scan.files_failed);
    }
    println!("  {:<20} {}", "Lines read", stats.scan.lines_read);
    println!("  {:<20} {}", "Lines accepted", stats.scan.lines_accepted);
    println!("  {:<20} {}", "Records", stats.pool.extracted);
    println!("  {:<20} {}", "Failed lines", stats.pool.failed);
    println!("  {:<20} {}", "Partners", report.partner_count());
    println!("  {:<20} {}", "Total mails", report.total_mails());
    println!(
        "  {:<20} {}",
        "Total volume",
        format_size(report.total_size().max(0) as u64, BINARY)
    );
    println!("  {:<20} {}", "Workers", stats.pool.workers);
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);

    let by_type = report.count_by_type();
    if !by_type.is_empty() {
        println!();
        println!("  By type:");
        for (kind, count) in &by_type {
            println!("    {count:>6}  {kind}");
        }
    }

    let top = report.top_partners(10);
    if !top.is_empty() {
        println!();
        println!("  Top partners:");
        for entry in &top {
            println!(
                "    {:>6}  {} <-> {}",
                entry.mails_total, entry.partner_a, entry.partner_b
            );
        }
    }
    println!();
}

fn print_summary_json(
    report: &AggregateReport,
    stats: &RunStats,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let top_json: Vec<serde_json::Value> = report
        .top_partners(10)
        .iter()
        .map(|entry| {
            serde_json::json!({
                "partnerA": entry.partner_a,
                "partnerB": entry.partner_b,
                "type": entry.kind,
                "mailsTotal": entry.mails_total,
                "sizeTotal": entry.size_total,
            })
        })
        .collect();

    let summary = serde_json::json!({
        "createDateTime": report.created_at.to_rfc3339(),
        "scan": stats.scan,
        "pool": stats.pool,
        "partners": stats.partners,
        "mailsTotal": report.total_mails(),
        "sizeTotal": report.total_size(),
        "byType": report.count_by_type(),
        "topPartners": top_json,
        "elapsedMs": elapsed.as_millis() as u64,
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
