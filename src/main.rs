mod client;
mod config;
mod error;
mod fetcher;
mod model;
mod navigator;
mod output;
mod parser;
mod pipeline;
mod report;
mod selection;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use crate::client::PortalClient;
use crate::config::{AttendanceDate, Overrides, Settings};
use crate::navigator::Navigator;
use crate::pipeline::{Pipeline, RangeRequest, RunData, RunOutcome, RunRequest};
use crate::selection::Selection;

#[derive(Parser)]
#[command(name = "muster_scraper", about = "NREGA muster roll attendance and photo reports")]
struct Cli {
    /// Config file (default: ./muster.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Portal Digest token
    #[arg(long, global = true)]
    digest: Option<String>,
    /// Financial year, e.g. 2024-2025
    #[arg(long, global = true)]
    fin_year: Option<String>,
    /// Max concurrent detail fetches
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OutputArgs {
    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Also write the print-style PDF
    #[arg(long)]
    pdf: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List attendance dates offered by the portal
    Dates,
    /// Walk state → district → block → council and fetch the listed muster rolls
    Run {
        /// Attendance date (dd/mm/yyyy)
        #[arg(short, long)]
        date: AttendanceDate,
        /// Council (panchayat) name
        #[arg(long)]
        council: Option<String>,
        /// Only rolls whose work code contains this
        #[arg(short, long)]
        work_code: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fetch a muster roll number range directly
    Range {
        /// Attendance date (dd/mm/yyyy)
        #[arg(short, long)]
        date: AttendanceDate,
        #[arg(short, long)]
        work_code: String,
        /// First muster roll number
        #[arg(long)]
        from: u32,
        /// Last muster roll number (inclusive)
        #[arg(long)]
        to: u32,
        #[arg(long)]
        council: Option<String>,
        /// Council code; a 3-digit code is prefixed with the block code
        #[arg(long)]
        council_code: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            digest: self.digest.clone(),
            fin_year: self.fin_year.clone(),
            concurrency: self.concurrency,
            timeout_secs: self.timeout,
            ..Default::default()
        };
        match &self.command {
            Commands::Dates => {}
            Commands::Run { council, output, .. } => {
                overrides.council = council.clone();
                overrides.output_dir = output.out.clone();
            }
            Commands::Range {
                council,
                council_code,
                output,
                ..
            } => {
                overrides.council = council.clone();
                overrides.council_code = council_code.clone();
                overrides.output_dir = output.out.clone();
            }
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = config::load(cli.config.as_deref(), cli.overrides())?;
    if settings.portal.digest.is_empty() {
        tracing::warn!("No Digest token configured; the portal will likely reject requests");
    }
    let source = PortalClient::shared(&settings.portal)?;

    let result = match cli.command {
        Commands::Dates => {
            let navigator = Navigator::new(source, &settings);
            let (_, form) = navigator.landing_form().await?;
            if form.date_options.is_empty() {
                println!("No attendance dates offered for {}.", settings.region.fin_year);
            }
            for date in &form.date_options {
                println!("{}", date);
            }
            Ok(())
        }
        Commands::Run {
            date,
            work_code,
            output,
            ..
        } => {
            let request = RunRequest {
                date,
                selection: Selection::from_work_code(work_code),
            };
            let pipeline = Pipeline::new(source, settings.clone());
            let outcome = pipeline.run_listing(&request).await?;
            finish(outcome, &settings, output.pdf)
        }
        Commands::Range {
            date,
            work_code,
            from,
            to,
            output,
            ..
        } => {
            let request = RangeRequest {
                date,
                work_code,
                from,
                to,
            };
            let pipeline = Pipeline::new(source, settings.clone());
            let outcome = pipeline.run_range(&request).await?;
            finish(outcome, &settings, output.pdf)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn finish(outcome: RunOutcome, settings: &Settings, pdf: bool) -> anyhow::Result<()> {
    let data = match outcome {
        RunOutcome::Empty => {
            println!("No muster rolls matched the selection. Nothing written.");
            return Ok(());
        }
        RunOutcome::Ready(data) => data,
    };
    print_summary(&data);

    let artifacts = data.artifacts(pdf)?;
    let paths = output::write_artifacts(&settings.output_dir, &artifacts)?;
    for path in &paths {
        println!("  {}", path.display());
    }
    Ok(())
}

fn print_summary(data: &RunData) {
    let s = &data.summary;
    println!("Work:        {} ({})", data.header.work_name, data.header.work_code);
    println!("Muster rolls: {}", s.references);
    println!("Pages:        {}", s.pages_fetched);
    println!("Attendance:   {} rows in {} rolls", s.attendance_rows, s.with_attendance);
    println!("Photos:       {}", s.photos);
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
