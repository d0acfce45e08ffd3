//! Command-line entry point for the tab open latency benchmark
//!
//! ```bash
//! tab-bench run --config tab-bench.toml --records records.jsonl
//! tab-bench probe --path /var/log/bios_info.txt
//! tab-bench validate --config tab-bench.toml
//! ```

use anyhow::{Context, Result};
use chromiumoxide::browser::BrowserConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tab_bench::config::Config;
use tab_bench::probe::{FirmwareIds, DEFAULT_PROBE_PATH};
use tab_bench::reporter::{ConsoleSink, JsonLinesSink, MultiSink, OutputFormat, Reporter};
use tab_bench::session::{CancelFlag, Session};
use tab_bench::source::ChromeTabSource;

/// Command-line arguments for tab-bench
#[derive(Parser, Debug)]
#[command(name = "tab-bench")]
#[command(about = "Measure browser tab open latency until the mean converges")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a benchmark session
    Run {
        /// Path to the TOML configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Format of the final report
        #[arg(long, value_enum, default_value = "console")]
        format: Format,

        /// Write the final report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Append every record as a JSON line to this file
        #[arg(long)]
        records: Option<PathBuf>,

        /// Attach hwid/fwid from this probe file to the report
        #[arg(long)]
        probe: Option<PathBuf>,

        /// Run with a visible browser window
        #[arg(long)]
        headful: bool,
    },
    /// Print hwid and fwid of this machine
    Probe {
        #[arg(long, default_value = DEFAULT_PROBE_PATH)]
        path: PathBuf,
    },
    /// Parse and validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Console,
    Json,
    JsonPretty,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Console => OutputFormat::Console,
            Format::Json => OutputFormat::Json,
            Format::JsonPretty => OutputFormat::JsonPretty,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Run {
            config,
            format,
            output,
            records,
            probe,
            headful,
        } => run(config, format.into(), output, records, probe, headful).await,
        Command::Probe { path } => {
            let ids = FirmwareIds::from_file(&path)
                .await
                .with_context(|| format!("Failed to probe {}", path.display()))?;
            println!("hwid: {}", ids.hwid);
            println!("fwid: {}", ids.fwid);
            Ok(())
        }
        Command::Validate { config } => {
            let config = Config::from_file(&config)?;
            println!("✓ Configuration is valid");
            println!(
                "  {} cycles x {} tabs per batch, threshold {}, {} converged round(s)",
                config.session.num_cycles,
                config.session.tabs_per_cycle,
                config.session.threshold,
                config.session.target_converged_count
            );
            println!("  Target: {}", config.source.target);
            Ok(())
        }
    }
}

async fn run(
    config_path: Option<PathBuf>,
    format: OutputFormat,
    output: Option<PathBuf>,
    records: Option<PathBuf>,
    probe: Option<PathBuf>,
    headful: bool,
) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => {
            info!("No config file given, using defaults");
            Config::default()
        }
    };

    let environment = match probe {
        Some(path) => Some(
            FirmwareIds::from_file(&path)
                .await
                .with_context(|| format!("Failed to probe {}", path.display()))?,
        ),
        None => None,
    };

    let mut builder = BrowserConfig::builder();
    if headful {
        builder = builder.with_head();
    }
    let browser_config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;
    let source = ChromeTabSource::launch(browser_config, &config.source).await?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current batch");
            on_interrupt.cancel();
        }
    });

    let mut sink = MultiSink::new().with(ConsoleSink::stdout());
    if let Some(path) = &records {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        sink = sink.with(JsonLinesSink::new(BufWriter::new(file)));
    }

    let mut session = Session::new(config.session.clone(), source, (&config.teardown).into())?
        .with_cancel_flag(cancel);
    if let Some(ids) = environment {
        session = session.with_environment(ids);
    }

    let outcome = session.run(&mut sink).await;

    // A session that stopped early still leaves its partial report
    if let Some(report) = session.report() {
        let reporter = Reporter::new(format);
        match &output {
            Some(path) => {
                reporter.write_to_file(report, path)?;
                info!("Report written to {}", path.display());
            }
            None => reporter.report(report)?,
        }
    }
    outcome?;
    Ok(())
}
