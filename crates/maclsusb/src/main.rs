//! Implements the CLI for maclsusb

use std::io::Write;

use clap::Parser;
use eyre::WrapErr;
use maclsusb::cli::Cli;
use maclsusb_core::ProfilerConfig;
use maclsusb_core::format::listing;
use maclsusb_core::parser::parse_report;
use maclsusb_core::source::{ReportSource, SourceError, SystemProfiler, TextReport};
use proc_exit::{Code, Exit};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> eyre::Result<Exit> {
    color_eyre::install()?;
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
        .from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .with(tracing_error::ErrorLayer::default())
        .init();
    let cli = Cli::parse();

    let source: Box<dyn ReportSource> = match &cli.input {
        Some(path) => Box::new(TextReport::from_path(path)?),
        None => {
            let config = ProfilerConfig::builder()
                .executable(cli.executable.clone())
                .data_type(cli.data_type.as_str())
                .build()?;
            Box::new(SystemProfiler::new(config))
        }
    };

    let lines = match source.fetch_report() {
        Ok(lines) => lines,
        // Pass on the exit code of system_profiler
        Err(err @ SourceError::Failed { code, .. }) => {
            eprintln!("{err}");
            return Ok(Exit::new(Code::new(code)));
        }
        Err(err) => return Err(err.into()),
    };

    let system = parse_report(&lines).wrap_err("Failed to parse USB report")?;

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    if cli.dump_tree {
        writeln!(stdout, "{}", system.dump())?;
    } else {
        for line in listing(&system) {
            let line = line.wrap_err("Failed to format device")?;
            writeln!(stdout, "{line}")?;
        }
    }
    stdout.flush()?;
    Ok(Exit::new(Code::SUCCESS))
}
