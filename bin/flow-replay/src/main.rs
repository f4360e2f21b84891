//! Replays captured NetFlow v9 and IPFIX packets, printing the decoded metrics in line protocol.
//!
//! Each argument is the path to a file holding the payload of a single packet. Files are parsed in order by the same
//! parser, so templates learned from earlier files are used to decode records in later ones.

#![deny(warnings)]
#![deny(missing_docs)]


use flowtide_error::{generic_error, ErrorContext as _, GenericError};
use flowtide_event::Metric;
use flowtide_netflow::{NetflowParser, Parser as _};
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

fn main() {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .init();

    match run() {
        Ok(()) => {}
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<(), GenericError> {
    let paths = std::env::args().skip(1).collect::<Vec<_>>();
    if paths.is_empty() {
        return Err(generic_error!(
            "Paths to one or more packet files must be passed as arguments to `flow-replay`."
        ));
    }

    let mut parser = NetflowParser::new();
    let mut metrics = Vec::new();
    let mut failed = 0;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for path in &paths {
        let payload = std::fs::read(path).with_error_context(|| format!("Failed to read packet file '{}'.", path))?;

        metrics.clear();
        if let Err(e) = parser.parse(&payload, &mut metrics) {
            warn!(path = %path, error = %e, decoded = metrics.len(), "Failed to parse packet.");
            failed += 1;
        }

        write_metrics(&mut out, &metrics).error_context("Failed to write metrics.")?;
    }

    info!(
        packets = paths.len(),
        failed,
        templates = parser.template_count(),
        "Replay complete."
    );

    Ok(())
}

fn write_metrics<W: std::io::Write>(out: &mut W, metrics: &[Metric]) -> std::io::Result<()> {
    for metric in metrics {
        writeln!(out, "{}", metric)?;
    }
    out.flush()
}
