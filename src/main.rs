use clap::Parser;
use scanward::data_dir::InstallDir;
use scanward::status::{latest_by_scan, read_log};
use std::path::PathBuf;

/// Inspect the scanward status log: the latest status per scan job, or the
/// full record history.
#[derive(Parser, Debug)]
#[command(name = "scanward", version, about)]
struct Cli {
    /// Status log path (default: resolved from SCANWARD_INSTALL_DIR)
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Only show records for this scan id
    #[arg(short, long)]
    scan_id: Option<String>,

    /// Print every record instead of the latest per scan
    #[arg(long)]
    history: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let path = cli
        .log
        .unwrap_or_else(|| InstallDir::from_env().scan_status_log());
    tracing::debug!(path = %path.display(), "reading status log");

    let mut records = match read_log(&path) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("scanward: {e}");
            std::process::exit(1);
        }
    };

    if let Some(id) = &cli.scan_id {
        records.retain(|r| &r.scan_id == id);
    }
    let shown = if cli.history {
        records
    } else {
        latest_by_scan(&records)
    };

    if shown.is_empty() {
        println!("no scan records in {}", path.display());
        return;
    }
    for record in shown {
        if record.scan_message.is_empty() {
            println!("{}\t{}", record.scan_id, record.scan_status);
        } else {
            println!(
                "{}\t{}\t{}",
                record.scan_id, record.scan_status, record.scan_message
            );
        }
    }
}
