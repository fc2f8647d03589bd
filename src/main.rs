use teammate_graph_lib::{input_loader, logger};
use teammate_graph_lib::{Cli, Crawler, GraphStore, HttpFetcher, OverrideTable, StoreGuard};

use clap::Parser;
use log::{error, info, warn};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logger::init(&cli.log_level);
    info!("Starting teammate graph crawl...");

    let config = cli.into_config().map_err(|e| {
        error!("{}", e);
        e
    })?;

    // 1. Load the roster
    let players = input_loader::load_roster(&config.roster_path).map_err(|e| {
        error!("{}", e);
        e
    })?;
    if players.is_empty() {
        error!("No players found in {:?}. Nothing to crawl.", config.roster_path);
        return Ok(());
    }

    // 2. Name overrides
    let overrides = match &config.overrides_path {
        Some(path) => OverrideTable::load(path)?,
        None => OverrideTable::bundled()?,
    };

    // 3. Ctrl-C stops before the next request. A second one exits at once;
    //    with the default checkpoint every finished player is already on disk.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            if stop.swap(true, Ordering::SeqCst) {
                eprintln!("Second interrupt, exiting now. Players up to the last checkpoint are saved.");
                std::process::exit(130);
            }
            eprintln!("Interrupt received. Saving completed players and exiting...");
        })
        .unwrap_or_else(|e| warn!("Failed to set Ctrl-C handler: {}. Interrupts will not save progress.", e));
    }

    // 4. Resume from the previous graph; the guard flushes on every way out.
    let mut store = StoreGuard::new(GraphStore::load(&config.graph_path));
    let fetcher = HttpFetcher::new(&config)?.with_stop_flag(stop.clone());
    let crawler = Crawler::new(fetcher, overrides, config)?.with_stop_flag(stop);

    let outcome = crawler.run(&players, &mut store);
    let flushed = store.finish();

    if let Err(e) = &flushed {
        error!("{}", e);
    }
    let summary = outcome?;
    flushed?;

    info!(
        "Done. {} added, {} skipped, {} failed{}.",
        summary.added,
        summary.skipped,
        summary.failed,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    if summary.interrupted {
        std::process::exit(130);
    }
    Ok(())
}
