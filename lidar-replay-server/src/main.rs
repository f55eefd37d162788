use clap::Parser;
use log::{info, warn};
use miette::{IntoDiagnostic, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use lidar_replay::{
    config::DatasetLayout,
    dataset::{Dataset, FramesSummary},
    playback::Playback,
    publisher::CloudPublisher,
    Cli, Session,
};
use lidar_replay_core::{CloudDecoder, SchedulerError};

mod web;

use web::Web;

#[tokio::main]
async fn main() -> Result<()> {
    let process_start = Instant::now();
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let layout = DatasetLayout::from(&args);
    let dataset = Dataset::open(&args.data_path, &layout).into_diagnostic()?;

    // Loading is a one-off blocking read of the whole drive
    let decoder = CloudDecoder::new(&args.topic);
    let store = tokio::task::spawn_blocking(move || dataset.load(&decoder))
        .await
        .into_diagnostic()?
        .into_diagnostic()?;

    let sequence = store.sequence();
    if sequence.is_empty() {
        return Err(SchedulerError::EmptySequence).into_diagnostic();
    }
    if !store.skipped().is_empty() {
        warn!(
            "{} of {} scans were skipped",
            store.skipped().len(),
            sequence.len() + store.skipped().len()
        );
    }

    let publisher = CloudPublisher::new(&args.topic, args.history_depth as usize, args.output);
    let session = Session::new(args.clone(), publisher, FramesSummary::from_store(&store));
    let playback = Playback::new(session.clone(), sequence, process_start);
    let web = (!args.no_web).then(|| Web::new(session.clone()));

    info!("Replaying {} on topic '{}'", args.data_path.display(), args.topic);

    Toplevel::new(|s| async move {
        s.start(SubsystemBuilder::new("Playback", |a| playback.run(a)));
        if let Some(web) = web {
            s.start(SubsystemBuilder::new("Web", |a| web.run(a)));
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(|e| miette::miette!("{}", e))
}
