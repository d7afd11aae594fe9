//! Wires the HTTP source and directory store into a streamer and runs one
//! command.

use std::sync::Arc;
use std::time::Duration;

use partstream_http::HttpSource;
use partstream_store_fs::FsObjectStore;
use partstream_transfer::{Streamer, TransferEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::Command;
use crate::config::Config;

pub async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?;
    let source = Arc::new(HttpSource::new(client));
    let store = Arc::new(FsObjectStore::new(&config.store_root));

    match command {
        Command::Transfer { url, target } => {
            let cancel = CancellationToken::new();
            let (tx, rx) = mpsc::channel(64);
            let streamer = Streamer::new(source, store, config.transfer.clone())?.with_events(tx);

            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received; stopping after the chunk in flight");
                    interrupt.cancel();
                }
            });
            let progress = tokio::spawn(log_progress(rx));

            let result = streamer.stream_to_store(&url, &target, &cancel).await;
            drop(streamer);
            let _ = progress.await;

            let report = result?;
            println!("{}", report.destination_locator);
        }
        Command::List { target } => {
            let streamer = Streamer::new(source, store, config.transfer.clone())?;
            for candidate in streamer.find_incomplete_uploads(&target).await? {
                let bytes: u64 = candidate.parts.iter().map(|p| p.size).sum();
                println!(
                    "{}\t{}\t{} parts\t{} bytes",
                    candidate.summary.session_id,
                    candidate.summary.initiated_at.to_rfc3339(),
                    candidate.parts.len(),
                    bytes
                );
            }
        }
        Command::Prune { target } => {
            let streamer = Streamer::new(source, store, config.transfer.clone())?;
            let report = streamer.prune_incomplete_uploads(&target).await;
            println!(
                "aborted {} of {} incomplete uploads",
                report.aborted(),
                report.attempted()
            );
            if report.failed().next().is_some() || report.listing_failed {
                anyhow::bail!("some incomplete uploads could not be aborted");
            }
        }
    }

    Ok(())
}

/// Logs coarse progress until the streamer drops its sender.
async fn log_progress(mut rx: mpsc::Receiver<TransferEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            TransferEvent::ChunkCompleted {
                part_number,
                chunk_count,
                bytes_done,
                total_bytes,
                ..
            } => {
                let percent = bytes_done as f64 * 100.0 / total_bytes.max(1) as f64;
                tracing::info!(part_number, chunk_count, "{percent:.1}% transferred");
            }
            TransferEvent::SessionResolved {
                uploaded_parts,
                next_part_number,
                ..
            } if uploaded_parts > 0 => {
                tracing::info!(uploaded_parts, next_part_number, "resuming earlier upload");
            }
            _ => {}
        }
    }
}
