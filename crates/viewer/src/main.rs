//! Headless dashboard viewer.
//!
//! Mirrors the server's counters over the event stream and rings one cue
//! per increment. Reconnects with a fixed backoff and resnapshots on every
//! (re)connect; the stale mirror is kept visible during the gap.

use std::time::Duration;

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pulse_viewer::audio::KiraCuePlayer;
use pulse_viewer::{Applied, CueScheduler, Reconciler, StreamTransport};

const RECONNECT_DELAY: Duration = Duration::from_millis(1500);
const DEFAULT_API_BASE: &str = "http://localhost:3000";
const DEFAULT_CUE_SOUND: &str = "assets/cash-register.mp3";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }

    let api_base =
        std::env::var("API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let cue_sound =
        std::env::var("CUE_SOUND").unwrap_or_else(|_| DEFAULT_CUE_SOUND.to_string());

    let scheduler = CueScheduler::start(KiraCuePlayer::new(cue_sound));
    if let Err(e) = scheduler.unlock().await {
        warn!("audio unavailable for now, cues stay queued: {:#}", e);
    }

    let transport = StreamTransport::new(&api_base);
    let mut reconciler = Reconciler::new();

    info!("Pulseboard viewer connecting to {}", api_base);
    loop {
        reconciler.connecting();
        let outcome = transport
            .run_once(|payload| match reconciler.apply(&payload) {
                Applied::Resynced => {
                    scheduler.reset();
                    info!("resynced: {:?}", reconciler.mirror());
                }
                Applied::Advanced(notice) => {
                    info!(
                        "{} -> {} active users",
                        notice.product_id, notice.users
                    );
                    scheduler.enqueue(notice);
                }
                Applied::Ignored => {}
            })
            .await;

        reconciler.disconnected();
        match outcome {
            Ok(()) => warn!("stream closed by server, reconnecting"),
            Err(e) => warn!("stream transport lost ({}), reconnecting", e),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
