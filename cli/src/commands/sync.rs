use std::process;

use anyhow::Result;
use tracing::info;

use larder_core::service::Session;

use super::helpers::json_error;
use crate::lifecycle::{SYNC_TAG, SyncSignal};
use crate::sync::{SyncCoordinator, SyncOutcome};

pub(crate) async fn cmd_sync(
    session: &Session,
    coordinator: &SyncCoordinator,
    background: bool,
    json: bool,
) -> Result<()> {
    if background {
        // Route the push through the one-shot registration, the same
        // path a deferred sync takes when connectivity returns.
        let signal = SyncSignal::new();
        let mut rx = signal.subscribe();
        signal.register(SYNC_TAG);
        signal.fire(SYNC_TAG);
        let message = rx.recv().await?;
        info!(?message, "deferred sync request received");
    }

    match coordinator.sync_once(session).await {
        Ok(SyncOutcome::Synced(count)) => {
            if json {
                println!("{}", serde_json::json!({ "synced": count }));
            } else {
                println!("Recipes synced successfully!");
            }
            Ok(())
        }
        Ok(SyncOutcome::NothingToSync) => {
            if json {
                println!("{}", serde_json::json!({ "synced": 0 }));
            } else {
                println!("Nothing to sync");
            }
            Ok(())
        }
        Ok(SyncOutcome::AlreadyInFlight) => {
            if json {
                println!("{}", json_error("A sync is already in progress"));
            } else {
                eprintln!("A sync is already in progress");
            }
            process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
