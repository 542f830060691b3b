/**
 * Complaint Sync Agent
 *
 * Runs the connectivity monitor and the replay loop against the local
 * database, logging reachability changes and replay outcomes until Ctrl-C.
 *
 * Usage: complaint-sync-agent [config.toml]
 */

use complaint_sync::client::auth::Credentials;
use complaint_sync::client::offline::SyncEvent;
use complaint_sync::client::{Config, SyncClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => Config::new(),
    };
    tracing::info!(
        server_url = %config.server_url(),
        database = %config.database_path().display(),
        "starting complaint sync agent"
    );

    let client = SyncClient::open(config).await?;

    if let Ok(access_token) = std::env::var("COMPLAINT_SYNC_ACCESS_TOKEN") {
        let refresh_token = std::env::var("COMPLAINT_SYNC_REFRESH_TOKEN").ok();
        client
            .session()
            .sign_in(Credentials::new(access_token, refresh_token));
    }

    let banner = client.monitor().on_reachability_change(|state| {
        if state.effective_online() {
            tracing::info!("online");
        } else {
            tracing::warn!(
                link_up = state.is_online,
                backend_reachable = state.backend_reachable,
                "offline, writes will be queued"
            );
        }
    });

    let mut events = client.offline().subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SyncEvent::Replayed { mutation_id, status } => {
                    tracing::info!(mutation_id, status, "queued write delivered");
                }
                SyncEvent::Failed(failure) => {
                    tracing::error!(
                        mutation_id = failure.mutation_id,
                        method = %failure.method,
                        url = %failure.url,
                        status = ?failure.status,
                        "change did not survive sync: {}",
                        failure.message
                    );
                }
                SyncEvent::Deferred { mutation_id, reason } => {
                    tracing::warn!(mutation_id, %reason, "replay deferred");
                }
                other => tracing::debug!(?other, "sync event"),
            }
        }
    });

    let status = client.offline().status().await?;
    if status.has_pending() {
        tracing::info!(
            pending = status.pending,
            oldest = ?status.oldest_queued_at,
            "found queued writes from a previous run"
        );
    }
    for failure in client.offline().sync_failures().await? {
        tracing::warn!(
            id = failure.id,
            url = %failure.url,
            "unresolved sync failure from {}",
            failure.failed_at.to_rfc3339()
        );
    }

    client.start();
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    client.stop();
    banner.abort();
    event_log.abort();
    client.offline().database().close().await;

    Ok(())
}
