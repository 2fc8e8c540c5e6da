use std::sync::Arc;

use bookmarker_core::auth::SessionGateway;
use bookmarker_core::dashboard::{Dashboard, Gate};
use bookmarker_core::store::BookmarkStore;
use bookmarker_core::sync::SyncSnapshot;
use chrono::Utc;

use crate::commands::common::{format_bookmark_lines, open_backend};
use crate::error::CliError;

pub async fn run_watch(global_profile: Option<&str>) -> Result<(), CliError> {
    let backend = open_backend(global_profile).await?;
    let token_refresh = backend.gateway.spawn_token_refresh();
    let gateway: Arc<dyn SessionGateway> = backend.gateway.clone();
    let store: Arc<dyn BookmarkStore> = backend.store.clone();
    let Gate::Render(dashboard) = Dashboard::open(gateway, store).await else {
        token_refresh.abort();
        return Err(CliError::NotSignedIn);
    };

    println!(
        "Watching bookmarks for {} (Ctrl-C to stop)",
        dashboard.display_name()
    );
    let mut snapshots = dashboard.watch();
    let initial = snapshots.borrow_and_update().clone();
    print!("{}", render_snapshot(&initial, Utc::now().timestamp_millis()));
    if !initial.live {
        tracing::warn!("Live updates are unavailable; showing the list as fetched");
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                print!("{}", render_snapshot(&snapshot, Utc::now().timestamp_millis()));
                if !snapshot.live {
                    tracing::warn!("Change feed closed");
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    dashboard.close();
    token_refresh.abort();
    Ok(())
}

pub fn render_snapshot(snapshot: &SyncSnapshot, now_ms: i64) -> String {
    let count = snapshot.bookmarks.len();
    let mut rendered = format!(
        "--- {count} bookmark{} ---\n",
        if count == 1 { "" } else { "s" }
    );
    for line in format_bookmark_lines(&snapshot.bookmarks, now_ms) {
        rendered.push_str(&line);
        rendered.push('\n');
    }
    rendered
}
