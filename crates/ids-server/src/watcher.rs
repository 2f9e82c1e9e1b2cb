// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional filesystem watcher that triggers `RuleLoader::reload()` on
//! changes under the rules directory (spec §4.1 expansion: "operational
//! convenience, not a correctness requirement"). Grounded on the teacher's
//! `LogWatcher` (`notify`-backed, debounced) in `driver/log_watch.rs`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ids_core::RuleLoader;

const DEBOUNCE: Duration = Duration::from_millis(300);

/// Spawn a background task that watches `dir` and calls `loader.reload()`
/// on any filesystem event, debounced so a burst of writes (e.g. an editor
/// save) triggers one reload rather than many.
pub fn spawn(dir: &Path, loader: Arc<RuleLoader>, shutdown: CancellationToken) {
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    let watch_dir = dir.to_path_buf();

    // `notify::Watcher` is not `Send` across an await point in all backends,
    // so it lives on a dedicated blocking thread and forwards a signal over
    // a channel rather than being held across `.await`.
    std::thread::spawn(move || {
        let tx2 = tx.clone();
        let mut watcher = match notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = tx2.send(());
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "failed to start rule directory watcher");
                return;
            }
        };
        if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
            warn!(error = %e, path = %watch_dir.display(), "failed to watch rules directory");
            return;
        }
        // Park this thread for the process lifetime; the watcher's
        // callback keeps firing into `tx` until it is dropped.
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    });

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                signal = rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    tokio::time::sleep(DEBOUNCE).await;
                    while rx.try_recv().is_ok() {}
                    let failures = loader.reload().await;
                    let catalog = loader.catalog().await;
                    info!(rule_count = catalog.len(), failure_count = failures.len(), "rules reloaded from filesystem event");
                }
            }
        }
    });
}
