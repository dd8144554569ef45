// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Full update cycle: make the index match the current contact set.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::UpdateError;
use crate::indexer::{CorpusUpdater, CycleCompletion};
use crate::metrics::LatencyTimer;
use crate::stats::{UpdateKind, UpdateStats};

use super::CycleContext;

pub(super) struct FullOutcome {
    pub result: Result<CycleCompletion, UpdateError>,
    pub stats: UpdateStats,
}

/// Lists every current contact (newest first, bounded by the full update
/// limit), removes indexed documents outside that set and indexes the rest.
/// Always keeps going past failed batches.
#[tracing::instrument(skip(ctx), fields(user = %ctx.user))]
pub(super) async fn run_full_update(ctx: CycleContext) -> FullOutcome {
    let _timer = LatencyTimer::new("full", "cycle");
    let _release = ctx.cancel.clone().drop_guard();
    let mut stats = UpdateStats::new(UpdateKind::Full);
    stats.previous_last_contact_update_timestamp_millis = ctx.settings.last_contact_update_timestamp_millis();
    stats.previous_last_contact_delete_timestamp_millis = ctx.settings.last_contact_delete_timestamp_millis();

    let result = execute(&ctx, &mut stats).await;
    stats.finish();
    if let Err(ref e) = result {
        warn!(error = %e, "Full update failed");
    }
    FullOutcome { result, stats }
}

async fn execute(ctx: &CycleContext, stats: &mut UpdateStats) -> Result<CycleCompletion, UpdateError> {
    if ctx.cancel.is_cancelled() {
        return Ok(CycleCompletion::Cancelled);
    }

    // Indexed ids are listed before the source. A delta update running in
    // between can then only add ids the source listing also returns.
    let indexed = ctx.store.get_all_ids().await?;
    let limit = ctx.config.full_limit();
    let current = ctx.source.list_updated_ids(0, limit).await?;
    stats.listing_truncated = limit.is_reached_by(current.len());

    let mut unwanted: Vec<String> = {
        let keep: HashSet<&str> = current.ids.iter().map(String::as_str).collect();
        indexed.into_iter().filter(|id| !keep.contains(id.as_str())).collect()
    };
    unwanted.sort();
    info!(
        current = current.len(),
        unwanted = unwanted.len(),
        pruned_to_limit = stats.listing_truncated,
        "Starting full update"
    );

    let updater = CorpusUpdater::new(ctx.source.clone(), ctx.store.clone(), ctx.config.batch_config(), true);
    updater.update_corpus(current.ids, unwanted, stats, &ctx.cancel).await
}
