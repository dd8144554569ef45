// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Delta update cycle: apply what changed since the last watermarks.

use tracing::{info, warn};

use crate::error::UpdateError;
use crate::indexer::{CorpusUpdater, CycleCompletion};
use crate::metrics::LatencyTimer;
use crate::scheduler::JobSpec;
use crate::stats::{UpdateKind, UpdateStats};

use super::CycleContext;

/// Watermarks reached by a delta update that did not fail.
#[derive(Debug, Clone, Copy)]
pub(super) struct DeltaProgress {
    pub completion: CycleCompletion,
    pub last_contact_update_millis: i64,
    pub last_contact_delete_millis: i64,
}

pub(super) struct DeltaOutcome {
    pub result: Result<DeltaProgress, UpdateError>,
    pub stats: UpdateStats,
}

#[tracing::instrument(skip(ctx), fields(user = %ctx.user))]
pub(super) async fn run_delta_update(ctx: CycleContext) -> DeltaOutcome {
    let _timer = LatencyTimer::new("delta", "cycle");
    let mut stats = UpdateStats::new(UpdateKind::Delta);
    stats.previous_last_contact_update_timestamp_millis = ctx.settings.last_contact_update_timestamp_millis();
    stats.previous_last_contact_delete_timestamp_millis = ctx.settings.last_contact_delete_timestamp_millis();

    let result = execute(&ctx, &mut stats).await;
    stats.finish();

    if let Err(ref e) = result {
        warn!(error = %e, "Delta update failed, watermarks unchanged");
    }

    if stats.has_out_of_space() || stats.listing_truncated {
        let reason = if stats.has_out_of_space() { "out_of_space" } else { "truncated_listing" };
        match ctx.scheduler.schedule(ctx.user, JobSpec::one_off_full_update()).await {
            Ok(()) => {
                info!(reason, "Scheduled one-off full update");
                crate::metrics::record_job("one_off");
            }
            Err(e) => warn!(reason, error = %e, "Failed to schedule one-off full update"),
        }
    }

    DeltaOutcome { result, stats }
}

async fn execute(ctx: &CycleContext, stats: &mut UpdateStats) -> Result<DeltaProgress, UpdateError> {
    let limit = ctx.config.delta_limit(ctx.settings.is_first_run());
    let (updated, deleted) = tokio::try_join!(
        ctx.source.list_updated_ids(ctx.settings.last_contact_update_timestamp_millis(), limit),
        ctx.source.list_deleted_ids(ctx.settings.last_contact_delete_timestamp_millis()),
    )?;
    stats.listing_truncated = limit.is_reached_by(updated.len());
    info!(
        updated = updated.len(),
        deleted = deleted.len(),
        truncated = stats.listing_truncated,
        "Starting delta update"
    );

    let updater = CorpusUpdater::new(
        ctx.source.clone(),
        ctx.store.clone(),
        ctx.config.batch_config(),
        ctx.config.keep_updating_on_error,
    );
    let completion = updater.update_corpus(updated.ids, deleted.ids, stats, &ctx.cancel).await?;

    stats.new_last_contact_update_timestamp_millis = updated.most_recent_change_millis;
    stats.new_last_contact_delete_timestamp_millis = deleted.most_recent_change_millis;
    Ok(DeltaProgress {
        completion,
        last_contact_update_millis: updated.most_recent_change_millis,
        last_contact_delete_millis: deleted.most_recent_change_millis,
    })
}
