// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic contacts-indexer usage example.
//!
//! Demonstrates:
//! 1. Starting a user instance over in-memory collaborators
//! 2. The first delta update indexing existing contacts
//! 3. Edits and deletions picked up on change notifications
//! 4. A scheduled full update that finds nothing to write
//! 5. Displaying metrics
//! 6. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use contacts_indexer::{
    Collaborators, ContactRecord, ContactsIndexerConfig, InMemoryContactsProvider,
    InMemoryDocumentStore, InMemoryJobScheduler, LabeledValue, UpdateStats, UserId, UserInstance,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt().with_target(false).compact().init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║          contacts-indexer: Basic Usage Example                ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Collaborators and instance
    // ─────────────────────────────────────────────────────────────────────────
    let provider = Arc::new(InMemoryContactsProvider::new());
    provider.upsert(
        ContactRecord::new("1", "Ada Lovelace")
            .with_email(LabeledValue::new("work", "ada@example.com"))
            .with_nickname("Enchantress of Numbers"),
    );
    provider.upsert(ContactRecord::new("2", "Grace Hopper").with_organization("US Navy").starred(true));
    provider.upsert(ContactRecord::new("3", "Alan Turing").with_phone(LabeledValue::new("home", "+44 20 0000")));

    let store = Arc::new(InMemoryDocumentStore::new());
    let scheduler = Arc::new(InMemoryJobScheduler::new());
    let collaborators = Collaborators { store: store.clone(), provider: provider.clone(), scheduler: scheduler.clone() };

    let settings_dir = tempfile::tempdir()?;
    let (config_tx, config_rx) = watch::channel(ContactsIndexerConfig::default());
    let user = UserId(0);
    let instance = UserInstance::start(user, settings_dir.path(), collaborators, config_rx).await?;
    println!("📦 Started indexer for user {user}, settings in {}", settings_dir.path().display());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. First delta update
    // ─────────────────────────────────────────────────────────────────────────
    let snapshot = instance.wait_until_idle().await?;
    print_stats("First delta update", snapshot.last_delta_stats.as_ref());
    println!("   Indexed ids: {:?}", store.ids());
    if let Some(job) = scheduler.pending(user) {
        println!("   Pending job: periodic={} every {} ms", job.periodic, job.interval_millis);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Edit, insert and delete, then notify
    // ─────────────────────────────────────────────────────────────────────────
    provider.update("1", |c| c.display_name = "Augusta Ada King".into());
    provider.upsert(ContactRecord::new("4", "Katherine Johnson"));
    provider.delete("3");
    instance.on_contacts_changed()?;

    let snapshot = instance.wait_until_idle().await?;
    print_stats("Delta update after edits", snapshot.last_delta_stats.as_ref());
    println!("   Indexed ids: {:?}", store.ids());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Full update job
    // ─────────────────────────────────────────────────────────────────────────
    let result = instance.run_full_update_job(CancellationToken::new()).await;
    println!("\n🔄 Full update job finished: {result:?}");
    let snapshot = instance.wait_until_idle().await?;
    print_stats("Full update", snapshot.last_full_stats.as_ref());
    println!("   Watermarks: {:?}", snapshot.settings);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    instance.shutdown().await;
    drop(config_tx);
    println!("\n👋 Indexer state: {}", instance.state());
    Ok(())
}

fn print_stats(title: &str, stats: Option<&UpdateStats>) {
    println!("\n✅ {title}");
    let Some(stats) = stats else {
        println!("   (no stats)");
        return;
    };
    println!(
        "   to_update={} inserted={} updated={} skipped={} failed={}",
        stats.contacts_to_update,
        stats.new_contacts_inserted,
        stats.contacts_update_succeeded,
        stats.contacts_update_skipped,
        stats.contacts_update_failed,
    );
    println!(
        "   to_delete={} deleted={} not_found={} took={}ms",
        stats.contacts_to_delete,
        stats.contacts_delete_succeeded,
        stats.contacts_delete_not_found,
        stats.duration_millis(),
    );
}

/// Dump all captured metrics, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = vec![];
    let mut gauges = vec![];
    let mut histograms = vec![];

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
        let name = key.name().to_string();

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, label_str, count, sum));
            }
        }
    }
    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, labels, value) in &counters {
        println!("   counter   {name}{labels} = {value}");
    }
    for (name, labels, value) in &gauges {
        println!("   gauge     {name}{labels} = {value:.2}");
    }
    for (name, labels, count, sum) in &histograms {
        println!("   histogram {name}{labels} count={count} sum={sum:.4}");
    }
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   (no metrics recorded)");
    }
}
