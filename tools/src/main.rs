//! snapshot-tool: headless runner over a location snapshot directory.
//!
//! Usage:
//!   snapshot-tool --dir ./snapshots
//!   snapshot-tool --dir ./snapshots --write
//!   snapshot-tool --dir ./snapshots --show 004000001234ABCD

use anyhow::{anyhow, Context, Result};
use location_core::{
    durability::{LoadReport, SnapshotDirectory},
    store::SnapshotStore,
    types::{identity_hex, Identity},
    CURRENT_VERSION,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let dir = arg_value(&args, "--dir").ok_or_else(|| anyhow!("--dir <path> is required"))?;
    let write = args.iter().any(|a| a == "--write");
    let show = arg_value(&args, "--show");

    let directory = SnapshotDirectory::new(dir);
    let store = SnapshotStore::new();
    let report = directory
        .load_into(&store)
        .with_context(|| format!("Cannot list {dir}"))?;

    if let Some(hex) = show {
        let identity = parse_identity(hex)?;
        if !store.contains(identity) {
            return Err(anyhow!("No snapshot for {}", identity_hex(identity)));
        }
        println!("{}", serde_json::to_string_pretty(&*store.get(identity))?);
        return Ok(());
    }

    print_summary(dir, &store, &report);

    if write {
        rewrite_migrated(&directory, &store, &report)?;
    }
    Ok(())
}

fn rewrite_migrated(
    directory: &SnapshotDirectory,
    store: &SnapshotStore,
    report: &LoadReport,
) -> Result<()> {
    for (identity, _) in &report.migrated {
        let path = directory.write(*identity, &store.get(*identity))?;
        log::info!("Rewrote {}", path.display());
    }
    println!("Rewrote {} file(s) at v{CURRENT_VERSION}", report.migrated.len());
    Ok(())
}

fn print_summary(dir: &str, store: &SnapshotStore, report: &LoadReport) {
    println!("Location snapshots in {dir}");
    println!("  loaded:    {}", report.loaded.len());
    println!("  upgraded:  {}", report.migrated.len());
    println!("  skipped:   {}", report.skipped.len());
    println!();

    for identity in store.identities() {
        let snapshot = store.get(identity);
        let upgraded_from = report
            .migrated
            .iter()
            .find(|(id, _)| *id == identity)
            .map(|(_, from)| format!(" (from v{from})"))
            .unwrap_or_default();
        let (hour, minute) = snapshot.time_of_day();
        println!(
            "  {}  v{}{upgraded_from}  {}  rot {:.1}°  {:02}:{:02}  layout {}/{}",
            identity_hex(identity),
            snapshot.version,
            snapshot.territory_path,
            snapshot.rotation_degrees(),
            hour,
            minute,
            snapshot.active.len(),
            snapshot.inactive.len(),
        );
    }
    for path in &report.skipped {
        println!("  skipped {}", path.display());
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_identity(hex: &str) -> Result<Identity> {
    Identity::from_str_radix(hex.trim_start_matches("0x"), 16)
        .with_context(|| format!("Not a hex identity: {hex}"))
}
