//! Manifest command implementation for inspecting a backup directory.

use crate::manifest::{Manifest, ManifestStore, VerifyReport};
use anyhow::{bail, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};

/// Arguments for the manifest command
#[derive(Args)]
pub struct ManifestArgs {
    /// Backup directory containing manifest.json
    #[arg(short, long)]
    pub backup: PathBuf,

    /// Output format (json, summary)
    #[arg(long, default_value = "summary", value_parser = ["summary", "json"])]
    pub format: String,

    /// Check every entry against its backup copy
    #[arg(long)]
    pub verify: bool,
}

/// Run the manifest command
pub fn run(args: ManifestArgs) -> Result<()> {
    let store = ManifestStore::new(&args.backup);

    if !store.path().exists() {
        println!("No manifest found at: {}", store.path().display());
        return Ok(());
    }

    let manifest = store.load()?;

    if args.verify {
        let report = manifest.verify(&args.backup);
        print_verify_report(&report);
        if !report.is_clean() {
            bail!("Verification failed for {}", store.path().display());
        }
        return Ok(());
    }

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&manifest)?),
        _ => print_manifest_summary(&manifest, &args.backup),
    }

    Ok(())
}

fn print_manifest_summary(manifest: &Manifest, backup_root: &Path) {
    let total_size: u64 = manifest
        .iter()
        .filter_map(|(key, _)| fs::metadata(backup_root.join(key)).ok())
        .map(|meta| meta.len())
        .sum();

    println!("Backup Manifest Summary");
    println!("=======================\n");
    println!("Backup Path:     {}", backup_root.display());
    println!("Tracked Files:   {}", manifest.len());
    println!("Total Size:      {}", format_bytes(total_size));

    if !manifest.is_empty() {
        println!("\nSample Files:");
        for (key, fingerprint) in manifest.iter().take(5) {
            let short = fingerprint.as_str().get(..12).unwrap_or(fingerprint.as_str());
            println!("  {} ({})", key, short);
        }
        if manifest.len() > 5 {
            println!("  ... and {} more files", manifest.len() - 5);
        }
    }
}

fn print_verify_report(report: &VerifyReport) {
    if report.is_clean() {
        println!("✓ Verification completed successfully");
        println!("  All {} entries match their backup copies", report.checked);
        return;
    }

    println!("✗ Verification failed");
    println!("  {} entries checked", report.checked);

    print_list("Missing", report.missing.iter().map(String::as_str));
    print_list("Mismatched", report.mismatched.iter().map(String::as_str));
    print_list(
        "Unreadable",
        report.unreadable.iter().map(|(key, _)| key.as_str()),
    );
    print_list(
        "Rejected",
        report.rejected.iter().map(|(key, _)| key.as_str()),
    );
}

fn print_list<'a>(label: &str, keys: impl ExactSizeIterator<Item = &'a str>) {
    let count = keys.len();
    if count == 0 {
        return;
    }

    println!("\n{} ({}):", label, count);
    for key in keys.take(10) {
        println!("  {}", key);
    }
    if count > 10 {
        println!("  ... and {} more", count - 10);
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
