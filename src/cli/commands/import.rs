//! Import command implementation.
//!
//! Imports the `.zip` archives found directly in the source directory, in
//! name order. Every processed archive is moved to the backup directory
//! (or deleted) whether its import succeeded or not, so a broken delivery
//! is not retried forever.

use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

use crate::cli::ImportArgs;
use crate::cli::commands::open_storage;
use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::import::{ImportStats, Importer};

#[derive(Serialize)]
struct ArchiveReport {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<ImportStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ImportOutput {
    archives: Vec<ArchiveReport>,
    processed: usize,
    failed: usize,
    seconds: f64,
}

/// Execute the import command.
///
/// # Errors
///
/// Returns [`Error::ImportFailed`] if any archive could not be imported,
/// or an error if the directories or database are unusable.
pub fn execute(
    args: &ImportArgs,
    db_path: Option<&Path>,
    config: ImportConfig,
    actor: &str,
    json: bool,
) -> Result<()> {
    let source_dir = config.project_dir.join(&args.source_dir);
    if !source_dir.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "The source directory {} does not exist.",
            source_dir.display()
        )));
    }

    let backup_dir = match &args.backup_dir {
        Some(dir) => {
            let dir = config.project_dir.join(dir);
            if !dir.is_dir() {
                return Err(Error::InvalidArgument(
                    "The backup directory does not exist.".to_string(),
                ));
            }
            Some(dir)
        }
        None => None,
    };

    let mut storage = open_storage(db_path)?;
    let archives = find_archives(&source_dir, args.max_files)?;
    let start = Instant::now();

    if !json {
        println!("Starting the OpenImmo import…");
    }

    let mut reports = Vec::with_capacity(archives.len());
    for path in &archives {
        let file = file_name(path);
        if !json {
            println!("\n{}", format!("Importing \"{file}\"").bold());
        }

        let result = Importer::new(&mut storage, config.clone(), actor).import_path(path);
        let report = match result {
            Ok(stats) => {
                info!(
                    archive = %file,
                    providers = stats.providers.len(),
                    rows = stats.totals().total(),
                    "Imported archive"
                );
                if !json {
                    print_stats(&stats);
                }
                ArchiveReport {
                    file,
                    stats: Some(stats),
                    error: None,
                }
            }
            Err(e) => {
                error!(archive = %file, error = %e, "Import failed");
                if !json {
                    println!("{} {e}", "Import failed:".yellow());
                }
                ArchiveReport {
                    file,
                    stats: None,
                    error: Some(e.to_structured_json()),
                }
            }
        };
        reports.push(report);

        match &backup_dir {
            Some(dir) => {
                fs::rename(path, backup_target(dir, path))?;
            }
            None => fs::remove_file(path)?,
        }
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    let seconds = (start.elapsed().as_secs_f64() * 100.0).round() / 100.0;

    if json {
        let output = ImportOutput {
            processed: reports.len(),
            failed,
            seconds,
            archives: reports,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if failed == 0 {
        println!(
            "\n{}",
            format!(
                "Import of {} file(s) completed in {seconds}s.",
                archives.len()
            )
            .green()
        );
    }

    if failed > 0 {
        return Err(Error::ImportFailed {
            failed,
            total: archives.len(),
        });
    }

    Ok(())
}

/// `.zip` files directly in `dir`, sorted by name.
fn find_archives(dir: &Path, max_files: usize) -> Result<Vec<PathBuf>> {
    let mut archives: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        })
        .collect();

    archives.sort();
    archives.truncate(max_files);
    Ok(archives)
}

/// First free name in `dir`: `name.zip`, then `name_1.zip`, `name_2.zip`, ...
fn backup_target(dir: &Path, archive: &Path) -> PathBuf {
    let target = dir.join(file_name(archive));
    if !target.exists() {
        return target;
    }

    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = archive
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    (1..)
        .map(|index| dir.join(format!("{stem}_{index}.{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(target)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_stats(stats: &ImportStats) {
    if stats.providers.is_empty() {
        println!("  No recognized providers in this archive.");
    } else {
        println!(
            "  {:<24} {:>8} {:>8} {:>8}",
            "OpenImmo ID".bold(),
            "created".bold(),
            "updated".bold(),
            "deleted".bold()
        );
        for (provider, s) in &stats.providers {
            println!(
                "  {provider:<24} {:>8} {:>8} {:>8}",
                s.created, s.updated, s.deleted
            );
        }
        if stats.providers.len() > 1 {
            let total = stats.totals();
            println!(
                "  {:<24} {:>8} {:>8} {:>8}",
                "total".bold(),
                total.created,
                total.updated,
                total.deleted
            );
        }
    }

    if stats.totals().total() == 0 && !stats.providers.is_empty() {
        println!("  {}", "Listings already up to date.".dimmed());
    }

    if stats.skipped_records > 0 {
        println!(
            "  {}",
            format!("{} listing(s) skipped", stats.skipped_records).yellow()
        );
    }
}
