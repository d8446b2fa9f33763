//! Loading entry snapshots written by the notes collaborator.
//!
//! Accepts either a JSON array of entries or JSON Lines (one entry per
//! line). Reads take a shared lock so a concurrent writer holding an
//! exclusive lock is never observed mid-write.

use crate::{LogEntry, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read all entries from `path`.
///
/// A missing file is an empty snapshot. In JSON Lines files, lines that fail
/// to parse are skipped with a warning rather than discarding the snapshot.
pub fn load_entries(path: &Path) -> Result<Vec<LogEntry>> {
    if !path.exists() {
        tracing::debug!("No entries file at {:?}, using empty snapshot", path);
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let entries = parse_entries(&contents)?;
    tracing::debug!("Read {} entries from {:?}", entries.len(), path);
    Ok(entries)
}

/// Parse a JSON array or JSON Lines document into entries
pub fn parse_entries(contents: &str) -> Result<Vec<LogEntry>> {
    let trimmed = contents.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut entries = Vec::new();
    for (line_num, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("Failed to parse entry at line {}: {}", line_num + 1, e);
            }
        }
    }

    Ok(entries)
}

/// Find an entry by id
pub fn find_entry<'a>(entries: &'a [LogEntry], id: &str) -> Option<&'a LogEntry> {
    entries.iter().find(|e| e.id == id)
}
