//! Newline-delimited JSON loading with rotation ordering.
//!
//! # Tolerance
//!
//! - A missing file, or a path that is not a regular file, reads as zero
//!   records.
//! - A line that is not JSON, or is JSON but not an object, is dropped and
//!   counted in [`LoadStats::dropped`].
//! - Blank lines are skipped and not counted.
//!
//! # Rotation Order
//!
//! A log rotated into numbered suffixes is folded in a fixed total order:
//!
//! 1. the un-suffixed (current) file,
//! 2. files with a purely numeric suffix, ascending by numeric value, with
//!    equal values (`.2`, `.02`) ordered by the raw suffix,
//! 3. any other suffix, lexicographically.
//!
//! Active-count reconstruction depends on fold order, so this order is part
//! of the contract and is pinned by tests.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::Record;

/// Per-load line accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Files that existed and were read.
    pub files_read: usize,
    /// Records kept.
    pub kept: usize,
    /// Non-blank lines dropped as malformed.
    pub dropped: usize,
}

impl LoadStats {
    fn absorb(&mut self, other: Self) {
        self.files_read += other.files_read;
        self.kept += other.kept;
        self.dropped += other.dropped;
    }
}

/// Records loaded from one or more files, in fold order.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    /// The records, in the order they must be folded.
    pub records: Vec<Record>,
    /// Line accounting across all files.
    pub stats: LoadStats,
}

/// Loads a single newline-delimited JSON file.
#[must_use]
pub fn load_ndjson(path: &Path) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {},
        Ok(_) => {
            debug!(path = %path.display(), "input is not a regular file, treating as empty");
            return loaded;
        },
        Err(err) => {
            debug!(path = %path.display(), error = %err, "input not readable, treating as empty");
            return loaded;
        },
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "input not readable, treating as empty");
            return loaded;
        },
    };
    loaded.stats.files_read = 1;

    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            // Invalid UTF-8 consumes the line, so it counts as malformed.
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                loaded.stats.dropped += 1;
                continue;
            },
            Err(err) => {
                debug!(path = %path.display(), error = %err, "read failed, stopping");
                break;
            },
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(record)) => {
                loaded.records.push(record);
                loaded.stats.kept += 1;
            },
            _ => loaded.stats.dropped += 1,
        }
    }

    debug!(
        path = %path.display(),
        kept = loaded.stats.kept,
        dropped = loaded.stats.dropped,
        "loaded ndjson"
    );
    loaded
}

/// Lists `base_name` and its rotations inside `dir`, in fold order.
#[must_use]
pub fn discover_rotated(dir: &Path, base_name: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let prefix = format!("{base_name}.");
    let mut found: Vec<(RotationKey, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let key = if name == base_name {
            RotationKey::Current
        } else if let Some(suffix) = name.strip_prefix(&prefix) {
            RotationKey::from_suffix(suffix)
        } else {
            continue;
        };
        found.push((key, path));
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    let ordered: Vec<PathBuf> = found.into_iter().map(|(_, path)| path).collect();
    debug!(base = base_name, files = ?ordered, "resolved rotation order");
    ordered
}

/// Loads `base_name` and all of its rotations as one ordered sequence.
#[must_use]
pub fn load_rotated(dir: &Path, base_name: &str) -> LoadedRecords {
    let mut loaded = LoadedRecords::default();
    for path in discover_rotated(dir, base_name) {
        let part = load_ndjson(&path);
        loaded.records.extend(part.records);
        loaded.stats.absorb(part.stats);
    }
    loaded
}

/// Loads a single-object JSON document.
///
/// Returns `None` when the file is missing, unreadable, not JSON, or not an
/// object.
#[must_use]
pub fn load_summary_object(path: &Path) -> Option<Record> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "summary not readable");
            return None;
        },
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(record)) => Some(record),
        Ok(_) => {
            warn!(path = %path.display(), "summary root is not a JSON object, ignoring");
            None
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "summary is not valid JSON, ignoring");
            None
        },
    }
}

/// Sort key for a rotated file name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RotationKey {
    Current,
    Numbered(u128, String),
    Other(String),
}

impl RotationKey {
    fn from_suffix(suffix: &str) -> Self {
        if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = suffix.parse::<u128>() {
                return Self::Numbered(number, suffix.to_string());
            }
        }
        Self::Other(suffix.to_string())
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Current => 0,
            Self::Numbered(..) => 1,
            Self::Other(_) => 2,
        }
    }
}

impl Ord for RotationKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numbered(a, raw_a), Self::Numbered(b, raw_b)) => {
                a.cmp(b).then_with(|| raw_a.cmp(raw_b))
            },
            (Self::Other(a), Self::Other(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for RotationKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    const BASE: &str = "orchestration-admission.ndjson";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let loaded = load_ndjson(&temp.path().join("absent.ndjson"));

        assert!(loaded.records.is_empty());
        assert_eq!(loaded.stats, LoadStats::default());
    }

    #[test]
    fn test_malformed_lines_are_dropped() {
        let temp = TempDir::new().unwrap();
        let path = write(
            temp.path(),
            "mixed.ndjson",
            "{\"kind\":\"run_allowed\"}\n\
             not json at all\n\
             \n\
             [1,2,3]\n\
             \"just a string\"\n\
             {\"kind\":\"run_en\n\
             {\"kind\":\"run_end\"}\n",
        );

        let loaded = load_ndjson(&path);

        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.stats.kept, 2);
        assert_eq!(loaded.stats.dropped, 4);
        assert_eq!(loaded.records[1]["kind"], "run_end");
    }

    #[test]
    fn test_rotation_order_is_numeric_then_lexicographic() {
        let temp = TempDir::new().unwrap();
        for name in [
            format!("{BASE}.10"),
            format!("{BASE}.old"),
            format!("{BASE}.2"),
            BASE.to_string(),
            format!("{BASE}.bak"),
            "status.ndjson".to_string(),
            format!("{BASE}x"),
        ] {
            write(temp.path(), &name, "");
        }
        fs::create_dir(temp.path().join(format!("{BASE}.3"))).unwrap();

        let ordered = discover_rotated(temp.path(), BASE);

        assert_eq!(
            names(&ordered),
            vec![
                BASE.to_string(),
                format!("{BASE}.2"),
                format!("{BASE}.10"),
                format!("{BASE}.bak"),
                format!("{BASE}.old"),
            ]
        );
    }

    #[test]
    fn test_load_rotated_concatenates_in_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), &format!("{BASE}.10"), "{\"n\":3}\n");
        write(temp.path(), BASE, "{\"n\":1}\n");
        write(temp.path(), &format!("{BASE}.2"), "{\"n\":2}\nbroken\n");

        let loaded = load_rotated(temp.path(), BASE);

        let order: Vec<i64> = loaded
            .records
            .iter()
            .map(|r| r["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(loaded.stats.files_read, 3);
        assert_eq!(loaded.stats.dropped, 1);
    }

    #[test]
    fn test_equal_numeric_suffixes_order_by_raw_suffix() {
        let temp = TempDir::new().unwrap();
        for suffix in ["2", "1", "002", "02"] {
            write(temp.path(), &format!("{BASE}.{suffix}"), "");
        }

        let ordered = discover_rotated(temp.path(), BASE);

        assert_eq!(
            names(&ordered),
            vec![
                format!("{BASE}.1"),
                format!("{BASE}.002"),
                format!("{BASE}.02"),
                format!("{BASE}.2"),
            ]
        );
    }

    #[test]
    fn test_directory_in_place_of_input_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("status.ndjson");
        fs::create_dir(&path).unwrap();

        let loaded = load_ndjson(&path);

        assert!(loaded.records.is_empty());
        assert_eq!(loaded.stats, LoadStats::default());
    }

    #[test]
    fn test_invalid_utf8_line_is_dropped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bytes.ndjson");
        fs::write(&path, b"{\"n\":1}\n\xff\xfe\n{\"n\":2}\n").unwrap();

        let loaded = load_ndjson(&path);

        assert_eq!(loaded.stats.kept, 2);
        assert_eq!(loaded.stats.dropped, 1);
    }

    #[test]
    fn test_discover_in_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(discover_rotated(&temp.path().join("nope"), BASE).is_empty());
    }

    #[test]
    fn test_summary_object_tolerance() {
        let temp = TempDir::new().unwrap();
        let good = write(temp.path(), "good.json", "{\"policy\":{\"maxRuns\":4}}");
        let array = write(temp.path(), "array.json", "[1]");
        let broken = write(temp.path(), "broken.json", "{\"policy\":");

        assert!(load_summary_object(&good).is_some());
        assert!(load_summary_object(&array).is_none());
        assert!(load_summary_object(&broken).is_none());
        assert!(load_summary_object(&temp.path().join("absent.json")).is_none());
    }
}
