use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use conkg_core::error::{ConkgError, Result};

/// Directory names skipped unless hidden content is requested.
pub const EXCLUDED_DIRS: [&str; 5] = [".git", ".venv", "node_modules", "__pycache__", ".pytest_cache"];

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub include_hidden: bool,
}

/// One row of the inventory; field order is the CSV column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub full_path: String,
    pub directory: String,
    pub filename: String,
    pub file_type: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub modified_date: String,
    pub created_date: String,
}

impl FileRecord {
    pub fn path(&self) -> &Path {
        Path::new(&self.full_path)
    }
}

pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size_bytes as f64;
    let mut i = 0;
    while size >= 1024.0 && i < UNITS.len() - 1 {
        size /= 1024.0;
        i += 1;
    }
    format!("{:.1} {}", size, UNITS[i])
}

/// Lower-cased extension, or `no_extension`.
pub fn file_type(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => "no_extension".to_string(),
    }
}

fn timestamp(time: std::io::Result<std::time::SystemTime>) -> String {
    time.map(|t| DateTime::<Local>::from(t).format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn record_for(path: &Path, metadata: &std::fs::Metadata) -> FileRecord {
    let full = absolute(path);
    let filename = full
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    FileRecord {
        full_path: full.to_string_lossy().to_string(),
        directory: full
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_type: file_type(&filename),
        filename,
        size_bytes: metadata.len(),
        size_human: format_size(metadata.len()),
        modified_date: timestamp(metadata.modified()),
        created_date: timestamp(metadata.created()),
    }
}

pub fn describe_file(path: &Path) -> Result<FileRecord> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(ConkgError::Ingest(format!("{} is not a file", path.display())));
    }
    Ok(record_for(path, &metadata))
}

/// Recursively list files under `root`, sorted by full path.
pub fn scan_directory(root: &Path, options: &ScanOptions) -> Result<Vec<FileRecord>> {
    if !root.is_dir() {
        return Err(ConkgError::Ingest(format!("{} is not a directory", root.display())));
    }
    info!(root = %root.display(), "Scanning directory");

    let include_hidden = options.include_hidden;
    let walker = WalkDir::new(root).into_iter().filter_entry(move |e| {
        include_hidden
            || e.depth() == 0
            || !e.file_type().is_dir()
            || !EXCLUDED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
    });

    let mut records = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Skipping file without metadata");
                continue;
            }
        };

        records.push(record_for(entry.path(), &metadata));
    }

    records.sort_by(|a, b| a.full_path.cmp(&b.full_path));
    info!(files = records.len(), "Scan complete");
    Ok(records)
}

pub fn write_csv<W: std::io::Write>(records: &[FileRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for r in records {
        wtr.serialize(r)
            .map_err(|e| ConkgError::Ingest(format!("Failed to write inventory row: {}", e)))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv_file(records: &[FileRecord], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(records, file)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeStat {
    pub file_type: String,
    pub count: u64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_files: u64,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub directories: u64,
    pub top_types_by_count: Vec<TypeStat>,
    pub top_types_by_size: Vec<TypeStat>,
    pub largest: Vec<FileRecord>,
    pub most_recent: Vec<FileRecord>,
}

impl InventorySummary {
    pub fn from_records(records: &[FileRecord], top: usize) -> Self {
        let total_size: u64 = records.iter().map(|r| r.size_bytes).sum();
        let directories: BTreeSet<&str> = records.iter().map(|r| r.directory.as_str()).collect();

        let mut by_type: HashMap<&str, TypeStat> = HashMap::new();
        for r in records {
            let stat = by_type.entry(r.file_type.as_str()).or_insert_with(|| TypeStat {
                file_type: r.file_type.clone(),
                count: 0,
                size_bytes: 0,
            });
            stat.count += 1;
            stat.size_bytes += r.size_bytes;
        }
        let stats: Vec<TypeStat> = by_type.into_values().collect();

        let mut by_count = stats.clone();
        by_count.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.file_type.cmp(&b.file_type)));
        by_count.truncate(top);

        let mut by_size = stats;
        by_size.sort_by(|a, b| {
            b.size_bytes
                .cmp(&a.size_bytes)
                .then_with(|| a.file_type.cmp(&b.file_type))
        });
        by_size.truncate(top);

        let mut largest = records.to_vec();
        largest.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.full_path.cmp(&b.full_path)));
        largest.truncate(top);

        let mut most_recent = records.to_vec();
        most_recent.sort_by(|a, b| {
            b.modified_date
                .cmp(&a.modified_date)
                .then_with(|| a.full_path.cmp(&b.full_path))
        });
        most_recent.truncate(top);

        Self {
            total_files: records.len() as u64,
            total_size_bytes: total_size,
            total_size_human: format_size(total_size),
            directories: directories.len() as u64,
            top_types_by_count: by_count,
            top_types_by_size: by_size,
            largest,
            most_recent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024u64.pow(5)), "3072.0 TB");
    }

    #[test]
    fn test_file_type() {
        assert_eq!(file_type("Report.PDF"), "pdf");
        assert_eq!(file_type("archive.tar.gz"), "gz");
        assert_eq!(file_type("Makefile"), "no_extension");
        assert_eq!(file_type("trailing."), "no_extension");
    }

    #[test]
    fn test_scan_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("specs")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("specs/b.txt"), "bb").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();

        let records = scan_directory(dir.path(), &ScanOptions::default()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
        assert_eq!(records[1].file_type, "txt");
        assert_eq!(records[1].size_bytes, 2);

        let all = scan_directory(dir.path(), &ScanOptions { include_hidden: true }).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_scan_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_directory(&dir.path().join("nope"), &ScanOptions::default()).is_err());
    }

    #[test]
    fn test_csv_header_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("b.txt"), "hi").unwrap();
        std::fs::write(dir.path().join("c.csv"), "x,y,z,w,v,u").unwrap();
        let records = scan_directory(dir.path(), &ScanOptions::default()).unwrap();

        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(
            "full_path,directory,filename,file_type,size_bytes,size_human,modified_date,created_date\n"
        ));
        assert_eq!(text.lines().count(), 4);

        let summary = InventorySummary::from_records(&records, 1);
        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.total_size_bytes, 18);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.top_types_by_count[0].file_type, "txt");
        assert_eq!(summary.top_types_by_size[0].file_type, "csv");
        assert_eq!(summary.largest[0].filename, "c.csv");
    }
}
