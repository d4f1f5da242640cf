use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use conkg_core::error::{ConkgError, Result};

use crate::inventory::{format_size, scan_directory, ScanOptions, EXCLUDED_DIRS};

/// Files sharing a name and size; `digest` is set once content has been compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateGroup {
    pub filename: String,
    pub size_bytes: u64,
    pub paths: Vec<PathBuf>,
    pub digest: Option<String>,
}

impl DuplicateGroup {
    /// Bytes freed by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.size_bytes * (self.paths.len().saturating_sub(1) as u64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateReport {
    pub fn extra_copies(&self) -> u64 {
        self.groups
            .iter()
            .map(|g| g.paths.len().saturating_sub(1) as u64)
            .sum()
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_bytes).sum()
    }

    pub fn wasted_human(&self) -> String {
        format_size(self.wasted_bytes())
    }
}

/// Candidate duplicates under `root`: groups of two or more files with equal name and size.
pub fn find_duplicates(root: &Path, options: &ScanOptions) -> Result<DuplicateReport> {
    let records = scan_directory(root, options)?;
    let mut groups: BTreeMap<(String, u64), Vec<PathBuf>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.filename.clone(), r.size_bytes))
            .or_default()
            .push(PathBuf::from(r.full_path));
    }

    let groups = groups
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|((filename, size_bytes), paths)| DuplicateGroup {
            filename,
            size_bytes,
            paths,
            digest: None,
        })
        .collect();
    Ok(DuplicateReport { groups })
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Split each candidate group by content digest, dropping files that turn out unique.
pub fn confirm_by_content(report: DuplicateReport) -> DuplicateReport {
    let mut confirmed = Vec::new();
    for group in report.groups {
        let mut by_digest: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for path in group.paths {
            match sha256_file(&path) {
                Ok(d) => by_digest.entry(d).or_default().push(path),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not hash file"),
            }
        }
        for (digest, paths) in by_digest {
            if paths.len() > 1 {
                confirmed.push(DuplicateGroup {
                    filename: group.filename.clone(),
                    size_bytes: group.size_bytes,
                    paths,
                    digest: Some(digest),
                });
            } else {
                debug!(filename = %group.filename, "Same name and size but different content");
            }
        }
    }
    DuplicateReport { groups: confirmed }
}

/// Files left for manual review even when duplicated.
pub const CRITICAL_FILES: &[&str] = &[
    "README.md",
    "package.json",
    "requirements.txt",
    ".gitignore",
    "LICENSE",
    "Makefile",
];

const MAX_PREFERRED_DEPTH: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupItem {
    pub filename: String,
    pub size_bytes: u64,
    pub keep: PathBuf,
    pub delete: Vec<PathBuf>,
}

impl CleanupItem {
    pub fn space_saved(&self) -> u64 {
        self.size_bytes * self.delete.len() as u64
    }
}

/// Which copy of each duplicate group survives and which are removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupPlan {
    pub root: PathBuf,
    pub items: Vec<CleanupItem>,
    /// Critical file names left alone.
    pub critical_skipped: Vec<String>,
    /// Extra copies kept because of the preservation rules.
    pub files_preserved: u64,
}

impl CleanupPlan {
    pub fn files_to_delete(&self) -> u64 {
        self.items.iter().map(|i| i.delete.len() as u64).sum()
    }

    pub fn space_to_save(&self) -> u64 {
        self.items.iter().map(CleanupItem::space_saved).sum()
    }

    /// Items ordered by bytes reclaimed, largest first.
    pub fn top_savers(&self, n: usize) -> Vec<&CleanupItem> {
        let mut items: Vec<&CleanupItem> = self.items.iter().collect();
        items.sort_by(|a, b| b.space_saved().cmp(&a.space_saved()).then(a.filename.cmp(&b.filename)));
        items.truncate(n);
        items
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    pub dry_run: bool,
    /// Copy each file here, keeping its path relative to the root, before deleting it.
    pub backup_dir: Option<PathBuf>,
    /// Where the JSON log goes; defaults to the plan root.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupAction {
    pub file: PathBuf,
    pub size_bytes: u64,
    pub kept_copy: PathBuf,
    pub backup: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupLog {
    pub timestamp: DateTime<Utc>,
    pub root: PathBuf,
    pub dry_run: bool,
    pub backup_dir: Option<PathBuf>,
    pub files_to_delete: u64,
    pub space_to_save: u64,
    pub files_preserved: u64,
    pub critical_skipped: Vec<String>,
    pub deleted: Vec<CleanupAction>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl CleanupLog {
    pub fn bytes_freed(&self) -> u64 {
        self.deleted.iter().map(|a| a.size_bytes).sum()
    }
}

fn in_preserved_dir(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            EXCLUDED_DIRS.iter().any(|p| name.contains(p))
        }
        _ => false,
    })
}

/// Higher scores are better copies to keep. Each rule that holds adds its
/// weight, earlier rules weighing more; older files get a small bonus.
fn keep_score(root: &Path, path: &Path, now: SystemTime) -> f64 {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let text = relative.to_string_lossy().to_lowercase();
    let depth = relative.components().count();
    let hidden = relative
        .components()
        .any(|c| matches!(c, Component::Normal(n) if n.to_string_lossy().starts_with('.')));

    let rules = [
        !in_preserved_dir(relative),
        depth < MAX_PREFERRED_DEPTH,
        !hidden,
        text.contains("original"),
        !text.contains("backup"),
    ];
    let weight = rules.len();
    let mut score: f64 = rules
        .iter()
        .enumerate()
        .filter(|(_, holds)| **holds)
        .map(|(i, _)| (weight - i) as f64)
        .sum();

    // Depth breaks ties between otherwise equal copies.
    score -= depth as f64 * 0.01;

    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    if let Some(age) = modified.and_then(|m| now.duration_since(m).ok()) {
        score += age.as_secs_f64() / 86_400.0 / 365.0;
    }
    score
}

/// Decide which copy of each group to keep. Critical files and copies under
/// preserved directories are never scheduled for deletion.
pub fn plan_cleanup(root: &Path, report: &DuplicateReport) -> CleanupPlan {
    let now = SystemTime::now();
    let mut plan = CleanupPlan {
        root: root.to_path_buf(),
        ..CleanupPlan::default()
    };

    for group in &report.groups {
        if CRITICAL_FILES.contains(&group.filename.as_str()) {
            warn!(filename = %group.filename, "Skipping critical file, needs manual review");
            plan.files_preserved += group.paths.len().saturating_sub(1) as u64;
            plan.critical_skipped.push(group.filename.clone());
            continue;
        }

        let (preserved, candidates): (Vec<&PathBuf>, Vec<&PathBuf>) = group
            .paths
            .iter()
            .partition(|p| in_preserved_dir(p.strip_prefix(root).unwrap_or(p.as_path())));
        plan.files_preserved += preserved.len() as u64;
        if candidates.len() < 2 {
            continue;
        }

        let mut scored: Vec<(f64, &PathBuf)> =
            candidates.into_iter().map(|p| (keep_score(root, p, now), p)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let keep = scored[0].1.clone();
        let delete: Vec<PathBuf> = scored[1..].iter().map(|(_, p)| p.to_path_buf()).collect();
        debug!(filename = %group.filename, keep = %keep.display(), delete = delete.len(), "Planned cleanup");
        plan.items.push(CleanupItem {
            filename: group.filename.clone(),
            size_bytes: group.size_bytes,
            keep,
            delete,
        });
    }
    plan
}

fn backup_file(root: &Path, backup_dir: &Path, path: &Path) -> Result<PathBuf> {
    let relative = path.strip_prefix(root).map_err(|_| {
        ConkgError::Ingest(format!("{} is outside {}", path.display(), root.display()))
    })?;
    let target = backup_dir.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(path, &target)?;
    Ok(target)
}

/// Carry out a plan and write a JSON log of what happened. A dry run deletes
/// nothing. A copy is only deleted while its kept copy still exists, and a
/// failed backup leaves the copy in place.
pub fn execute_cleanup(plan: &CleanupPlan, options: &CleanupOptions) -> Result<CleanupLog> {
    let started = Utc::now();
    let mut log = CleanupLog {
        timestamp: started,
        root: plan.root.clone(),
        dry_run: options.dry_run,
        backup_dir: options.backup_dir.clone(),
        files_to_delete: plan.files_to_delete(),
        space_to_save: plan.space_to_save(),
        files_preserved: plan.files_preserved,
        critical_skipped: plan.critical_skipped.clone(),
        deleted: Vec::new(),
        errors: Vec::new(),
        log_path: None,
    };

    if options.dry_run {
        info!(files = log.files_to_delete, bytes = log.space_to_save, "Dry run, no files deleted");
    } else {
        for item in &plan.items {
            if !item.keep.is_file() {
                log.errors.push(format!(
                    "Kept copy {} is missing, leaving {} copies of {}",
                    item.keep.display(),
                    item.delete.len(),
                    item.filename
                ));
                continue;
            }
            for path in &item.delete {
                let backup = match &options.backup_dir {
                    Some(dir) => match backup_file(&plan.root, dir, path) {
                        Ok(target) => Some(target),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Backup failed, keeping file");
                            log.errors.push(format!("Backup failed for {}: {e}", path.display()));
                            continue;
                        }
                    },
                    None => None,
                };
                match std::fs::remove_file(path) {
                    Ok(()) => {
                        debug!(path = %path.display(), "Deleted duplicate");
                        log.deleted.push(CleanupAction {
                            file: path.clone(),
                            size_bytes: item.size_bytes,
                            kept_copy: item.keep.clone(),
                            backup,
                            timestamp: Utc::now(),
                        });
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Delete failed");
                        log.errors.push(format!("Failed to delete {}: {e}", path.display()));
                    }
                }
            }
        }
        info!(
            deleted = log.deleted.len(),
            bytes = log.bytes_freed(),
            errors = log.errors.len(),
            "Cleanup finished"
        );
    }

    let log_dir = options.log_dir.as_deref().unwrap_or(&plan.root);
    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(format!("cleanup_log_{}.json", started.format("%Y%m%d_%H%M%S")));
    log.log_path = Some(log_path.clone());
    std::fs::write(&log_path, serde_json::to_string_pretty(&log)?)?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_by_name_and_size_then_content() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["a", "b", "c", "d"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        std::fs::write(dir.path().join("a/spec.txt"), "same body").unwrap();
        std::fs::write(dir.path().join("b/spec.txt"), "same body").unwrap();
        std::fs::write(dir.path().join("c/spec.txt"), "diff body").unwrap();
        std::fs::write(dir.path().join("d/spec.txt"), "short").unwrap();
        std::fs::write(dir.path().join("d/other.txt"), "same body").unwrap();

        let report = find_duplicates(dir.path(), &ScanOptions::default()).unwrap();
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].paths.len(), 3);
        assert_eq!(report.extra_copies(), 2);
        assert_eq!(report.wasted_bytes(), 18);

        let confirmed = confirm_by_content(report);
        assert_eq!(confirmed.groups.len(), 1);
        assert_eq!(confirmed.groups[0].paths.len(), 2);
        assert_eq!(confirmed.groups[0].digest.as_deref().map(str::len), Some(64));
        assert_eq!(confirmed.wasted_human(), "9.0 B");
    }

    #[test]
    fn test_sha256_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x");
        std::fs::write(&p, "abc").unwrap();
        assert_eq!(
            sha256_file(&p).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    fn duplicate_tree() -> (tempfile::TempDir, DuplicateReport) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["docs", "docs/old/backup", "node_modules/pkg", "x"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        std::fs::write(root.join("docs/plan.pdf"), "floor plan").unwrap();
        std::fs::write(root.join("docs/old/backup/plan.pdf"), "floor plan").unwrap();
        std::fs::write(root.join("x/plan.pdf"), "floor plan").unwrap();
        std::fs::write(root.join("node_modules/pkg/plan.pdf"), "floor plan").unwrap();
        std::fs::write(root.join("README.md"), "readme").unwrap();
        std::fs::write(root.join("x/README.md"), "readme").unwrap();

        let scan = ScanOptions { include_hidden: true };
        let report = confirm_by_content(find_duplicates(root, &scan).unwrap());
        (dir, report)
    }

    #[test]
    fn test_plan_cleanup_applies_keep_rules() {
        let (dir, report) = duplicate_tree();
        let root = dir.path();
        let plan = plan_cleanup(root, &report);

        assert_eq!(plan.critical_skipped, vec!["README.md".to_string()]);
        assert_eq!(plan.items.len(), 1);
        let item = &plan.items[0];
        assert_eq!(item.filename, "plan.pdf");
        assert!(item.keep == root.join("docs/plan.pdf") || item.keep == root.join("x/plan.pdf"));
        assert_eq!(item.delete.len(), 2);
        assert!(item.delete.contains(&root.join("docs/old/backup/plan.pdf")));
        assert!(!item.delete.contains(&root.join("node_modules/pkg/plan.pdf")));
        // one README copy plus the node_modules copy
        assert_eq!(plan.files_preserved, 2);
        assert_eq!(plan.files_to_delete(), 2);
        assert_eq!(plan.space_to_save(), 20);
    }

    #[test]
    fn test_dry_run_deletes_nothing_but_logs() {
        let (dir, report) = duplicate_tree();
        let root = dir.path();
        let logs = tempfile::tempdir().unwrap();
        let plan = plan_cleanup(root, &report);

        let options = CleanupOptions {
            dry_run: true,
            backup_dir: None,
            log_dir: Some(logs.path().to_path_buf()),
        };
        let log = execute_cleanup(&plan, &options).unwrap();
        assert!(log.deleted.is_empty());
        assert_eq!(log.files_to_delete, 2);
        for path in &plan.items[0].delete {
            assert!(path.exists());
        }

        let written = std::fs::read_to_string(log.log_path.as_ref().unwrap()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["dry_run"], true);
        assert_eq!(parsed["space_to_save"], 20);
    }

    #[test]
    fn test_execute_cleanup_with_backup() {
        let (dir, report) = duplicate_tree();
        let root = dir.path();
        let backups = tempfile::tempdir().unwrap();
        let plan = plan_cleanup(root, &report);
        let keep = plan.items[0].keep.clone();

        let options = CleanupOptions {
            dry_run: false,
            backup_dir: Some(backups.path().to_path_buf()),
            log_dir: None,
        };
        let log = execute_cleanup(&plan, &options).unwrap();
        assert_eq!(log.deleted.len(), 2);
        assert_eq!(log.bytes_freed(), 20);
        assert!(log.errors.is_empty());
        assert!(keep.exists());
        assert!(!root.join("docs/old/backup/plan.pdf").exists());
        assert!(root.join("node_modules/pkg/plan.pdf").exists());
        assert!(root.join("x/README.md").exists());
        assert_eq!(
            std::fs::read_to_string(backups.path().join("docs/old/backup/plan.pdf")).unwrap(),
            "floor plan"
        );
        assert!(log.log_path.as_ref().unwrap().starts_with(root));
    }

    #[test]
    fn test_missing_kept_copy_blocks_deletion() {
        let (dir, report) = duplicate_tree();
        let plan = plan_cleanup(dir.path(), &report);
        std::fs::remove_file(&plan.items[0].keep).unwrap();

        let log = execute_cleanup(&plan, &CleanupOptions::default()).unwrap();
        assert!(log.deleted.is_empty());
        assert_eq!(log.errors.len(), 1);
        for path in &plan.items[0].delete {
            assert!(path.exists());
        }
    }
}
