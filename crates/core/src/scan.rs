use crate::album::CreationPolicy;
use crate::catalog::Catalog;
use crate::metadata::MediaKind;
use crate::sync::{RunReport, SyncOrchestrator};
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned_files: usize,
    pub media_files: usize,
    pub skipped_hidden: usize,
    pub skipped_unsupported: usize,
}

/// Media files of one source directory and the album path they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumBatch {
    pub segments: Vec<String>,
    pub files: Vec<PathBuf>,
}

pub fn collect_batches(root: &Path) -> Result<(Vec<AlbumBatch>, ScanStats)> {
    let root = fs::canonicalize(root)
        .with_context(|| format!("source folder not found: {}", root.display()))?;
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());

    let mut stats = ScanStats::default();
    let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    let walker = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()) || e.file_type().is_file());
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk folder: {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        stats.scanned_files += 1;

        if is_hidden(path) {
            stats.skipped_hidden += 1;
            continue;
        }
        if MediaKind::from_path(path).is_none() {
            stats.skipped_unsupported += 1;
            continue;
        }
        stats.media_files += 1;
        let dir = path.parent().unwrap_or(&root).to_path_buf();
        by_dir.entry(dir).or_default().push(path.to_path_buf());
    }

    let batches = by_dir
        .into_iter()
        .map(|(dir, files)| AlbumBatch {
            segments: album_segments(&root, &root_name, &dir),
            files,
        })
        .collect();
    Ok((batches, stats))
}

fn album_segments(root: &Path, root_name: &str, dir: &Path) -> Vec<String> {
    let relative: Vec<String> = dir
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    if relative.is_empty() {
        vec![root_name.to_string()]
    } else {
        relative
    }
}

/// Batch driver: one album per source directory, every media file synced
/// into it, then the run is finished.
pub fn sync_tree<C: Catalog>(mut sync: SyncOrchestrator<C>, root: &Path) -> Result<RunReport> {
    let (batches, stats) = collect_batches(root)?;
    info!(
        "{} media file(s) in {} folder(s) under {} ({} hidden, {} unsupported skipped)",
        stats.media_files,
        batches.len(),
        root.display(),
        stats.skipped_hidden,
        stats.skipped_unsupported
    );

    let mode = sync.mode();
    for batch in batches {
        let label = batch.segments.join("/");
        let album = match sync.resolve_album(&batch.segments, CreationPolicy::AutoCreate) {
            Ok(resolution) => resolution.album_id(),
            Err(err) if err.is_fatal() => return Err(err.into()),
            Err(err) => {
                for file in &batch.files {
                    sync.fail_unplaced(file, label.clone(), &err);
                }
                continue;
            }
        };
        let Some(album) = album else {
            continue;
        };

        debug!("syncing {} file(s) into {}", batch.files.len(), label);
        for file in &batch.files {
            sync.process_file(file, album, mode)?;
        }
    }

    Ok(sync.finish()?)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::identity::IdentityEngine;
    use crate::normalize::testing::ScriptedDecoder;
    use crate::sync::{SyncMode, SyncOptions};
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, bytes).expect("write");
    }

    fn clock() -> u64 {
        1_600_000_000
    }

    #[test]
    fn directories_become_album_paths() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("Photos");
        write(&root, "top.jpg", b"1");
        write(&root, "2020/Summer/b.jpg", b"2");
        write(&root, "2020/Summer/a.JPG", b"3");
        write(&root, "2020/notes.txt", b"4");
        write(&root, ".cache/hidden.jpg", b"5");
        write(&root, "2020/.hidden.jpg", b"6");

        let (batches, stats) = collect_batches(&root).expect("scan");
        assert_eq!(stats.media_files, 3);
        assert_eq!(stats.skipped_unsupported, 1);
        assert_eq!(stats.skipped_hidden, 1);
        assert_eq!(batches.len(), 2);

        assert_eq!(batches[0].segments, vec!["Photos".to_string()]);
        assert_eq!(
            batches[1].segments,
            vec!["2020".to_string(), "Summer".to_string()]
        );
        let names: Vec<String> = batches[1]
            .files
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();
        assert_eq!(names, vec!["a.JPG".to_string(), "b.jpg".to_string()]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().expect("tempdir");
        assert!(collect_batches(&temp.path().join("nope")).is_err());
    }

    #[test]
    fn tree_sync_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("Photos");
        write(&root, "2020/Summer/a.jpg", b"a");
        write(&root, "2020/Summer/b.jpg", b"b");
        write(&root, "2021/c.png", b"c");

        let mut catalog = MemoryCatalog::new();
        let run = |catalog: &mut MemoryCatalog, seed: u64| {
            let sync = SyncOrchestrator::with_identity(
                catalog,
                Box::new(ScriptedDecoder::default()),
                SyncOptions {
                    mode: SyncMode::Normal,
                    ..SyncOptions::default()
                },
                IdentityEngine::with_seed(seed, clock),
            )
            .expect("orchestrator");
            sync_tree(sync, &root).expect("sync")
        };

        let first = run(&mut catalog, 1);
        assert_eq!(first.created, 3);
        assert_eq!(catalog.albums().len(), 3);

        let second = run(&mut catalog, 2);
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, 3);
        assert_eq!(catalog.photos().len(), 3);
        assert_eq!(catalog.albums().len(), 3);
    }
}
