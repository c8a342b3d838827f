use crate::app::SessionLog;
use crate::config::StoragePaths;
use crate::services::Storage;
use tracing::warn;

/// Outcome of copying logs and media to the removable drive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpReport {
    pub files_copied: u64,
    pub failures: u32,
}

impl DumpReport {
    pub fn succeeded(&self) -> bool {
        self.failures == 0
    }
}

/// Replace the dump folder on the drive with fresh copies of every dump source.
///
/// Each failure is logged with the offending path and the dump moves on to the
/// next source. A failed mount skips the copy entirely.
pub fn dump_to_drive(
    storage: &mut dyn Storage,
    paths: &StoragePaths,
    mount: bool,
    log: &mut SessionLog,
) -> DumpReport {
    let mut report = DumpReport::default();

    if mount {
        if let Err(err) = storage.mount_drive() {
            warn!(drive = %paths.drive_name, error = %err, "drive mount failed");
            log.line(&format!("  Mounting {} failed: {err:#}", paths.drive_name));
            report.failures += 1;
            return report;
        }
    }

    match storage.remove_tree(&paths.drive_dump_dir) {
        Ok(true) => log.line("  Removed old directory"),
        Ok(false) => {}
        Err(err) => {
            warn!(path = %paths.drive_dump_dir.display(), error = %err, "old dump not removed");
            log.line(&format!(
                "  Directory: '{}' not removed: {err:#}",
                paths.drive_dump_dir.display()
            ));
            report.failures += 1;
        }
    }

    for source in paths.dump_sources() {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = paths.drive_dump_dir.join(name);
        match storage.copy_tree(&source, &target) {
            Ok(files) => {
                report.files_copied += files;
                log.line(&format!("  Dumping {}... ({files} files)", name.to_string_lossy()));
            }
            Err(err) => {
                warn!(path = %source.display(), error = %err, "dump source not copied");
                log.line(&format!(
                    "  Directory: '{}' not copied: {err:#}",
                    source.display()
                ));
                report.failures += 1;
            }
        }
    }

    if mount {
        if let Err(err) = storage.unmount_drive() {
            warn!(drive = %paths.drive_name, error = %err, "drive unmount failed");
            log.line(&format!("  Unmounting {} failed: {err:#}", paths.drive_name));
            report.failures += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimLogStore, SimStorage};
    use std::path::{Path, PathBuf};

    fn paths() -> StoragePaths {
        StoragePaths::under(
            PathBuf::from("/data"),
            Path::new("/media/pi"),
            "DASHCAM",
            "dashcam",
        )
    }

    fn fixture() -> (SimStorage, SimLogStore, SessionLog) {
        let paths = paths();
        let storage = SimStorage::new(&paths.passive_dir);
        storage.add_file(&paths.passive_dir.join("vid_a.h264"));
        storage.add_file(&paths.log_dir.join("log_2024-5-1.txt"));
        storage.set_drive_present(true);
        let store = SimLogStore::default();
        let log = SessionLog::new(Box::new(store.clone()), false);
        (storage, store, log)
    }

    #[test]
    fn copies_logs_and_media_into_dump_folder() {
        let (mut storage, store, mut log) = fixture();
        let report = dump_to_drive(&mut storage, &paths(), false, &mut log);
        assert!(report.succeeded());
        assert_eq!(report.files_copied, 2);
        assert_eq!(
            storage.copies(),
            vec![
                (
                    PathBuf::from("/data/logs"),
                    PathBuf::from("/media/pi/DASHCAM/dashcam/logs")
                ),
                (
                    PathBuf::from("/data/media"),
                    PathBuf::from("/media/pi/DASHCAM/dashcam/media")
                ),
            ]
        );
        log.flush().unwrap();
        assert!(store.text().contains("  Dumping logs... (1 files)"));
        assert_eq!(storage.mount_calls(), (0, 0));
    }

    #[test]
    fn second_dump_replaces_previous_folder() {
        let (mut storage, store, mut log) = fixture();
        dump_to_drive(&mut storage, &paths(), false, &mut log);
        dump_to_drive(&mut storage, &paths(), false, &mut log);
        log.flush().unwrap();
        assert_eq!(store.text().matches("Removed old directory").count(), 1);
    }

    #[test]
    fn copy_failures_are_counted_and_logged_per_source() {
        let (mut storage, store, mut log) = fixture();
        storage.fail_copies(true);
        let report = dump_to_drive(&mut storage, &paths(), false, &mut log);
        assert_eq!(report.failures, 2);
        log.flush().unwrap();
        let text = store.text();
        assert!(text.contains("Directory: '/data/logs' not copied"));
        assert!(text.contains("Directory: '/data/media' not copied"));
    }

    #[test]
    fn mounts_and_unmounts_when_asked() {
        let (mut storage, _store, mut log) = fixture();
        let report = dump_to_drive(&mut storage, &paths(), true, &mut log);
        assert!(report.succeeded());
        assert_eq!(storage.mount_calls(), (1, 1));
    }

    #[test]
    fn failed_mount_skips_copy() {
        let (mut storage, _store, mut log) = fixture();
        storage.set_drive_present(false);
        let report = dump_to_drive(&mut storage, &paths(), true, &mut log);
        assert_eq!(report.failures, 1);
        assert!(storage.copies().is_empty());
    }
}
