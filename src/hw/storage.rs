use crate::config::StoragePaths;
use crate::services::{ClipRecord, Storage};
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Media directories on the local filesystem plus a removable drive by label.
pub struct FsStorage {
    paths: StoragePaths,
    /// Block device to mount; `None` when the desktop automounts the drive.
    device: Option<PathBuf>,
}

impl FsStorage {
    /// Create the media and log directories if they are missing.
    pub fn new(paths: StoragePaths, mount_drive: bool) -> Result<Self> {
        for dir in [
            &paths.passive_dir,
            &paths.active_dir,
            &paths.image_dir,
            &paths.log_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let device = mount_drive.then(|| Path::new("/dev/disk/by-label").join(&paths.drive_name));
        Ok(Self { paths, device })
    }

    pub fn with_device(mut self, device: PathBuf) -> Self {
        self.device = Some(device);
        self
    }
}

impl Storage for FsStorage {
    fn list_passive_clips(&mut self) -> Result<Vec<ClipRecord>> {
        let dir = &self.paths.passive_dir;
        let entries =
            fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
        let mut clips = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let path = entry.path();
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .with_context(|| format!("failed to stat {}", path.display()))?;
            clips.push(ClipRecord { path, modified });
        }
        clips.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(clips)
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))
    }

    fn drive_mounted(&mut self) -> Result<bool> {
        let probe = self
            .device
            .as_deref()
            .unwrap_or(self.paths.drive_root.as_path());
        probe
            .try_exists()
            .with_context(|| format!("failed to check {}", probe.display()))
    }

    fn mount_drive(&mut self) -> Result<()> {
        let device = self
            .device
            .as_deref()
            .ok_or_else(|| anyhow!("no drive device configured"))?;
        let root = &self.paths.drive_root;
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create mount point {}", root.display()))?;
        run("mount", &[device.as_os_str(), root.as_os_str()])
    }

    fn unmount_drive(&mut self) -> Result<()> {
        run("umount", &[self.paths.drive_root.as_os_str()])
    }

    fn copy_tree(&mut self, src: &Path, dst: &Path) -> Result<u64> {
        let mut copied = 0;
        let mut failures = Vec::new();
        copy_dir(src, dst, &mut copied, &mut failures)?;
        if let Some(first) = failures.first() {
            bail!(
                "{} of {} files not copied, first: {first}",
                failures.len(),
                copied + failures.len() as u64
            );
        }
        Ok(copied)
    }

    fn remove_tree(&mut self, path: &Path) -> Result<bool> {
        if !path
            .try_exists()
            .with_context(|| format!("failed to check {}", path.display()))?
        {
            return Ok(false);
        }
        fs::remove_dir_all(path).with_context(|| format!("failed to remove {}", path.display()))?;
        Ok(true)
    }
}

// Keeps going past individual file failures; only an unreadable source directory aborts.
fn copy_dir(src: &Path, dst: &Path, copied: &mut u64, failures: &mut Vec<String>) -> Result<()> {
    let entries = fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))?;
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                failures.push(format!("{}: {err}", src.display()));
                continue;
            }
        };
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let is_dir = entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false);
        let result = if is_dir {
            copy_dir(&from, &to, copied, failures)
        } else {
            fs::copy(&from, &to)
                .map(|_| *copied += 1)
                .with_context(|| format!("{}", from.display()))
        };
        if let Err(err) = result {
            failures.push(format!("{err:#}"));
        }
    }
    Ok(())
}

fn run(program: &str, args: &[&std::ffi::OsStr]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("failed to run {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn storage(root: &Path) -> FsStorage {
        let paths = StoragePaths::under(
            root.join("data"),
            &root.join("media-root"),
            "DASHCAM",
            "dashcam",
        );
        FsStorage::new(paths, false).unwrap()
    }

    fn touch(path: &Path, age_secs: u64) {
        fs::write(path, b"x").unwrap();
        let stamp = SystemTime::now() - Duration::from_secs(age_secs);
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(stamp)
            .unwrap();
    }

    #[test]
    fn creates_layout_on_startup() {
        let root = tempfile::tempdir().unwrap();
        storage(root.path());
        for dir in ["data/media/passive", "data/media/active", "data/media/images", "data/logs"] {
            assert!(root.path().join(dir).is_dir(), "{dir}");
        }
    }

    #[test]
    fn lists_passive_clips_oldest_first() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = storage(root.path());
        let passive = root.path().join("data/media/passive");
        touch(&passive.join("vid_new.h264"), 10);
        touch(&passive.join("vid_old.h264"), 500);
        touch(&passive.join("notes.txt"), 100);
        let names: Vec<String> = storage
            .list_passive_clips()
            .unwrap()
            .into_iter()
            .map(|clip| clip.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["vid_old.h264", "notes.txt", "vid_new.h264"]);
    }

    #[test]
    fn drive_presence_follows_mount_point() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = storage(root.path());
        assert!(!storage.drive_mounted().unwrap());
        fs::create_dir_all(root.path().join("media-root/DASHCAM")).unwrap();
        assert!(storage.drive_mounted().unwrap());
    }

    #[test]
    fn copy_and_remove_tree() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = storage(root.path());
        let media = root.path().join("data/media");
        fs::write(media.join("passive/vid_a.h264"), b"a").unwrap();
        fs::write(media.join("images/img_a.jpg"), b"b").unwrap();
        let dst = root.path().join("media-root/DASHCAM/dashcam/media");
        assert_eq!(storage.copy_tree(&media, &dst).unwrap(), 2);
        assert_eq!(fs::read(dst.join("passive/vid_a.h264")).unwrap(), b"a");
        let dump = root.path().join("media-root/DASHCAM/dashcam");
        assert!(storage.remove_tree(&dump).unwrap());
        assert!(!storage.remove_tree(&dump).unwrap());
    }

    #[test]
    fn copying_missing_source_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = storage(root.path());
        assert!(storage
            .copy_tree(&root.path().join("absent"), &root.path().join("out"))
            .is_err());
    }

    #[test]
    fn mounting_without_device_fails() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = storage(root.path());
        assert!(storage.mount_drive().is_err());
    }

    #[test]
    fn configured_device_decides_presence() {
        let root = tempfile::tempdir().unwrap();
        let device = root.path().join("sda1");
        let mut storage = storage(root.path()).with_device(device.clone());
        assert!(!storage.drive_mounted().unwrap());
        fs::write(&device, b"").unwrap();
        assert!(storage.drive_mounted().unwrap());
    }

    #[test]
    fn deleting_missing_file_reports_path() {
        let root = tempfile::tempdir().unwrap();
        let mut storage = storage(root.path());
        let err = storage
            .delete_file(&root.path().join("vid_gone.h264"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("vid_gone.h264"));
    }
}
