//! In-memory collaborators for tests and bench runs without hardware.
//!
//! Every handle is cheap to clone and clones share state, so a test can keep
//! one copy for inspection after boxing another into [`Collaborators`].

use crate::config::StoragePaths;
use crate::lock_or_recover;
use crate::services::{
    Camera, ClipRecord, Collaborators, Gpio, LogStore, Shutdown, Storage, Thermal,
};
use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Calls observed by [`SimCamera`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    Start(PathBuf),
    Stop,
    Split(PathBuf),
    Capture(PathBuf),
    Annotate(String),
    Release,
}

#[derive(Debug, Default)]
struct CameraState {
    events: Vec<CameraEvent>,
    recording: bool,
    fail_captures: bool,
    fail_recording: bool,
}

/// Camera that writes empty media files into a [`SimStorage`].
#[derive(Clone)]
pub struct SimCamera {
    state: Arc<Mutex<CameraState>>,
    storage: SimStorage,
}

impl SimCamera {
    pub fn new(storage: &SimStorage) -> Self {
        Self {
            state: Arc::new(Mutex::new(CameraState::default())),
            storage: storage.clone(),
        }
    }

    pub fn events(&self) -> Vec<CameraEvent> {
        lock_or_recover(&self.state, "sim camera").events.clone()
    }

    pub fn is_recording(&self) -> bool {
        lock_or_recover(&self.state, "sim camera").recording
    }

    pub fn fail_captures(&self, fail: bool) {
        lock_or_recover(&self.state, "sim camera").fail_captures = fail;
    }

    pub fn fail_recording(&self, fail: bool) {
        lock_or_recover(&self.state, "sim camera").fail_recording = fail;
    }

    fn record(&self, event: CameraEvent) {
        lock_or_recover(&self.state, "sim camera").events.push(event);
    }
}

impl Camera for SimCamera {
    fn start_recording(&mut self, path: &Path) -> Result<()> {
        {
            let mut state = lock_or_recover(&self.state, "sim camera");
            if state.fail_recording {
                bail!("simulated recorder failure");
            }
            if state.recording {
                bail!("already recording");
            }
            state.recording = true;
            state.events.push(CameraEvent::Start(path.to_path_buf()));
        }
        self.storage.add_file(path);
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        let mut state = lock_or_recover(&self.state, "sim camera");
        if !state.recording {
            bail!("not recording");
        }
        state.recording = false;
        state.events.push(CameraEvent::Stop);
        Ok(())
    }

    fn split_recording(&mut self, path: &Path) -> Result<()> {
        {
            let mut state = lock_or_recover(&self.state, "sim camera");
            if state.fail_recording {
                // Like a real split, the running clip is closed before the new one fails.
                state.recording = false;
                bail!("simulated recorder failure");
            }
            // A split with nothing running starts a fresh recording.
            state.recording = true;
            state.events.push(CameraEvent::Split(path.to_path_buf()));
        }
        self.storage.add_file(path);
        Ok(())
    }

    fn capture(&mut self, path: &Path) -> Result<()> {
        {
            let mut state = lock_or_recover(&self.state, "sim camera");
            if state.fail_captures {
                bail!("simulated still capture failure");
            }
            state.events.push(CameraEvent::Capture(path.to_path_buf()));
        }
        self.storage.add_file(path);
        Ok(())
    }

    fn annotate(&mut self, text: &str) -> Result<()> {
        self.record(CameraEvent::Annotate(text.to_string()));
        Ok(())
    }

    fn release(&mut self) {
        let mut state = lock_or_recover(&self.state, "sim camera");
        state.recording = false;
        state.events.push(CameraEvent::Release);
    }
}

#[derive(Debug, Default)]
struct GpioState {
    outputs: Vec<bool>,
    inputs: Vec<bool>,
    scripts: Vec<VecDeque<bool>>,
    writes: Vec<(usize, bool)>,
    fail_reads: bool,
    released: bool,
}

/// LED outputs plus button inputs that can be held or scripted per read.
#[derive(Clone)]
pub struct SimGpio {
    state: Arc<Mutex<GpioState>>,
}

impl SimGpio {
    pub fn new(outputs: usize, inputs: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(GpioState {
                outputs: vec![false; outputs],
                inputs: vec![false; inputs],
                scripts: vec![VecDeque::new(); inputs],
                ..GpioState::default()
            })),
        }
    }

    /// Hold or release a button until changed again.
    pub fn set_input(&self, index: usize, down: bool) {
        let mut state = lock_or_recover(&self.state, "sim gpio");
        if let Some(input) = state.inputs.get_mut(index) {
            *input = down;
        }
    }

    /// Queue samples returned by the next reads of `index`, ahead of the held value.
    pub fn script_input(&self, index: usize, samples: impl IntoIterator<Item = bool>) {
        let mut state = lock_or_recover(&self.state, "sim gpio");
        if let Some(script) = state.scripts.get_mut(index) {
            script.extend(samples);
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        lock_or_recover(&self.state, "sim gpio").fail_reads = fail;
    }

    pub fn outputs(&self) -> Vec<bool> {
        lock_or_recover(&self.state, "sim gpio").outputs.clone()
    }

    /// Every output write since the last [`SimGpio::clear_writes`].
    pub fn writes(&self) -> Vec<(usize, bool)> {
        lock_or_recover(&self.state, "sim gpio").writes.clone()
    }

    pub fn clear_writes(&self) {
        lock_or_recover(&self.state, "sim gpio").writes.clear();
    }

    pub fn released(&self) -> bool {
        lock_or_recover(&self.state, "sim gpio").released
    }
}

impl Gpio for SimGpio {
    fn set_output(&mut self, index: usize, on: bool) -> Result<()> {
        let mut state = lock_or_recover(&self.state, "sim gpio");
        let Some(output) = state.outputs.get_mut(index) else {
            bail!("no output at index {index}");
        };
        *output = on;
        state.writes.push((index, on));
        Ok(())
    }

    fn get_output(&self, index: usize) -> bool {
        lock_or_recover(&self.state, "sim gpio")
            .outputs
            .get(index)
            .copied()
            .unwrap_or(false)
    }

    fn read_input(&mut self, index: usize) -> Result<bool> {
        let mut state = lock_or_recover(&self.state, "sim gpio");
        if state.fail_reads {
            bail!("simulated input read failure");
        }
        if let Some(sample) = state.scripts.get_mut(index).and_then(VecDeque::pop_front) {
            return Ok(sample);
        }
        match state.inputs.get(index) {
            Some(down) => Ok(*down),
            None => bail!("no input at index {index}"),
        }
    }

    fn output_count(&self) -> usize {
        lock_or_recover(&self.state, "sim gpio").outputs.len()
    }

    fn release(&mut self) {
        let mut state = lock_or_recover(&self.state, "sim gpio");
        state.outputs.iter_mut().for_each(|output| *output = false);
        state.released = true;
    }
}

#[derive(Debug, Default)]
struct StorageState {
    passive_dir: PathBuf,
    files: BTreeMap<PathBuf, SystemTime>,
    drive_trees: BTreeSet<PathBuf>,
    drive_present: bool,
    drive_error: bool,
    fail_copies: bool,
    fail_deletes: bool,
    mounts: u32,
    unmounts: u32,
    copies: Vec<(PathBuf, PathBuf)>,
    released: bool,
}

/// In-memory file table with a fake removable drive.
#[derive(Clone)]
pub struct SimStorage {
    state: Arc<Mutex<StorageState>>,
}

impl SimStorage {
    pub fn new(passive_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StorageState {
                passive_dir: passive_dir.into(),
                ..StorageState::default()
            })),
        }
    }

    /// Add a file stamped one second after the newest file present.
    pub fn add_file(&self, path: &Path) {
        let mut state = lock_or_recover(&self.state, "sim storage");
        let newest = state.files.values().max().copied().unwrap_or(UNIX_EPOCH);
        state
            .files
            .insert(path.to_path_buf(), newest + Duration::from_secs(1));
    }

    pub fn insert_file(&self, path: impl Into<PathBuf>, modified: SystemTime) {
        lock_or_recover(&self.state, "sim storage")
            .files
            .insert(path.into(), modified);
    }

    pub fn files(&self) -> Vec<PathBuf> {
        lock_or_recover(&self.state, "sim storage")
            .files
            .keys()
            .cloned()
            .collect()
    }

    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        lock_or_recover(&self.state, "sim storage")
            .files
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .cloned()
            .collect()
    }

    pub fn set_drive_present(&self, present: bool) {
        lock_or_recover(&self.state, "sim storage").drive_present = present;
    }

    pub fn fail_drive_checks(&self, fail: bool) {
        lock_or_recover(&self.state, "sim storage").drive_error = fail;
    }

    pub fn fail_copies(&self, fail: bool) {
        lock_or_recover(&self.state, "sim storage").fail_copies = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        lock_or_recover(&self.state, "sim storage").fail_deletes = fail;
    }

    /// `(source, destination)` of every successful tree copy.
    pub fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
        lock_or_recover(&self.state, "sim storage").copies.clone()
    }

    pub fn mount_calls(&self) -> (u32, u32) {
        let state = lock_or_recover(&self.state, "sim storage");
        (state.mounts, state.unmounts)
    }

    pub fn released(&self) -> bool {
        lock_or_recover(&self.state, "sim storage").released
    }
}

impl Storage for SimStorage {
    fn list_passive_clips(&mut self) -> Result<Vec<ClipRecord>> {
        let state = lock_or_recover(&self.state, "sim storage");
        let mut clips: Vec<ClipRecord> = state
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(state.passive_dir.as_path()))
            .map(|(path, modified)| ClipRecord {
                path: path.clone(),
                modified: *modified,
            })
            .collect();
        clips.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
        Ok(clips)
    }

    fn delete_file(&mut self, path: &Path) -> Result<()> {
        let mut state = lock_or_recover(&self.state, "sim storage");
        if state.fail_deletes {
            bail!("simulated delete failure for {}", path.display());
        }
        if state.files.remove(path).is_none() {
            bail!("no such file: {}", path.display());
        }
        Ok(())
    }

    fn drive_mounted(&mut self) -> Result<bool> {
        let state = lock_or_recover(&self.state, "sim storage");
        if state.drive_error {
            bail!("simulated drive check failure");
        }
        Ok(state.drive_present)
    }

    fn mount_drive(&mut self) -> Result<()> {
        let mut state = lock_or_recover(&self.state, "sim storage");
        if !state.drive_present {
            bail!("no drive to mount");
        }
        state.mounts += 1;
        Ok(())
    }

    fn unmount_drive(&mut self) -> Result<()> {
        lock_or_recover(&self.state, "sim storage").unmounts += 1;
        Ok(())
    }

    fn copy_tree(&mut self, src: &Path, dst: &Path) -> Result<u64> {
        let mut state = lock_or_recover(&self.state, "sim storage");
        if state.fail_copies {
            bail!("simulated copy failure");
        }
        if !state.drive_present {
            bail!("drive not present");
        }
        let copied = state
            .files
            .keys()
            .filter(|path| path.starts_with(src))
            .count() as u64;
        state.drive_trees.insert(dst.to_path_buf());
        state.copies.push((src.to_path_buf(), dst.to_path_buf()));
        Ok(copied)
    }

    fn remove_tree(&mut self, path: &Path) -> Result<bool> {
        let mut state = lock_or_recover(&self.state, "sim storage");
        let before = state.drive_trees.len();
        state.drive_trees.retain(|tree| !tree.starts_with(path));
        Ok(state.drive_trees.len() != before)
    }

    fn release(&mut self) {
        lock_or_recover(&self.state, "sim storage").released = true;
    }
}

#[derive(Debug)]
struct ThermalState {
    temperature: f32,
    script: VecDeque<Option<f32>>,
    reads: u32,
}

/// Temperature sensor with a steady reading and an optional queue of overrides.
#[derive(Clone)]
pub struct SimThermal {
    state: Arc<Mutex<ThermalState>>,
}

impl SimThermal {
    pub fn fixed(temperature: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ThermalState {
                temperature,
                script: VecDeque::new(),
                reads: 0,
            })),
        }
    }

    pub fn set_temperature(&self, temperature: f32) {
        lock_or_recover(&self.state, "sim thermal").temperature = temperature;
    }

    /// Queue readings for the next reads; `None` is a failed read.
    pub fn script(&self, readings: impl IntoIterator<Item = Option<f32>>) {
        lock_or_recover(&self.state, "sim thermal")
            .script
            .extend(readings);
    }

    pub fn reads(&self) -> u32 {
        lock_or_recover(&self.state, "sim thermal").reads
    }
}

impl Thermal for SimThermal {
    fn read_cpu_temperature(&mut self) -> Result<f32> {
        let mut state = lock_or_recover(&self.state, "sim thermal");
        state.reads += 1;
        match state.script.pop_front() {
            Some(Some(temp)) => Ok(temp),
            Some(None) => bail!("simulated sensor failure"),
            None => Ok(state.temperature),
        }
    }
}

/// Counts power-off requests instead of powering off.
#[derive(Clone, Default)]
pub struct SimShutdown {
    calls: Arc<Mutex<u32>>,
}

impl SimShutdown {
    pub fn calls(&self) -> u32 {
        *lock_or_recover(&self.calls, "sim shutdown")
    }
}

impl Shutdown for SimShutdown {
    fn shutdown_now(&mut self) -> Result<()> {
        *lock_or_recover(&self.calls, "sim shutdown") += 1;
        Ok(())
    }
}

/// Session log sink that keeps everything in memory.
#[derive(Clone, Default)]
pub struct SimLogStore {
    text: Arc<Mutex<String>>,
    appends: Arc<Mutex<u32>>,
}

impl SimLogStore {
    pub fn text(&self) -> String {
        lock_or_recover(&self.text, "sim log").clone()
    }

    pub fn appends(&self) -> u32 {
        *lock_or_recover(&self.appends, "sim log")
    }
}

impl LogStore for SimLogStore {
    fn append(&mut self, text: &str) -> Result<()> {
        lock_or_recover(&self.text, "sim log").push_str(text);
        *lock_or_recover(&self.appends, "sim log") += 1;
        Ok(())
    }
}

/// A full set of simulated collaborators sharing one file table.
#[derive(Clone)]
pub struct SimRig {
    pub camera: SimCamera,
    pub gpio: SimGpio,
    pub storage: SimStorage,
    pub thermal: SimThermal,
    pub shutdown: SimShutdown,
    pub log_store: SimLogStore,
}

impl SimRig {
    pub fn new(paths: &StoragePaths, cpu_temp: f32) -> Self {
        let storage = SimStorage::new(&paths.passive_dir);
        Self {
            camera: SimCamera::new(&storage),
            gpio: SimGpio::new(3, 2),
            storage,
            thermal: SimThermal::fixed(cpu_temp),
            shutdown: SimShutdown::default(),
            log_store: SimLogStore::default(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            camera: Box::new(self.camera.clone()),
            gpio: Box::new(self.gpio.clone()),
            storage: Box::new(self.storage.clone()),
            thermal: Box::new(self.thermal.clone()),
            shutdown: Box::new(self.shutdown.clone()),
            log_store: Box::new(self.log_store.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_inputs_run_before_held_value() {
        let mut gpio = SimGpio::new(3, 2);
        gpio.set_input(1, true);
        gpio.script_input(1, [false, false]);
        let reads: Vec<bool> = (0..3).map(|_| gpio.read_input(1).unwrap()).collect();
        assert_eq!(reads, vec![false, false, true]);
        assert!(gpio.read_input(5).is_err());
    }

    #[test]
    fn camera_files_land_in_storage_with_rising_stamps() {
        let storage = SimStorage::new("/data/media/passive");
        let mut camera = SimCamera::new(&storage);
        camera
            .start_recording(Path::new("/data/media/passive/vid_1.h264"))
            .unwrap();
        camera
            .split_recording(Path::new("/data/media/passive/vid_2.h264"))
            .unwrap();
        camera
            .capture(Path::new("/data/media/images/img_1.jpg"))
            .unwrap();
        let clips = storage.clone().list_passive_clips().unwrap();
        assert_eq!(clips.len(), 2);
        assert!(clips[0].modified < clips[1].modified);
        assert_eq!(storage.files().len(), 3);
    }

    #[test]
    fn thermal_script_then_steady_reading() {
        let mut thermal = SimThermal::fixed(50.0);
        thermal.script([None, Some(70.0)]);
        assert!(thermal.read_cpu_temperature().is_err());
        assert_eq!(thermal.read_cpu_temperature().unwrap(), 70.0);
        assert_eq!(thermal.read_cpu_temperature().unwrap(), 50.0);
        assert_eq!(thermal.reads(), 3);
    }

    #[test]
    fn remove_tree_reports_existing_dump() {
        let mut storage = SimStorage::new("/p");
        storage.set_drive_present(true);
        let dump = Path::new("/media/pi/DASHCAM/dashcam");
        assert!(!storage.remove_tree(dump).unwrap());
        storage.copy_tree(Path::new("/data/logs"), &dump.join("logs")).unwrap();
        assert!(storage.remove_tree(dump).unwrap());
    }
}
