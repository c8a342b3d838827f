//! Contracts for the hardware and OS services the controller drives.
//!
//! The controller core only talks to these traits. `hw` provides the device
//! implementations and `sim` provides in-memory ones for tests and bench runs.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Video and still capture.
pub trait Camera {
    fn start_recording(&mut self, path: &Path) -> Result<()>;
    fn stop_recording(&mut self) -> Result<()>;
    /// End the current segment and continue recording into `path`.
    fn split_recording(&mut self, path: &Path) -> Result<()>;
    fn capture(&mut self, path: &Path) -> Result<()>;
    fn annotate(&mut self, text: &str) -> Result<()>;
    fn release(&mut self) {}
}

/// Logical LED outputs and button inputs.
pub trait Gpio {
    fn set_output(&mut self, index: usize, on: bool) -> Result<()>;
    fn get_output(&self, index: usize) -> bool;
    /// `true` while the button at `index` is held down.
    fn read_input(&mut self, index: usize) -> Result<bool>;
    fn output_count(&self) -> usize;
    fn release(&mut self) {}
}

/// One file in the passive recording directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipRecord {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Media files and the removable drive.
pub trait Storage {
    /// Every file in the passive directory, oldest first.
    fn list_passive_clips(&mut self) -> Result<Vec<ClipRecord>>;
    fn delete_file(&mut self, path: &Path) -> Result<()>;
    fn drive_mounted(&mut self) -> Result<bool>;
    fn mount_drive(&mut self) -> Result<()>;
    fn unmount_drive(&mut self) -> Result<()>;
    /// Recursively copy `src` to `dst`, returning the number of files copied.
    fn copy_tree(&mut self, src: &Path, dst: &Path) -> Result<u64>;
    /// Remove a directory tree, returning whether anything was there.
    fn remove_tree(&mut self, path: &Path) -> Result<bool>;
    fn release(&mut self) {}
}

pub trait Thermal {
    /// CPU temperature in degrees Celsius.
    fn read_cpu_temperature(&mut self) -> Result<f32>;
}

pub trait Shutdown {
    fn shutdown_now(&mut self) -> Result<()>;
}

/// Persistent sink for session log text.
pub trait LogStore {
    fn append(&mut self, text: &str) -> Result<()>;
}

/// The full set of collaborators a controller is built from.
pub struct Collaborators {
    pub camera: Box<dyn Camera>,
    pub gpio: Box<dyn Gpio>,
    pub storage: Box<dyn Storage>,
    pub thermal: Box<dyn Thermal>,
    pub shutdown: Box<dyn Shutdown>,
    pub log_store: Box<dyn LogStore>,
}
