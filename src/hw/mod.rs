//! Device-backed collaborators for a Raspberry Pi style rig.

mod camera;
mod gpio;
mod shutdown;
mod storage;
mod thermal;

pub use camera::{CameraFiles, CommandCamera};
pub(crate) use camera::{find_program, FRAME_PLACEHOLDER, OVERLAY_PLACEHOLDER};
pub use gpio::{SysfsGpio, SYSFS_GPIO_ROOT};
pub use shutdown::CommandShutdown;
pub use storage::FsStorage;
pub use thermal::{SystemThermal, ThermalSource};

use crate::app::FileLogStore;
use crate::config::{AppConfig, StoragePaths};
use crate::services::Collaborators;
use anyhow::{Context, Result};
use std::path::Path;

/// Open every device the controller needs. Any failure here is fatal at startup.
pub fn device_collaborators(config: &AppConfig, paths: &StoragePaths) -> Result<Collaborators> {
    let storage = FsStorage::new(paths.clone(), config.mount_drive)
        .context("failed to prepare storage directories")?;
    let files = CameraFiles {
        overlay: paths.data_dir.join("overlay.txt"),
        frame: paths.data_dir.join("frame.jpg"),
    };
    let camera = CommandCamera::new(&config.camera_cmd, &config.still_cmd, files)
        .context("camera unavailable")?;
    let gpio = SysfsGpio::new(
        Path::new(SYSFS_GPIO_ROOT),
        &config.led_pins,
        &config.button_pins,
        config.buttons_active_high,
    )
    .context("GPIO unavailable")?;
    let thermal = SystemThermal::from_config(config.thermal_zone.clone(), config.thermal_cmd.as_deref())?;
    let shutdown = CommandShutdown::new(&config.shutdown_cmd)?;
    Ok(Collaborators {
        camera: Box::new(camera),
        gpio: Box::new(gpio),
        storage: Box::new(storage),
        thermal: Box::new(thermal),
        shutdown: Box::new(shutdown),
        log_store: Box::new(FileLogStore::new(&paths.log_dir)),
    })
}
