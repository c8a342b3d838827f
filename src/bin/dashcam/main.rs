//! Dashcam entrypoint: parse flags, acquire hardware, run the tick loop.
//!
//! Startup failures (bad flags, missing camera, GPIO, or storage) exit
//! non-zero. Once the loop runs, per-tick faults are logged and absorbed, and
//! the loop only stops on a terminal mode transition.

use anyhow::{Context, Result};
use clap::Parser;
use dashcam::app::install_panic_hook;
use dashcam::config::AppConfig;
use dashcam::controller::Controller;
use dashcam::doctor::doctor_report;
use dashcam::hw::device_collaborators;
use dashcam::scheduler::TickPacer;
use dashcam::sim::SimRig;
use dashcam::telemetry::init_tracing;
use tracing::info;

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    if config.check {
        println!("{}", doctor_report(&config, "dashcam").render());
        return Ok(());
    }

    config.validate()?;
    init_tracing(&config);
    install_panic_hook();

    let paths = config.storage_paths();
    let controller_config = config.controller_config();
    let collaborators = if config.simulate {
        SimRig::new(&paths, config.sim_cpu_temp).collaborators()
    } else {
        device_collaborators(&config, &paths).context("hardware startup failed")?
    };
    info!(
        simulate = config.simulate,
        data_dir = %paths.data_dir.display(),
        tick_ms = controller_config.tick_ms,
        "dashcam starting"
    );

    let pacer = TickPacer::new(controller_config.tick());
    let controller = Controller::new(controller_config, paths, collaborators, Box::new(pacer));
    let code = controller.run()?;
    info!(code = code.label(), "dashcam stopped");
    println!("dashcam stopped: {}", code.label());
    Ok(())
}
