pub mod app;
pub mod config;
pub mod controller;
pub mod doctor;
pub mod hw;
pub mod input;
mod lock;
pub mod media;
pub mod mode;
pub mod retention;
pub mod scheduler;
pub mod services;
pub mod sim;
pub mod status;
pub mod telemetry;

pub(crate) use lock::lock_or_recover;
