pub mod config;
pub mod tesla;

pub use config::{Config, Validate};
pub use tesla::{Error, Result, TeslaApi, Vehicle};
