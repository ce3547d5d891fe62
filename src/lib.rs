pub mod config;
pub mod nunchuk;

pub use config::{ConfigError, NunchukConfig, PartialFramePolicy};
