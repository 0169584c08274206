//! ML inference using Candle.
//!
//! Provides device selection with CPU fallback, safetensors loading, and the
//! `SegFormer` segmentation engine.

mod device;
mod loader;
mod segformer;

pub use device::{device_name, select_device, smoke_test, DevicePreference};
pub use loader::{load_json_config, load_safetensors};
pub use segformer::{ModelFiles, Ready, SegFormerEngine, DEFAULT_INPUT_SIZE};
