//! Compute device selection for inference.

use std::fmt;
use std::str::FromStr;

use candle_core::{Device, Tensor};
use tracing::{debug, info, warn};

/// Which device the caller would like the model bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Use an accelerator when one is present and working, else CPU.
    #[default]
    Auto,
    /// Always use the CPU.
    ForceCpu,
    /// Use the accelerator; fall back to CPU if it fails the smoke test.
    ForceAccelerator,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::ForceCpu),
            "gpu" | "accelerator" | "cuda" | "metal" => Ok(Self::ForceAccelerator),
            other => Err(format!(
                "unknown device '{other}', expected auto, cpu or accelerator"
            )),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::ForceCpu => "cpu",
            Self::ForceAccelerator => "accelerator",
        })
    }
}

/// Picks a device according to `preference`.
///
/// Never fails: every accelerator problem degrades to CPU.
#[must_use]
pub fn select_device(preference: DevicePreference) -> Device {
    resolve(
        preference,
        probe_accelerator,
        |device| smoke_test(device).map_err(|e| e.to_string()),
        Device::Cpu,
    )
}

/// Short name of a device for logs and reports.
#[must_use]
pub fn device_name(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}

/// Selection policy, generic over the device type.
pub(crate) fn resolve<D>(
    preference: DevicePreference,
    probe: impl FnOnce() -> Option<D>,
    smoke: impl FnOnce(&D) -> Result<(), String>,
    cpu: D,
) -> D {
    if preference == DevicePreference::ForceCpu {
        info!("Using CPU for inference (forced)");
        return cpu;
    }

    let Some(accelerator) = probe() else {
        if preference == DevicePreference::ForceAccelerator {
            warn!("No accelerator available, falling back to CPU");
        } else {
            info!("Using CPU for inference");
        }
        return cpu;
    };

    match smoke(&accelerator) {
        Ok(()) => {
            info!("Using accelerator for inference");
            accelerator
        }
        Err(e) => {
            warn!("Accelerator smoke test failed ({e}), falling back to CPU");
            cpu
        }
    }
}

/// Allocates a small tensor and runs one op on `device`.
///
/// # Errors
///
/// Returns the candle error if allocation or the op fails.
pub fn smoke_test(device: &Device) -> candle_core::Result<()> {
    let t = Tensor::randn(0f32, 1f32, (2, 2), device)?;
    let out = t.affine(1.0, 1.0)?.to_vec2::<f32>()?;
    debug!("Smoke test on {} ok: {out:?}", device_name(device));
    Ok(())
}

#[allow(clippy::unnecessary_wraps)]
fn probe_accelerator() -> Option<Device> {
    #[cfg(feature = "cuda")]
    {
        if candle_core::utils::cuda_is_available() {
            match Device::new_cuda(0) {
                Ok(device) => return Some(device),
                Err(e) => debug!("CUDA device unavailable: {e}"),
            }
        }
    }

    #[cfg(feature = "metal")]
    {
        if candle_core::utils::metal_is_available() {
            match Device::new_metal(0) {
                Ok(device) => return Some(device),
                Err(e) => debug!("Metal device unavailable: {e}"),
            }
        }
    }

    None
}
