//! Weight and config loading for safetensors checkpoints.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use safetensors::SafeTensors;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LoadError;

/// Loads a safetensors file onto `device` and wraps it in a `VarBuilder`.
///
/// Tensors are converted to `F32` on access.
///
/// # Errors
///
/// Returns [`LoadError::MissingArtifact`] if the file does not exist, or
/// [`LoadError::Weights`] if it cannot be parsed or a tensor has an
/// unsupported dtype.
pub fn load_safetensors(path: &Path, device: &Device) -> Result<VarBuilder<'static>, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingArtifact(path.to_path_buf()));
    }
    debug!("Loading safetensors from {}", path.display());

    let data = std::fs::read(path)
        .map_err(|e| LoadError::Weights(format!("failed to read {}: {e}", path.display())))?;
    let tensors = SafeTensors::deserialize(&data)
        .map_err(|e| LoadError::Weights(format!("failed to parse {}: {e}", path.display())))?;

    let mut tensor_map: HashMap<String, Tensor> = HashMap::new();
    for name in tensors.names() {
        let view = tensors
            .tensor(name)
            .map_err(|e| LoadError::Weights(format!("tensor '{name}': {e}")))?;
        let dtype = safetensors_dtype_to_candle(view.dtype())?;
        let tensor = Tensor::from_raw_buffer(view.data(), dtype, view.shape(), device)
            .map_err(|e| LoadError::Weights(format!("tensor '{name}': {e}")))?;
        tensor_map.insert(name.clone(), tensor);
    }
    debug!("Loaded {} tensors", tensor_map.len());

    Ok(VarBuilder::from_tensors(tensor_map, DType::F32, device))
}

/// Reads and deserializes a JSON model config.
///
/// # Errors
///
/// Returns [`LoadError::MissingArtifact`] if the file does not exist, or
/// [`LoadError::Config`] if it cannot be read or parsed.
pub fn load_json_config<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingArtifact(path.to_path_buf()));
    }
    let config_error = |reason: String| LoadError::Config {
        path: path.to_path_buf(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))
}

fn safetensors_dtype_to_candle(dtype: safetensors::Dtype) -> Result<DType, LoadError> {
    use safetensors::Dtype as S;
    match dtype {
        S::F32 => Ok(DType::F32),
        S::F64 => Ok(DType::F64),
        S::F16 => Ok(DType::F16),
        S::BF16 => Ok(DType::BF16),
        S::I64 => Ok(DType::I64),
        S::U8 => Ok(DType::U8),
        S::U32 => Ok(DType::U32),
        other => Err(LoadError::Weights(format!("unsupported dtype: {other:?}"))),
    }
}
