//! `SegFormer` semantic segmentation engine.
//!
//! Wraps the candle `SegFormer` implementation behind the [`Segmenter`] port.
//! Input images are resized to a square model input, normalized with
//! `ImageNet` statistics, and the per-pixel argmax is mapped back to the
//! original resolution with nearest-neighbour sampling.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;

use candle_core::{DType, Device, Module, Tensor};
use candle_transformers::models::segformer::{Config, SemanticSegmentationModel};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, warn};

use super::device::{device_name, select_device, DevicePreference};
use super::loader::{load_json_config, load_safetensors};
use crate::domain::{ClassNames, LabelGrid, CITYSCAPES_CLASSES};
use crate::error::{InferenceError, LoadError};
use crate::ports::Segmenter;

/// Default square input resolution of the Cityscapes checkpoints.
pub const DEFAULT_INPUT_SIZE: u32 = 1024;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// On-disk artifacts of one checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    /// `model.safetensors`
    pub weights: PathBuf,
    /// `config.json` in Hugging Face format.
    pub config: PathBuf,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct Ready {
    /// Device the model ended up on (`cpu`, `cuda`, `metal`).
    pub device: &'static str,
    /// Number of output classes.
    pub num_labels: usize,
    /// Class table from the checkpoint config, when it carries one.
    pub class_names: Option<ClassNames>,
}

struct LoadedModel {
    model: SemanticSegmentationModel,
    device: Device,
    num_labels: usize,
}

/// Segmentation engine backed by a `SegFormer` checkpoint.
///
/// Starts unloaded. A failed [`load`](Self::load) leaves it unloaded, so the
/// call can simply be retried.
pub struct SegFormerEngine {
    files: ModelFiles,
    input_size: u32,
    loaded: Option<LoadedModel>,
    scratch: Vec<f32>,
}

impl SegFormerEngine {
    /// Creates an unloaded engine for `files`.
    #[must_use]
    pub const fn new(files: ModelFiles) -> Self {
        Self {
            files,
            input_size: DEFAULT_INPUT_SIZE,
            loaded: None,
            scratch: Vec::new(),
        }
    }

    /// Loads the checkpoint and binds it to a device chosen by `preference`.
    ///
    /// Loading over an already-loaded engine tears the old model down first.
    /// If building the model on an accelerator fails, the load is retried
    /// once on CPU.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if an artifact is missing or invalid; the
    /// engine is then unloaded.
    pub fn load(&mut self, preference: DevicePreference) -> Result<Ready, LoadError> {
        if self.loaded.take().is_some() {
            info!("Tearing down loaded model before reload");
            self.scratch = Vec::new();
        }

        let config: Config = load_json_config(&self.files.config)?;
        let class_names = ClassNames::from_id2label(&config.id2label);
        let num_labels = if config.id2label.is_empty() {
            warn!(
                "{} has no id2label table, assuming {} Cityscapes classes",
                self.files.config.display(),
                CITYSCAPES_CLASSES.len()
            );
            CITYSCAPES_CLASSES.len()
        } else {
            config.id2label.len()
        };

        let device = select_device(preference);
        let (model, device) = match self.build(&config, num_labels, &device) {
            Ok(model) => (model, device),
            Err(e) if !device.is_cpu() => {
                warn!("Failed to build model on {}: {e}; retrying on CPU", device_name(&device));
                (self.build(&config, num_labels, &Device::Cpu)?, Device::Cpu)
            }
            Err(e) => return Err(e),
        };

        info!(
            "Loaded SegFormer ({num_labels} classes) on {}",
            device_name(&device)
        );
        let ready = Ready {
            device: device_name(&device),
            num_labels,
            class_names,
        };
        self.loaded = Some(LoadedModel {
            model,
            device,
            num_labels,
        });
        Ok(ready)
    }

    /// Drops the loaded model and its buffers.
    pub fn unload(&mut self) {
        self.loaded = None;
        self.scratch = Vec::new();
    }

    fn build(
        &self,
        config: &Config,
        num_labels: usize,
        device: &Device,
    ) -> Result<SemanticSegmentationModel, LoadError> {
        let vb = load_safetensors(&self.files.weights, device)?;
        SemanticSegmentationModel::new(config, num_labels, vb)
            .map_err(|e| LoadError::Weights(e.to_string()))
    }
}

impl Segmenter for SegFormerEngine {
    fn is_ready(&self) -> bool {
        self.loaded.is_some()
    }

    fn classify(&mut self, image: &DynamicImage) -> Result<LabelGrid, InferenceError> {
        let Some(loaded) = &self.loaded else {
            return Err(InferenceError::NotReady);
        };
        let (width, height) = image.dimensions();
        let size = self.input_size as usize;

        fill_input(&mut self.scratch, image, self.input_size);
        let input = Tensor::from_slice(&self.scratch, (1, 3, size, size), &loaded.device)?;

        let logits = loaded.model.forward(&input)?;
        let (_, classes, _, _) = logits.dims4()?;
        if classes != loaded.num_labels {
            return Err(InferenceError::Shape(format!(
                "expected {} class channels, got {classes}",
                loaded.num_labels
            )));
        }

        // argmax commutes with nearest upsampling, so take it at model resolution
        let labels = logits
            .argmax_keepdim(1)?
            .to_dtype(DType::F32)?
            .upsample_nearest2d(height as usize, width as usize)?
            .to_dtype(DType::U32)?
            .flatten_all()?
            .to_vec1::<u32>()?;
        debug!("Classified {width}x{height} image");

        LabelGrid::new(width, height, labels)
    }

    fn release_cached(&mut self) {
        self.scratch = Vec::new();
        if let Some(loaded) = &self.loaded {
            if let Err(e) = loaded.device.synchronize() {
                warn!("Device synchronize failed: {e}");
            }
        }
    }
}

/// Writes `image` as a normalized CHW tensor of `size x size` into `buf`.
fn fill_input(buf: &mut Vec<f32>, image: &DynamicImage, size: u32) {
    let rgb = image
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();
    let plane = size as usize * size as usize;
    buf.clear();
    buf.resize(3 * plane, 0.0);

    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let v = f32::from(pixel[c]) / 255.0;
            buf[c * plane + i] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use candle_nn::{VarBuilder, VarMap};
    use std::fs;

    fn engine_in(dir: &std::path::Path) -> SegFormerEngine {
        SegFormerEngine::new(ModelFiles {
            weights: dir.join("model.safetensors"),
            config: dir.join("config.json"),
        })
    }

    /// Writes a randomly initialized four-stage checkpoint small enough to run
    /// on CPU in a unit test.
    fn write_tiny_checkpoint(dir: &std::path::Path) {
        let id2label: serde_json::Map<String, serde_json::Value> = CITYSCAPES_CLASSES
            .iter()
            .enumerate()
            .map(|(id, name)| (id.to_string(), serde_json::Value::from(name.replace('_', " "))))
            .collect();
        let config_json = serde_json::json!({
            "num_channels": 3,
            "num_encoder_blocks": 4,
            "depths": [1, 1, 1, 1],
            "sr_ratios": [8, 4, 2, 1],
            "hidden_sizes": [8, 16, 16, 16],
            "patch_sizes": [7, 3, 3, 3],
            "strides": [4, 2, 2, 2],
            "num_attention_heads": [1, 1, 1, 1],
            "mlp_ratios": [2, 2, 2, 2],
            "hidden_act": "gelu",
            "layer_norm_eps": 1e-6,
            "decoder_hidden_size": 16,
            "id2label": id2label,
        });
        let config_path = dir.join("config.json");
        fs::write(&config_path, config_json.to_string()).expect("write config");

        let config: Config = load_json_config(&config_path).expect("config");
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        SemanticSegmentationModel::new(&config, CITYSCAPES_CLASSES.len(), vb).expect("model");
        varmap.save(dir.join("model.safetensors")).expect("save weights");
    }

    fn street_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8])
        }))
    }

    #[test]
    fn test_tiny_checkpoint_loads_and_classifies() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tiny_checkpoint(dir.path());
        let mut engine = engine_in(dir.path());
        engine.input_size = 64;

        let ready = engine.load(DevicePreference::ForceCpu).expect("load");
        assert_eq!(ready.device, "cpu");
        assert_eq!(ready.num_labels, 19);
        let names = ready.class_names.expect("id2label");
        assert_eq!(names.name(6), "traffic_light");
        assert!(engine.is_ready());

        let image = street_image(37, 23);
        let grid = engine.classify(&image).expect("classify");
        assert_eq!((grid.width(), grid.height()), (37, 23));
        assert_eq!(grid.pixel_count(), 851);
        for y in 0..23 {
            for x in 0..37 {
                assert!(grid.get(x, y).expect("in bounds") < 19);
            }
        }

        engine.release_cached();
        let again = engine.classify(&image).expect("classify after release");
        assert_eq!(again, grid);

        let ready = engine.load(DevicePreference::ForceCpu).expect("reload");
        assert_eq!(ready.num_labels, 19);
        assert!(engine.is_ready());
        let reloaded = engine.classify(&image).expect("classify after reload");
        assert_eq!(reloaded, grid);
    }

    #[test]
    fn test_config_without_id2label_assumes_cityscapes() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_tiny_checkpoint(dir.path());
        let config_path = dir.path().join("config.json");
        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config_path).expect("read")).expect("json");
        raw.as_object_mut().expect("object").remove("id2label");
        fs::write(&config_path, raw.to_string()).expect("write");

        let mut engine = engine_in(dir.path());
        engine.input_size = 64;
        let ready = engine.load(DevicePreference::ForceCpu).expect("load");
        assert_eq!(ready.num_labels, CITYSCAPES_CLASSES.len());
        assert!(ready.class_names.is_none());
    }

    #[test]
    fn test_classify_before_load_is_not_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_in(dir.path());
        assert!(!engine.is_ready());
        let err = engine
            .classify(&DynamicImage::new_rgb8(4, 4))
            .expect_err("not ready");
        assert!(matches!(err, InferenceError::NotReady));
    }

    #[test]
    fn test_load_missing_artifacts_leaves_engine_unloaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut engine = engine_in(dir.path());
        let err = engine.load(DevicePreference::ForceCpu).expect_err("missing");
        assert!(matches!(err, LoadError::MissingArtifact(_)));
        assert!(!engine.is_ready());

        // still retriable
        let err = engine.load(DevicePreference::ForceCpu).expect_err("missing");
        assert!(matches!(err, LoadError::MissingArtifact(_)));
    }

    #[test]
    fn test_load_bad_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("config.json"), r#"{"num_channels": "three"}"#).expect("write");
        let mut engine = engine_in(dir.path());
        let err = engine.load(DevicePreference::ForceCpu).expect_err("bad config");
        assert!(matches!(err, LoadError::Config { .. }));
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_fill_input_normalizes_channels() {
        let white = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            3,
            3,
            image::Rgb([255, 255, 255]),
        ));
        let mut buf = Vec::new();
        fill_input(&mut buf, &white, 2);
        assert_eq!(buf.len(), 12);
        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let expected_b = (1.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((buf[0] - expected_r).abs() < 1e-5);
        assert!((buf[11] - expected_b).abs() < 1e-5);
    }
}
