use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{Repo, RepoType, api::sync::Api};
use image::{ImageBuffer, Rgba};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Classifier, LabelScores, SAFE_LABEL, UNSAFE_LABEL};

const MODEL_REPO: &str = "LukeJacob2023/nsfw-image-detector";
const IMAGE_SIZE: usize = 224;

// Class indices from model config. drawings and neutral are safe,
// the other three add up to the "unsafe" probability.
const CLASS_NAMES: [&str; 5] = ["drawings", "hentai", "neutral", "porn", "sexy"];
const UNSAFE_CLASSES: [usize; 3] = [1, 3, 4];

/// NSFW classifier using the LukeJacob2023/nsfw-image-detector ViT model
pub struct NsfwClassifier {
    model: Mutex<vit::Model>,
    device: Device,
}

impl NsfwClassifier {
    pub fn new() -> Result<Self> {
        #[cfg(feature = "metal")]
        let device = Device::new_metal(0).unwrap_or(Device::Cpu);
        #[cfg(not(feature = "metal"))]
        let device = Device::Cpu;

        info!("Loading NSFW detection model on {:?}", device);

        let api = Api::new()?;
        let repo = api.repo(Repo::new(MODEL_REPO.to_string(), RepoType::Model));

        let model_path = repo.get("model.safetensors")?;
        let config_path = repo.get("config.json")?;

        let config: vit::Config = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[model_path], DType::F32, &device)? };
        let model = vit::Model::new(&config, CLASS_NAMES.len(), vb)?;

        info!("NSFW model loaded successfully");

        Ok(Self {
            model: Mutex::new(model),
            device,
        })
    }

    fn preprocess_batch(&self, scaled_images: &[Vec<u8>]) -> Result<Tensor> {
        let batch_size = scaled_images.len();
        let data = normalize_batch(scaled_images);
        let tensor = Tensor::from_vec(data, (batch_size, 3, IMAGE_SIZE, IMAGE_SIZE), &self.device)?;
        Ok(tensor)
    }
}

impl Classifier for NsfwClassifier {
    fn classify(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, LabelScores)>> {
        // Unreadable images are dropped here; the organizer records them as errors.
        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            match load_scaled(path) {
                Ok(scaled) => loaded.push((path.clone(), scaled)),
                Err(e) => warn!("Failed to load {}: {:#}", path.display(), e),
            }
        }

        if loaded.is_empty() {
            return Ok(vec![]);
        }

        let scaled_batch: Vec<Vec<u8>> = loaded.iter().map(|(_, s)| s.clone()).collect();
        let input = self.preprocess_batch(&scaled_batch)?;
        let model = self.model.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
        debug!("Running forward pass on {} images", loaded.len());
        let logits = model.forward(&input)?;

        // Softmax to get probabilities - shape is (batch_size, 5)
        let probs = candle_nn::ops::softmax(&logits, 1)?;
        let probs_vec: Vec<f32> = probs.flatten_all()?.to_vec1()?;

        let results = loaded
            .into_iter()
            .zip(probs_vec.chunks(CLASS_NAMES.len()))
            .map(|((path, _), class_probs)| (path, label_scores(class_probs)))
            .collect::<Vec<_>>();

        info!("[NSFW] Batch of {} classified in single forward pass", results.len());
        Ok(results)
    }
}

/// Opens an image and scales it to the 224x224 RGB model input.
fn load_scaled(path: &Path) -> Result<Vec<u8>> {
    let rgba = image::open(path)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    scale(rgba.as_raw(), width, height)
}

fn scale(rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let img: ImageBuffer<Rgba<u8>, _> = ImageBuffer::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| anyhow!("Invalid image dimensions"))?;

    let resized = image::imageops::resize(
        &img,
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        image::imageops::FilterType::Triangle,
    );

    // Convert RGBA to RGB
    let mut rgb = Vec::with_capacity(IMAGE_SIZE * IMAGE_SIZE * 3);
    for pixel in resized.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
    }

    Ok(rgb)
}

/// HWC u8 images to a flat CHW f32 buffer, normalized with mean=0.5, std=0.5.
fn normalize_batch(scaled_images: &[Vec<u8>]) -> Vec<f32> {
    let mean = 0.5;
    let std = 0.5;
    let plane = IMAGE_SIZE * IMAGE_SIZE;

    let mut data = vec![0f32; scaled_images.len() * 3 * plane];

    for (batch_idx, scaled_rgb) in scaled_images.iter().enumerate() {
        let offset = batch_idx * 3 * plane;
        for (i, pixel) in scaled_rgb.chunks_exact(3).take(plane).enumerate() {
            for channel in 0..3 {
                let value = pixel[channel] as f32 / 255.0;
                data[offset + channel * plane + i] = (value - mean) / std;
            }
        }
    }

    data
}

fn label_scores(class_probs: &[f32]) -> LabelScores {
    let mut scores: LabelScores = CLASS_NAMES
        .iter()
        .zip(class_probs)
        .map(|(name, p)| (name.to_string(), *p))
        .collect();

    let unsafe_prob: f32 = UNSAFE_CLASSES
        .iter()
        .filter_map(|&idx| class_probs.get(idx))
        .sum::<f32>()
        .clamp(0.0, 1.0);

    scores.insert(UNSAFE_LABEL.to_string(), unsafe_prob);
    scores.insert(SAFE_LABEL.to_string(), 1.0 - unsafe_prob);
    scores
}
