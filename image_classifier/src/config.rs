use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_MODEL_NAME: &str = "mobilenet_v2_1.0_224.onnx";

/// Execution backend requested for the model.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Delegate {
    #[default]
    Cpu,
    Gpu,
}

impl Delegate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delegate::Cpu => "cpu",
            Delegate::Gpu => "gpu",
        }
    }
}

/// User tunable parameters of an [`ImageClassifierHelper`](crate::ImageClassifierHelper).
///
/// Changing a field has no effect on an already built classifier; call
/// `invalidate()` on the helper to have the next frame rebuild it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_max_results")]
    pub max_results: i32,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default)]
    pub delegate: Delegate,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_threshold() -> f32 {
    0.1
}

fn default_max_results() -> i32 {
    3
}

fn default_num_threads() -> usize {
    4
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_results: default_max_results(),
            num_threads: default_num_threads(),
            delegate: Delegate::default(),
            model_name: default_model_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    #[default]
    Nchw,
    Nhwc,
}

/// Activation applied to the raw model output before ranking.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    None,
    #[default]
    Softmax,
    Sigmoid,
}

/// Describes where model assets live and what input the model expects.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ModelSettings {
    pub model_dir: PathBuf,
    #[serde(default)]
    pub labels_file: Option<String>,
    #[serde(default = "default_input_size")]
    pub input_width: u32,
    #[serde(default = "default_input_size")]
    pub input_height: u32,
    #[serde(default)]
    pub layout: TensorLayout,
    #[serde(default = "default_mean")]
    pub mean: Vec<f32>,
    #[serde(default = "default_std")]
    pub std: Vec<f32>,
    #[serde(default)]
    pub activation: OutputActivation,
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_input_size() -> u32 {
    224
}

fn default_mean() -> Vec<f32> {
    vec![0.485, 0.456, 0.406]
}

fn default_std() -> Vec<f32> {
    vec![0.229, 0.224, 0.225]
}

fn default_output_name() -> String {
    "output".to_string()
}

impl ModelSettings {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            labels_file: None,
            input_width: default_input_size(),
            input_height: default_input_size(),
            layout: TensorLayout::default(),
            mean: default_mean(),
            std: default_std(),
            activation: OutputActivation::default(),
            output_name: default_output_name(),
        }
    }

    pub fn get_model_path(&self, model_asset_path: &str) -> PathBuf {
        self.model_dir.join(model_asset_path)
    }

    pub fn get_labels_path(&self) -> Option<PathBuf> {
        self.labels_file
            .as_ref()
            .map(|labels_file| self.model_dir.join(labels_file))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(format!(
                "Invalid model input size: {}x{}",
                self.input_width, self.input_height
            ));
        }
        if self.mean.len() != 3 || self.std.len() != 3 {
            return Err("mean and std must hold exactly 3 values (RGB)".to_string());
        }
        if self.std.iter().any(|s| *s == 0.0) {
            return Err("std values must be non-zero".to_string());
        }
        if let Some(labels_path) = self.get_labels_path() {
            if !labels_path.exists() {
                return Err(format!("Labels file not found: {:?}", labels_path));
            }
        }
        Ok(())
    }
}
