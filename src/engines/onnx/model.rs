use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use serde::Deserialize;

use super::phonemizer::{phonemize, phonemes_to_ids, EspeakConfig};
use crate::engines::{Device, SpeechModel};
use crate::{SynthesisError, SynthesisResult};

/// Silence inserted between synthesized lines, in seconds.
const LINE_GAP_SECS: f32 = 0.2;

/// Voice configuration stored next to the `.onnx` file.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    pub audio: AudioConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub noise_scale: f32,
    pub length_scale: f32,
    pub noise_w: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            noise_scale: 0.667,
            length_scale: 1.0,
            noise_w: 0.8,
        }
    }
}

impl VoiceConfig {
    pub fn load(path: &Path) -> Result<Self, SynthesisError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SynthesisError::Configuration(format!("Invalid {}: {e}", path.display()))
        })
    }

    /// Phoneme map keyed by character; multi-character keys are skipped.
    fn char_id_map(&self) -> HashMap<char, Vec<i64>> {
        self.phoneme_id_map
            .iter()
            .filter_map(|(k, v)| {
                let mut chars = k.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Some((ch, v.clone())),
                    _ => None,
                }
            })
            .collect()
    }
}

/// VITS text-to-speech model running in ONNX Runtime.
pub struct OnnxModel {
    model_id: String,
    session: Session,
    id_map: HashMap<char, Vec<i64>>,
    sample_rate: u32,
    inference: InferenceConfig,
    espeak: EspeakConfig,
}

impl OnnxModel {
    pub fn load(
        model_id: &str,
        onnx_path: &Path,
        config_path: &Path,
        device: Device,
        num_threads: Option<usize>,
        espeak: EspeakConfig,
    ) -> Result<Self, SynthesisError> {
        let config = VoiceConfig::load(config_path)?;
        log::info!("Loading ONNX model from {}", onnx_path.display());
        let session = init_session(onnx_path, device, num_threads)?;

        Ok(Self {
            model_id: model_id.to_string(),
            session,
            id_map: config.char_id_map(),
            sample_rate: config.audio.sample_rate,
            inference: config.inference,
            espeak,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Synthesize text line by line, separated by short pauses.
    pub fn synthesize_text(&mut self, text: &str, language: &str) -> Result<SynthesisResult, SynthesisError> {
        let lines = phonemize(text, language, &self.espeak)?;
        let gap = vec![0f32; (self.sample_rate as f32 * LINE_GAP_SECS) as usize];

        let mut samples = Vec::new();
        for ipa in &lines {
            let ids = phonemes_to_ids(ipa, &self.id_map);
            let audio = self.run(ids)?;
            if audio.is_empty() {
                continue;
            }
            if !samples.is_empty() {
                samples.extend_from_slice(&gap);
            }
            samples.extend_from_slice(&audio);
        }

        if samples.is_empty() {
            log::warn!("No audio produced for text: {text:?}");
        }
        Ok(SynthesisResult {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    fn run(&mut self, ids: Vec<i64>) -> Result<Vec<f32>, SynthesisError> {
        let len = ids.len();
        let ids = Array2::from_shape_vec((1, len), ids)?;
        let lengths = ndarray::arr1(&[len as i64]);
        let scales = ndarray::arr1(&[
            self.inference.noise_scale,
            self.inference.length_scale,
            self.inference.noise_w,
        ]);

        let inputs = inputs![
            "input" => TensorRef::from_array_view(ids.view())?,
            "input_lengths" => TensorRef::from_array_view(lengths.view())?,
            "scales" => TensorRef::from_array_view(scales.view())?,
        ];
        let output = self.session.run(inputs)?;

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| SynthesisError::Backend("No output from model".to_string()))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;

        Ok(waveform.iter().copied().collect())
    }
}

impl SpeechModel for OnnxModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn synthesize_to_file(
        &mut self,
        text: &str,
        language: &str,
        speaker_wav: Option<&Path>,
        output: &Path,
    ) -> Result<(), SynthesisError> {
        if speaker_wav.is_some() {
            return Err(SynthesisError::Configuration(format!(
                "{} does not support reference voices",
                self.model_id
            )));
        }
        self.synthesize_text(text, language)?.write_wav(output)?;
        Ok(())
    }
}

/// True when ONNX Runtime can run on CUDA here.
pub fn cuda_available() -> bool {
    use ort::execution_providers::ExecutionProvider;

    CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

fn init_session(
    onnx_path: &Path,
    device: Device,
    num_threads: Option<usize>,
) -> Result<Session, SynthesisError> {
    let providers = match device {
        Device::Cuda => vec![
            CUDAExecutionProvider::default().build(),
            CPUExecutionProvider::default().build(),
        ],
        Device::Cpu => vec![CPUExecutionProvider::default().build()],
    };

    let mut builder = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_execution_providers(providers)?;

    if let Some(threads) = num_threads {
        builder = builder.with_intra_threads(threads)?;
    }

    Ok(builder.commit_from_file(onnx_path)?)
}
