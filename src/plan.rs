//! Declarative load plans
//!
//! A load plan is a JSON document declaring which checkpoint files make up
//! a model (decoder unets, prior, clip) and where each one comes from.
//! Structural rules are enforced at construction: the unet numbers across
//! all decoder sources must form a contiguous sequence starting at 1.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::LoadError;
use crate::source::FileSource;

/// Checkpoint sources for one span of decoder unets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDecoderLoadConfig {
    /// Which unets this checkpoint provides (1-based)
    pub unet_numbers: Vec<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sample_timesteps: Option<Vec<u32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cond_scale: Option<Vec<f64>>,

    pub load_model_from: FileSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_config_from: Option<FileSource>,
}

/// Full decoder load plan
///
/// `final_unet_number` is computed at construction as the highest unet
/// number across all sources; construction fails if the combined numbers
/// repeat, skip, or do not start at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDecoderLoadConfig")]
pub struct DecoderLoadConfig {
    pub unet_sources: Vec<SingleDecoderLoadConfig>,
    pub final_unet_number: u32,
}

#[derive(Debug, Deserialize)]
struct RawDecoderLoadConfig {
    unet_sources: Vec<SingleDecoderLoadConfig>,
}

impl TryFrom<RawDecoderLoadConfig> for DecoderLoadConfig {
    type Error = LoadError;

    fn try_from(raw: RawDecoderLoadConfig) -> Result<Self, Self::Error> {
        let mut unet_numbers: Vec<u32> = raw
            .unet_sources
            .iter()
            .flat_map(|s| s.unet_numbers.iter().copied())
            .collect();
        unet_numbers.sort_unstable();

        validate_unet_numbers(&unet_numbers)?;

        // Sorted and non-empty after validation, so the last entry is the max
        let final_unet_number = *unet_numbers.last().unwrap_or(&0);

        Ok(Self {
            unet_sources: raw.unet_sources,
            final_unet_number,
        })
    }
}

/// Validate a sorted list of decoder unet numbers
///
/// The numbers must be non-empty, unique, start at 1, and be contiguous.
pub fn validate_unet_numbers(sorted: &[u32]) -> Result<(), LoadError> {
    if sorted.is_empty() {
        return Err(LoadError::Validation(
            "The decoder must declare at least one unet.".to_string(),
        ));
    }
    for window in sorted.windows(2) {
        if window[0] == window[1] {
            return Err(LoadError::Validation(
                "The decoder unet numbers must not repeat.".to_string(),
            ));
        }
    }
    if sorted[0] != 1 {
        return Err(LoadError::Validation(
            "The decoder unet numbers must start from 1.".to_string(),
        ));
    }
    if sorted.windows(2).any(|w| w[1] - w[0] != 1) {
        return Err(LoadError::Validation(
            "The decoder unet numbers must not skip any.".to_string(),
        ));
    }
    Ok(())
}

/// Checkpoint sources for the prior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorLoadConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sample_timesteps: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cond_scale: Option<f64>,

    pub load_model_from: FileSource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_config_from: Option<FileSource>,
}

/// Device assignment: a single device string or one per model part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Devices {
    Single(String),
    Multiple(Vec<String>),
}

impl Default for Devices {
    fn default() -> Self {
        Self::Single("cuda:0".to_string())
    }
}

/// Top-level load plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLoadConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoder: Option<DecoderLoadConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<PriorLoadConfig>,

    /// Clip adapter configuration, passed through opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<serde_json::Value>,

    #[serde(default)]
    pub devices: Devices,

    #[serde(default = "default_load_on_cpu")]
    pub load_on_cpu: bool,

    #[serde(default = "default_strict_loading")]
    pub strict_loading: bool,
}

impl ModelLoadConfig {
    /// Load and validate a plan from a JSON file
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read load plan: {:?}", path))?;
        let config: Self =
            serde_json::from_str(&content).context("Failed to parse load plan JSON")?;
        Ok(config)
    }

    /// All file sources referenced by the plan, in declaration order
    pub fn file_sources(&self) -> Vec<&FileSource> {
        let mut sources = Vec::new();
        if let Some(ref decoder) = self.decoder {
            for unet_source in &decoder.unet_sources {
                sources.push(&unet_source.load_model_from);
                if let Some(ref config) = unet_source.load_config_from {
                    sources.push(config);
                }
            }
        }
        if let Some(ref prior) = self.prior {
            sources.push(&prior.load_model_from);
            if let Some(ref config) = prior.load_config_from {
                sources.push(config);
            }
        }
        sources
    }
}

// Default functions
fn default_load_on_cpu() -> bool {
    true
}
fn default_strict_loading() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unet_source(numbers: &[u32]) -> SingleDecoderLoadConfig {
        SingleDecoderLoadConfig {
            unet_numbers: numbers.to_vec(),
            default_sample_timesteps: None,
            default_cond_scale: None,
            load_model_from: FileSource::url("https://host/decoder.pth"),
            load_config_from: None,
        }
    }

    fn decoder_json(numbers_per_source: &[&[u32]]) -> String {
        let sources: Vec<_> = numbers_per_source
            .iter()
            .map(|numbers| {
                serde_json::json!({
                    "unet_numbers": numbers,
                    "load_model_from": {
                        "load_type": "url",
                        "path": "https://host/decoder.pth"
                    }
                })
            })
            .collect();
        serde_json::json!({ "unet_sources": sources }).to_string()
    }

    #[test]
    fn test_contiguous_unet_numbers_pass() {
        assert!(validate_unet_numbers(&[1, 2, 3]).is_ok());
        assert!(validate_unet_numbers(&[1]).is_ok());
    }

    #[test]
    fn test_duplicate_unet_numbers_fail() {
        let err = validate_unet_numbers(&[1, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("must not repeat"));
    }

    #[test]
    fn test_unet_numbers_must_start_from_one() {
        let err = validate_unet_numbers(&[2, 3, 4]).unwrap_err();
        assert!(err.to_string().contains("must start from 1"));
    }

    #[test]
    fn test_unet_numbers_must_not_skip() {
        let err = validate_unet_numbers(&[1, 3, 4]).unwrap_err();
        assert!(err.to_string().contains("must not skip"));
    }

    #[test]
    fn test_empty_unet_numbers_fail() {
        assert!(validate_unet_numbers(&[]).is_err());
    }

    #[test]
    fn test_final_unet_number_computed_across_sources() {
        let config: DecoderLoadConfig =
            serde_json::from_str(&decoder_json(&[&[1, 2], &[3]])).unwrap();
        assert_eq!(config.final_unet_number, 3);
        assert_eq!(config.unet_sources.len(), 2);
    }

    #[test]
    fn test_decoder_with_invalid_sequence_rejected() {
        let result: Result<DecoderLoadConfig, _> =
            serde_json::from_str(&decoder_json(&[&[1, 2], &[2, 3]]));
        assert!(result.is_err());
    }

    #[test]
    fn test_devices_single_and_multiple() {
        let single: Devices = serde_json::from_str(r#""cuda:1""#).unwrap();
        assert_eq!(single, Devices::Single("cuda:1".to_string()));

        let multiple: Devices = serde_json::from_str(r#"["cuda:0", "cuda:1"]"#).unwrap();
        assert_eq!(
            multiple,
            Devices::Multiple(vec!["cuda:0".to_string(), "cuda:1".to_string()])
        );
    }

    #[test]
    fn test_model_load_config_defaults() {
        let config: ModelLoadConfig = serde_json::from_str("{}").unwrap();
        assert!(config.decoder.is_none());
        assert!(config.prior.is_none());
        assert!(config.clip.is_none());
        assert_eq!(config.devices, Devices::Single("cuda:0".to_string()));
        assert!(config.load_on_cpu);
        assert!(config.strict_loading);
    }

    #[test]
    fn test_full_plan_parse() {
        let json = r#"{
            "decoder": {
                "unet_sources": [{
                    "unet_numbers": [1],
                    "load_model_from": {
                        "load_type": "url",
                        "path": "https://huggingface.co/org/model/resolve/main/decoder.pth",
                        "cache_dir": "/var/cache/ckpt"
                    },
                    "load_config_from": {
                        "load_type": "local",
                        "path": "/etc/decoder_config.json"
                    }
                }]
            },
            "prior": {
                "default_cond_scale": 1.5,
                "load_model_from": {
                    "load_type": "url",
                    "path": "https://host/prior.pth?download=true"
                }
            },
            "devices": ["cuda:0", "cuda:1"],
            "load_on_cpu": false
        }"#;

        let config: ModelLoadConfig = serde_json::from_str(json).unwrap();
        let decoder = config.decoder.as_ref().unwrap();
        assert_eq!(decoder.final_unet_number, 1);
        // Hosted-model checksum derivation runs during plan parsing
        assert_eq!(
            decoder.unet_sources[0]
                .load_model_from
                .checksum_file_path
                .as_deref(),
            Some("https://huggingface.co/org/model/raw/main/decoder.pth")
        );
        assert_eq!(
            config.prior.as_ref().unwrap().load_model_from.filename(),
            "prior.pth"
        );
        assert!(!config.load_on_cpu);
    }

    #[test]
    fn test_file_sources_declaration_order() {
        let decoder: DecoderLoadConfig =
            serde_json::from_str(&decoder_json(&[&[1]])).unwrap();
        let config = ModelLoadConfig {
            decoder: Some(decoder),
            prior: Some(PriorLoadConfig {
                default_sample_timesteps: None,
                default_cond_scale: None,
                load_model_from: FileSource::url("https://host/prior.pth"),
                load_config_from: Some(FileSource::local("/etc/prior.json")),
            }),
            clip: None,
            devices: Devices::default(),
            load_on_cpu: true,
            strict_loading: true,
        };

        let sources = config.file_sources();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].filename(), "decoder.pth");
        assert_eq!(sources[1].filename(), "prior.pth");
        assert_eq!(sources[2].filename(), "prior.json");
    }

    #[test]
    fn test_from_json_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let plan_path = temp_dir.path().join("plan.json");
        std::fs::write(&plan_path, r#"{"load_on_cpu": false}"#).unwrap();

        let config = ModelLoadConfig::from_json_path(&plan_path).unwrap();
        assert!(!config.load_on_cpu);
    }

    #[test]
    fn test_from_json_path_missing_file() {
        let result = ModelLoadConfig::from_json_path("/nonexistent/plan-12345.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_single_decoder_config_direct_construction() {
        let source = unet_source(&[1, 2]);
        assert_eq!(source.unet_numbers, vec![1, 2]);
        assert_eq!(source.load_model_from.filename(), "decoder.pth");
    }
}
