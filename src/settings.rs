//! Decoder configuration loaded from TOML.
//!
//! - `DecoderConfig::from_toml(content)` parses and validates a custom config
//! - `DecoderConfig::default()` parses the embedded default TOML
//!
//! The config is a plain value handed to `Decoder::new`; there is no
//! process-wide settings singleton. Per-sentence mutable state lives in the
//! decoder instance, never at module scope.

use serde::Deserialize;

use crate::model::FeatureVector;

pub const DEFAULT_CONFIG_TOML: &str = include_str!("default_config.toml");

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    pub search: SearchSettings,
    pub weights: Weights,
    #[serde(default)]
    pub trace: TraceSettings,
}

impl DecoderConfig {
    /// Parse and validate a TOML config.
    pub fn from_toml(toml_str: &str) -> Result<Self, SettingsError> {
        let config: DecoderConfig =
            toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::from_toml(DEFAULT_CONFIG_TOML).expect("embedded default config must be valid")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    /// Maximum representatives per stack; admission evicts the worst beyond this.
    pub stack_size: usize,
    /// Hypotheses a container may emit per expansion.
    pub pop_limit: usize,
    /// Top-K slice size per cube axis.
    pub cube_width: usize,
    /// Additive score gap below the stack best within which admission is
    /// allowed. 0.0 disables threshold pruning.
    pub beam_width: f32,
    /// Longest source span handed to the phrase table.
    pub max_phrase_len: usize,
    /// How far past the first uncovered position an extension may start.
    /// Negative means unlimited.
    pub max_distortion: i32,
}

/// Model weights applied when collapsing feature scores into a single
/// hypothesis score.
#[derive(Debug, Clone, Deserialize)]
pub struct Weights {
    /// One weight per phrase-table feature column.
    pub phrase: Vec<f32>,
    pub lm: f32,
    pub distortion: f32,
    pub word_penalty: f32,
    /// One weight per registered extra feature function, in registration order.
    #[serde(default)]
    pub extra: Vec<f32>,
}

impl Weights {
    /// Weighted sum over a phrase-table feature vector. Feature columns
    /// beyond the weight vector contribute nothing.
    pub fn phrase_score(&self, features: &FeatureVector) -> f32 {
        self.phrase
            .iter()
            .zip(features.values())
            .map(|(w, v)| w * v)
            .sum()
    }
}

fn default_trace_filter() -> String {
    "phrasal=debug".to_string()
}

fn default_trace_file() -> String {
    "phrasal-trace.jsonl".to_string()
}

/// File-tracing settings, consumed by `trace_init::init_tracing` when the
/// `trace` feature is enabled.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceSettings {
    /// Fallback filter directives when `RUST_LOG` is not set.
    #[serde(default = "default_trace_filter")]
    pub filter: String,
    /// Log file name inside the directory handed to `init_tracing`.
    #[serde(default = "default_trace_file")]
    pub file: String,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            filter: default_trace_filter(),
            file: default_trace_file(),
        }
    }
}

fn validate(config: &DecoderConfig) -> Result<(), SettingsError> {
    macro_rules! check_positive {
        ($field:ident) => {
            if config.search.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!("search.", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    check_positive!(stack_size);
    check_positive!(pop_limit);
    check_positive!(cube_width);
    check_positive!(max_phrase_len);

    if !config.search.beam_width.is_finite() || config.search.beam_width < 0.0 {
        return Err(SettingsError::InvalidValue {
            field: "search.beam_width".to_string(),
            reason: "must be finite and non-negative".to_string(),
        });
    }

    if config.weights.phrase.is_empty() {
        return Err(SettingsError::InvalidValue {
            field: "weights.phrase".to_string(),
            reason: "must contain at least one weight".to_string(),
        });
    }
    let all_weights = config
        .weights
        .phrase
        .iter()
        .chain(config.weights.extra.iter())
        .chain([
            &config.weights.lm,
            &config.weights.distortion,
            &config.weights.word_penalty,
        ]);
    for w in all_weights {
        if !w.is_finite() {
            return Err(SettingsError::InvalidValue {
                field: "weights".to_string(),
                reason: "weights must be finite".to_string(),
            });
        }
    }

    if config.trace.filter.is_empty() {
        return Err(SettingsError::InvalidValue {
            field: "trace.filter".to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if config.trace.file.is_empty() {
        return Err(SettingsError::InvalidValue {
            field: "trace.file".to_string(),
            reason: "must not be empty".to_string(),
        });
    }

    Ok(())
}
