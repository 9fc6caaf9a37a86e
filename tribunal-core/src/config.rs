//! Configuration system for Tribunal.
//!
//! Two kinds of configuration live here:
//!
//! - [`JuryConfig`]: the criteria, jurors, and voting policy for one jury.
//!   Loaded from a TOML or JSON file with `TRIBUNAL_JURY_` environment overrides.
//! - [`TribunalConfig`]: runtime settings (LLM provider wiring), layered as
//!   defaults -> `~/.config/tribunal/config.toml` -> `.tribunal/config.toml`
//!   -> `TRIBUNAL_` environment variables.
//!
//! Both are plain serde values. A jury configuration must pass
//! [`JuryConfig::validate`] before any juror is invoked.

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::voting::CustomVotingRegistry;

/// Model used by jurors that do not name one.
pub const DEFAULT_JUROR_MODEL: &str = "openrouter/horizon-alpha";

fn default_weight() -> f64 {
    1.0
}

fn default_max_score() -> u32 {
    5
}

fn default_juror_model() -> String {
    DEFAULT_JUROR_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

/// One named, weighted dimension of quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_max_score")]
    pub max_score: u32,
}

impl CriterionConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            weight: default_weight(),
            max_score: default_max_score(),
        }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn max_score(mut self, max_score: u32) -> Self {
        self.max_score = max_score;
        self
    }
}

/// One independent evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurorConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_juror_model", alias = "model")]
    pub model_name: String,
    /// Overrides the default evaluator system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl JurorConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model_name: default_juror_model(),
            system_prompt: None,
            temperature: default_temperature(),
            weight: default_weight(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// The aggregation algorithm that turns juror evaluations into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum VotingMethod {
    #[default]
    Majority,
    Average,
    Weighted,
    Ranked,
    Consensus,
    Custom,
}

impl VotingMethod {
    pub const ALL: [VotingMethod; 6] = [
        VotingMethod::Majority,
        VotingMethod::Average,
        VotingMethod::Weighted,
        VotingMethod::Ranked,
        VotingMethod::Consensus,
        VotingMethod::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::Majority => "majority",
            VotingMethod::Average => "average",
            VotingMethod::Weighted => "weighted",
            VotingMethod::Ranked => "ranked",
            VotingMethod::Consensus => "consensus",
            VotingMethod::Custom => "custom",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            VotingMethod::Majority => "One vote per juror for its top response; most votes wins",
            VotingMethod::Average => "Unweighted mean of composite scores across jurors",
            VotingMethod::Weighted => "Juror-weighted mean of composite scores",
            VotingMethod::Ranked => "Borda count over each juror's preference ordering",
            VotingMethod::Consensus => "Majority winner flagged when agreement is too low",
            VotingMethod::Custom => "Caller-registered aggregation function",
        }
    }
}

impl std::fmt::Display for VotingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        VotingMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownVotingMethod {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for VotingMethod {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Tunables for the voting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingPolicy {
    /// The consensus winner's share of votes must strictly exceed this.
    pub consensus_threshold: f64,
    /// Multiply each juror's Borda points by the juror weight.
    pub ranked_juror_weighted: bool,
}

impl Default for VotingPolicy {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.5,
            ranked_juror_weighted: false,
        }
    }
}

/// How juror invocations are scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-attempt timeout in seconds. 0 disables it.
    pub attempt_timeout_secs: u64,
    /// Maximum number of jurors invoked at once.
    pub max_concurrency: usize,
    /// Delay before the first retry of a juror, doubled on each further retry. 0 retries at once.
    pub retry_backoff_ms: u64,
    /// Upper bound on the retry delay.
    pub max_backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: 60,
            max_concurrency: 10,
            retry_backoff_ms: 0,
            max_backoff_ms: 10_000,
        }
    }
}

impl ExecutionConfig {
    /// Per-attempt timeout, if enabled.
    pub fn attempt_timeout(&self) -> Option<std::time::Duration> {
        (self.attempt_timeout_secs > 0)
            .then(|| std::time::Duration::from_secs(self.attempt_timeout_secs))
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> std::time::Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        let ms = self
            .retry_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        std::time::Duration::from_millis(ms)
    }
}

/// Complete description of one jury.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JuryConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub voting_method: VotingMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_voting_function: Option<String>,
    #[serde(default = "default_true")]
    pub require_explanation: bool,
    /// Additional attempts per juror after the first one fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub voting: VotingPolicy,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Free-form settings handed to custom voting functions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_settings: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub criteria: Vec<CriterionConfig>,
    #[serde(default)]
    pub jurors: Vec<JurorConfig>,
}

impl Default for JuryConfig {
    fn default() -> Self {
        Self {
            name: "jury".to_string(),
            description: None,
            voting_method: VotingMethod::default(),
            custom_voting_function: None,
            require_explanation: true,
            max_retries: default_max_retries(),
            voting: VotingPolicy::default(),
            execution: ExecutionConfig::default(),
            custom_settings: BTreeMap::new(),
            criteria: Vec::new(),
            jurors: Vec::new(),
        }
    }
}

impl JuryConfig {
    /// Check every configuration rule. Runs before any juror is invoked.
    pub fn validate(&self, registry: &CustomVotingRegistry) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "jury name must not be empty".into(),
            });
        }
        if self.criteria.is_empty() {
            return Err(ConfigError::Invalid {
                message: "at least one criterion is required".into(),
            });
        }
        if self.jurors.is_empty() {
            return Err(ConfigError::Invalid {
                message: "at least one juror is required".into(),
            });
        }

        let mut seen = HashSet::new();
        for criterion in &self.criteria {
            if criterion.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "criterion name must not be empty".into(),
                });
            }
            if !seen.insert(criterion.name.as_str()) {
                return Err(ConfigError::DuplicateCriterion {
                    name: criterion.name.clone(),
                });
            }
            check_weight("Criterion", &criterion.name, criterion.weight)?;
            if criterion.max_score < 1 {
                return Err(ConfigError::Invalid {
                    message: format!("criterion '{}' must have max_score >= 1", criterion.name),
                });
            }
        }

        let mut seen = HashSet::new();
        for juror in &self.jurors {
            if juror.name.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "juror name must not be empty".into(),
                });
            }
            if !seen.insert(juror.name.as_str()) {
                return Err(ConfigError::DuplicateJuror {
                    name: juror.name.clone(),
                });
            }
            check_weight("Juror", &juror.name, juror.weight)?;
            if !(0.0..=2.0).contains(&juror.temperature) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "juror '{}' temperature {} is outside [0, 2]",
                        juror.name, juror.temperature
                    ),
                });
            }
        }

        let threshold = self.voting.consensus_threshold;
        if !(0.0..1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                message: format!("consensus_threshold {threshold} is outside [0, 1)"),
            });
        }
        if self.execution.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "execution.max_concurrency must be at least 1".into(),
            });
        }

        if self.voting_method == VotingMethod::Custom {
            let name = self
                .custom_voting_function
                .as_deref()
                .ok_or(ConfigError::MissingCustomFunction)?;
            if !registry.contains(name) {
                return Err(ConfigError::UnknownCustomFunction {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }

    /// A small but complete jury used by `tribunal example-config`.
    pub fn example() -> Self {
        Self {
            name: "Code Review Jury".to_string(),
            description: Some("Compares candidate answers to a programming question".to_string()),
            criteria: vec![
                CriterionConfig::new("factuality", "Is the answer technically correct?")
                    .weight(2.0),
                CriterionConfig::new("clarity", "Is the answer easy to follow?"),
                CriterionConfig::new("completeness", "Does it cover the whole question?")
                    .weight(1.5)
                    .max_score(10),
            ],
            jurors: vec![
                JurorConfig {
                    description: Some("Strict senior reviewer".to_string()),
                    temperature: 0.0,
                    ..JurorConfig::new("strict-reviewer").weight(2.0)
                },
                JurorConfig::new("pragmatist").model("openai/gpt-4o-mini"),
                JurorConfig::new("mentor")
                    .model("anthropic/claude-3.5-haiku")
                    .system_prompt("You grade answers the way a patient mentor would."),
            ],
            voting_method: VotingMethod::Weighted,
            ..Self::default()
        }
    }
}

fn check_weight(kind: &str, name: &str, weight: f64) -> Result<(), ConfigError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveWeight {
            kind: kind.to_string(),
            name: name.to_string(),
            weight,
        })
    }
}

/// Load a jury configuration from a TOML or JSON file.
///
/// The file is merged over serialized defaults, then `TRIBUNAL_JURY_`
/// environment variables (e.g. `TRIBUNAL_JURY_MAX_RETRIES=1`,
/// `TRIBUNAL_JURY_VOTING__CONSENSUS_THRESHOLD=0.6`). The result is not
/// validated; see [`JuryConfig::validate`].
pub fn load_jury_config(path: &Path) -> Result<JuryConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut figment = Figment::from(Serialized::defaults(JuryConfig::default()));
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    figment = if is_json {
        figment.merge(Json::file(path))
    } else {
        figment.merge(Toml::file(path))
    };
    figment = figment.merge(Env::prefixed("TRIBUNAL_JURY_").split("__"));

    // Surface a bad method name as its own error rather than a generic parse failure.
    if let Ok(raw) = figment.extract_inner::<String>("voting_method") {
        raw.parse::<VotingMethod>()?;
    }

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Runtime configuration for the `tribunal` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TribunalConfig {
    #[serde(default)]
    pub llm: LlmConfig,
}

/// LLM provider configuration shared by every LLM-backed juror.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openrouter", "openai", or "local".
    pub provider: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    pub api_key_env: Option<String>,
    /// Inline API key. Takes precedence over `api_key_env`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Maximum tokens to generate per juror reply.
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            base_url: None,
            api_key_env: None,
            api_key: None,
            max_tokens: 2000,
        }
    }
}

impl LlmConfig {
    /// Endpoint for the configured provider, honoring `base_url`.
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "openai" => "https://api.openai.com/v1".to_string(),
            "local" => "http://localhost:11434/v1".to_string(),
            _ => "https://openrouter.ai/api/v1".to_string(),
        }
    }

    /// Environment variable consulted for the API key.
    pub fn resolved_api_key_env(&self) -> String {
        if let Some(var) = &self.api_key_env {
            return var.clone();
        }
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY".to_string(),
            "local" => "LOCAL_LLM_API_KEY".to_string(),
            _ => "OPENROUTER_API_KEY".to_string(),
        }
    }

    /// Whether the provider runs without an API key.
    pub fn is_local(&self) -> bool {
        self.provider == "local"
            || self
                .base_url
                .as_deref()
                .is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"))
    }
}

/// Load runtime configuration with layered sources.
///
/// Order (later overrides earlier):
/// 1. Built-in defaults
/// 2. User config (`~/.config/tribunal/config.toml`)
/// 3. Workspace config (`.tribunal/config.toml`)
/// 4. Environment variables (`TRIBUNAL_LLM__PROVIDER`, ...)
pub fn load_config(workspace: Option<&Path>) -> Result<TribunalConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(TribunalConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "tribunal", "tribunal") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".tribunal").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    figment = figment.merge(Env::prefixed("TRIBUNAL_").split("__"));

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn valid_config() -> JuryConfig {
        JuryConfig {
            name: "test".into(),
            criteria: vec![CriterionConfig::new("accuracy", "Is it right?")],
            jurors: vec![JurorConfig::new("j1"), JurorConfig::new("j2")],
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let criterion = CriterionConfig::new("clarity", "");
        assert_eq!(criterion.weight, 1.0);
        assert_eq!(criterion.max_score, 5);

        let juror = JurorConfig::new("j");
        assert_eq!(juror.model_name, DEFAULT_JUROR_MODEL);
        assert_eq!(juror.temperature, 0.1);
        assert_eq!(juror.weight, 1.0);

        let config = JuryConfig::default();
        assert!(config.require_explanation);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.voting.consensus_threshold, 0.5);
        assert_eq!(config.execution.attempt_timeout_secs, 60);
        assert_eq!(config.execution.max_concurrency, 10);
    }

    #[test]
    fn test_execution_timeout_and_backoff() {
        let mut exec = ExecutionConfig::default();
        assert_eq!(exec.attempt_timeout(), Some(std::time::Duration::from_secs(60)));
        assert_eq!(exec.backoff_for(1), std::time::Duration::ZERO);

        exec.attempt_timeout_secs = 0;
        exec.retry_backoff_ms = 100;
        exec.max_backoff_ms = 350;
        assert_eq!(exec.attempt_timeout(), None);
        assert_eq!(exec.backoff_for(1).as_millis(), 100);
        assert_eq!(exec.backoff_for(2).as_millis(), 200);
        assert_eq!(exec.backoff_for(3).as_millis(), 350);
        assert_eq!(exec.backoff_for(40).as_millis(), 350);
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        assert!(valid_config().validate(&CustomVotingRegistry::new()).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_criterion() {
        let mut config = valid_config();
        config.criteria.push(CriterionConfig::new("accuracy", "again"));
        let err = config.validate(&CustomVotingRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCriterion { name } if name == "accuracy"));
    }

    #[test]
    fn test_validate_rejects_duplicate_juror() {
        let mut config = valid_config();
        config.jurors.push(JurorConfig::new("j1"));
        let err = config.validate(&CustomVotingRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateJuror { name } if name == "j1"));
    }

    #[test]
    fn test_validate_rejects_non_positive_weights() {
        let mut config = valid_config();
        config.criteria[0].weight = 0.0;
        let err = config.validate(&CustomVotingRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveWeight { ref kind, .. } if kind == "Criterion"));

        let mut config = valid_config();
        config.jurors[1].weight = -2.0;
        let err = config.validate(&CustomVotingRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveWeight { ref name, .. } if name == "j2"));

        let mut config = valid_config();
        config.jurors[0].weight = f64::NAN;
        assert!(config.validate(&CustomVotingRegistry::new()).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_lists_and_bad_ranges() {
        let registry = CustomVotingRegistry::new();

        let mut config = valid_config();
        config.jurors.clear();
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::Invalid { .. })
        ));

        let mut config = valid_config();
        config.criteria[0].max_score = 0;
        assert!(config.validate(&registry).is_err());

        let mut config = valid_config();
        config.jurors[0].temperature = 2.5;
        assert!(config.validate(&registry).is_err());

        let mut config = valid_config();
        config.voting.consensus_threshold = 1.0;
        assert!(config.validate(&registry).is_err());

        let mut config = valid_config();
        config.execution.max_concurrency = 0;
        assert!(config.validate(&registry).is_err());
    }

    #[test]
    fn test_validate_custom_method_requires_registered_function() {
        let mut config = valid_config();
        config.voting_method = VotingMethod::Custom;
        let registry = CustomVotingRegistry::new();
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::MissingCustomFunction)
        ));

        config.custom_voting_function = Some("nope".into());
        assert!(matches!(
            config.validate(&registry),
            Err(ConfigError::UnknownCustomFunction { name }) if name == "nope"
        ));
    }

    #[test]
    fn test_voting_method_parse() {
        assert_eq!("ranked".parse::<VotingMethod>().unwrap(), VotingMethod::Ranked);
        assert_eq!(" Consensus ".parse::<VotingMethod>().unwrap(), VotingMethod::Consensus);
        let err = "plurality".parse::<VotingMethod>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVotingMethod { value } if value == "plurality"));
    }

    #[test]
    fn test_voting_method_serde() {
        let json = serde_json::to_string(&VotingMethod::Weighted).unwrap();
        assert_eq!(json, "\"weighted\"");
        let method: VotingMethod = serde_json::from_str("\"AVERAGE\"").unwrap();
        assert_eq!(method, VotingMethod::Average);
        assert!(serde_json::from_str::<VotingMethod>("\"plurality\"").is_err());
    }

    #[test]
    fn test_load_jury_config_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jury.toml");
        std::fs::write(
            &path,
            r#"
name = "Summaries"
voting_method = "consensus"
max_retries = 1

[voting]
consensus_threshold = 0.6

[[criteria]]
name = "faithfulness"
description = "No invented facts"
weight = 2.0

[[criteria]]
name = "brevity"
max_score = 10

[[jurors]]
name = "a"
model = "openai/gpt-4o"

[[jurors]]
name = "b"
weight = 0.5
"#,
        )
        .unwrap();

        let config = load_jury_config(&path).unwrap();
        assert_eq!(config.name, "Summaries");
        assert_eq!(config.voting_method, VotingMethod::Consensus);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.voting.consensus_threshold, 0.6);
        assert_eq!(config.criteria[1].weight, 1.0);
        assert_eq!(config.criteria[1].max_score, 10);
        assert_eq!(config.jurors[0].model_name, "openai/gpt-4o");
        assert_eq!(config.jurors[1].model_name, DEFAULT_JUROR_MODEL);
        assert!(config.require_explanation);
        assert!(config.validate(&CustomVotingRegistry::new()).is_ok());
    }

    #[test]
    fn test_load_jury_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jury.json");
        std::fs::write(
            &path,
            r#"{
                "name": "json jury",
                "voting_method": "ranked",
                "require_explanation": false,
                "criteria": [{"name": "accuracy"}],
                "jurors": [{"name": "solo", "temperature": 0.7}],
                "custom_settings": {"min_margin": 0.2}
            }"#,
        )
        .unwrap();

        let config = load_jury_config(&path).unwrap();
        assert_eq!(config.voting_method, VotingMethod::Ranked);
        assert!(!config.require_explanation);
        assert_eq!(config.jurors[0].temperature, 0.7);
        assert_eq!(
            config.custom_settings.get("min_margin"),
            Some(&serde_json::json!(0.2))
        );
    }

    #[test]
    fn test_load_jury_config_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jury.toml");
        std::fs::write(&path, "name = \"x\"\nvoting_method = \"plurality\"\n").unwrap();
        let err = load_jury_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVotingMethod { value } if value == "plurality"));
    }

    #[test]
    fn test_load_jury_config_missing_file() {
        let err = load_jury_config(Path::new("/nonexistent/jury.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_example_config_is_valid_and_round_trips_toml() {
        let example = JuryConfig::example();
        assert!(example.validate(&CustomVotingRegistry::new()).is_ok());

        let rendered = example.to_toml_string().unwrap();
        let parsed: JuryConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, example);
    }

    #[test]
    fn test_llm_config_resolution() {
        let config = LlmConfig::default();
        assert_eq!(config.resolved_base_url(), "https://openrouter.ai/api/v1");
        assert_eq!(config.resolved_api_key_env(), "OPENROUTER_API_KEY");
        assert!(!config.is_local());

        let config = LlmConfig {
            provider: "openai".into(),
            ..Default::default()
        };
        assert_eq!(config.resolved_base_url(), "https://api.openai.com/v1");
        assert_eq!(config.resolved_api_key_env(), "OPENAI_API_KEY");

        let config = LlmConfig {
            provider: "local".into(),
            base_url: Some("http://127.0.0.1:8000/v1/".into()),
            ..Default::default()
        };
        assert_eq!(config.resolved_base_url(), "http://127.0.0.1:8000/v1");
        assert!(config.is_local());
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let tribunal_dir = dir.path().join(".tribunal");
        std::fs::create_dir_all(&tribunal_dir).unwrap();
        std::fs::write(
            tribunal_dir.join("config.toml"),
            "[llm]\nprovider = \"openai\"\nmax_tokens = 512\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.max_tokens, 512);
    }
}
