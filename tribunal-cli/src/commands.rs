//! CLI subcommand handlers.

use crate::custom_methods;
use anyhow::Context;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tribunal_core::config::{DEFAULT_JUROR_MODEL, JuryConfig, VotingMethod, load_config, load_jury_config};
use tribunal_core::error::{ConfigError, TribunalError};
use tribunal_core::providers::create_provider;
use tribunal_core::{Jury, LlmJuror, ResponseCandidate, Verdict};

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: u8 = 0;
    /// The evaluation ran and failed, or an output could not be written.
    pub const EVALUATION_FAILED: u8 = 1;
    /// Bad configuration or usage; nothing was evaluated.
    pub const CONFIG_ERROR: u8 = 2;
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Evaluate candidate responses with a jury
    Run {
        /// Jury configuration file (TOML or JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// The prompt the responses answer
        #[arg(short, long)]
        prompt: String,
        /// Candidate response text (repeat for each response)
        #[arg(short, long = "response", required = true)]
        responses: Vec<String>,
        /// Ids for the responses, in the same order
        #[arg(long = "response-id")]
        response_ids: Vec<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the jurors of a configuration, or the built-in voting methods
    Jurors {
        /// Jury configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List jury configuration files under a directory
    ListConfigs {
        /// Directory to scan recursively for `.json` and `.toml` files
        #[arg(short, long)]
        dir: PathBuf,
    },
    /// Print an example jury configuration
    ExampleConfig {
        #[arg(short, long, value_enum, default_value_t)]
        format: ConfigFormat,
    },
    /// Convert a saved JSON result to another format
    Export {
        /// JSON verdict written by `tribunal run --format json`
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value_t)]
        format: ExportFormat,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
    Table,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Text,
}

/// A usage problem detected by the CLI itself.
#[derive(Debug)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Map an error to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    let configuration = err.chain().any(|cause| {
        cause.is::<UsageError>()
            || cause.is::<ConfigError>()
            || cause
                .downcast_ref::<TribunalError>()
                .is_some_and(TribunalError::is_configuration)
    });
    if configuration {
        exit_codes::CONFIG_ERROR
    } else {
        exit_codes::EVALUATION_FAILED
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            config,
            prompt,
            responses,
            response_ids,
            format,
            output,
        } => {
            let candidates = build_candidates(responses, response_ids)?;
            let verdict = run_jury(&config, &prompt, candidates, workspace).await?;
            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&verdict)?,
                OutputFormat::Text => verdict.render_text(),
                OutputFormat::Table => render_table(&verdict),
            };
            emit(&rendered, output.as_deref())
        }
        Commands::Jurors { config } => {
            match config {
                Some(path) => {
                    let config = load_jury_config(&path)?;
                    print!("{}", render_jurors(&config));
                }
                None => print!("{}", render_methods()),
            }
            Ok(())
        }
        Commands::ListConfigs { dir } => {
            if !dir.is_dir() {
                return Err(UsageError(format!("{} is not a directory", dir.display())).into());
            }
            let found = find_configs(&dir);
            if found.is_empty() {
                println!("No jury configuration files found in {}", dir.display());
            } else {
                print!("{}", render_configs(&found));
            }
            Ok(())
        }
        Commands::ExampleConfig { format } => {
            let example = JuryConfig::example();
            let text = match format {
                ConfigFormat::Toml => example.to_toml_string()?,
                ConfigFormat::Json => serde_json::to_string_pretty(&example)?,
            };
            println!("{text}");
            Ok(())
        }
        Commands::Export {
            input,
            output,
            format,
        } => {
            let raw = std::fs::read_to_string(&input)
                .map_err(|e| UsageError(format!("cannot read {}: {e}", input.display())))?;
            let document: Value = serde_json::from_str(&raw)
                .map_err(|e| UsageError(format!("{} is not valid JSON: {e}", input.display())))?;
            let summary = ExportSummary::from_json(&document)?;
            let text = match format {
                ExportFormat::Csv => summary.to_csv(),
                ExportFormat::Json => serde_json::to_string_pretty(&document)?,
                ExportFormat::Text => summary.to_text(),
            };
            std::fs::write(&output, text)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Results exported to {}", output.display());
            Ok(())
        }
    }
}

fn build_candidates(
    responses: Vec<String>,
    ids: Vec<String>,
) -> Result<Vec<ResponseCandidate>, UsageError> {
    if ids.is_empty() {
        return Ok(responses.into_iter().map(ResponseCandidate::new).collect());
    }
    if ids.len() != responses.len() {
        return Err(UsageError(format!(
            "got {} --response-id values for {} responses",
            ids.len(),
            responses.len()
        )));
    }
    Ok(ids
        .into_iter()
        .zip(responses)
        .map(|(id, text)| ResponseCandidate::with_id(id, text))
        .collect())
}

async fn run_jury(
    config_path: &Path,
    prompt: &str,
    candidates: Vec<ResponseCandidate>,
    workspace: &Path,
) -> anyhow::Result<Verdict> {
    let config = load_jury_config(config_path)?;
    let settings = load_config(Some(workspace))
        .map_err(|e| UsageError(format!("Invalid runtime configuration: {e}")))?;
    let provider = create_provider(&settings.llm, DEFAULT_JUROR_MODEL)
        .map_err(|e| UsageError(e.to_string()))?;
    let invoker = LlmJuror::new(provider)
        .with_max_tokens(settings.llm.max_tokens)
        .with_require_explanation(config.require_explanation);

    let jury = Jury::new(config, Arc::new(invoker), custom_methods::registry())?;
    info!(
        jurors = jury.config().jurors.len(),
        responses = candidates.len(),
        "Starting evaluation"
    );

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling evaluation");
            on_interrupt.cancel();
        }
    });

    let verdict = jury
        .evaluate_with_cancellation(prompt, candidates, &token)
        .await?;
    Ok(verdict)
}

fn emit(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Results saved to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

/// Left-aligned plain-text table.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .map(|r| r.get(i).map_or(0, |c| c.chars().count()))
                .max()
                .unwrap_or(0)
                .max(h.len())
        })
        .collect();

    let line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

fn render_table(verdict: &Verdict) -> String {
    let result = &verdict.final_verdict;
    let rows: Vec<Vec<String>> = result
        .ranking
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let name = verdict
                .response(id)
                .map(|r| r.display_name().to_string())
                .unwrap_or_else(|| id.clone());
            vec![
                (i + 1).to_string(),
                name,
                format!("{:.3}", result.scores.get(id).copied().unwrap_or_default()),
                if *id == result.winner { "*".to_string() } else { String::new() },
            ]
        })
        .collect();
    let mut out = format!(
        "Evaluation Results ({}, confidence {:.1}%)\n",
        result.method,
        result.confidence * 100.0
    );
    out.push_str(&table(&["Rank", "Response", "Score", "Winner"], &rows));
    out
}

/// A jury configuration file found on disk.
#[derive(Debug, PartialEq)]
struct ConfigEntry {
    /// Path relative to the scanned directory.
    file: PathBuf,
    size: u64,
    /// Jury name, or `None` when the file does not load as a jury.
    jury: Option<String>,
}

fn find_configs(dir: &Path) -> Vec<ConfigEntry> {
    let mut entries: Vec<ConfigEntry> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            matches!(
                e.path().extension().and_then(|ext| ext.to_str()),
                Some("json" | "toml")
            )
        })
        .map(|e| ConfigEntry {
            file: e.path().strip_prefix(dir).unwrap_or(e.path()).to_path_buf(),
            size: e.metadata().map(|m| m.len()).unwrap_or(0),
            jury: load_jury_config(e.path()).ok().map(|config| config.name),
        })
        .collect();
    entries.sort_by(|a, b| a.file.cmp(&b.file));
    entries
}

fn render_configs(entries: &[ConfigEntry]) -> String {
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|entry| {
            vec![
                entry.file.display().to_string(),
                format!("{} bytes", entry.size),
                entry.jury.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    table(&["File", "Size", "Jury"], &rows)
}

fn render_jurors(config: &JuryConfig) -> String {
    let jurors: Vec<Vec<String>> = config
        .jurors
        .iter()
        .map(|j| {
            vec![
                j.name.clone(),
                j.model_name.clone(),
                j.weight.to_string(),
                j.temperature.to_string(),
            ]
        })
        .collect();
    let criteria: Vec<Vec<String>> = config
        .criteria
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.weight.to_string(),
                format!("0-{}", c.max_score),
                c.description.clone(),
            ]
        })
        .collect();

    let mut out = format!("Jurors in {} (voting: {})\n", config.name, config.voting_method);
    out.push_str(&table(&["Name", "Model", "Weight", "Temperature"], &jurors));
    out.push_str("\nCriteria\n");
    out.push_str(&table(&["Name", "Weight", "Scale", "Description"], &criteria));
    out
}

fn render_methods() -> String {
    let mut out = String::from("Built-in voting methods:\n");
    for method in VotingMethod::ALL {
        out.push_str(&format!("  {:<10} {}\n", method.as_str(), method.describe()));
    }
    out.push_str("\nCustom voting functions:\n");
    for name in custom_methods::registry().names() {
        out.push_str(&format!("  {name}\n"));
    }
    out
}

/// The parts of a saved result that every export format needs.
#[derive(Debug, PartialEq)]
struct ExportSummary {
    winner: String,
    confidence: f64,
    scores: Vec<(String, f64)>,
}

impl ExportSummary {
    /// Accepts a full verdict, a bare voting result, or any object with
    /// `winner`, `confidence` and `scores`.
    fn from_json(document: &Value) -> Result<Self, UsageError> {
        let result = document.get("final_verdict").unwrap_or(document);
        let winner = result
            .get("winner")
            .and_then(Value::as_str)
            .ok_or_else(|| UsageError("result has no 'winner'".to_string()))?
            .to_string();
        let confidence = result
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let score_map = result.get("scores").and_then(Value::as_object);
        let order: Vec<String> = match result.get("ranking").and_then(Value::as_array) {
            Some(ranking) => ranking
                .iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect(),
            None => score_map
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default(),
        };
        let scores = order
            .into_iter()
            .map(|id| {
                let score = score_map
                    .and_then(|m| m.get(&id))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                (id, score)
            })
            .collect();

        Ok(Self {
            winner,
            confidence,
            scores,
        })
    }

    fn to_csv(&self) -> String {
        let mut out = String::from("Response,Score,Winner,Confidence\n");
        for (id, score) in &self.scores {
            out.push_str(&format!(
                "{},{},{},{}\n",
                csv_field(id),
                score,
                csv_field(&self.winner),
                self.confidence
            ));
        }
        out
    }

    fn to_text(&self) -> String {
        let mut out = format!(
            "Winner: {}\nConfidence: {:.2}%\n\nScores:\n",
            self.winner,
            self.confidence * 100.0
        );
        for (id, score) in &self.scores {
            out.push_str(&format!("  {id}: {score}\n"));
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_build_candidates() {
        let generated = build_candidates(vec!["x".into(), "y".into()], vec![]).unwrap();
        assert!(generated.iter().all(|c| c.id.starts_with("response_")));

        let named = build_candidates(
            vec!["x".into(), "y".into()],
            vec!["first".into(), "second".into()],
        )
        .unwrap();
        assert_eq!(named[1].id, "second");
        assert_eq!(named[1].content, "y");

        let err = build_candidates(vec!["x".into()], vec!["a".into(), "b".into()]).unwrap_err();
        assert_eq!(err.to_string(), "got 2 --response-id values for 1 responses");
    }

    #[test]
    fn test_exit_codes() {
        let usage = anyhow::Error::new(UsageError("bad".into()));
        assert_eq!(exit_code_for(&usage), exit_codes::CONFIG_ERROR);

        let config = anyhow::Error::new(ConfigError::MissingCustomFunction);
        assert_eq!(exit_code_for(&config), exit_codes::CONFIG_ERROR);

        let wrapped = anyhow::Error::new(TribunalError::Config(ConfigError::Invalid {
            message: "x".into(),
        }));
        assert_eq!(exit_code_for(&wrapped), exit_codes::CONFIG_ERROR);

        let failed = anyhow::Error::new(TribunalError::Evaluation(
            tribunal_core::EvaluationError::Cancelled,
        ));
        assert_eq!(exit_code_for(&failed), exit_codes::EVALUATION_FAILED);

        let duplicate = anyhow::Error::new(TribunalError::Evaluation(
            tribunal_core::EvaluationError::DuplicateResponseId { id: "a".into() },
        ));
        assert_eq!(exit_code_for(&duplicate), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_export_summary_from_verdict_json() {
        let document = json!({
            "jury_name": "x",
            "final_verdict": {
                "method": "average",
                "ranking": ["b", "a"],
                "winner": "b",
                "scores": {"a": 0.4, "b": 0.9},
                "confidence": 0.75
            }
        });
        let summary = ExportSummary::from_json(&document).unwrap();
        assert_eq!(summary.winner, "b");
        assert_eq!(summary.scores, vec![("b".into(), 0.9), ("a".into(), 0.4)]);
        assert_eq!(
            summary.to_csv(),
            "Response,Score,Winner,Confidence\nb,0.9,b,0.75\na,0.4,b,0.75\n"
        );
        assert!(summary.to_text().starts_with("Winner: b\nConfidence: 75.00%\n"));
    }

    #[test]
    fn test_export_summary_from_flat_result() {
        let document = json!({"winner": "r,1", "confidence": 1.0, "scores": {"r,1": 5}});
        let summary = ExportSummary::from_json(&document).unwrap();
        assert_eq!(summary.to_csv(), "Response,Score,Winner,Confidence\n\"r,1\",5,\"r,1\",1\n");

        assert!(ExportSummary::from_json(&json!({"scores": {}})).is_err());
    }

    #[test]
    fn test_find_configs_scans_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("juries");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("review.json"),
            serde_json::to_string(&JuryConfig::example()).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "name = [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let found = find_configs(dir.path());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].file, PathBuf::from("broken.toml"));
        assert_eq!(found[0].jury, None);
        assert_eq!(found[1].file, Path::new("juries").join("review.json"));
        assert_eq!(found[1].jury.as_deref(), Some("Code Review Jury"));
        assert!(found[1].size > 0);

        let text = render_configs(&found);
        assert!(text.starts_with("File"));
        assert!(text.contains("Code Review Jury"));
    }

    #[tokio::test]
    async fn test_list_configs_rejects_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = handle_command(
            Commands::ListConfigs {
                dir: dir.path().join("absent"),
            },
            dir.path(),
        )
        .await
        .unwrap_err();
        assert_eq!(exit_code_for(&err), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("line\r\nbreak"), "\"line\r\nbreak\"");
    }

    #[test]
    fn test_table_alignment() {
        let text = table(
            &["Name", "Weight"],
            &[vec!["strict".into(), "2".into()], vec!["j".into(), "1.5".into()]],
        );
        assert_eq!(text, "Name    Weight\n------  ------\nstrict  2\nj       1.5\n");
    }

    #[test]
    fn test_render_jurors_and_methods() {
        let text = render_jurors(&JuryConfig::example());
        assert!(text.starts_with("Jurors in Code Review Jury (voting: weighted)"));
        assert!(text.contains("Temperature"));

        let methods = render_methods();
        assert!(methods.contains("consensus"));
        assert!(methods.contains(custom_methods::MARGIN_OF_VICTORY));
    }

    #[tokio::test]
    async fn test_export_roundtrip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("verdict.json");
        let output = dir.path().join("out.txt");
        std::fs::write(
            &input,
            r#"{"winner": "a", "confidence": 0.5, "scores": {"a": 1.0, "b": 0.5}}"#,
        )
        .unwrap();
        handle_command(
            Commands::Export {
                input: input.clone(),
                output: output.clone(),
                format: ExportFormat::Text,
            },
            dir.path(),
        )
        .await
        .unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        assert!(text.contains("  a: 1\n  b: 0.5"));
    }
}
