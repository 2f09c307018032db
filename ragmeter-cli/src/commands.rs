//! CLI subcommand handlers.

use crate::BackendKind;
use crate::Commands;
use crate::ConfigAction;
use crate::EvaluateArgs;
use crate::output::{self, EvaluationReport};
use anyhow::Context;
use ragmeter_core::config::workspace_config_path;
use ragmeter_core::{
    ConfigOverrides, EvalConfig, EvaluationBackend, JudgeEvaluator, JudgeMetric, Metric,
    MetricKind, RagEvaluator,
};
use ragmeter_ingest::{EvaluationDataset, load_dataset};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Evaluate(args) => handle_evaluate(args, workspace).await,
        Commands::Score {
            query,
            context,
            answer,
            ground_truth,
            backend,
        } => {
            let config = load(workspace, None)?;
            let backend = select_backend(backend, &config)?;
            let result = backend
                .evaluate(&query, &context, &answer, ground_truth.as_deref())
                .await?;
            print!("{}", output::render_result("Scores", &result, true));
            Ok(())
        }
        Commands::Metrics => {
            println!("Term-overlap metrics (--backend heuristic):");
            for kind in MetricKind::ALL {
                let metric = kind.build();
                println!(
                    "  {}{}",
                    metric.name(),
                    ground_truth_note(metric.requires_ground_truth())
                );
            }
            println!("\nJudge metrics (--backend judge):");
            for metric in JudgeMetric::ALL {
                println!(
                    "  {}{}",
                    metric.as_str(),
                    ground_truth_note(metric.requires_ground_truth())
                );
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn ground_truth_note(required: bool) -> &'static str {
    if required {
        " (requires ground truth)"
    } else {
        ""
    }
}

fn load(workspace: &Path, overrides: Option<&ConfigOverrides>) -> anyhow::Result<EvalConfig> {
    ragmeter_core::load_config(Some(workspace), overrides)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

/// Command-line flags as the top configuration layer.
fn overrides(args: &EvaluateArgs) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::default();
    match args.backend {
        BackendKind::Heuristic => overrides.metrics = args.metrics.clone(),
        BackendKind::Judge => overrides.judge.metrics = args.metrics.clone(),
    }
    if args.lenient_metrics {
        overrides.strict_metrics = Some(false);
    }
    if args.parallel {
        overrides.parallel = Some(true);
    }
    overrides
}

fn select_backend(
    kind: BackendKind,
    config: &EvalConfig,
) -> anyhow::Result<Box<dyn EvaluationBackend>> {
    match kind {
        BackendKind::Heuristic => Ok(Box::new(RagEvaluator::from_config(config)?)),
        BackendKind::Judge => {
            let judge = JudgeEvaluator::probe(&config.judge)?.context(
                "The LLM judge is disabled. Set `judge.enabled = true` in \
                 .ragmeter/config.toml or RAGMETER_JUDGE__ENABLED=true",
            )?;
            Ok(Box::new(judge))
        }
    }
}

async fn handle_evaluate(args: EvaluateArgs, workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace, Some(&overrides(&args)))?;

    let dataset = load_dataset(&args.file, args.format)
        .with_context(|| format!("Failed to load dataset from {}", args.file.display()))?;
    if dataset.is_empty() {
        println!("No examples found in {}", args.file.display());
        return Ok(());
    }

    let report = run_batch(args.backend, &config, &dataset).await?;
    for (i, result) in report.results.iter().enumerate() {
        let label = format!("Example {}: {}", i + 1, dataset.queries[i]);
        println!("{}", output::render_result(&label, result, args.details));
    }
    print!(
        "{}",
        output::render_averages(&report.average_scores, report.num_examples)
    );

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        println!("\nResults written to {}", path.display());
    }
    Ok(())
}

/// Score the whole dataset; the heuristic backend uses rayon when
/// `parallel` is set.
async fn run_batch(
    kind: BackendKind,
    config: &EvalConfig,
    dataset: &EvaluationDataset,
) -> anyhow::Result<EvaluationReport> {
    let start = Instant::now();
    let (report, backend) = if kind == BackendKind::Heuristic && config.parallel {
        let evaluator = RagEvaluator::from_config(config)?;
        let results = evaluator.evaluate_batch_parallel(
            dataset.queries.as_slice(),
            dataset.contexts.as_slice(),
            dataset.answers.as_slice(),
            Some(dataset.ground_truths.as_slice()),
        )?;
        let averages = evaluator.get_average_scores(&results);
        let report = EvaluationReport::new(results, averages, &evaluator.metric_names());
        (report, "heuristic")
    } else {
        let backend = select_backend(kind, config)?;
        let results = backend
            .evaluate_batch(
                &dataset.queries,
                &dataset.contexts,
                &dataset.answers,
                Some(dataset.ground_truths.as_slice()),
            )
            .await?;
        let averages = backend.get_average_scores(&results);
        let report = EvaluationReport::new(results, averages, &backend.metric_names());
        (report, backend.name())
    };
    info!(
        backend,
        examples = report.num_examples,
        parallel = config.parallel,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Evaluation finished"
    );
    Ok(report)
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml_str = toml::to_string_pretty(&EvalConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, None)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(backend: BackendKind) -> EvaluateArgs {
        EvaluateArgs {
            file: PathBuf::from("data.csv"),
            format: ragmeter_ingest::DataKind::Auto,
            metrics: Some(vec!["faithfulness".into(), "bogus".into()]),
            lenient_metrics: false,
            backend,
            parallel: false,
            output: None,
            details: false,
        }
    }

    #[test]
    fn test_overrides_target_selected_backend() {
        let heuristic = overrides(&args(BackendKind::Heuristic));
        assert_eq!(heuristic.metrics.as_ref().map(Vec::len), Some(2));
        assert!(heuristic.judge.metrics.is_none());
        assert_eq!(heuristic.strict_metrics, None);
        assert_eq!(heuristic.parallel, None);

        let mut judge_args = args(BackendKind::Judge);
        judge_args.lenient_metrics = true;
        judge_args.parallel = true;
        let judge = overrides(&judge_args);
        assert!(judge.metrics.is_none());
        assert!(judge.judge.metrics.is_some());
        assert_eq!(judge.strict_metrics, Some(false));
        assert_eq!(judge.parallel, Some(true));
    }

    #[test]
    fn test_flags_layer_over_workspace_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".ragmeter")).unwrap();
        std::fs::write(
            workspace_config_path(dir.path()),
            "metrics = [\"relevance\"]\nstrict_metrics = false\n",
        )
        .unwrap();

        let mut evaluate = args(BackendKind::Heuristic);
        evaluate.metrics = None;
        evaluate.parallel = true;
        let config = load(dir.path(), Some(&overrides(&evaluate))).unwrap();
        assert!(config.parallel);
        assert_eq!(config.metrics, Some(vec!["relevance".to_string()]));
        assert!(!config.strict_metrics);
    }

    #[test]
    fn test_select_backend() {
        let mut config = EvalConfig::default();
        let backend = select_backend(BackendKind::Heuristic, &config).unwrap();
        assert_eq!(backend.name(), "heuristic");

        // Strict mode rejects the unknown name; lenient mode drops it.
        config.metrics = Some(vec!["faithfulness".into(), "bogus".into()]);
        assert!(select_backend(BackendKind::Heuristic, &config).is_err());
        config.strict_metrics = false;
        let backend = select_backend(BackendKind::Heuristic, &config).unwrap();
        assert_eq!(backend.metric_names(), vec!["faithfulness"]);

        let err = select_backend(BackendKind::Judge, &EvalConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("judge is disabled"));
    }

    #[tokio::test]
    async fn test_parallel_batch_matches_sequential() {
        let dataset: EvaluationDataset = vec![
            ragmeter_ingest::EvaluationRecord::new(
                "What is rust?",
                "Rust is a systems language.",
                "Rust is a language.",
                "Rust is a systems language.",
            ),
            ragmeter_ingest::EvaluationRecord::new("Why?", "Because.", "No idea.", ""),
        ]
        .into_iter()
        .collect();

        let mut config = EvalConfig::default();
        let sequential = run_batch(BackendKind::Heuristic, &config, &dataset)
            .await
            .unwrap();
        config.parallel = true;
        let parallel = run_batch(BackendKind::Heuristic, &config, &dataset)
            .await
            .unwrap();
        assert_eq!(parallel.results, sequential.results);
        assert_eq!(parallel.average_scores, sequential.average_scores);
        assert_eq!(parallel.metrics, sequential.metrics);
    }

    #[tokio::test]
    async fn test_evaluate_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(
            &data,
            r#"[{"query": "What is rust?", "context": "Rust is a language.",
                 "answer": "Rust is a language.", "ground_truth": "Rust is a language."}]"#,
        )
        .unwrap();
        let output = dir.path().join("out.json");

        let mut evaluate = args(BackendKind::Heuristic);
        evaluate.file = data;
        evaluate.metrics = None;
        evaluate.output = Some(output.clone());
        handle_evaluate(evaluate, dir.path()).await.unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["num_examples"], 1);
        assert_eq!(report["average_scores"]["faithfulness"], 1.0);
        assert_eq!(report["results"][0]["context_precision"]["score"], 1.0);
    }

    #[test]
    fn test_config_init_creates_file_once() {
        let dir = tempfile::tempdir().unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        let path = workspace_config_path(dir.path());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("strict_metrics = true"));

        std::fs::write(&path, "parallel = true\n").unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "parallel = true\n");
    }
}
