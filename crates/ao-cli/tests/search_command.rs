#![cfg(unix)]

use ao_cli::{run, SearchArgs};
use ao_optimizer::{JsonFileStorage, SamplerKind, TrialState};
use ao_types::{AoError, ParameterValue, StudyError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BASE_CONFIG: &str = r#"
local hidden = std.parseInt(std.extVar('hidden_size'));
{
  dataset_reader: { type: 'text_classification_json' },
  model: {
    type: 'basic_classifier',
    encoder: { type: std.extVar('encoder'), hidden_size: hidden },
    dropout: std.parseJson(std.extVar('dropout')),
  },
  trainer: { num_epochs: 1, validation_metric: '-loss' },
}
"#;

const SEARCH_SPACE: &str = r#"{
  "encoder": "lstm",
  "hidden_size": {"sampling strategy": "integer", "bounds": [16, 64]},
  "dropout": {"sampling strategy": "uniform", "bounds": [0.0, 0.5]}
}"#;

// `allennlp train <config> --serialization-dir <dir>`: reports the dropout
// as the validation loss.
const FAKE_TRAINER: &str = r#"
out="$4"
mkdir -p "$out"
printf '{"best_validation_loss": %s, "best_epoch": 0}' "$dropout" > "$out/metrics.json"
"#;

fn fixture() -> (TempDir, SearchArgs) {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, text: &str| -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    };
    let base_config = write("classifier.jsonnet", BASE_CONFIG);
    let search_space = write("space.json", SEARCH_SPACE);
    let script = write("train.sh", FAKE_TRAINER);

    let args = SearchArgs {
        base_config,
        search_space,
        experiment_name: None,
        study_name: None,
        storage: None,
        num_samples: Some(4),
        n_trials: None,
        timeout: None,
        sampler: SamplerKind::Random,
        seed: Some(9),
        exploration_weight: 0.3,
        catch_failures: false,
        allennlp_bin: Some(PathBuf::from("sh")),
        allennlp_args: vec![script.display().to_string()],
        include_package: Vec::new(),
    };
    (dir, args)
}

fn float(params: &ao_optimizer::Params, name: &str) -> f64 {
    match params.get(name) {
        Some(ParameterValue::Float(v)) => *v,
        other => panic!("unexpected {name}: {other:?}"),
    }
}

#[test]
fn search_reports_best_trial() {
    let (_dir, args) = fixture();
    let outcome = run(&args).unwrap();

    assert_eq!(outcome.trials, 4);
    assert!(outcome.study_name.starts_with("no-name-"));
    assert!((outcome.best_value - float(&outcome.best_params, "dropout")).abs() < 1e-12);
    assert_eq!(
        outcome.best_params.get("encoder"),
        Some(&ParameterValue::Json("lstm".into()))
    );

    let report = outcome.report().unwrap();
    assert!(report.starts_with(&format!("Best score: {}\n{{\n  \"", outcome.best_value)));
    assert!(report.contains("\"hidden_size\": "));
}

#[test]
fn named_study_persists_and_resumes() {
    let (dir, mut args) = fixture();
    let storage = dir.path().join("studies.json");
    args.storage = Some(format!("file:{}", storage.display()));
    args.experiment_name = Some("sst-lstm".into());
    args.num_samples = Some(2);

    run(&args).unwrap();
    let resumed = run(&args).unwrap();
    assert_eq!(resumed.study_name, "sst-lstm");
    assert_eq!(resumed.trials, 4);

    let record = JsonFileStorage::open(storage.to_str().unwrap())
        .unwrap()
        .load("sst-lstm")
        .unwrap()
        .unwrap();
    assert_eq!(record.trials.len(), 4);
    assert!(record.trials.iter().all(|t| t.state == TrialState::Complete));
    let numbers: Vec<_> = record.trials.iter().map(|t| t.number).collect();
    assert_eq!(numbers, [0, 1, 2, 3]);
}

#[test]
fn failing_trainer_aborts_search() {
    let (dir, mut args) = fixture();
    let script = dir.path().join("fail.sh");
    std::fs::write(&script, "exit 7\n").unwrap();
    args.allennlp_args = vec![script.display().to_string()];

    let err = run(&args).unwrap_err();
    assert!(matches!(err, AoError::Training(_)), "{err}");
    assert!(!err.is_config_error());
}

#[test]
fn unknown_strategy_fails_before_training() {
    let (dir, mut args) = fixture();
    args.search_space = dir.path().join("bad.json");
    std::fs::write(
        &args.search_space,
        r#"{"dropout": {"sampling strategy": "beta", "bounds": [0, 1]}}"#,
    )
    .unwrap();
    args.allennlp_bin = Some(Path::new("/nonexistent/allennlp").to_path_buf());

    let err = run(&args).unwrap_err();
    assert!(err.is_config_error());
    assert!(err.to_string().contains("beta"));
}

#[test]
fn nan_metric_fails_trials_without_aborting() {
    let (dir, mut args) = fixture();
    let script = dir.path().join("nan.sh");
    std::fs::write(
        &script,
        "mkdir -p \"$4\"\nprintf '{\"best_validation_loss\": NaN}' > \"$4/metrics.json\"\n",
    )
    .unwrap();
    args.allennlp_args = vec![script.display().to_string()];
    let storage = dir.path().join("studies.json");
    args.storage = Some(storage.display().to_string());
    args.study_name = Some("diverging".into());
    args.num_samples = Some(3);

    let err = run(&args).unwrap_err();
    assert!(
        matches!(err, AoError::Study(StudyError::NoCompletedTrials)),
        "{err}"
    );

    let record = JsonFileStorage::open(storage.to_str().unwrap())
        .unwrap()
        .load("diverging")
        .unwrap()
        .unwrap();
    assert_eq!(record.trials.len(), 3);
    assert!(record.trials.iter().all(|t| t.state == TrialState::Failed));
}
