use std::fs;
use std::path::Path;

use assert_cmd::Command;
use hound::{SampleFormat, WavSpec, WavWriter};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use voxgender::features::{BASELINE_FEATURES, CALIBRATED_FEATURES};

fn voxgender() -> Command {
    Command::cargo_bin("voxgender").expect("binary builds")
}

fn write_tone(path: &Path, frequency: f32, seconds: f32) {
    let sample_rate = 22_050;
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).expect("create wav");
    let total = (sample_rate as f32 * seconds) as usize;
    for i in 0..total {
        let t = i as f32 / sample_rate as f32;
        let value = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.5;
        writer
            .write_sample((value * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

fn write_models(dir: &Path) {
    let n = BASELINE_FEATURES.len();
    let first_column: Vec<f64> = (0..n).map(|i| if i == 0 { 1.0 } else { 0.0 }).collect();
    let artifacts = [
        ("scaler.json", json!({ "mean": vec![0.0; n], "scale": vec![100.0; n] })),
        ("pca.json", json!({ "mean": vec![0.0; n], "components": [first_column] })),
        (
            "final_model.json",
            json!({ "kind": "logistic_regression", "coef": [[1.0]], "intercept": [-1.0] }),
        ),
        ("label_encoder.json", json!({ "classes": ["female", "male"] })),
    ];
    for (name, value) in artifacts {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn schema_prints_twenty_names() {
    let output = voxgender().arg("schema").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let names: Vec<&str> = stdout.lines().collect();
    assert_eq!(names, BASELINE_FEATURES);

    voxgender()
        .args(["schema", "--variant", "calibrated"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sp.ent").and(predicate::str::contains("mode")));
}

#[test]
fn extract_prints_features_in_schema_order() {
    let dir = TempDir::new().unwrap();
    let wav = dir.path().join("tone.wav");
    write_tone(&wav, 180.0, 1.0);

    let output = voxgender()
        .args(["extract", "--variant", "calibrated"])
        .arg(&wav)
        .output()
        .unwrap();
    assert!(output.status.success());
    let features = stdout_json(&output);
    let object = features.as_object().expect("JSON object");
    let keys: Vec<&str> = object.keys().map(String::as_str).collect();
    assert_eq!(keys, CALIBRATED_FEATURES);
    assert!(object.values().all(|v| v.as_f64().is_some_and(f64::is_finite)));
}

#[test]
fn extract_of_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    voxgender()
        .arg("extract")
        .arg(dir.path().join("absent.wav"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.wav"));
}

#[test]
fn predict_reports_prediction_json() {
    let dir = TempDir::new().unwrap();
    let wav = dir.path().join("tone.wav");
    write_tone(&wav, 150.0, 2.0);
    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    write_models(&models);

    let output = voxgender()
        .arg("predict")
        .arg(&wav)
        .arg("--models")
        .arg(&models)
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);
    let result = stdout_json(&output);
    assert_eq!(result["success"], json!(true));
    let label = result["prediction"].as_str().unwrap();
    assert!(label == "female" || label == "male");
    let confidence = result["confidence"].as_f64().unwrap();
    assert!((0.5..=1.0).contains(&confidence));
    assert_eq!(
        result["extracted_features"].as_object().unwrap().len(),
        BASELINE_FEATURES.len()
    );
    assert_eq!(result["pca_features"].as_array().unwrap().len(), 1);
}

#[test]
fn predict_with_missing_models_dir_fails_as_json() {
    let dir = TempDir::new().unwrap();
    let wav = dir.path().join("tone.wav");
    write_tone(&wav, 150.0, 0.5);

    let output = voxgender()
        .arg("predict")
        .arg(&wav)
        .arg("--models")
        .arg(dir.path().join("no-models-here"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["success"], json!(false));
    assert!(result["error"].as_str().unwrap().contains("models"));
}

#[test]
fn classify_scores_a_raw_vector() {
    let dir = TempDir::new().unwrap();
    write_models(dir.path());
    let mut vector = vec![0.0; BASELINE_FEATURES.len()];
    vector[0] = 300.0;

    let output = voxgender()
        .args(["classify", "--features"])
        .arg(serde_json::to_string(&vector).unwrap())
        .arg("--models")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["prediction"], json!("male"));
    assert_eq!(result["scaled_features"][0], json!(3.0));
    assert!(result.get("extracted_features").is_none());

    let short = voxgender()
        .args(["classify", "--features", "[1.0, 2.0]", "--models"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!short.status.success());
    assert_eq!(stdout_json(&short)["success"], json!(false));
}
