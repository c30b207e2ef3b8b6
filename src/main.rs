use anyhow::{Context, Result};
use clap::Parser;
use ndarray::Array1;
use serde_json::{json, Map, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxgender::cli::{ClassifyArgs, Cli, Command, ExtractArgs, PredictArgs, SchemaArgs};
use voxgender::config::AppConfig;
use voxgender::features::{FeatureMap, FeatureSchema};
use voxgender::inference::{ModelContext, Prediction};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Extract(args) => handle_extract(&args),
        Command::Schema(args) => handle_schema(&args),
        Command::Predict(args) => report_json_failure(handle_predict(&args)),
        Command::Classify(args) => report_json_failure(handle_classify(&args)),
    };

    if let Err(err) = outcome {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

/// Turns a failure into a `{success: false, error}` line on stdout.
fn report_json_failure(result: Result<()>) -> Result<()> {
    result.map_err(|err| {
        println!("{}", json!({ "success": false, "error": format!("{err:#}") }));
        err
    })
}

fn handle_extract(args: &ExtractArgs) -> Result<()> {
    let params = args.extraction.params()?;
    let extractor = args.extraction.variant.extractor(params);
    let features = extractor
        .extract_file(&args.input)
        .with_context(|| format!("Failed to extract features from {:?}", args.input))?;
    let object = ordered_features(&features, &extractor.schema());
    println!("{}", serde_json::to_string_pretty(&Value::Object(object))?);
    Ok(())
}

fn handle_schema(args: &SchemaArgs) -> Result<()> {
    for name in args.variant.schema().names() {
        println!("{name}");
    }
    Ok(())
}

fn handle_predict(args: &PredictArgs) -> Result<()> {
    let params = args.extraction.params()?;
    let variant = args.extraction.variant;
    let models = load_models(args.models.clone(), variant.schema())?;

    let extractor = variant.extractor(params);
    let features = extractor
        .extract_file(&args.input)
        .with_context(|| format!("Failed to extract features from {:?}", args.input))?;
    let prediction = models
        .predict_features(&features, args.policy())
        .context("Failed to classify extracted features")?;
    info!(label = %prediction.label, variant = %variant, "prediction complete");

    let extracted = ordered_features(&features, models.schema());
    println!("{}", prediction_json(prediction, Some(extracted)));
    Ok(())
}

fn handle_classify(args: &ClassifyArgs) -> Result<()> {
    let vector = Array1::from_vec(args.vector()?);
    let models = load_models(args.models.clone(), args.variant.schema())?;
    let prediction = models
        .predict_vector(&vector)
        .context("Failed to classify feature vector")?;
    println!("{}", prediction_json(prediction, None));
    Ok(())
}

fn load_models(
    override_dir: Option<std::path::PathBuf>,
    schema: FeatureSchema,
) -> Result<ModelContext> {
    let config = AppConfig::from_override(override_dir)?;
    let models = ModelContext::load(&config.models_dir, schema)
        .context("Failed to load model artifacts")?;
    info!(
        classifier = ?models.classifier().kind(),
        probabilities = models.classifier().supports_probabilities(),
        labels = models.labels().classes().len(),
        "classifier ready"
    );
    Ok(models)
}

fn ordered_features(features: &FeatureMap, schema: &FeatureSchema) -> Map<String, Value> {
    let mut object = Map::new();
    for (name, value) in schema.ordered_values(features) {
        object.insert(name.to_string(), json!(value));
    }
    // Entries outside the schema still get reported, after the ordered ones.
    for (name, value) in features.iter() {
        if !object.contains_key(name) {
            object.insert(name.to_string(), json!(value));
        }
    }
    object
}

fn prediction_json(prediction: Prediction, extracted: Option<Map<String, Value>>) -> Value {
    let mut object = Map::new();
    object.insert("success".into(), json!(true));
    object.insert("prediction".into(), json!(prediction.label));
    object.insert("confidence".into(), json!(prediction.confidence));
    object.insert("probabilities".into(), json!(prediction.probabilities));
    if let Some(extracted) = extracted {
        object.insert("extracted_features".into(), Value::Object(extracted));
    }
    object.insert("scaled_features".into(), json!(prediction.scaled_features));
    object.insert("pca_features".into(), json!(prediction.pca_features));
    Value::Object(object)
}
