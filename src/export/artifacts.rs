//! Fitted artifact persistence
//!
//! Each artifact is a JSON envelope carrying its kind, a format version and the
//! feature schema it was fitted with, so a loader can refuse artifacts that
//! would silently mis-map fields.

use crate::error::{PlacementError, Result};
use crate::features::FeatureSchema;
use crate::preprocessing::StandardScaler;
use crate::training::RandomForest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the scaler artifact
pub const SCALER_FILE: &str = "scaler.json";
/// File name of the classifier artifact
pub const MODEL_FILE: &str = "model.json";
/// Envelope format understood by this build
pub const FORMAT_VERSION: u32 = 1;

/// What an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Scaler,
    Classifier,
}

/// Versioned artifact envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub kind: ArtifactKind,
    pub format_version: u32,
    /// Schema the payload was fitted with
    pub schema: FeatureSchema,
    /// Crate version that wrote the file
    #[serde(default)]
    pub created_by: String,
    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn new(kind: ArtifactKind, schema: FeatureSchema, payload: T) -> Self {
        Self {
            kind,
            format_version: FORMAT_VERSION,
            schema,
            created_by: format!("placement {}", env!("CARGO_PKG_VERSION")),
            payload,
        }
    }
}

/// Where `save_artifacts` wrote its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
}

/// Write `scaler.json` and `model.json` into `dir`, creating it if needed
pub fn save_artifacts(
    dir: impl AsRef<Path>,
    schema: &FeatureSchema,
    scaler: &StandardScaler,
    forest: &RandomForest,
) -> Result<ArtifactPaths> {
    let dir = dir.as_ref();
    schema.ensure_matches(scaler.schema(), "scaler")?;
    scaler.validate()?;
    forest.validate()?;
    schema.ensure_width(forest.n_features(), "forest")?;

    fs::create_dir_all(dir)?;
    let paths = ArtifactPaths {
        scaler: dir.join(SCALER_FILE),
        model: dir.join(MODEL_FILE),
    };

    write_artifact(&paths.scaler, &Artifact::new(ArtifactKind::Scaler, schema.clone(), scaler))?;
    write_artifact(&paths.model, &Artifact::new(ArtifactKind::Classifier, schema.clone(), forest))?;

    info!(
        dir = %dir.display(),
        schema_version = schema.version,
        n_trees = forest.n_trees(),
        "Saved artifacts"
    );
    Ok(paths)
}

/// Load both artifacts from `dir` and check them against `expected`.
///
/// Unreadable, corrupt, wrongly typed or unfitted artifacts are
/// `ModelUnavailableError`; a schema that differs from `expected` in version,
/// names or order is `ShapeError`.
pub fn load_artifacts(
    dir: impl AsRef<Path>,
    expected: &FeatureSchema,
) -> Result<(StandardScaler, RandomForest)> {
    let dir = dir.as_ref();

    let scaler: Artifact<StandardScaler> = read_artifact(&dir.join(SCALER_FILE), ArtifactKind::Scaler)?;
    let model: Artifact<RandomForest> = read_artifact(&dir.join(MODEL_FILE), ArtifactKind::Classifier)?;

    expected.ensure_matches(&scaler.schema, "scaler artifact")?;
    expected.ensure_matches(&model.schema, "model artifact")?;
    expected.ensure_matches(scaler.payload.schema(), "scaler parameters")?;

    let scaler = scaler.payload;
    let forest = model.payload;
    scaler.validate()?;
    forest.validate()?;
    expected.ensure_width(forest.n_features(), "forest")?;

    info!(
        dir = %dir.display(),
        schema_version = expected.version,
        n_trees = forest.n_trees(),
        "Loaded artifacts"
    );
    Ok((scaler, forest))
}

fn write_artifact<T: Serialize>(path: &Path, artifact: &Artifact<T>) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, artifact)?;
    writer.flush()?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<Artifact<T>> {
    let unavailable = |reason: String| {
        PlacementError::ModelUnavailableError(format!("{}: {}", path.display(), reason))
    };

    let file = File::open(path).map_err(|e| unavailable(e.to_string()))?;
    let envelope: Artifact<Value> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| unavailable(format!("corrupt artifact ({})", e)))?;

    if envelope.kind != kind {
        return Err(unavailable(format!(
            "expected a {:?} artifact, found {:?}",
            kind, envelope.kind
        )));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(unavailable(format!(
            "unsupported format version {} (expected {})",
            envelope.format_version, FORMAT_VERSION
        )));
    }

    let payload: T = serde_json::from_value(envelope.payload)
        .map_err(|e| unavailable(format!("corrupt payload ({})", e)))?;

    Ok(Artifact {
        kind: envelope.kind,
        format_version: envelope.format_version,
        schema: envelope.schema,
        created_by: envelope.created_by,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FieldSpec;
    use ndarray::array;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(1, vec![FieldSpec::new("a"), FieldSpec::new("b")]).unwrap()
    }

    fn fitted() -> (StandardScaler, RandomForest) {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0], [3.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut scaler = StandardScaler::new(schema());
        let xs = scaler.fit_transform(&x).unwrap();
        let mut forest = RandomForest::new_classifier(5);
        forest.fit(&xs, &y).unwrap();
        (scaler, forest)
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, forest) = fitted();
        let paths = save_artifacts(dir.path(), &schema(), &scaler, &forest).unwrap();
        assert!(paths.scaler.exists());
        assert!(paths.model.exists());

        let (loaded_scaler, loaded_forest) = load_artifacts(dir.path(), &schema()).unwrap();
        assert_eq!(loaded_scaler.params(), scaler.params());
        assert_eq!(
            loaded_forest.predict_proba_row(&[0.3, -0.2]).unwrap(),
            forest.predict_proba_row(&[0.3, -0.2]).unwrap()
        );
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_artifacts(dir.path().join("nope"), &schema()).unwrap_err();
        assert!(matches!(err, PlacementError::ModelUnavailableError(_)));
    }

    #[test]
    fn test_corrupt_model() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, forest) = fitted();
        save_artifacts(dir.path(), &schema(), &scaler, &forest).unwrap();
        fs::write(dir.path().join(MODEL_FILE), "{\"kind\": \"classifier\"").unwrap();

        let err = load_artifacts(dir.path(), &schema()).unwrap_err();
        assert!(matches!(err, PlacementError::ModelUnavailableError(_)));
    }

    #[test]
    fn test_swapped_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, forest) = fitted();
        save_artifacts(dir.path(), &schema(), &scaler, &forest).unwrap();
        fs::copy(dir.path().join(SCALER_FILE), dir.path().join(MODEL_FILE)).unwrap();

        let err = load_artifacts(dir.path(), &schema()).unwrap_err();
        assert!(matches!(err, PlacementError::ModelUnavailableError(_)));
    }

    #[test]
    fn test_reordered_schema_is_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, forest) = fitted();
        save_artifacts(dir.path(), &schema(), &scaler, &forest).unwrap();

        let reordered =
            FeatureSchema::new(1, vec![FieldSpec::new("b"), FieldSpec::new("a")]).unwrap();
        let err = load_artifacts(dir.path(), &reordered).unwrap_err();
        assert!(matches!(err, PlacementError::ShapeError { .. }));
    }

    /// Overwrite the first leaf found in a serialized tree
    fn rewrite_first_leaf(value: &mut Value, distribution: Value, cover: f64) -> bool {
        match value {
            Value::Object(map) if map.contains_key("distribution") => {
                map.insert("distribution".to_string(), distribution);
                map.insert("cover".to_string(), Value::from(cover));
                true
            }
            Value::Object(map) => map
                .values_mut()
                .any(|v| rewrite_first_leaf(v, distribution.clone(), cover)),
            Value::Array(items) => items
                .iter_mut()
                .any(|v| rewrite_first_leaf(v, distribution.clone(), cover)),
            _ => false,
        }
    }

    #[test]
    fn test_out_of_range_leaf_is_model_unavailable() {
        let cases = [
            (serde_json::json!([-4.0, 5.0]), 1.0),
            (serde_json::json!([0.2, 0.2]), 1.0),
            (serde_json::json!([0.5, 0.5]), -1.0),
        ];
        for (distribution, cover) in cases {
            let dir = tempfile::tempdir().unwrap();
            let (scaler, forest) = fitted();
            save_artifacts(dir.path(), &schema(), &scaler, &forest).unwrap();

            let path = dir.path().join(MODEL_FILE);
            let mut json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
            assert!(rewrite_first_leaf(&mut json["payload"], distribution, cover));
            fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

            let err = load_artifacts(dir.path(), &schema()).unwrap_err();
            assert!(matches!(err, PlacementError::ModelUnavailableError(_)));
        }
    }

    #[test]
    fn test_unfitted_forest_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (scaler, _) = fitted();
        let err = save_artifacts(dir.path(), &schema(), &scaler, &RandomForest::default()).unwrap_err();
        assert!(matches!(err, PlacementError::ModelUnavailableError(_)));
    }
}
