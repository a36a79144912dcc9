//! Model export and serialization module
//!
//! Saves and loads the two fitted artifacts (scaler and forest) as versioned
//! JSON envelopes that embed the feature schema.

mod artifacts;

pub use artifacts::{
    load_artifacts, save_artifacts, Artifact, ArtifactKind, ArtifactPaths, FORMAT_VERSION,
    MODEL_FILE, SCALER_FILE,
};
