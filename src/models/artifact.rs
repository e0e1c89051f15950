//! Model artifact persistence
//!
//! The fitted classifier, the vocabulary it was trained against and the
//! ordered class list are only meaningful together, so they travel as one
//! JSON document. The write goes through a temp file and a rename: a
//! crash mid-write leaves the previous artifact intact instead of a torn
//! classifier/vocabulary pair.

use crate::models::adaboost::AdaBoostM1;
use crate::nlp::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to write model artifact {}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode model artifact {}: {}", .path.display(), .source)]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to read model artifact {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("model artifact {} is corrupt: {}", .path.display(), .source)]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub classifier: AdaBoostM1,
    pub vocabulary: Vocabulary,
    /// Class names in id order, shared by classifier and reports
    pub classes: Vec<String>,
}

impl ModelArtifact {
    pub fn new(classifier: AdaBoostM1, vocabulary: Vocabulary, classes: Vec<String>) -> Self {
        Self {
            classifier,
            vocabulary,
            classes,
        }
    }

    pub fn class_name(&self, id: usize) -> &str {
        self.classes.get(id).map(String::as_str).unwrap_or("?")
    }

    /// Write the artifact atomically: encode into `<path with .tmp>` and
    /// rename over the destination.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let tmp = path.with_extension("tmp");

        if let Err(err) = self.encode_to(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        fs::rename(&tmp, path).map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved model artifact to {}", path.display());
        Ok(())
    }

    fn encode_to(&self, tmp: &Path) -> Result<(), ArtifactError> {
        let file = File::create(tmp).map_err(|source| ArtifactError::Write {
            path: tmp.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| ArtifactError::Encode {
            path: tmp.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(|source| ArtifactError::Write {
            path: tmp.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let file = File::open(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::Record;
    use crate::models::decision_tree::TreeParams;
    use crate::models::{BoostParams, Classifier};
    use crate::nlp::projector::{project, project_records};
    use crate::nlp::vocabulary::VocabularyBuilder;

    fn fitted_artifact() -> ModelArtifact {
        let classes = vec!["Infectious".to_string(), "Circulatory".to_string()];
        let records = vec![
            Record::labeled("fever and chills all night", "Infectious"),
            Record::labeled("high fever with sweating", "Infectious"),
            Record::labeled("chest pain down the arm", "Circulatory"),
            Record::labeled("sudden chest pain then collapse", "Circulatory"),
        ];
        let vocab = VocabularyBuilder::new().build(&records);
        let data = project_records(&records, &vocab, &classes).unwrap();

        let mut classifier = AdaBoostM1::new(BoostParams {
            iterations: 3,
            weight_threshold: 100,
            tree: TreeParams {
                max_depth: 20,
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
        });
        classifier.fit(&data).unwrap();
        ModelArtifact::new(classifier, vocab, classes)
    }

    #[test]
    fn test_save_load_round_trip_predicts_identically() {
        let artifact = fitted_artifact();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        artifact.save(&path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.classes, artifact.classes);
        assert_eq!(loaded.vocabulary.len(), artifact.vocabulary.len());

        let probe = Record::new("patient had fever and chills".to_string(), None, Vec::new());
        let before = project(&probe, &artifact.vocabulary);
        let after = project(&probe, &loaded.vocabulary);
        assert_eq!(before.values, after.values);
        assert_eq!(
            loaded.classifier.predict_one(&after.values).unwrap(),
            artifact.classifier.predict_one(&before.values).unwrap()
        );
    }

    #[test]
    fn test_save_overwrites_previous_artifact() {
        let artifact = fitted_artifact();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        artifact.save(&path).unwrap();
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.classes, artifact.classes);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::Read { .. }));
    }

    #[test]
    fn test_load_garbage_is_corrupt_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "{ not a model").unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(err, ArtifactError::Corrupt { .. }));
    }

    #[test]
    fn test_class_name_lookup() {
        let artifact = fitted_artifact();
        assert_eq!(artifact.class_name(0), "Infectious");
        assert_eq!(artifact.class_name(1), "Circulatory");
        assert_eq!(artifact.class_name(99), "?");
    }
}
