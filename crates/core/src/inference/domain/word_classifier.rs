use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::inference::domain::probability_vector::ProbabilityVector;

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse vocabulary {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Vocabulary is empty")]
    Empty,
}

#[derive(Error, Debug, PartialEq)]
pub enum ClassifyError {
    #[error("Class index {0} is not in the vocabulary")]
    UnknownClassIndex(usize),
    #[error("Model returned no class scores")]
    EmptyProbabilities,
}

/// Class index (decimal string) to gloss. Loaded once, then read-only.
#[derive(Clone, Debug, PartialEq)]
pub struct VocabularyTable {
    entries: HashMap<String, String>,
}

impl VocabularyTable {
    pub fn new(entries: HashMap<String, String>) -> Result<Self, VocabularyError> {
        if entries.is_empty() {
            return Err(VocabularyError::Empty);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let json = fs::read_to_string(path).map_err(|source| VocabularyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = serde_json::from_str(&json).map_err(|source| VocabularyError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::new(entries)?;
        log::info!("Loaded {} vocabulary entries from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(&index.to_string()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Arg-max lookup of the probability vector in the vocabulary.
pub fn classify(
    probabilities: &ProbabilityVector,
    table: &VocabularyTable,
) -> Result<String, ClassifyError> {
    let index = probabilities
        .argmax()
        .ok_or(ClassifyError::EmptyProbabilities)?;
    table
        .get(index)
        .map(str::to_string)
        .ok_or(ClassifyError::UnknownClassIndex(index))
}
