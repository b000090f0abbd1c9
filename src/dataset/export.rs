//! Dataset export to a Hub-like destination.
//!
//! The upload itself is pluggable; `DirectoryExporter` lays the dataset out
//! on disk in the shape a Hub repository would receive.

use crate::dataset::local::FeedbackDataset;
use crate::models::{FeedbackError, Field, MetadataProperty, Question, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination for `push_to_huggingface`.
#[async_trait]
pub trait HubExporter: Send + Sync {
    async fn push(
        &self,
        repo_id: &str,
        dataset: &FeedbackDataset,
        generate_card: bool,
    ) -> Result<()>;
}

/// Schema part of an exported dataset.
#[derive(Debug, Serialize)]
struct ExportedSettings<'a> {
    fields: &'a [Field],
    questions: &'a [Question],
    metadata_properties: &'a [MetadataProperty],
    guidelines: Option<&'a str>,
    allow_extra_metadata: bool,
}

/// Writes `<root>/<repo_id>/` with `records.jsonl`, `settings.json` and,
/// when asked, a `README.md` card.
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    root: PathBuf,
}

impl DirectoryExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory a given repo id is written to.
    pub fn repo_dir(&self, repo_id: &str) -> PathBuf {
        self.root.join(repo_id.replace('/', "__"))
    }
}

#[async_trait]
impl HubExporter for DirectoryExporter {
    async fn push(
        &self,
        repo_id: &str,
        dataset: &FeedbackDataset,
        generate_card: bool,
    ) -> Result<()> {
        let dir = self.repo_dir(repo_id);
        fs::create_dir_all(&dir)
            .map_err(|e| FeedbackError::io(format!("creating {}", dir.display()), e))?;

        dataset.write_jsonl(&dir.join("records.jsonl"))?;

        let settings = ExportedSettings {
            fields: dataset.fields(),
            questions: dataset.questions(),
            metadata_properties: dataset.metadata_properties(),
            guidelines: dataset.guidelines(),
            allow_extra_metadata: dataset.allow_extra_metadata(),
        };
        let json = serde_json::to_string_pretty(&settings)
            .map_err(|e| FeedbackError::Internal(format!("serializing settings: {e}")))?;
        write_file(&dir.join("settings.json"), &json)?;

        if generate_card {
            write_file(&dir.join("README.md"), &dataset_card(repo_id, dataset))?;
        }

        info!(repo_id, dir = %dir.display(), records = dataset.len(), "Exported dataset");
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| FeedbackError::io(format!("writing {}", path.display()), e))
}

fn dataset_card(repo_id: &str, dataset: &FeedbackDataset) -> String {
    let names = |items: Vec<&str>| items.join(", ");
    let mut card = format!("# Dataset Card for {repo_id}\n\n");
    card.push_str(&format!("- Records: {}\n", dataset.len()));
    card.push_str(&format!(
        "- Fields: {}\n",
        names(dataset.fields().iter().map(|f| f.name.as_str()).collect())
    ));
    card.push_str(&format!(
        "- Questions: {}\n",
        names(dataset.questions().iter().map(|q| q.name.as_str()).collect())
    ));
    if let Some(guidelines) = dataset.guidelines() {
        card.push_str(&format!("\n## Guidelines\n\n{guidelines}\n"));
    }
    card
}
