//! In-memory feedback dataset.
//!
//! Epistemic foundation:
//! - K_i: Every record held here passed schema validation on the way in
//! - K_i: No network access; this is what a remote dataset materializes into
//! - I^B: File output may fail → `FeedbackError::Io`

use crate::dataset::export::HubExporter;
use crate::dataset::training::{self, TrainingData, TrainingTask};
use crate::dataset::unification::{self, UnificationStrategy};
use crate::dataset::validation::{self, RecordSchema, RecordsInput};
use crate::models::{FeedbackError, FeedbackRecord, Field, MetadataProperty, Question, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// A dataset whose schema and records live in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackDataset {
    fields: Vec<Field>,
    questions: Vec<Question>,
    metadata_properties: Vec<MetadataProperty>,
    guidelines: Option<String>,
    allow_extra_metadata: bool,
    records: Vec<FeedbackRecord>,
}

impl FeedbackDataset {
    /// Empty dataset with the given schema.
    ///
    /// Needs at least one field and one question; names must be unique
    /// within fields, questions and metadata properties respectively.
    pub fn new(fields: Vec<Field>, questions: Vec<Question>) -> Result<Self> {
        if fields.is_empty() {
            return Err(FeedbackError::validation("A dataset needs at least one field"));
        }
        if questions.is_empty() {
            return Err(FeedbackError::validation("A dataset needs at least one question"));
        }
        ensure_unique("field", fields.iter().map(|f| f.name.as_str()))?;
        ensure_unique("question", questions.iter().map(|q| q.name.as_str()))?;

        Ok(Self {
            fields,
            questions,
            metadata_properties: Vec::new(),
            guidelines: None,
            allow_extra_metadata: true,
            records: Vec::new(),
        })
    }

    pub fn with_metadata_properties(mut self, properties: Vec<MetadataProperty>) -> Result<Self> {
        ensure_unique("metadata property", properties.iter().map(|p| p.name.as_str()))?;
        self.metadata_properties = properties;
        Ok(self)
    }

    pub fn with_guidelines(mut self, guidelines: Option<String>) -> Self {
        self.guidelines = guidelines.filter(|g| !g.is_empty());
        self
    }

    pub fn with_allow_extra_metadata(mut self, allow: bool) -> Self {
        self.allow_extra_metadata = allow;
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, name: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.name == name)
    }

    pub fn metadata_properties(&self) -> &[MetadataProperty] {
        &self.metadata_properties
    }

    pub fn guidelines(&self) -> Option<&str> {
        self.guidelines.as_deref()
    }

    pub fn allow_extra_metadata(&self) -> bool {
        self.allow_extra_metadata
    }

    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeedbackRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Validate and append records. Nothing is appended if any record fails.
    pub fn add_records(&mut self, records: impl Into<RecordsInput>) -> Result<()> {
        let schema = RecordSchema::new(
            &self.fields,
            &self.metadata_properties,
            self.allow_extra_metadata,
        );
        let records = validation::parse_and_validate_records(records.into(), &schema)?;

        for record in &records {
            let unknown = record
                .suggestions
                .iter()
                .map(|s| s.question_name.as_str())
                .chain(record.responses.iter().flat_map(|r| r.values.keys().map(String::as_str)))
                .find(|name| self.question(name).is_none());
            if let Some(name) = unknown {
                return Err(FeedbackError::validation(format!(
                    "Record references unknown question `{name}`"
                )));
            }
        }

        self.records.extend(records);
        Ok(())
    }

    /// Write one JSON record per line. Returns the number of lines written.
    pub fn write_jsonl(&self, path: &Path) -> Result<usize> {
        let file = File::create(path)
            .map_err(|e| FeedbackError::io(format!("creating {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);

        for record in &self.records {
            let line = serde_json::to_string(record)
                .map_err(|e| FeedbackError::Internal(format!("serializing record: {e}")))?;
            writeln!(writer, "{line}")
                .map_err(|e| FeedbackError::io(format!("writing {}", path.display()), e))?;
        }
        writer
            .flush()
            .map_err(|e| FeedbackError::io(format!("flushing {}", path.display()), e))?;

        info!(path = %path.display(), records = self.records.len(), "Wrote dataset");
        Ok(self.records.len())
    }

    /// Unify the responses to `question` on every record.
    pub fn unify_responses(&mut self, question: &str, strategy: UnificationStrategy) -> Result<()> {
        let question = self
            .question(question)
            .cloned()
            .ok_or_else(|| FeedbackError::validation(format!("Unknown question `{question}`")))?;
        unification::unify_records(&mut self.records, &question, strategy)?;
        Ok(())
    }

    /// Split the records into train/test examples for `task`.
    pub fn prepare_for_training(
        &self,
        task: &TrainingTask,
        train_size: f64,
    ) -> Result<TrainingData> {
        training::prepare(&self.records, &self.fields, &self.questions, task, train_size)
    }

    /// Hand the dataset to `exporter` for upload under `repo_id`.
    pub async fn push_to_huggingface(
        &self,
        repo_id: &str,
        exporter: &dyn HubExporter,
        generate_card: bool,
    ) -> Result<()> {
        if repo_id.trim().is_empty() {
            return Err(FeedbackError::validation("repo_id must not be empty"));
        }
        exporter.push(repo_id, self, generate_card).await
    }
}

impl<'a> IntoIterator for &'a FeedbackDataset {
    type Item = &'a FeedbackRecord;
    type IntoIter = std::slice::Iter<'a, FeedbackRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn ensure_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(FeedbackError::validation(format!("Duplicate {kind} name `{name}`")));
        }
    }
    Ok(())
}
