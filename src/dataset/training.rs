//! Turn annotated records into train/test examples.

use crate::models::{
    FeedbackError, FeedbackRecord, Field, Question, QuestionSettings, ResponseStatus, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What to train and which parts of a record feed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingTask {
    /// `text` names a field, `label` a label or multi-label question.
    TextClassification { text: String, label: String },
}

impl TrainingTask {
    pub fn text_classification(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self::TextClassification {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// One text classification example. `label` is a string, or a list of
/// strings for multi-label questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextClassificationExample {
    pub text: String,
    pub label: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    pub train: Vec<TextClassificationExample>,
    pub test: Vec<TextClassificationExample>,
}

/// Build examples from `records` and split them in record order.
///
/// The label comes from the unified response when there is one, otherwise
/// from the first submitted response. Records without a label are skipped.
pub fn prepare(
    records: &[FeedbackRecord],
    fields: &[Field],
    questions: &[Question],
    task: &TrainingTask,
    train_size: f64,
) -> Result<TrainingData> {
    if !(train_size > 0.0 && train_size <= 1.0) {
        return Err(FeedbackError::validation(format!(
            "train_size must be in (0, 1], got {train_size}"
        )));
    }

    let TrainingTask::TextClassification { text, label } = task;
    if !fields.iter().any(|f| &f.name == text) {
        return Err(FeedbackError::validation(format!("Unknown field `{text}`")));
    }
    let question = questions
        .iter()
        .find(|q| &q.name == label)
        .ok_or_else(|| FeedbackError::validation(format!("Unknown question `{label}`")))?;
    if !matches!(
        question.settings,
        QuestionSettings::LabelSelection { .. } | QuestionSettings::MultiLabelSelection { .. }
    ) {
        return Err(FeedbackError::validation(format!(
            "Text classification needs a label question, `{label}` is not one"
        )));
    }

    let examples: Vec<TextClassificationExample> = records
        .iter()
        .filter_map(|record| {
            let text = record.fields.get(text)?.clone();
            let label = label_for(record, label)?;
            Some(TextClassificationExample { text, label })
        })
        .collect();

    let n_train = ((examples.len() as f64) * train_size).round() as usize;
    let mut train = examples;
    let test = train.split_off(n_train.min(train.len()));

    debug!(
        train = train.len(),
        test = test.len(),
        skipped = records.len() - train.len() - test.len(),
        "Prepared training data"
    );
    Ok(TrainingData { train, test })
}

fn label_for(record: &FeedbackRecord, question: &str) -> Option<Value> {
    if let Some(unified) = record.unified_responses.get(question) {
        return Some(unified.value.clone());
    }
    record
        .responses
        .iter()
        .filter(|r| r.status == ResponseStatus::Submitted)
        .find_map(|r| r.values.get(question))
        .map(|v| v.value.clone())
}
