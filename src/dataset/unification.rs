//! Collapse several annotators' responses to one question into one value.
//!
//! K_i: Only `submitted` responses count; drafts and discards are ignored
//! K_i: Ties resolve to the value seen first, so results are deterministic
//! B_i: A record may have no submitted answer → it gets no unified value

use crate::models::{
    FeedbackError, FeedbackRecord, Question, QuestionSettings, ResponseStatus, Result, UnifiedValue,
};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Strategies for label and multi-label questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStrategy {
    /// Most voted label; for multi-label, every label picked by at least
    /// half of the annotators
    Majority,
    /// Keep the answer only when every annotator gave the same one
    Disagreement,
}

/// Strategies for rating questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingStrategy {
    Mean,
    Majority,
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnificationStrategy {
    Label(LabelStrategy),
    Rating(RatingStrategy),
}

impl UnificationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label(LabelStrategy::Majority) | Self::Rating(RatingStrategy::Majority) => {
                "majority"
            }
            Self::Label(LabelStrategy::Disagreement) => "disagreement",
            Self::Rating(RatingStrategy::Mean) => "mean",
            Self::Rating(RatingStrategy::Max) => "max",
            Self::Rating(RatingStrategy::Min) => "min",
        }
    }

    /// Resolve a strategy name for a given question kind.
    pub fn for_question(question: &Question, name: &str) -> Result<Self> {
        match question.settings {
            QuestionSettings::LabelSelection { .. }
            | QuestionSettings::MultiLabelSelection { .. } => Ok(Self::Label(name.parse()?)),
            QuestionSettings::Rating { .. } => Ok(Self::Rating(name.parse()?)),
            _ => Err(unsupported(question)),
        }
    }
}

impl std::fmt::Display for UnificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelStrategy {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "majority" => Ok(Self::Majority),
            "disagreement" => Ok(Self::Disagreement),
            other => Err(FeedbackError::validation(format!(
                "Unknown label strategy `{other}`, expected majority or disagreement"
            ))),
        }
    }
}

impl FromStr for RatingStrategy {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "majority" => Ok(Self::Majority),
            "max" => Ok(Self::Max),
            "min" => Ok(Self::Min),
            other => Err(FeedbackError::validation(format!(
                "Unknown rating strategy `{other}`, expected mean, majority, max or min"
            ))),
        }
    }
}

fn unsupported(question: &Question) -> FeedbackError {
    FeedbackError::validation(format!(
        "Question `{}` does not support response unification",
        question.name
    ))
}

/// Fill `unified_responses[question.name]` on every record.
///
/// Returns how many records received a unified value.
pub fn unify_records(
    records: &mut [FeedbackRecord],
    question: &Question,
    strategy: UnificationStrategy,
) -> Result<usize> {
    type Unify = fn(&[&Value], UnificationStrategy) -> Option<Value>;
    let unify: Unify = match (&question.settings, strategy) {
        (QuestionSettings::LabelSelection { .. }, UnificationStrategy::Label(_)) => unify_label,
        (QuestionSettings::MultiLabelSelection { .. }, UnificationStrategy::Label(_)) => {
            unify_multi_label
        }
        (QuestionSettings::Rating { .. }, UnificationStrategy::Rating(_)) => unify_rating,
        (QuestionSettings::Text { .. } | QuestionSettings::Ranking { .. }, _) => {
            return Err(unsupported(question));
        }
        _ => {
            return Err(FeedbackError::validation(format!(
                "Strategy `{strategy}` cannot be applied to question `{}`",
                question.name
            )));
        }
    };

    let mut unified = 0;
    for record in records.iter_mut() {
        let answers: Vec<&Value> = record
            .responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Submitted)
            .filter_map(|r| r.values.get(&question.name))
            .map(|v| &v.value)
            .collect();

        match (!answers.is_empty()).then(|| unify(&answers, strategy)).flatten() {
            Some(value) => {
                record.unified_responses.insert(
                    question.name.clone(),
                    UnifiedValue {
                        value,
                        strategy: strategy.as_str().to_string(),
                    },
                );
                unified += 1;
            }
            None => {
                record.unified_responses.remove(&question.name);
            }
        }
    }

    debug!(
        question = %question.name,
        %strategy,
        unified,
        total = records.len(),
        "Unified responses"
    );
    Ok(unified)
}

/// Votes per distinct value, in first-seen order.
fn tally<'a>(values: impl IntoIterator<Item = &'a Value>) -> Vec<(&'a Value, usize)> {
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }
    counts
}

fn most_voted<'a>(counts: &[(&'a Value, usize)]) -> Option<&'a Value> {
    let mut best: Option<(&Value, usize)> = None;
    for &(value, n) in counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((value, n));
        }
    }
    best.map(|(value, _)| value)
}

fn all_equal(answers: &[&Value]) -> Option<Value> {
    let first = answers.first()?;
    answers.iter().all(|a| a == first).then(|| (*first).clone())
}

fn unify_label(answers: &[&Value], strategy: UnificationStrategy) -> Option<Value> {
    match strategy {
        UnificationStrategy::Label(LabelStrategy::Majority) => {
            most_voted(&tally(answers.iter().copied())).cloned()
        }
        _ => all_equal(answers),
    }
}

fn unify_multi_label(answers: &[&Value], strategy: UnificationStrategy) -> Option<Value> {
    match strategy {
        UnificationStrategy::Label(LabelStrategy::Majority) => {
            let labels = answers
                .iter()
                .filter_map(|a| a.as_array())
                .flat_map(|labels| labels.iter());
            let kept: Vec<Value> = tally(labels)
                .into_iter()
                .filter(|(_, n)| n * 2 >= answers.len())
                .map(|(label, _)| label.clone())
                .collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        _ => {
            // Order of the picked labels is not part of the answer.
            let normalized = |answer: &Value| -> Vec<String> {
                let mut labels: Vec<String> = answer
                    .as_array()
                    .map(|l| l.iter().map(Value::to_string).collect())
                    .unwrap_or_default();
                labels.sort();
                labels
            };
            let first = normalized(*answers.first()?);
            answers
                .iter()
                .all(|a| normalized(*a) == first)
                .then(|| (*answers[0]).clone())
        }
    }
}

fn unify_rating(answers: &[&Value], strategy: UnificationStrategy) -> Option<Value> {
    let ratings: Vec<i64> = answers.iter().filter_map(|a| a.as_i64()).collect();
    if ratings.is_empty() {
        return None;
    }
    let value = match strategy {
        UnificationStrategy::Rating(RatingStrategy::Mean) => {
            let sum: i64 = ratings.iter().sum();
            (sum as f64 / ratings.len() as f64).round() as i64
        }
        UnificationStrategy::Rating(RatingStrategy::Max) => *ratings.iter().max()?,
        UnificationStrategy::Rating(RatingStrategy::Min) => *ratings.iter().min()?,
        _ => {
            let values: Vec<Value> = ratings.iter().map(|r| Value::from(*r)).collect();
            return most_voted(&tally(values.iter())).cloned();
        }
    };
    Some(Value::from(value))
}
