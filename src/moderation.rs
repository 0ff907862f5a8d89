use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::classifier::{ClassifierError, ToxicityModel};

pub const MODEL_FILE: &str = "toxicity_model.json";
pub const MODERATION_LOG: &str = "moderation_log.csv";
pub const TO_LABEL_LOG: &str = "to_label.csv";

/// Lowercases, maps leet digits and symbols to letters, turns anything that is
/// not a digit, Latin or Cyrillic letter into a space and collapses spaces.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '7' => 't',
            '@' => 'a',
            '$' => 's',
            c if c.is_ascii_digit() || c.is_ascii_lowercase() => c,
            'а'..='я' | 'ё' => c,
            c if c.is_whitespace() => c,
            _ => ' ',
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub block: f64,
    pub flag: f64,
    pub to_label: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            block: 0.8,
            flag: 0.5,
            to_label: 0.45,
        }
    }
}

impl Thresholds {
    pub fn is_ordered(&self) -> bool {
        (0.0..=1.0).contains(&self.block)
            && (0.0..=1.0).contains(&self.to_label)
            && self.to_label <= self.flag
            && self.flag <= self.block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Block,
    Flag,
    Allow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub action: Action,
    pub reason: &'static str,
    pub probability: Option<f64>,
}

#[derive(Serialize)]
struct LogRow<'a> {
    timestamp: String,
    text: &'a str,
    model_prob: Option<f64>,
    action: Action,
    reason: &'static str,
    meta: &'a str,
}

#[derive(Serialize)]
struct LabelRow<'a> {
    timestamp: String,
    text: &'a str,
    model_prob: Option<f64>,
    label: &'static str,
    meta: &'a str,
}

pub struct Moderator {
    model: Option<ToxicityModel>,
    thresholds: Thresholds,
    log_dir: Option<PathBuf>,
}

impl Moderator {
    pub fn new(model: Option<ToxicityModel>, thresholds: Thresholds) -> Self {
        Self {
            model,
            thresholds,
            log_dir: None,
        }
    }

    /// Loads the trained model from `dir` if one exists and logs decisions there.
    pub fn from_dir(dir: &Path, thresholds: Thresholds) -> Result<Self, ClassifierError> {
        let model = ToxicityModel::load(&dir.join(MODEL_FILE))?;
        if model.is_none() {
            tracing::debug!(dir = %dir.display(), "no moderation model, comments will be flagged");
        }
        Ok(Self {
            model,
            thresholds,
            log_dir: Some(dir.to_path_buf()),
        })
    }

    pub fn decide(&self, text: &str) -> Decision {
        let Some(model) = &self.model else {
            return Decision {
                action: Action::Flag,
                reason: "no_model",
                probability: None,
            };
        };
        let p = model.probability(text);
        let (action, reason) = if p >= self.thresholds.block {
            (Action::Block, "model:high_confidence")
        } else if p >= self.thresholds.flag {
            (Action::Flag, "model:medium_confidence")
        } else {
            (Action::Allow, "model:low_confidence")
        };
        Decision {
            action,
            reason,
            probability: Some(p),
        }
    }

    /// Decides and appends the decision to the audit logs. Borderline scores
    /// also go to the to-label queue. Rows carry the teacher id but never the
    /// author, since comments are anonymous.
    pub fn moderate(&self, text: &str, teacher_id: &str) -> Result<Decision, ClassifierError> {
        let decision = self.decide(text);
        tracing::info!(action = ?decision.action, reason = decision.reason, teacher_id, "comment moderated");

        if let Some(dir) = &self.log_dir {
            let timestamp = Utc::now().to_rfc3339();
            let meta = serde_json::json!({ "teacher_id": teacher_id }).to_string();
            append_row(
                &dir.join(MODERATION_LOG),
                &LogRow {
                    timestamp: timestamp.clone(),
                    text,
                    model_prob: decision.probability,
                    action: decision.action,
                    reason: decision.reason,
                    meta: &meta,
                },
            )?;
            if let Some(p) = decision.probability {
                if p >= self.thresholds.to_label && p < self.thresholds.block {
                    append_row(
                        &dir.join(TO_LABEL_LOG),
                        &LabelRow {
                            timestamp,
                            text,
                            model_prob: Some(p),
                            label: "",
                            meta: &meta,
                        },
                    )?;
                }
            }
        }
        Ok(decision)
    }
}

fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<(), ClassifierError> {
    let is_new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}
