use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::moderation::normalize;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("training data error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: label must be 0 or 1, got {label:?}")]
    BadLabel { row: usize, label: String },

    #[error("training data needs at least one example of each label")]
    SingleClass,

    #[error("model file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model format error: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ClassCounts {
    documents: u64,
    tokens: u64,
    features: HashMap<String, u64>,
}

impl ClassCounts {
    fn log_likelihood(&self, features: &[String], vocabulary: u64, total_docs: u64) -> f64 {
        let prior = ((self.documents + 1) as f64 / (total_docs + 2) as f64).ln();
        let denominator = (self.tokens + vocabulary) as f64;
        features.iter().fold(prior, |acc, f| {
            let hits = self.features.get(f).copied().unwrap_or(0);
            acc + ((hits + 1) as f64 / denominator).ln()
        })
    }
}

/// Multinomial naive Bayes over unigrams and bigrams of normalized text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToxicityModel {
    clean: ClassCounts,
    toxic: ClassCounts,
    vocabulary: u64,
}

pub fn features(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut out: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    out.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    out
}

impl ToxicityModel {
    pub fn train<I, T>(samples: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = (T, bool)>,
        T: AsRef<str>,
    {
        let mut clean = ClassCounts::default();
        let mut toxic = ClassCounts::default();
        let mut vocabulary = HashSet::new();

        for (text, is_toxic) in samples {
            let class = if is_toxic { &mut toxic } else { &mut clean };
            class.documents += 1;
            for feature in features(text.as_ref()) {
                class.tokens += 1;
                *class.features.entry(feature.clone()).or_insert(0) += 1;
                vocabulary.insert(feature);
            }
        }

        if clean.documents == 0 || toxic.documents == 0 {
            return Err(ClassifierError::SingleClass);
        }
        Ok(Self {
            clean,
            toxic,
            vocabulary: vocabulary.len() as u64,
        })
    }

    /// Trains on all but a held-out share of `samples` and scores the model
    /// on the rest.
    pub fn train_with_holdout(
        samples: Vec<Sample>,
        fraction: f64,
    ) -> Result<(Self, Evaluation), ClassifierError> {
        let (train, test) = split_holdout(samples, fraction);
        let model = Self::train(train.iter().map(|(text, label)| (text.as_str(), *label)))?;
        let scored: Vec<(f64, bool)> = test
            .iter()
            .map(|(text, label)| (model.probability(text), *label))
            .collect();
        let evaluation = evaluate(&scored, train.len());
        Ok((model, evaluation))
    }

    /// Probability that `text` belongs to the toxic class.
    pub fn probability(&self, text: &str) -> f64 {
        let features = features(text);
        let total_docs = self.clean.documents + self.toxic.documents;
        let clean = self.clean.log_likelihood(&features, self.vocabulary, total_docs);
        let toxic = self.toxic.log_likelihood(&features, self.vocabulary, total_docs);
        1.0 / (1.0 + (clean - toxic).exp())
    }

    pub fn load(path: &Path) -> Result<Option<Self>, ClassifierError> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }
}

pub type Sample = (String, bool);

pub const HOLDOUT_FRACTION: f64 = 0.2;

/// Reads `text,label` rows. Rows missing either field are skipped.
pub fn read_samples<R: Read>(input: R) -> Result<Vec<Sample>, ClassifierError> {
    #[derive(Deserialize)]
    struct Row {
        text: Option<String>,
        label: Option<String>,
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut samples = Vec::new();
    for (i, result) in reader.deserialize::<Row>().enumerate() {
        let row = result?;
        let (Some(text), Some(label)) = (row.text, row.label) else {
            continue;
        };
        let is_toxic = match label.as_str() {
            "0" => false,
            "1" => true,
            _ => return Err(ClassifierError::BadLabel { row: i + 1, label }),
        };
        samples.push((text, is_toxic));
    }
    Ok(samples)
}

/// Splits each label's samples separately so both sides keep the label mix.
/// Held-out rows are spread evenly through each label's rows, so the split is
/// the same on every run. A label with a single sample stays in training.
pub fn split_holdout(samples: Vec<Sample>, fraction: f64) -> (Vec<Sample>, Vec<Sample>) {
    let (toxic, clean): (Vec<Sample>, Vec<Sample>) =
        samples.into_iter().partition(|(_, label)| *label);

    let mut train = Vec::new();
    let mut test = Vec::new();
    for class in [clean, toxic] {
        let n = class.len();
        if n < 2 {
            train.extend(class);
            continue;
        }
        let held = ((n as f64 * fraction).round() as usize).clamp(1, n - 1);
        let picked: HashSet<usize> = (0..held).map(|i| i * n / held).collect();
        for (i, sample) in class.into_iter().enumerate() {
            if picked.contains(&i) {
                test.push(sample);
            } else {
                train.push(sample);
            }
        }
    }
    (train, test)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: &'static str,
    pub precision: f64,
    pub recall: f64,
    pub support: usize,
}

/// Holdout scores, predicting toxic at probability 0.5 and above.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub train_size: usize,
    pub test_size: usize,
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    /// `None` unless the holdout holds both labels.
    pub roc_auc: Option<f64>,
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn class_metrics(label: &'static str, positive: bool, scored: &[(f64, bool)]) -> ClassMetrics {
    let predicted = |p: f64| (p >= 0.5) == positive;
    let hits = scored
        .iter()
        .filter(|(p, actual)| predicted(*p) && *actual == positive)
        .count();
    let predicted_count = scored.iter().filter(|(p, _)| predicted(*p)).count();
    let support = scored.iter().filter(|(_, actual)| *actual == positive).count();
    ClassMetrics {
        label,
        precision: ratio(hits, predicted_count),
        recall: ratio(hits, support),
        support,
    }
}

/// Probability that a random toxic sample outscores a random clean one, ties
/// counting half.
fn roc_auc(scored: &[(f64, bool)]) -> Option<f64> {
    let toxic: Vec<f64> = scored.iter().filter(|(_, t)| *t).map(|(p, _)| *p).collect();
    let clean: Vec<f64> = scored.iter().filter(|(_, t)| !*t).map(|(p, _)| *p).collect();
    if toxic.is_empty() || clean.is_empty() {
        return None;
    }
    let wins: f64 = toxic
        .iter()
        .flat_map(|t| clean.iter().map(move |c| (t, c)))
        .map(|(t, c)| match t.partial_cmp(c) {
            Some(std::cmp::Ordering::Greater) => 1.0,
            Some(std::cmp::Ordering::Equal) => 0.5,
            _ => 0.0,
        })
        .sum();
    Some(wins / (toxic.len() * clean.len()) as f64)
}

fn evaluate(scored: &[(f64, bool)], train_size: usize) -> Evaluation {
    let correct = scored.iter().filter(|(p, actual)| (*p >= 0.5) == *actual).count();
    Evaluation {
        train_size,
        test_size: scored.len(),
        classes: [
            class_metrics("clean", false, scored),
            class_metrics("toxic", true, scored),
        ],
        accuracy: ratio(correct, scored.len()),
        roc_auc: roc_auc(scored),
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Trained on {} samples, evaluated on {}.",
            self.train_size, self.test_size
        )?;
        writeln!(f, "{:<8}{:>10}{:>10}{:>9}", "class", "precision", "recall", "support")?;
        for c in &self.classes {
            writeln!(
                f,
                "{:<8}{:>10.3}{:>10.3}{:>9}",
                c.label, c.precision, c.recall, c.support
            )?;
        }
        writeln!(f, "accuracy {:.3}", self.accuracy)?;
        match self.roc_auc {
            Some(auc) => writeln!(f, "ROC AUC  {auc:.3}"),
            None => writeln!(f, "ROC AUC  n/a (holdout lacks one label)"),
        }
    }
}
