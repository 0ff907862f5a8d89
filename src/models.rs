use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TeacherId = String;
pub type UserId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristic {
    pub key: &'static str,
    pub name: &'static str,
}

/// Rateable traits. Aggregation walks this table, so entries can be added or
/// removed without touching the store.
pub const CHARACTERISTICS: &[Characteristic] = &[
    Characteristic {
        key: "clarity",
        name: "Понятно объясняет",
    },
    Characteristic {
        key: "humor",
        name: "Чувство юмора",
    },
    Characteristic {
        key: "strict",
        name: "Строгость",
    },
    Characteristic {
        key: "favorites",
        name: "Есть любимчики",
    },
];

pub const DEPARTMENTS: &[&str] = &[
    "Математика",
    "Физика",
    "Информатика",
    "Химия",
    "Биология",
    "Иностранные языки",
    "Гуманитарные науки",
    "Экономика",
    "Искусство",
    "Физкультура",
];

pub fn characteristic(key: &str) -> Option<&'static Characteristic> {
    CHARACTERISTICS.iter().find(|c| c.key == key)
}

pub fn is_department(name: &str) -> bool {
    DEPARTMENTS.contains(&name)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAggregate {
    pub sum: f64,
    pub count: u32,
}

impl RatingAggregate {
    pub fn average(&self) -> Score {
        if self.count == 0 {
            Score::Unrated
        } else {
            Score::Rated((self.sum / self.count as f64).clamp(1.0, 5.0))
        }
    }
}

/// An average rating, or the explicit absence of one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Rated(f64),
    Unrated,
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Rated(v) => Some(v),
            Score::Unrated => None,
        }
    }

    /// Descending order with unrated entries after every rated one.
    pub fn cmp_desc(&self, other: &Score) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Score::Rated(a), Score::Rated(b)) => b.partial_cmp(a).unwrap_or(Ordering::Equal),
            (Score::Rated(_), Score::Unrated) => Ordering::Less,
            (Score::Unrated, Score::Rated(_)) => Ordering::Greater,
            (Score::Unrated, Score::Unrated) => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub patronymic: String,
    pub department: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub ratings: BTreeMap<String, RatingAggregate>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Teacher {
    pub fn full_name(&self) -> String {
        format!("{} {} {}", self.last_name, self.first_name, self.patronymic)
            .trim_end()
            .to_string()
    }

    /// The "first last patronymic" form the search matches against.
    pub fn search_name(&self) -> String {
        format!("{} {} {}", self.first_name, self.last_name, self.patronymic)
    }

    pub fn aggregate(&self, key: &str) -> RatingAggregate {
        self.ratings.get(key).copied().unwrap_or_default()
    }
}

/// One row of a bulk import before it has been given an id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub patronymic: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreData {
    pub version: u32,
    pub teachers: Vec<Teacher>,
}

/// userId -> teacherId -> characteristic key -> value
pub type Ledger = BTreeMap<UserId, BTreeMap<TeacherId, BTreeMap<String, u8>>>;
