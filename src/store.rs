use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{StorageError, StoreError};
use crate::models::{
    characteristic, is_department, Comment, Ledger, RatingAggregate, Score, StoreData, Teacher,
    TeacherRecord, CHARACTERISTICS,
};
use crate::storage::{save_json, KeyValueStore, DATA_KEY, LEDGER_KEY};

pub const DATA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub comment_max_chars: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            comment_max_chars: crate::config::DEFAULT_COMMENT_MAX_CHARS,
        }
    }
}

/// Teacher records plus the per-user vote ledger, persisted after every mutation.
pub struct RatingStore<S: KeyValueStore> {
    storage: S,
    data: StoreData,
    ledger: Ledger,
    options: StoreOptions,
}

impl<S: KeyValueStore> RatingStore<S> {
    /// Loads persisted state, seeding the starter teachers when none exists yet.
    pub fn open(storage: S, options: StoreOptions) -> Result<Self, StoreError> {
        let (data, seeded) = match storage.get(DATA_KEY)? {
            Some(raw) => (parse_data(&raw)?, false),
            None => (
                StoreData {
                    version: DATA_VERSION,
                    teachers: seed_teachers(),
                },
                true,
            ),
        };
        let ledger = match storage.get(LEDGER_KEY)? {
            // A ledger only describes the teacher data stored beside it.
            Some(_) if seeded => {
                tracing::warn!("teacher data missing, discarding the old vote ledger");
                Ledger::new()
            }
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StoreError::CorruptState {
                key: LEDGER_KEY.to_string(),
                reason: e.to_string(),
            })?,
            None => Ledger::new(),
        };

        let mut store = Self {
            storage,
            data,
            ledger,
            options,
        };
        if seeded {
            tracing::info!(teachers = store.data.teachers.len(), "seeding starter teachers");
            store.persist_all()?;
        }
        Ok(store)
    }

    pub fn teachers(&self) -> &[Teacher] {
        &self.data.teachers
    }

    pub fn teacher(&self, teacher_id: &str) -> Option<&Teacher> {
        self.data.teachers.iter().find(|t| t.id == teacher_id)
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Records `value` as `user_id`'s vote, replacing any earlier vote for the
    /// same teacher and characteristic.
    pub fn cast_vote(
        &mut self,
        user_id: &str,
        teacher_id: &str,
        key: &str,
        value: i64,
    ) -> Result<RatingAggregate, StoreError> {
        let vote = u8::try_from(value)
            .ok()
            .filter(|v| (1..=5).contains(v))
            .ok_or_else(|| StoreError::InvalidVoteValue(value.to_string()))?;
        if characteristic(key).is_none() {
            return Err(StoreError::NotFound(format!("characteristic {key}")));
        }
        let idx = self.teacher_index(teacher_id)?;

        let prior = self.my_vote(user_id, teacher_id, key);
        let before = self.data.teachers[idx].aggregate(key);
        let mut after = before;
        match prior {
            Some(p) => after.sum += f64::from(vote) - f64::from(p),
            None => {
                after.sum += f64::from(vote);
                after.count += 1;
            }
        }

        self.data.teachers[idx]
            .ratings
            .insert(key.to_string(), after);
        self.set_vote(user_id, teacher_id, key, Some(vote));

        if let Err(err) = self.persist_all() {
            tracing::error!(error = %err, teacher_id, key, "vote not persisted, rolling back");
            self.data.teachers[idx]
                .ratings
                .insert(key.to_string(), before);
            self.set_vote(user_id, teacher_id, key, prior);
            self.resync();
            return Err(err.into());
        }

        tracing::info!(
            teacher_id,
            key,
            overwrite = prior.is_some(),
            count = after.count,
            "vote recorded"
        );
        Ok(after)
    }

    pub fn my_vote(&self, user_id: &str, teacher_id: &str, key: &str) -> Option<u8> {
        self.ledger
            .get(user_id)
            .and_then(|teachers| teachers.get(teacher_id))
            .and_then(|votes| votes.get(key))
            .copied()
    }

    pub fn average(&self, teacher_id: &str, key: &str) -> Result<Score, StoreError> {
        if characteristic(key).is_none() {
            return Err(StoreError::NotFound(format!("characteristic {key}")));
        }
        let teacher = self.find(teacher_id)?;
        Ok(teacher.aggregate(key).average())
    }

    pub fn overall_rating(&self, teacher_id: &str) -> Result<Score, StoreError> {
        Ok(overall_score(self.find(teacher_id)?))
    }

    /// Trims `text` and checks it could be posted on `teacher_id` without
    /// changing anything.
    pub fn check_comment(&self, teacher_id: &str, text: &str) -> Result<String, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyComment);
        }
        let len = text.chars().count();
        if len > self.options.comment_max_chars {
            return Err(StoreError::CommentTooLong {
                len,
                max: self.options.comment_max_chars,
            });
        }
        self.find(teacher_id)?;
        Ok(text.to_string())
    }

    pub fn add_comment(&mut self, teacher_id: &str, text: &str) -> Result<Comment, StoreError> {
        let text = self.check_comment(teacher_id, text)?;
        let len = text.chars().count();
        let idx = self.teacher_index(teacher_id)?;

        let comment = Comment {
            text,
            ts: Utc::now(),
        };
        self.data.teachers[idx].comments.push(comment.clone());

        if let Err(err) = self.persist_data() {
            tracing::error!(error = %err, teacher_id, "comment not persisted, rolling back");
            self.data.teachers[idx].comments.pop();
            return Err(err);
        }

        tracing::info!(teacher_id, chars = len, "comment added");
        Ok(comment)
    }

    /// Comments for a teacher, newest first.
    pub fn comments(&self, teacher_id: &str) -> Result<Vec<&Comment>, StoreError> {
        Ok(self.find(teacher_id)?.comments.iter().rev().collect())
    }

    /// Inserts every row or none of them.
    pub fn bulk_import(&mut self, rows: Vec<TeacherRecord>) -> Result<Vec<String>, StoreError> {
        for (i, row) in rows.iter().enumerate() {
            validate_record(i + 1, row)?;
        }

        let previous_len = self.data.teachers.len();
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id = format!("t-{}", Uuid::new_v4().simple());
            ids.push(id.clone());
            self.data.teachers.push(Teacher {
                id,
                first_name: row.first_name.trim().to_string(),
                last_name: row.last_name.trim().to_string(),
                patronymic: row.patronymic.trim().to_string(),
                department: row.department.trim().to_string(),
                subjects: row.subjects,
                photo: row.photo.filter(|p| !p.trim().is_empty()),
                ratings: zeroed_ratings(),
                comments: Vec::new(),
            });
        }

        if let Err(err) = self.persist_data() {
            tracing::error!(error = %err, "import not persisted, rolling back");
            self.data.teachers.truncate(previous_len);
            return Err(err);
        }

        tracing::info!(imported = ids.len(), "teachers imported");
        Ok(ids)
    }

    /// Every teacher ranked by one characteristic's average, highest first.
    pub fn ranked_by_characteristic(&self, key: &str) -> Result<Vec<(&Teacher, Score)>, StoreError> {
        if characteristic(key).is_none() {
            return Err(StoreError::NotFound(format!("characteristic {key}")));
        }
        let mut ranked: Vec<(&Teacher, Score)> = self
            .data
            .teachers
            .iter()
            .map(|t| (t, t.aggregate(key).average()))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp_desc(&b.1));
        Ok(ranked)
    }

    /// Teachers of one department ranked by overall rating, highest first.
    pub fn in_department(&self, department: &str) -> Vec<(&Teacher, Score)> {
        let mut ranked: Vec<(&Teacher, Score)> = self
            .data
            .teachers
            .iter()
            .filter(|t| t.department == department)
            .map(|t| (t, overall_score(t)))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp_desc(&b.1));
        ranked
    }

    /// Case-insensitive substring match over "first last patronymic".
    pub fn search(&self, query: &str) -> Vec<(&Teacher, Score)> {
        let needle = query.trim().to_lowercase();
        self.data
            .teachers
            .iter()
            .filter(|t| t.search_name().to_lowercase().contains(&needle))
            .map(|t| (t, overall_score(t)))
            .collect()
    }

    fn find(&self, teacher_id: &str) -> Result<&Teacher, StoreError> {
        self.teacher(teacher_id)
            .ok_or_else(|| StoreError::NotFound(format!("teacher {teacher_id}")))
    }

    fn teacher_index(&self, teacher_id: &str) -> Result<usize, StoreError> {
        self.data
            .teachers
            .iter()
            .position(|t| t.id == teacher_id)
            .ok_or_else(|| StoreError::NotFound(format!("teacher {teacher_id}")))
    }

    fn set_vote(&mut self, user_id: &str, teacher_id: &str, key: &str, vote: Option<u8>) {
        match vote {
            Some(v) => {
                self.ledger
                    .entry(user_id.to_string())
                    .or_default()
                    .entry(teacher_id.to_string())
                    .or_default()
                    .insert(key.to_string(), v);
            }
            None => {
                if let Some(teachers) = self.ledger.get_mut(user_id) {
                    if let Some(votes) = teachers.get_mut(teacher_id) {
                        votes.remove(key);
                        if votes.is_empty() {
                            teachers.remove(teacher_id);
                        }
                    }
                    if teachers.is_empty() {
                        self.ledger.remove(user_id);
                    }
                }
            }
        }
    }

    fn persist_data(&mut self) -> Result<(), StoreError> {
        save_json(&mut self.storage, DATA_KEY, &self.data)?;
        Ok(())
    }

    fn persist_all(&mut self) -> Result<(), StorageError> {
        save_json(&mut self.storage, LEDGER_KEY, &self.ledger)?;
        save_json(&mut self.storage, DATA_KEY, &self.data)
    }

    /// Best effort rewrite after a rollback so a half-written pair of blobs
    /// matches memory again.
    fn resync(&mut self) {
        if let Err(err) = self.persist_all() {
            tracing::warn!(error = %err, "storage still out of sync after rollback");
        }
    }
}

/// Parses a vote typed by a person. Range checks happen in `cast_vote`.
pub fn parse_vote(raw: &str) -> Result<i64, StoreError> {
    raw.trim()
        .parse()
        .map_err(|_| StoreError::InvalidVoteValue(raw.to_string()))
}

/// Mean of the characteristic averages that have at least one vote.
pub fn overall_score(teacher: &Teacher) -> Score {
    let rated: Vec<f64> = CHARACTERISTICS
        .iter()
        .filter_map(|c| teacher.aggregate(c.key).average().value())
        .collect();
    if rated.is_empty() {
        Score::Unrated
    } else {
        Score::Rated(rated.iter().sum::<f64>() / rated.len() as f64)
    }
}

fn parse_data(raw: &str) -> Result<StoreData, StoreError> {
    let data: StoreData = serde_json::from_str(raw).map_err(|e| StoreError::CorruptState {
        key: DATA_KEY.to_string(),
        reason: e.to_string(),
    })?;
    if data.version > DATA_VERSION {
        return Err(StoreError::CorruptState {
            key: DATA_KEY.to_string(),
            reason: format!("unsupported version {}", data.version),
        });
    }
    Ok(data)
}

fn validate_record(row: usize, record: &TeacherRecord) -> Result<(), StoreError> {
    let missing = [
        ("firstName", &record.first_name),
        ("lastName", &record.last_name),
        ("department", &record.department),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());

    if let Some((field, _)) = missing {
        return Err(StoreError::MalformedRow {
            row,
            reason: format!("missing {field}"),
        });
    }
    let department = record.department.trim();
    if !is_department(department) {
        return Err(StoreError::MalformedRow {
            row,
            reason: format!("unknown department {department:?}"),
        });
    }
    Ok(())
}

fn zeroed_ratings() -> BTreeMap<String, RatingAggregate> {
    CHARACTERISTICS
        .iter()
        .map(|c| (c.key.to_string(), RatingAggregate::default()))
        .collect()
}

fn seed_teachers() -> Vec<Teacher> {
    let rows: [(&str, &str, &str, &str, &[&str]); 10] = [
        ("Иван", "Петров", "Алексеевич", "Математика", &["Алгебра", "Геометрия"]),
        ("Елена", "Сидорова", "Игоревна", "Физика", &["Механика", "Электричество"]),
        ("Сергей", "Кузнецов", "Владимирович", "Информатика", &["Python", "Алгоритмы"]),
        ("Мария", "Иванова", "Павловна", "Химия", &["Неорганическая", "Органическая"]),
        ("Анна", "Смирнова", "Олеговна", "Иностранные языки", &["Английский B2", "IELTS Prep"]),
        ("Павел", "Фёдоров", "Николаевич", "Биология", &["Общая биология", "Генетика"]),
        ("Дарья", "Соколова", "Сергеевна", "Гуманитарные науки", &["История", "Литература"]),
        ("Николай", "Орлов", "Андреевич", "Экономика", &["Микроэкономика", "Макроэкономика"]),
        ("Ольга", "Кравцова", "Романовна", "Искусство", &["Графика", "Дизайн"]),
        ("Артём", "Васильев", "Михайлович", "Физкультура", &["Лёгкая атлетика", "Игровые виды"]),
    ];
    let now = Utc::now();

    rows.iter()
        .enumerate()
        .map(|(i, (first, last, patronymic, department, subjects))| Teacher {
            id: format!("t{}", i + 1),
            first_name: first.to_string(),
            last_name: last.to_string(),
            patronymic: patronymic.to_string(),
            department: department.to_string(),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            photo: None,
            ratings: zeroed_ratings(),
            comments: vec![Comment {
                text: "Отлично объясняет материал!".to_string(),
                ts: now - Duration::days(i as i64 + 1),
            }],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn open_store() -> RatingStore<MemoryStore> {
        RatingStore::open(MemoryStore::new(), StoreOptions::default()).unwrap()
    }

    fn record(first: &str, last: &str, department: &str) -> TeacherRecord {
        TeacherRecord {
            first_name: first.to_string(),
            last_name: last.to_string(),
            department: department.to_string(),
            ..TeacherRecord::default()
        }
    }

    #[test]
    fn seeds_unrated_teachers_on_first_open() {
        let store = open_store();
        assert_eq!(store.teachers().len(), 10);
        assert_eq!(store.average("t1", "clarity").unwrap(), Score::Unrated);
        assert_eq!(store.overall_rating("t1").unwrap(), Score::Unrated);

        let reopened =
            RatingStore::open(store.into_storage(), StoreOptions::default()).unwrap();
        assert_eq!(reopened.teachers().len(), 10);
    }

    #[test]
    fn overwrite_and_second_voter_scenario() {
        let mut store = open_store();

        let agg = store.cast_vote("u1", "t1", "clarity", 4).unwrap();
        assert_eq!(agg.count, 1);
        assert_eq!(store.average("t1", "clarity").unwrap(), Score::Rated(4.0));

        let agg = store.cast_vote("u1", "t1", "clarity", 2).unwrap();
        assert_eq!(agg.count, 1);
        assert_eq!(store.average("t1", "clarity").unwrap(), Score::Rated(2.0));

        let agg = store.cast_vote("u2", "t1", "clarity", 5).unwrap();
        assert_eq!(agg.sum, 7.0);
        assert_eq!(agg.count, 2);
        assert_eq!(store.average("t1", "clarity").unwrap(), Score::Rated(3.5));
    }

    #[test]
    fn overwrite_counts_once_and_keeps_only_latest_value() {
        let mut store = open_store();
        store.cast_vote("other", "t2", "humor", 3).unwrap();
        let before = store.teacher("t2").unwrap().aggregate("humor");

        store.cast_vote("u1", "t2", "humor", 1).unwrap();
        let after = store.cast_vote("u1", "t2", "humor", 5).unwrap();

        assert_eq!(after.count, before.count + 1);
        assert_eq!(after.sum, before.sum + 5.0);
        assert_eq!(store.my_vote("u1", "t2", "humor"), Some(5));
    }

    #[test]
    fn distinct_voters_accumulate() {
        let mut store = open_store();
        let values = [1, 2, 3, 4, 5, 5, 2];
        for (i, v) in values.iter().enumerate() {
            store.cast_vote(&format!("user{i}"), "t3", "strict", *v).unwrap();
        }
        let agg = store.teacher("t3").unwrap().aggregate("strict");
        assert_eq!(agg.count as usize, values.len());
        assert_eq!(agg.sum, values.iter().sum::<i64>() as f64);

        let avg = store.average("t3", "strict").unwrap().value().unwrap();
        assert!((1.0..=5.0).contains(&avg));
    }

    #[test]
    fn rejects_bad_votes_without_mutating() {
        let mut store = open_store();
        for bad in [0, 6, -1, 300] {
            assert!(matches!(
                store.cast_vote("u1", "t1", "clarity", bad),
                Err(StoreError::InvalidVoteValue(_))
            ));
        }
        assert!(matches!(
            store.cast_vote("u1", "nobody", "clarity", 3),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.cast_vote("u1", "t1", "charisma", 3),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.teacher("t1").unwrap().aggregate("clarity").count, 0);
        assert_eq!(store.my_vote("u1", "t1", "clarity"), None);
    }

    #[test]
    fn persistence_failure_rolls_back_the_vote() {
        let mut store = open_store();
        store.cast_vote("u1", "t1", "clarity", 4).unwrap();

        let mut storage = store.into_storage();
        storage.fail_writes(true);
        let mut store = RatingStore::open(storage, StoreOptions::default()).unwrap();

        let err = store.cast_vote("u1", "t1", "clarity", 1).unwrap_err();
        assert!(matches!(err, StoreError::PersistenceFailure(_)));
        assert_eq!(store.average("t1", "clarity").unwrap(), Score::Rated(4.0));
        assert_eq!(store.my_vote("u1", "t1", "clarity"), Some(4));

        let err = store.cast_vote("u2", "t1", "clarity", 1).unwrap_err();
        assert!(matches!(err, StoreError::PersistenceFailure(_)));
        assert_eq!(store.teacher("t1").unwrap().aggregate("clarity").count, 1);
        assert_eq!(store.my_vote("u2", "t1", "clarity"), None);
    }

    #[test]
    fn vote_text_must_be_an_integer() {
        assert_eq!(parse_vote(" 4 ").unwrap(), 4);
        assert_eq!(parse_vote("-1").unwrap(), -1);
        for bad in ["4.5", "abc", ""] {
            let err = parse_vote(bad).unwrap_err();
            assert!(matches!(&err, StoreError::InvalidVoteValue(raw) if raw == bad));
        }
        assert_eq!(
            StoreError::InvalidVoteValue("4.5".to_string()).to_string(),
            "Invalid vote value \"4.5\": expected an integer from 1 to 5"
        );

        let mut store = open_store();
        let err = store.cast_vote("u1", "t1", "clarity", 7).unwrap_err();
        assert!(matches!(err, StoreError::InvalidVoteValue(raw) if raw == "7"));
    }

    #[test]
    fn persistence_failure_rolls_back_comments_and_imports() {
        let mut storage = open_store().into_storage();
        storage.fail_writes(true);
        let mut store = RatingStore::open(storage, StoreOptions::default()).unwrap();

        let err = store.add_comment("t1", "Great teacher").unwrap_err();
        assert!(matches!(err, StoreError::PersistenceFailure(_)));
        assert_eq!(store.comments("t1").unwrap().len(), 1);

        let err = store
            .bulk_import(vec![
                record("Олег", "Белов", "Физика"),
                record("Вера", "Белова", "Химия"),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::PersistenceFailure(_)));
        assert_eq!(store.teachers().len(), 10);
    }

    #[test]
    fn seeding_discards_a_ledger_left_without_teacher_data() {
        let mut storage = MemoryStore::new();
        storage
            .set(LEDGER_KEY, r#"{"u1": {"t1": {"clarity": 4}}}"#)
            .unwrap();
        let mut store = RatingStore::open(storage, StoreOptions::default()).unwrap();
        assert_eq!(store.my_vote("u1", "t1", "clarity"), None);

        let agg = store.cast_vote("u1", "t1", "clarity", 2).unwrap();
        assert_eq!(agg.count, 1);
        assert_eq!(agg.sum, 2.0);

        let storage = store.into_storage();
        let ledger: Ledger = serde_json::from_str(&storage.get(LEDGER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(ledger["u1"]["t1"]["clarity"], 2);
    }

    #[test]
    fn check_comment_validates_without_mutating() {
        let store = open_store();
        assert_eq!(store.check_comment("t1", "  hello  ").unwrap(), "hello");
        assert!(matches!(store.check_comment("t1", " "), Err(StoreError::EmptyComment)));
        assert!(matches!(
            store.check_comment("missing", "hello"),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.comments("t1").unwrap().len(), 1);
    }

    #[test]
    fn votes_survive_reopen() {
        let mut store = open_store();
        store.cast_vote("u1", "t4", "favorites", 2).unwrap();
        let mut store =
            RatingStore::open(store.into_storage(), StoreOptions::default()).unwrap();

        let agg = store.cast_vote("u1", "t4", "favorites", 3).unwrap();
        assert_eq!(agg.count, 1);
        assert_eq!(agg.sum, 3.0);
    }

    #[test]
    fn overall_rating_averages_rated_characteristics_only() {
        let mut store = open_store();
        store.cast_vote("u1", "t5", "clarity", 5).unwrap();
        store.cast_vote("u1", "t5", "humor", 2).unwrap();
        assert_eq!(store.overall_rating("t5").unwrap(), Score::Rated(3.5));
    }

    #[test]
    fn comments_are_validated_and_listed_newest_first() {
        let mut store = open_store();
        assert!(matches!(store.add_comment("t1", ""), Err(StoreError::EmptyComment)));
        assert!(matches!(store.add_comment("t1", "   "), Err(StoreError::EmptyComment)));

        store.add_comment("t1", "Great teacher").unwrap();
        let comments = store.comments("t1").unwrap();
        assert_eq!(comments[0].text, "Great teacher");
        assert_eq!(comments.len(), 2);

        assert!(matches!(
            store.add_comment("missing", "hi"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn overlong_comments_are_rejected_not_truncated() {
        let mut store =
            RatingStore::open(MemoryStore::new(), StoreOptions { comment_max_chars: 5 }).unwrap();
        let err = store.add_comment("t1", "слишком длинно").unwrap_err();
        assert!(matches!(err, StoreError::CommentTooLong { max: 5, .. }));
        assert_eq!(store.comments("t1").unwrap().len(), 1);
    }

    #[test]
    fn import_is_all_or_nothing() {
        let mut store = open_store();
        let rows = vec![
            record("Олег", "Белов", "Физика"),
            record("", "Никто", "Физика"),
        ];
        let err = store.bulk_import(rows).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow { row: 2, .. }));
        assert_eq!(store.teachers().len(), 10);

        let err = store
            .bulk_import(vec![record("Олег", "Белов", "Астрология")])
            .unwrap_err();
        assert!(matches!(err, StoreError::MalformedRow { row: 1, .. }));

        let ids = store
            .bulk_import(vec![
                record("Олег", "Белов", "Физика"),
                record("Вера", "Белова", "Химия"),
            ])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        let imported = store.teacher(&ids[0]).unwrap();
        assert_eq!(imported.ratings.len(), CHARACTERISTICS.len());
        assert!(imported.comments.is_empty());
        assert_eq!(store.overall_rating(&ids[0]).unwrap(), Score::Unrated);
    }

    #[test]
    fn rankings_put_unrated_last() {
        let mut store = open_store();
        store.cast_vote("u1", "t2", "clarity", 3).unwrap();
        store.cast_vote("u1", "t7", "clarity", 5).unwrap();

        let ranked = store.ranked_by_characteristic("clarity").unwrap();
        assert_eq!(ranked[0].0.id, "t7");
        assert_eq!(ranked[1].0.id, "t2");
        assert_eq!(ranked[2].1, Score::Unrated);
        assert!(store.ranked_by_characteristic("nope").is_err());
    }

    #[test]
    fn search_is_case_insensitive_over_full_name() {
        let store = open_store();
        let hits = store.search("  ПЕТРОВ ");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.id, "t1");
        assert_eq!(store.search("иван").len(), 2);
        assert_eq!(store.search("").len(), 10);
    }

    #[test]
    fn corrupt_or_future_blobs_are_surfaced() {
        let mut storage = MemoryStore::new();
        storage.set(DATA_KEY, "{not json").unwrap();
        assert!(matches!(
            RatingStore::open(storage, StoreOptions::default()),
            Err(StoreError::CorruptState { .. })
        ));

        let mut storage = MemoryStore::new();
        storage
            .set(DATA_KEY, r#"{"version": 9, "teachers": []}"#)
            .unwrap();
        assert!(matches!(
            RatingStore::open(storage, StoreOptions::default()),
            Err(StoreError::CorruptState { .. })
        ));
    }
}
