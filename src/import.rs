use std::io::Read;
use std::path::Path;

use crate::error::StoreError;
use crate::models::TeacherRecord;

pub const SUBJECT_DELIMITER: char = '|';

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    patronymic: Option<String>,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    subjects: Option<String>,
    #[serde(default)]
    photo: Option<String>,
}

impl From<CsvRow> for TeacherRecord {
    fn from(row: CsvRow) -> Self {
        TeacherRecord {
            first_name: row.first_name.unwrap_or_default(),
            last_name: row.last_name.unwrap_or_default(),
            patronymic: row.patronymic.unwrap_or_default(),
            department: row.department.unwrap_or_default(),
            subjects: split_subjects(row.subjects.as_deref().unwrap_or_default()),
            photo: row.photo.filter(|p| !p.is_empty()),
        }
    }
}

pub fn split_subjects(raw: &str) -> Vec<String> {
    raw.split(SUBJECT_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses `firstName,lastName,patronymic,department,subjects,photo` rows.
/// Columns are matched by header name; missing optional columns are fine.
pub fn read_records<R: Read>(input: R) -> Result<Vec<TeacherRecord>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let mut records = Vec::new();
    for (i, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| StoreError::MalformedRow {
            row: i + 1,
            reason: e.to_string(),
        })?;
        records.push(row.into());
    }
    Ok(records)
}

pub fn read_records_from_path(path: &Path) -> Result<Vec<TeacherRecord>, StoreError> {
    let file = std::fs::File::open(path).map_err(|e| StoreError::MalformedRow {
        row: 0,
        reason: format!("cannot open {}: {e}", path.display()),
    })?;
    read_records(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_columns_and_subject_lists() {
        let csv = "\
lastName,firstName,patronymic,department,subjects,photo
Белов, Олег ,Ильич,Физика,Механика | Оптика ||,
Белова,Вера,,Химия,,img/vera.png
";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].first_name, "Олег");
        assert_eq!(records[0].subjects, vec!["Механика", "Оптика"]);
        assert_eq!(records[0].photo, None);
        assert_eq!(records[1].patronymic, "");
        assert!(records[1].subjects.is_empty());
        assert_eq!(records[1].photo.as_deref(), Some("img/vera.png"));
    }

    #[test]
    fn missing_columns_become_empty_fields() {
        let csv = "firstName,lastName\nОлег,Белов\n";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].department, "");
    }

    #[test]
    fn short_rows_are_tolerated() {
        let csv = "firstName,lastName,department,subjects\nОлег,Белов,Физика\n";
        let records = read_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].department, "Физика");
        assert!(records[0].subjects.is_empty());
    }
}
