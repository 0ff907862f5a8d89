use std::fmt::Write;

use chrono::{DateTime, Local, Utc};

use crate::models::Score;
use crate::views::{Profile, TeacherRow, View};

pub fn stars(score: Score) -> String {
    match score {
        Score::Rated(v) => format!("★ {:.1}", (v * 10.0).round() / 10.0),
        Score::Unrated => "★ —".to_string(),
    }
}

pub fn format_date(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%d.%m.%Y %H:%M").to_string()
}

fn write_rows(output: &mut String, rows: &[TeacherRow], show_department: bool, empty: &str) {
    if rows.is_empty() {
        let _ = writeln!(output, "{empty}");
        return;
    }
    for row in rows {
        let meta = if show_department {
            format!("{} · {}", row.department, row.subjects.join(", "))
        } else {
            row.subjects.join(", ")
        };
        let _ = writeln!(
            output,
            "- {} [{}] ({}) {}",
            row.full_name,
            row.id,
            meta,
            stars(row.score)
        );
    }
}

pub fn render(view: &View) -> String {
    let mut output = String::new();

    match view {
        View::Home {
            by_characteristic,
            by_department,
        } => {
            let _ = writeln!(output, "# Топ по характеристикам");
            for (characteristic, rows) in by_characteristic {
                let _ = writeln!(output);
                let _ = writeln!(output, "## {} (/top/{})", characteristic.name, characteristic.key);
                write_rows(&mut output, rows, true, "Пока нет учителей");
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "# По кафедрам");
            for (department, rows) in by_department {
                let _ = writeln!(output);
                let _ = writeln!(output, "## {department}");
                write_rows(&mut output, rows, true, "Пока нет учителей");
            }
        }
        View::Characteristic {
            characteristic,
            teachers,
        } => {
            let _ = writeln!(output, "# Топ учителей — {}", characteristic.name);
            write_rows(&mut output, teachers, true, "Пока нет учителей");
        }
        View::Department { name, teachers } => {
            let _ = writeln!(output, "# Кафедра — {name}");
            write_rows(&mut output, teachers, false, "Пока нет учителей");
        }
        View::Search { query, teachers } => {
            let _ = writeln!(output, "# Результаты поиска: “{query}”");
            write_rows(&mut output, teachers, true, "Ничего не найдено");
        }
        View::Profile(profile) => render_profile(&mut output, profile),
    }

    output
}

fn render_profile(output: &mut String, profile: &Profile) {
    let _ = writeln!(output, "# {} [{}]", profile.full_name, profile.id);
    let _ = writeln!(output, "Кафедра: {}", profile.department);
    let _ = writeln!(output, "Предметы: {}", profile.subjects.join(", "));
    if let Some(photo) = &profile.photo {
        let _ = writeln!(output, "Фото: {photo}");
    }
    let _ = writeln!(output, "Общий рейтинг: {}", stars(profile.overall));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Оценки по характеристикам");
    for entry in &profile.characteristics {
        let mine = entry
            .my_vote
            .map(|v| format!(", ваша оценка {v}"))
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "- {} ({}): {} из {} оценок{}",
            entry.characteristic.name,
            entry.characteristic.key,
            stars(entry.score),
            entry.votes,
            mine
        );
    }
    if !profile.can_post {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "Чтобы оставить комментарий или оценку, войдите: leto-talks login"
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Комментарии");
    if profile.comments.is_empty() {
        let _ = writeln!(output, "Комментариев пока нет");
    }
    for comment in &profile.comments {
        let _ = writeln!(output, "- Аноним · {}: {}", format_date(comment.ts), comment.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CHARACTERISTICS;

    #[test]
    fn stars_round_to_one_decimal_and_mark_unrated() {
        assert_eq!(stars(Score::Rated(3.46)), "★ 3.5");
        assert_eq!(stars(Score::Rated(4.0)), "★ 4.0");
        assert_eq!(stars(Score::Unrated), "★ —");
    }

    #[test]
    fn empty_search_says_nothing_found() {
        let out = render(&View::Search {
            query: "зzz".to_string(),
            teachers: Vec::new(),
        });
        assert!(out.contains("Ничего не найдено"));
    }

    #[test]
    fn characteristic_view_lists_rows() {
        let out = render(&View::Characteristic {
            characteristic: &CHARACTERISTICS[0],
            teachers: vec![TeacherRow {
                id: "t1".into(),
                full_name: "Петров Иван Алексеевич".into(),
                department: "Математика".into(),
                subjects: vec!["Алгебра".into(), "Геометрия".into()],
                score: Score::Rated(4.25),
            }],
        });
        assert!(out.contains("Понятно объясняет"));
        assert!(out.contains("- Петров Иван Алексеевич [t1] (Математика · Алгебра, Геометрия) ★ 4.3"));
    }
}
