use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::models::{characteristic, Characteristic, Comment, Score, Teacher, CHARACTERISTICS, DEPARTMENTS};
use crate::router::{Capture, Outcome, Pattern, Router};
use crate::storage::KeyValueStore;
use crate::store::{overall_score, RatingStore};

const PREVIEW_LEN: usize = 3;

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn top_path(key: &str) -> String {
    format!("/top/{key}")
}

pub fn department_path(name: &str) -> String {
    format!("/department/{}", utf8_percent_encode(name, COMPONENT))
}

pub fn search_path(query: &str) -> String {
    format!("/search?q={}", utf8_percent_encode(query.trim(), COMPONENT))
}

pub fn teacher_path(id: &str) -> String {
    format!("/teacher/{}", utf8_percent_encode(id, COMPONENT))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherRow {
    pub id: String,
    pub full_name: String,
    pub department: String,
    pub subjects: Vec<String>,
    pub score: Score,
}

impl TeacherRow {
    fn new(teacher: &Teacher, score: Score) -> Self {
        Self {
            id: teacher.id.clone(),
            full_name: teacher.full_name(),
            department: teacher.department.clone(),
            subjects: teacher.subjects.clone(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacteristicScore {
    pub characteristic: &'static Characteristic,
    pub score: Score,
    pub votes: u32,
    pub my_vote: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub department: String,
    pub subjects: Vec<String>,
    pub photo: Option<String>,
    pub overall: Score,
    pub characteristics: Vec<CharacteristicScore>,
    pub comments: Vec<Comment>,
    pub can_post: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Home {
        by_characteristic: Vec<(&'static Characteristic, Vec<TeacherRow>)>,
        by_department: Vec<(String, Vec<TeacherRow>)>,
    },
    Characteristic {
        characteristic: &'static Characteristic,
        teachers: Vec<TeacherRow>,
    },
    Department {
        name: String,
        teachers: Vec<TeacherRow>,
    },
    Search {
        query: String,
        teachers: Vec<TeacherRow>,
    },
    Profile(Profile),
}

/// What the route handlers read from: the store and whoever is looking.
pub struct ViewContext<'a, S: KeyValueStore> {
    pub store: &'a RatingStore<S>,
    pub viewer: Option<&'a str>,
}

pub fn build_router<'a, S: KeyValueStore + 'a>() -> Router<ViewContext<'a, S>, View> {
    let mut router: Router<ViewContext<'a, S>, View> = Router::new(home);
    router
        .register(Pattern::exact("/"), |ctx, _| Outcome::Render(home(ctx)))
        .register(Pattern::prefixed("/top/", Capture::Word), |ctx, p| {
            by_characteristic(ctx, &p[0])
        })
        .register(Pattern::prefixed("/department/", Capture::Rest), |ctx, p| {
            Outcome::Render(by_department(ctx, &p[0]))
        })
        .register(Pattern::prefixed("/search?q=", Capture::Tail), |ctx, p| {
            Outcome::Render(by_search(ctx, &p[0]))
        })
        .register(Pattern::prefixed("/teacher/", Capture::Segment), |ctx, p| {
            profile(ctx, &p[0])
        });
    router
}

fn rows<'t>(ranked: impl IntoIterator<Item = (&'t Teacher, Score)>) -> Vec<TeacherRow> {
    ranked
        .into_iter()
        .map(|(t, score)| TeacherRow::new(t, score))
        .collect()
}

fn home<S: KeyValueStore>(ctx: &mut ViewContext<'_, S>) -> View {
    let by_characteristic = CHARACTERISTICS
        .iter()
        .map(|c| {
            let ranked = ctx.store.ranked_by_characteristic(c.key).unwrap_or_default();
            (c, rows(ranked.into_iter().take(PREVIEW_LEN)))
        })
        .collect();

    let by_department = DEPARTMENTS
        .iter()
        .filter_map(|d| {
            let ranked = ctx.store.in_department(d);
            if ranked.is_empty() {
                None
            } else {
                Some((d.to_string(), rows(ranked.into_iter().take(PREVIEW_LEN))))
            }
        })
        .collect();

    View::Home {
        by_characteristic,
        by_department,
    }
}

fn by_characteristic<S: KeyValueStore>(ctx: &mut ViewContext<'_, S>, key: &str) -> Outcome<View> {
    let (Some(characteristic), Ok(ranked)) =
        (characteristic(key), ctx.store.ranked_by_characteristic(key))
    else {
        return Outcome::Redirect("/".to_string());
    };
    Outcome::Render(View::Characteristic {
        characteristic,
        teachers: rows(ranked),
    })
}

fn by_department<S: KeyValueStore>(ctx: &mut ViewContext<'_, S>, name: &str) -> View {
    View::Department {
        name: name.to_string(),
        teachers: rows(ctx.store.in_department(name)),
    }
}

fn by_search<S: KeyValueStore>(ctx: &mut ViewContext<'_, S>, query: &str) -> View {
    View::Search {
        query: query.trim().to_string(),
        teachers: rows(ctx.store.search(query)),
    }
}

fn profile<S: KeyValueStore>(ctx: &mut ViewContext<'_, S>, id: &str) -> Outcome<View> {
    let Some(teacher) = ctx.store.teacher(id) else {
        return Outcome::Redirect("/".to_string());
    };

    let characteristics = CHARACTERISTICS
        .iter()
        .map(|c| {
            let aggregate = teacher.aggregate(c.key);
            CharacteristicScore {
                characteristic: c,
                score: aggregate.average(),
                votes: aggregate.count,
                my_vote: ctx
                    .viewer
                    .and_then(|user| ctx.store.my_vote(user, &teacher.id, c.key)),
            }
        })
        .collect();

    Outcome::Render(View::Profile(Profile {
        id: teacher.id.clone(),
        full_name: teacher.full_name(),
        department: teacher.department.clone(),
        subjects: teacher.subjects.clone(),
        photo: teacher.photo.clone(),
        overall: overall_score(teacher),
        characteristics,
        comments: teacher.comments.iter().rev().cloned().collect(),
        can_post: ctx.viewer.is_some(),
    }))
}
