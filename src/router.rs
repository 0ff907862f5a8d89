use std::collections::VecDeque;

use percent_encoding::percent_decode_str;

pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// `[a-z]+`
    Word,
    /// one or more characters up to the next `/`
    Segment,
    /// one or more characters to the end of the path
    Rest,
    /// zero or more characters to the end of the path
    Tail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Literal(&'static str),
    Capture(Capture),
}

/// A path shape. Captures consume greedily and the whole path must be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    parts: Vec<Part>,
}

impl Pattern {
    pub fn new(parts: Vec<Part>) -> Self {
        Self { parts }
    }

    pub fn exact(path: &'static str) -> Self {
        Self::new(vec![Part::Literal(path)])
    }

    pub fn prefixed(prefix: &'static str, capture: Capture) -> Self {
        Self::new(vec![Part::Literal(prefix), Part::Capture(capture)])
    }

    pub fn arity(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::Capture(_)))
            .count()
    }

    /// Returns the decoded captures when `path` fits this pattern.
    pub fn matches(&self, path: &str) -> Option<Vec<String>> {
        let mut rest = path;
        let mut raw = Vec::with_capacity(self.arity());

        for part in &self.parts {
            let taken = match part {
                Part::Literal(lit) => {
                    rest = rest.strip_prefix(lit)?;
                    continue;
                }
                Part::Capture(Capture::Word) => rest
                    .find(|c: char| !c.is_ascii_lowercase())
                    .unwrap_or(rest.len()),
                Part::Capture(Capture::Segment) => rest.find('/').unwrap_or(rest.len()),
                Part::Capture(Capture::Rest) | Part::Capture(Capture::Tail) => rest.len(),
            };
            if taken == 0 && *part != Part::Capture(Capture::Tail) {
                return None;
            }
            raw.push(&rest[..taken]);
            rest = &rest[taken..];
        }

        if !rest.is_empty() {
            return None;
        }
        raw.into_iter()
            .map(|s| percent_decode_str(s).decode_utf8().ok().map(|d| d.into_owned()))
            .collect()
    }
}

pub enum Outcome<T> {
    Render(T),
    Redirect(String),
}

pub type Handler<C, T> = fn(&mut C, &[String]) -> Outcome<T>;
pub type HomeHandler<C, T> = fn(&mut C) -> T;

/// Ordered route table with a mandatory home fallback. The first registered
/// pattern that matches wins.
pub struct Router<C, T> {
    routes: Vec<(Pattern, Handler<C, T>)>,
    home: HomeHandler<C, T>,
    current: String,
    pending: VecDeque<String>,
}

impl<C, T> Router<C, T> {
    pub fn new(home: HomeHandler<C, T>) -> Self {
        Self {
            routes: Vec::new(),
            home,
            current: "/".to_string(),
            pending: VecDeque::new(),
        }
    }

    pub fn register(&mut self, pattern: Pattern, handler: Handler<C, T>) -> &mut Self {
        self.routes.push((pattern, handler));
        self
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Runs exactly one handler for `path`: the first matching route, or home.
    pub fn resolve(&self, ctx: &mut C, path: &str) -> Outcome<T> {
        let path = if path.is_empty() { "/" } else { path };
        for (pattern, handler) in &self.routes {
            if let Some(params) = pattern.matches(path) {
                return handler(ctx, &params);
            }
        }
        tracing::debug!(path, "no route matched, falling back to home");
        Outcome::Render((self.home)(ctx))
    }

    /// Moves to `path` and resolves it. Redirects issued by handlers are
    /// queued and run after the current resolution returns.
    pub fn navigate(&mut self, ctx: &mut C, path: &str) -> T {
        self.pending.push_back(path.to_string());
        let mut hops = 0;

        while let Some(next) = self.pending.pop_front() {
            self.current = if next.is_empty() { "/".to_string() } else { next };
            match self.resolve(ctx, &self.current) {
                Outcome::Render(view) => {
                    self.pending.clear();
                    return view;
                }
                Outcome::Redirect(to) => {
                    hops += 1;
                    if hops > MAX_REDIRECTS {
                        tracing::warn!(path = %self.current, "redirect limit reached");
                        break;
                    }
                    self.pending.push_back(to);
                }
            }
        }

        self.pending.clear();
        self.current = "/".to_string();
        (self.home)(ctx)
    }

    /// Re-resolves the current path, e.g. after a mutation.
    pub fn refresh(&mut self, ctx: &mut C) -> T {
        let current = self.current.clone();
        self.navigate(ctx, &current)
    }
}
