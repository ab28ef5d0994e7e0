//! Cover URL splitter & interner (C6).

/// Split a (possibly already-stripped) cover URL into `(base, path)`.
/// See spec.md §4.6 for the full table of input shapes.
pub fn split_cover_url(raw: &str) -> (String, String) {
    let s = raw.trim();
    if s.is_empty() {
        return (String::new(), String::new());
    }

    let s = if s.starts_with("//") {
        format!("https:{s}")
    } else {
        s.to_string()
    };

    if let Some(scheme) = ["http://", "https://"].iter().find(|p| s.starts_with(**p)) {
        return split_absolute_url(&s, scheme);
    }

    if let Some(path) = s.strip_prefix('/') {
        return (String::new(), format!("/{path}"));
    }

    if s.contains("://") {
        return (String::new(), s);
    }

    // Legacy bare `host/path` (no scheme), default to https://.
    match s.split_once('/') {
        Some((host, rest)) => (format!("https://{host}"), format!("/{rest}")),
        None => (format!("https://{s}"), String::new()),
    }
}

fn split_absolute_url(s: &str, scheme: &str) -> (String, String) {
    let rest = &s[scheme.len()..];
    // rest is "host[/path][?query]"
    let split_at = rest.find(['/', '?']);
    let (host, path_and_query) = match split_at {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if host.is_empty() {
        return (String::new(), s.to_string());
    }
    let scheme_name = scheme.trim_end_matches("://");
    let base = format!("{scheme_name}://{host}");
    (base, path_and_query.to_string())
}

/// Interns cover-URL bases in first-seen order, with the empty string
/// reserved at index 0.
#[derive(Default)]
pub struct CoverBaseInterner {
    bases: Vec<String>,
    index: std::collections::HashMap<String, usize>,
}

impl CoverBaseInterner {
    pub fn new() -> Self {
        let mut interner = Self {
            bases: vec![String::new()],
            index: std::collections::HashMap::new(),
        };
        interner.index.insert(String::new(), 0);
        interner
    }

    /// Intern `base`, returning its stable index.
    pub fn intern(&mut self, base: &str) -> usize {
        if let Some(&idx) = self.index.get(base) {
            return idx;
        }
        let idx = self.bases.len();
        self.bases.push(base.to_string());
        self.index.insert(base.to_string(), idx);
        idx
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}
