//! Repository path helpers.
//!
//! Paths are `/`-separated, relative to the repository root, with no leading
//! or trailing slash. The empty string is the root itself.

/// Trim leading and trailing slashes. `"/"` and `""` both become the root.
#[must_use]
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Whether `path` equals `scope` or lies underneath it.
#[must_use]
pub fn is_within(path: &str, scope: &str) -> bool {
    if scope.is_empty() {
        return true;
    }
    path.strip_prefix(scope)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Whether `ancestor` is a strict ancestor directory of `path`.
#[must_use]
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    ancestor != path && is_within(path, ancestor)
}

/// Parent directory, `None` for the root.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(parent, _)| parent))
}

/// `path` with the `base` prefix removed. `Some("")` when they are equal.
#[must_use]
pub fn relative_to<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if !is_within(path, base) {
        return None;
    }
    if base.is_empty() {
        return Some(path);
    }
    Some(path[base.len()..].trim_start_matches('/'))
}

#[must_use]
pub fn join(base: &str, rel: &str) -> String {
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

/// Non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}
