//! Canonicalization of `.proto` file paths.
//!
//! Files are deduplicated within a session under their canonical path:
//! backslashes become forward slashes (on every platform, so output is
//! deterministic), `.` and `..` segments collapse, and paths may not be
//! absolute or escape the import root. Windows drive prefixes are tolerated
//! with a warning. Emitted `dependency[]` strings keep whatever the user
//! wrote; the canonical form is only the dedup key.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CanonicalPath {
    pub(crate) path: String,
    /// The path carried a drive prefix such as `C:`.
    pub(crate) has_drive_prefix: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathProblem {
    Empty,
    Absolute,
    EscapesRoot,
}

impl fmt::Display for PathProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathProblem::Empty => write!(f, "the path is empty"),
            PathProblem::Absolute => write!(f, "the path is absolute"),
            PathProblem::EscapesRoot => write!(f, "the path escapes the import root"),
        }
    }
}

pub(crate) fn canonicalize(path: &str) -> Result<CanonicalPath, PathProblem> {
    let normalized = path.replace('\\', "/");
    if normalized.is_empty() {
        return Err(PathProblem::Empty);
    }
    if normalized.starts_with('/') {
        return Err(PathProblem::Absolute);
    }

    let (prefix, rest) = split_drive_prefix(&normalized);
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathProblem::EscapesRoot);
                }
            }
            _ => segments.push(segment),
        }
    }
    if segments.is_empty() {
        return Err(PathProblem::Empty);
    }

    let mut out = String::with_capacity(normalized.len());
    out.push_str(prefix);
    out.push_str(&segments.join("/"));
    Ok(CanonicalPath {
        path: out,
        has_drive_prefix: !prefix.is_empty(),
    })
}

fn split_drive_prefix(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let end = if bytes.get(2) == Some(&b'/') { 3 } else { 2 };
        (&path[..end], &path[end..])
    } else {
        ("", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashes_and_dots_collapse() {
        assert_eq!(
            canonicalize("foo\\bar/./baz.proto").unwrap().path,
            "foo/bar/baz.proto"
        );
        assert_eq!(
            canonicalize("foo/x/../bar.proto").unwrap().path,
            "foo/bar.proto"
        );
        assert_eq!(canonicalize("./a.proto").unwrap().path, "a.proto");
    }

    #[test]
    fn absolute_and_escaping_paths_rejected() {
        assert_eq!(canonicalize("/etc/a.proto"), Err(PathProblem::Absolute));
        assert_eq!(canonicalize("../a.proto"), Err(PathProblem::EscapesRoot));
        assert_eq!(
            canonicalize("a/../../b.proto"),
            Err(PathProblem::EscapesRoot)
        );
        assert_eq!(canonicalize(""), Err(PathProblem::Empty));
    }

    #[test]
    fn drive_prefix_tolerated_with_flag() {
        let canonical = canonicalize("C:\\protos\\a.proto").unwrap();
        assert_eq!(canonical.path, "C:/protos/a.proto");
        assert!(canonical.has_drive_prefix);
        assert!(!canonicalize("protos/a.proto").unwrap().has_drive_prefix);
    }
}
