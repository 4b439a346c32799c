//! Path helpers used by the resolver

use std::path::{Component, Path, PathBuf};

use cow_utils::CowUtils;

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Returns `None` when `..` would climb above the
/// path's root (or above the first component of a relative path).
pub fn normalize_path(path: &Path) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                normalized.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
        }
    }

    Some(normalized)
}

/// Join a `/`-separated specifier onto a `/`-separated base directory and
/// normalize the result. Returns `None` when the specifier climbs above the
/// base's root.
pub fn join_normalized(base_dir: &str, specifier: &str) -> Option<String> {
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }

    Some(segments.join("/"))
}

/// Render a root-relative path as a `/`-separated id string
pub fn path_to_id(relative: &Path) -> String {
    let joined = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    joined.cow_replace('\\', "/").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalized() {
        assert_eq!(
            join_normalized("src/lib", "./math.js").as_deref(),
            Some("src/lib/math.js")
        );
        assert_eq!(
            join_normalized("src/lib", "../util/./fmt.js").as_deref(),
            Some("src/util/fmt.js")
        );
        assert_eq!(join_normalized("", "./a.js").as_deref(), Some("a.js"));
        assert_eq!(
            join_normalized("src", "./nested//deep/../b.js").as_deref(),
            Some("src/nested/b.js")
        );
    }

    #[test]
    fn test_join_normalized_rejects_escape() {
        assert_eq!(join_normalized("", "../outside.js"), None);
        assert_eq!(join_normalized("src", "../../outside.js"), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/project/./src/../lib/a.js")),
            Some(PathBuf::from("/project/lib/a.js"))
        );
        assert_eq!(normalize_path(Path::new("a/../../b")), None);
    }

    #[test]
    fn test_path_to_id() {
        assert_eq!(path_to_id(Path::new("src/lib/a.js")), "src/lib/a.js");
    }
}
