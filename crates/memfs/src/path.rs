use alloc::{string::String, vec::Vec};

use snafu::ensure;

use crate::error::{FsError, InvalidPathSnafu};

/// Splits an absolute, `/`-separated path into its components.
///
/// Empty components and `.` are skipped. `..` is rejected, as is any path
/// that does not start at the root.
pub(crate) fn components(path: &str) -> Result<Vec<&str>, FsError> {
    ensure!(path.starts_with('/'), InvalidPathSnafu { path });

    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return InvalidPathSnafu { path }.fail(),
            part => parts.push(part),
        }
    }
    Ok(parts)
}

pub(crate) fn join(parent: &str, name: &str) -> String {
    let mut path = String::from(parent);
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(name);
    path
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components() {
        assert_eq!(components("/").unwrap(), Vec::<&str>::new());
        assert_eq!(components("/hello.txt").unwrap(), ["hello.txt"]);
        assert_eq!(components("/a//b/./c/").unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["", "relative", "/a/../b"] {
            assert!(matches!(
                components(path),
                Err(FsError::InvalidPath { .. })
            ));
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }
}
