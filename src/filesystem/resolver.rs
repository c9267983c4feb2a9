use snafu::Snafu;
use tracing::debug;

use crate::filesystem::{EntryId, EntryKind, Tree};

/// Resolves a path string against `cursor`, returning the directory the
/// cursor would move to.
///
/// Reads the tree only, so a failed resolution cannot leave a caller's
/// cursor half-moved. Consecutive and trailing separators collapse; `..`
/// at the root stays at the root. Only directories are navigable: a path
/// segment naming a file fails the same way as a missing one.
pub fn resolve(tree: &Tree, cursor: EntryId, path: &str) -> Result<EntryId, ResolveError> {
    match path {
        ".." => return Ok(tree.parent(cursor).unwrap_or(cursor)),
        "." | "" => return Ok(cursor),
        "/" => return Ok(tree.root()),
        _ => {}
    }

    let (start, rest) = if let Some(stripped) = path.strip_prefix("./") {
        (cursor, stripped)
    } else if let Some(stripped) = path.strip_prefix('/') {
        (tree.root(), stripped)
    } else {
        (cursor, path)
    };

    let mut current = start;
    for segment in rest.split('/').filter(|segment| !segment.is_empty()) {
        if segment == ".." {
            current = tree.parent(current).unwrap_or(current);
            continue;
        }
        current = match tree.find_child(current, segment) {
            Some(child) if tree.kind(child) == EntryKind::Directory => child,
            _ => {
                debug!("Resolution of '{}' stopped at segment '{}'", path, segment);
                return NotFoundSnafu { segment }.fail();
            }
        };
    }
    Ok(current)
}

#[derive(Debug, Snafu)]
pub enum ResolveError {
    #[snafu(display("Path '{segment}' does not exist"))]
    NotFound { segment: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn sample_tree() -> (Tree, EntryId, EntryId) {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.create_directory(root, "a").unwrap();
        let b = tree.create_directory(a, "b").unwrap();
        tree.create_file(a, "c", b"hello").unwrap();
        (tree, a, b)
    }

    #[test]
    fn parent_of_root_is_root() {
        let tree = Tree::new();
        let resolved = resolve(&tree, tree.root(), "..").unwrap();
        assert_eq!(resolved, tree.root());
    }

    #[rstest]
    #[case(".")]
    #[case("")]
    fn dot_and_empty_stay_put(#[case] path: &str) {
        let (tree, a, _) = sample_tree();
        assert_eq!(resolve(&tree, a, path).unwrap(), a);
    }

    #[test]
    fn bare_slash_jumps_to_root() {
        let (tree, _, b) = sample_tree();
        assert_eq!(resolve(&tree, b, "/").unwrap(), tree.root());
    }

    #[test]
    fn double_dot_ascends_one_level() {
        let (tree, a, b) = sample_tree();
        assert_eq!(resolve(&tree, b, "..").unwrap(), a);
    }

    #[rstest]
    #[case("a/b")]
    #[case("./a/b")]
    #[case("/a/b")]
    #[case("a//b/")]
    fn multi_segment_paths_reach_the_same_directory(#[case] path: &str) {
        let (tree, _, b) = sample_tree();
        assert_eq!(resolve(&tree, tree.root(), path).unwrap(), b);
    }

    #[test]
    fn relative_paths_start_at_the_cursor() {
        let (tree, a, b) = sample_tree();
        assert_eq!(resolve(&tree, a, "b").unwrap(), b);
        assert_eq!(resolve(&tree, b, "../b").unwrap(), b);
    }

    #[test]
    fn double_dot_above_root_mid_walk_is_a_no_op() {
        let (tree, a, _) = sample_tree();
        assert_eq!(resolve(&tree, tree.root(), "../../a").unwrap(), a);
    }

    #[test]
    fn missing_segment_fails_with_its_name() {
        let (tree, _, b) = sample_tree();
        let result = resolve(&tree, b, "/a/z");
        assert!(matches!(
            result,
            Err(ResolveError::NotFound { segment }) if segment == "z"
        ));
    }

    #[test]
    fn file_segments_are_not_navigable() {
        let (tree, _, _) = sample_tree();
        let result = resolve(&tree, tree.root(), "a/c");
        assert!(matches!(
            result,
            Err(ResolveError::NotFound { segment }) if segment == "c"
        ));
    }

    #[test]
    fn failure_reports_the_first_missing_segment() {
        let (tree, _, _) = sample_tree();
        let result = resolve(&tree, tree.root(), "a/x/y");
        assert!(matches!(
            result,
            Err(ResolveError::NotFound { segment }) if segment == "x"
        ));
    }
}
