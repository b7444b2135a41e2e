//! A single-traversal view of one directory's immediate contents,
//! without building a full tree structure. Ported from the original
//! system's directory-listing helper: given a flat, fully materialized
//! file list, find direct children and immediate sub-directories of one
//! path in one pass.

use crate::file::File;

/// The result of peeking into one directory within a [`StateAtPoint`](crate::state::StateAtPoint).
#[derive(Debug, Clone, Default)]
pub struct DirPeek {
    pub path: String,
    pub files: Vec<File>,
    /// Ancestor directories from nearest to root, excluding the root `"."` itself.
    pub parent_dirs: Vec<String>,
    pub sub_dirs: Vec<String>,
}

/// Mirrors `path.Dir`'s notion of "the directory containing this path"
/// for the slash-separated, non-rooted paths used throughout this
/// crate: `"foo/bar/baz"` -> `"foo/bar"`, `"foo"` -> `"."`, `"."` -> `"."`.
fn dir_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _name)) if !dir.is_empty() => dir.to_string(),
        Some((_, _name)) => ".".to_string(),
        None => ".".to_string(),
    }
}

/// Ancestor directories of `dir_path`, nearest first, excluding the root.
fn parents(dir_path: &str) -> Vec<String> {
    let mut ret = Vec::new();
    let mut curr = dir_of(dir_path);

    while curr != "." {
        ret.push(curr.clone());
        curr = dir_of(&curr);
    }

    ret
}

/// Lists the files directly inside `dir_to_peek` and the names of its
/// immediate sub-directories, given the full flat file list of a
/// materialized state.
///
/// `dir_to_peek` uses `"."` for the root.
pub fn dir_peek(files: &[File], dir_to_peek: &str) -> DirPeek {
    let mut result = DirPeek {
        path: dir_to_peek.to_string(),
        files: Vec::new(),
        parent_dirs: parents(dir_to_peek),
        sub_dirs: Vec::new(),
    };

    // "foo" => 1, "foo/bar/baz" => 3
    let level_of_subdir_to_peek_base = dir_to_peek.matches('/').count() as i64;

    let (level_of_subdir_to_peek, prefix) = if dir_to_peek == "." {
        (level_of_subdir_to_peek_base - 1, String::new())
    } else {
        (level_of_subdir_to_peek_base, dir_to_peek.to_string())
    };

    for file in files {
        let dir = dir_of(&file.path);

        if dir == dir_to_peek {
            result.files.push(file.clone());
        } else if dir.starts_with(&prefix) {
            let components: Vec<&str> = dir.split('/').collect();
            if (components.len() as i64) < level_of_subdir_to_peek + 1 {
                continue;
            }

            let want_len = (level_of_subdir_to_peek + 2) as usize;
            let sub_dir = components[0..want_len].join("/");

            if !result.sub_dirs.contains(&sub_dir) {
                result.sub_dirs.push(sub_dir);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use varasto_crypto::BlobRef;

    fn file(path: &str) -> File {
        let now = Utc::now();
        File {
            path: path.to_string(),
            sha256: BlobRef::from_sha256(path.as_bytes()).as_hex(),
            size: 1,
            created: now,
            modified: now,
            blob_refs: vec![BlobRef::from_sha256(path.as_bytes())],
        }
    }

    fn files() -> Vec<File> {
        vec![
            file("readme.txt"),
            file("photos/2019/summer.jpg"),
            file("photos/2019/winter.jpg"),
            file("photos/2020/spring.jpg"),
            file("photos/index.txt"),
        ]
    }

    #[test]
    fn root_peek_lists_top_level_files_and_subdirs() {
        let peek = dir_peek(&files(), ".");
        assert_eq!(peek.files.len(), 1);
        assert_eq!(peek.files[0].path, "readme.txt");
        assert_eq!(peek.sub_dirs, vec!["photos".to_string()]);
        assert!(peek.parent_dirs.is_empty());
    }

    #[test]
    fn peek_one_level_down_lists_files_and_subdirs_there() {
        let peek = dir_peek(&files(), "photos");
        assert_eq!(peek.files.len(), 1);
        assert_eq!(peek.files[0].path, "photos/index.txt");
        assert_eq!(
            peek.sub_dirs,
            vec!["photos/2019".to_string(), "photos/2020".to_string()]
        );
        assert!(peek.parent_dirs.is_empty());
    }

    #[test]
    fn peek_two_levels_down_lists_only_its_own_files() {
        let peek = dir_peek(&files(), "photos/2019");
        assert_eq!(peek.files.len(), 2);
        assert!(peek.sub_dirs.is_empty());
        assert_eq!(peek.parent_dirs, vec!["photos".to_string()]);
    }

    #[test]
    fn nonexistent_dir_has_no_files_or_subdirs() {
        let peek = dir_peek(&files(), "nowhere");
        assert!(peek.files.is_empty());
        assert!(peek.sub_dirs.is_empty());
    }
}
