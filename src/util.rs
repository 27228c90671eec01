//! Small helpers shared by the loader, the template functions, and the
//! server: opening files with a readable error, and normalizing the
//! slash-separated relative paths used as [`crate::load::Snapshot`] keys.

use anyhow::{anyhow, Result};
use std::fs::File;
use std::path::{Component, Path};

/// The key of the content root.
pub const ROOT: &str = ".";

pub fn open(path: &Path, kind: &str) -> Result<File> {
    match File::open(path) {
        Err(e) => {
            Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e))
        }
        Ok(file) => Ok(file),
    }
}

/// Normalizes a slash-separated relative path into a key. Empty and `.`
/// segments are dropped and `..` removes the previous segment. The root is
/// represented as [`ROOT`]. Returns `None` if the path climbs above the root.
pub fn clean(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            part => parts.push(part),
        }
    }
    match parts.is_empty() {
        true => Some(ROOT.to_owned()),
        false => Some(parts.join("/")),
    }
}

/// Resolves `relative` against the directory key `base`.
pub fn join(base: &str, relative: &str) -> Option<String> {
    clean(&format!("{}/{}", base, relative))
}

/// Returns the key of the directory containing `key`, or `None` for the root.
pub fn parent(key: &str) -> Option<&str> {
    if key == ROOT {
        return None;
    }
    match key.rfind('/') {
        Some(i) => Some(&key[..i]),
        None => Some(ROOT),
    }
}

/// Returns the URL a directory key is served at: `/` for the root,
/// `/posts/` for `posts`.
pub fn directory_url(key: &str) -> String {
    match key == ROOT {
        true => String::from("/"),
        false => format!("/{}/", key),
    }
}

/// Converts a path relative to the content root into a key. Returns `None`
/// if the path isn't valid UTF-8 or isn't purely relative.
pub fn key_from_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    match parts.is_empty() {
        true => Some(ROOT.to_owned()),
        false => Some(parts.join("/")),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean("/"), Some(String::from(".")));
        assert_eq!(clean(""), Some(String::from(".")));
        assert_eq!(clean("/posts/"), Some(String::from("posts")));
        assert_eq!(clean("posts//a"), Some(String::from("posts/a")));
        assert_eq!(
            clean("./posts/../notes/b"),
            Some(String::from("notes/b"))
        );
        assert_eq!(clean("../etc/passwd"), None);
        assert_eq!(clean("posts/../../x"), None);
    }

    #[test]
    fn test_join() {
        assert_eq!(join(".", "posts"), Some(String::from("posts")));
        assert_eq!(join("posts", "."), Some(String::from("posts")));
        assert_eq!(join("posts/2016", ".."), Some(String::from("posts")));
        assert_eq!(join("posts", "../notes"), Some(String::from("notes")));
        assert_eq!(join(".", ".."), None);
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("."), None);
        assert_eq!(parent("posts"), Some("."));
        assert_eq!(parent("posts/2016/a"), Some("posts/2016"));
    }

    #[test]
    fn test_directory_url() {
        assert_eq!(directory_url("."), "/");
        assert_eq!(directory_url("posts/2016"), "/posts/2016/");
    }

    #[test]
    fn test_key_from_path() {
        assert_eq!(key_from_path(Path::new("")), Some(String::from(".")));
        assert_eq!(
            key_from_path(Path::new("posts/a.md")),
            Some(String::from("posts/a.md"))
        );
        assert_eq!(key_from_path(Path::new("../a")), None);
    }
}
