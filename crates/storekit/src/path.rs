//! Logical storage paths.
//!
//! [`StoragePath`] is the value every adapter and manager operation speaks.
//! It keeps the caller's original string next to a canonical form:
//!
//! | Input | Normalized | Directory |
//! |-------|------------|-----------|
//! | `/a//b.txt` | `a/b.txt` | no |
//! | `a\b\` | `a/b/` | yes |
//! | `/` | `` (root) | yes |
//!
//! The root's normalized form is empty, which [`StoragePath::parse`] rejects
//! as blank. Its display and serialized form is `/`, which parses back to the
//! root, so `parse(path.to_string())` is a fixed point for every path.
//!
//! A trailing separator is the only thing that makes a path a directory.
//! Nothing in the crate infers directory-ness from content or existence.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Path separator used in normalized paths.
pub const SEPARATOR: char = '/';

/// Characters rejected anywhere in a path, on top of control characters.
/// Chosen so a path is a valid key on every shipped backend.
const RESERVED_CHARACTERS: &[char] = &['"', '<', '>', '|', ':', '*', '?'];

/// Canonical logical path.
///
/// Equality, ordering and hashing only look at the normalized form, so
/// `/a/b` and `a//b` are the same path while `a/b` and `a/b/` are not.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath {
    original: String,
    normalized: String,
    is_directory: bool,
    tree: OnceLock<Vec<StoragePath>>,
}

impl StoragePath {
    /// Parse and normalize a caller-supplied path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for blank input, control or reserved
    /// characters, and `.` / `..` segments.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::invalid_path(raw, "path is blank"));
        }

        if let Some(c) = raw
            .chars()
            .find(|c| c.is_control() || RESERVED_CHARACTERS.contains(c))
        {
            return Err(Error::invalid_path(
                raw,
                format!("contains invalid character {c:?}"),
            ));
        }

        let unified = raw.replace('\\', "/");
        let is_directory = unified.ends_with(SEPARATOR);

        let mut segments = Vec::new();
        for segment in unified.split(SEPARATOR).filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(Error::invalid_path(
                    raw,
                    "relative segments are not allowed",
                ));
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            return Ok(Self::from_parts(raw.to_string(), String::new(), true));
        }

        let mut normalized = segments.join("/");
        if is_directory {
            normalized.push(SEPARATOR);
        }

        Ok(Self::from_parts(raw.to_string(), normalized, is_directory))
    }

    /// The root directory of a store.
    pub fn root() -> Self {
        Self::from_parts("/".to_string(), String::new(), true)
    }

    fn from_parts(original: String, normalized: String, is_directory: bool) -> Self {
        Self {
            original,
            normalized,
            is_directory,
            tree: OnceLock::new(),
        }
    }

    fn derived(normalized: String, is_directory: bool) -> Self {
        Self::from_parts(normalized.clone(), normalized, is_directory)
    }

    /// The string the caller supplied, untouched.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Canonical form: no leading slash, no duplicate slashes, one trailing
    /// slash for directories. Empty for the root.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Whether this path denotes a directory.
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Whether this is the root directory.
    pub fn is_root(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Path segments, without separators.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.normalized
            .split(SEPARATOR)
            .filter(|segment| !segment.is_empty())
    }

    /// Final segment, `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Ancestors from the shallowest down to this path itself.
    ///
    /// Every element but the last is a directory; the last equals `self`.
    /// Empty for the root.
    pub fn path_tree(&self) -> &[StoragePath] {
        self.tree.get_or_init(|| {
            let names: Vec<&str> = self.segments().collect();
            (1..=names.len())
                .map(|depth| {
                    if depth == names.len() {
                        Self::from_parts(
                            self.original.clone(),
                            self.normalized.clone(),
                            self.is_directory,
                        )
                    } else {
                        Self::derived(format!("{}/", names[..depth].join("/")), true)
                    }
                })
                .collect()
        })
    }

    /// Enclosing directory, `None` for the root.
    pub fn parent(&self) -> Option<StoragePath> {
        if self.is_root() {
            return None;
        }
        let tree = self.path_tree();
        match tree.len() {
            0 | 1 => Some(Self::root()),
            n => Some(tree[n - 2].clone()),
        }
    }

    /// Same location as a directory path.
    pub fn as_directory(&self) -> StoragePath {
        if self.is_directory {
            return self.clone();
        }
        Self::derived(format!("{}/", self.normalized), true)
    }

    /// Same location as a file path, `None` for the root.
    pub fn as_file(&self) -> Option<StoragePath> {
        if self.is_root() {
            return None;
        }
        if !self.is_directory {
            return Some(self.clone());
        }
        Some(Self::derived(
            self.normalized.trim_end_matches(SEPARATOR).to_string(),
            false,
        ))
    }

    /// Directory named `name` directly beneath this one. `name` must be a
    /// segment taken from another valid path.
    pub(crate) fn child_directory(&self, name: &str) -> StoragePath {
        Self::derived(format!("{}{}/", self.normalized, name), true)
    }

    /// Whether this path is `dir` itself or lies beneath it.
    pub fn is_within(&self, dir: &StoragePath) -> bool {
        dir.is_directory && self.normalized.starts_with(&dir.normalized)
    }

    /// Append `other` beneath this directory.
    ///
    /// The result is a directory exactly when `other` is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `self` is not a directory.
    pub fn combine(&self, other: &StoragePath) -> Result<StoragePath> {
        if !self.is_directory {
            return Err(Error::invalid_path(
                self.normalized.clone(),
                "only a directory can be combined with another path",
            ));
        }
        if other.is_root() {
            return Ok(self.clone());
        }
        Ok(Self::derived(
            format!("{}{}", self.normalized, other.normalized),
            other.is_directory,
        ))
    }

    /// Re-anchor this path from directory `from` to directory `to`.
    ///
    /// Only the leading occurrence of `from` is rewritten. Paths outside
    /// `from` come back unchanged. Returns `None` when the rewrite leaves
    /// nothing, i.e. this path is `from` and `to` is the root.
    pub fn replace_directory_within_path(
        &self,
        from: &StoragePath,
        to: &StoragePath,
    ) -> Option<StoragePath> {
        if !self.is_within(from) {
            return Some(self.clone());
        }
        let rest = &self.normalized[from.normalized.len()..];
        let replaced = format!("{}{}", to.normalized, rest);
        if replaced.is_empty() {
            return None;
        }
        Some(Self::derived(replaced, self.is_directory))
    }

    /// Strip a store's root path from a path produced by an adapter.
    ///
    /// The root itself and every ancestor of it are dropped (`None`), so a
    /// caller of a root-scoped store never sees segments it did not supply.
    pub fn remove_root_path(&self, root: &StoragePath) -> Option<StoragePath> {
        if root.is_root() {
            return Some(self.clone());
        }
        if root.path_tree().iter().any(|ancestor| ancestor == self) {
            return None;
        }
        self.replace_directory_within_path(root, &Self::root())
    }
}

impl PartialEq for StoragePath {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for StoragePath {}

impl Hash for StoragePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for StoragePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StoragePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        f.write_str(&self.normalized)
    }
}

impl fmt::Debug for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoragePath")
            .field("normalized", &self.normalized)
            .field("is_directory", &self.is_directory)
            .finish()
    }
}

impl FromStr for StoragePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for StoragePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<StoragePath> for String {
    fn from(path: StoragePath) -> Self {
        if path.is_root() {
            return SEPARATOR.to_string();
        }
        path.normalized
    }
}
