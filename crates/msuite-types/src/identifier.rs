//! Suite identifiers and the sanitizer that defines them.
//!
//! An identifier is accepted only when it already equals its own sanitized
//! form. The sanitizer is used purely as an equality oracle: nothing is ever
//! rewritten into a "fixed" identifier.
//!
//! Sanitizing (mirroring the usual secure-filename rules):
//! - non-ASCII characters are dropped (no compatibility decomposition)
//! - `/` becomes a space, then whitespace runs collapse to `_`
//! - anything outside `[A-Za-z0-9_.-]` is removed
//! - leading and trailing `.` and `_` are trimmed

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Return the sanitized form of `name`.
///
/// ```
/// use msuite_types::secure_filename;
///
/// assert_eq!(secure_filename("doc1"), "doc1");
/// assert_eq!(secure_filename("../etc/passwd"), "etc_passwd");
/// assert_eq!(secure_filename("My cool file.txt"), "My_cool_file.txt");
/// ```
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// A validated MaterialSuite identifier.
///
/// Safe to use verbatim as a path segment, a URL path segment, a document
/// key or an object key. The only way to obtain one is [`Identifier::parse`]
/// (or deserialization, which goes through it).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Longest identifier accepted. Keeps every variant usable as a single
    /// file name.
    pub const MAX_LEN: usize = 255;

    /// Validate `value` as an identifier.
    pub fn parse(value: impl Into<String>) -> TypeResult<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > Self::MAX_LEN || secure_filename(&value) != value {
            return Err(TypeError::InvalidIdentifier(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = TypeError;

    fn try_from(value: String) -> TypeResult<Self> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = TypeError;

    fn try_from(value: &str) -> TypeResult<Self> {
        Self::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}
