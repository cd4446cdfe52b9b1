//! Identifier ↔ pair-tree path mapping.
//!
//! Identifiers are cleaned (reserved and non-visible bytes hex-encoded as
//! `^hh`, then `/` → `=`, `:` → `+`, `.` → `,`) and split into two-character
//! directory levels ("shorties"). The suite's files live in an `arf`
//! directory under the last shorty:
//!
//! ```text
//! doc1      -> do/c1/arf
//! abc       -> ab/c/arf
//! b.tar     -> b,/ta/r/arf
//! ```
//!
//! Shorties are at most two characters, so the three-character `arf`
//! directory can never be mistaken for part of an identifier.

use std::path::{Component, Path, PathBuf};

use msuite_types::Identifier;

/// Directory that holds a suite's files beneath its shorty path.
pub const ENCAPSULATION_DIR: &str = "arf";

const SHORTY_LEN: usize = 2;

/// Bytes that must be hex-encoded in addition to anything outside `!`..`~`.
const RESERVED: &[u8] = b"\"*+,<=>?\\^|";

/// Deterministic identifier → directory mapping.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairtreeMapper;

impl PairtreeMapper {
    pub fn new() -> Self {
        Self
    }

    /// Relative path of the suite's encapsulation directory.
    pub fn locate(&self, id: &Identifier) -> PathBuf {
        let mut path: PathBuf = Self::shorties(id.as_str()).into_iter().collect();
        path.push(ENCAPSULATION_DIR);
        path
    }

    /// Reverse of [`locate`](Self::locate) minus the encapsulation directory:
    /// turn a relative shorty path back into an identifier.
    ///
    /// Returns `None` for paths that are not a well-formed shorty sequence or
    /// that decode to something other than a valid identifier.
    pub fn resolve(&self, relative: &Path) -> Option<Identifier> {
        let mut parts = Vec::new();
        for component in relative.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            let part = part.to_str()?;
            if part.is_empty() || part.len() > SHORTY_LEN {
                return None;
            }
            parts.push(part);
        }
        let (_, init) = parts.split_last()?;
        if init.iter().any(|p| p.len() != SHORTY_LEN) {
            return None;
        }
        let cleaned: String = parts.concat();
        Identifier::parse(Self::unclean(&cleaned)?).ok()
    }

    /// Pair-tree character cleaning.
    pub fn clean(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for &b in raw.as_bytes() {
            if !(0x21..=0x7e).contains(&b) || RESERVED.contains(&b) {
                out.push_str(&format!("^{b:02x}"));
                continue;
            }
            out.push(match b {
                b'/' => '=',
                b':' => '+',
                b'.' => ',',
                other => other as char,
            });
        }
        out
    }

    /// Reverse of [`clean`](Self::clean). `None` on malformed `^` escapes or
    /// invalid UTF-8.
    pub fn unclean(cleaned: &str) -> Option<String> {
        let bytes = cleaned.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'^' => {
                    let hex = cleaned.get(i + 1..i + 3)?;
                    out.push(u8::from_str_radix(hex, 16).ok()?);
                    i += 3;
                    continue;
                }
                b'=' => out.push(b'/'),
                b'+' => out.push(b':'),
                b',' => out.push(b'.'),
                other => out.push(other),
            }
            i += 1;
        }
        String::from_utf8(out).ok()
    }

    fn shorties(raw: &str) -> Vec<String> {
        // Cleaned output is pure ASCII, so byte chunks are char chunks.
        Self::clean(raw)
            .as_bytes()
            .chunks(SHORTY_LEN)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    #[test]
    fn locate_examples() {
        let m = PairtreeMapper::new();
        assert_eq!(m.locate(&id("doc1")), PathBuf::from("do/c1/arf"));
        assert_eq!(m.locate(&id("abc")), PathBuf::from("ab/c/arf"));
        assert_eq!(m.locate(&id("a")), PathBuf::from("a/arf"));
        assert_eq!(m.locate(&id("b.tar")), PathBuf::from("b,/ta/r/arf"));
    }

    #[test]
    fn clean_encodes_reserved_and_invisible_bytes() {
        assert_eq!(PairtreeMapper::clean("ark:/13030/xt12t3"), "ark+=13030=xt12t3");
        assert_eq!(PairtreeMapper::clean("a b"), "a^20b");
        assert_eq!(PairtreeMapper::clean("x,y=z"), "x^2cy^3dz");
        assert_eq!(PairtreeMapper::clean("caf\u{e9}"), "caf^c3^a9");
    }

    #[test]
    fn unclean_reverses_clean() {
        for raw in ["ark:/13030/xt12t3", "a b", "x,y=z^", "caf\u{e9}", "plain", ""] {
            let cleaned = PairtreeMapper::clean(raw);
            assert_eq!(PairtreeMapper::unclean(&cleaned).as_deref(), Some(raw));
        }
    }

    #[test]
    fn unclean_rejects_malformed_escapes() {
        assert!(PairtreeMapper::unclean("ab^2").is_none());
        assert!(PairtreeMapper::unclean("ab^zz").is_none());
        assert!(PairtreeMapper::unclean("^ff").is_none());
    }

    #[test]
    fn resolve_reverses_locate() {
        let m = PairtreeMapper::new();
        for s in ["doc1", "a", "abc", "b.tar", "file.tar.gz", "x-y_z"] {
            let located = m.locate(&id(s));
            let shorty_path = located.parent().unwrap();
            assert_eq!(m.resolve(shorty_path), Some(id(s)));
        }
    }

    #[test]
    fn resolve_rejects_foreign_layouts() {
        let m = PairtreeMapper::new();
        assert!(m.resolve(Path::new("")).is_none());
        assert!(m.resolve(Path::new("abc/d")).is_none());
        assert!(m.resolve(Path::new("a/bc")).is_none());
        assert!(m.resolve(Path::new("../ab")).is_none());
        // Decodes to something the sanitizer would change.
        assert!(m.resolve(Path::new("^2/0a")).is_none());
    }

    #[test]
    fn resolve_accepts_short_final_shorty() {
        let m = PairtreeMapper::new();
        assert_eq!(m.resolve(Path::new("ab/c")), Some(id("abc")));
        assert_eq!(m.resolve(Path::new("ab/c/")), Some(id("abc")));
        assert_eq!(m.resolve(Path::new("ab/cd")), Some(id("abcd")));
    }

    #[test]
    fn similar_identifiers_get_distinct_leaves() {
        let m = PairtreeMapper::new();
        let ids = ["ab", "abc", "abd", "ab.c", "a.bc", "abcd", "Abcd"];
        let leaves: HashSet<_> = ids.iter().map(|s| m.locate(&id(s))).collect();
        assert_eq!(leaves.len(), ids.len());
    }
}
