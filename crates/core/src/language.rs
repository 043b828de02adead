//! The single table mapping remote content languages to local file
//! extensions.
//!
//! Both sync directions go through this module, so a remote → local → remote
//! round trip always reproduces the original language tag.

use serde::{Deserialize, Serialize};

/// Content language of a remote leaf.
///
/// The set is closed. A label the remote reports that is not listed here is
/// parsed as `None` by [`LanguageTag::from_wire`] and the leaf is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LanguageTag {
    Python,
    Scala,
    Sql,
    R,
}

/// `(tag, extension without the dot, wire label)`.
const TABLE: [(LanguageTag, &str, &str); 4] = [
    (LanguageTag::Python, "py", "PYTHON"),
    (LanguageTag::Scala, "scala", "SCALA"),
    (LanguageTag::Sql, "sql", "SQL"),
    (LanguageTag::R, "r", "R"),
];

impl LanguageTag {
    pub const ALL: [LanguageTag; 4] = [Self::Python, Self::Scala, Self::Sql, Self::R];

    fn row(self) -> &'static (LanguageTag, &'static str, &'static str) {
        // Every variant has exactly one row.
        match self {
            Self::Python => &TABLE[0],
            Self::Scala => &TABLE[1],
            Self::Sql => &TABLE[2],
            Self::R => &TABLE[3],
        }
    }

    /// Local file extension for this language, without the leading dot.
    pub fn to_extension(self) -> &'static str {
        self.row().1
    }

    /// Language for a local file extension (without the leading dot).
    ///
    /// Matching is exact and case-sensitive: `R` is not `r`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        TABLE
            .iter()
            .find(|(_, e, _)| *e == ext)
            .map(|(tag, _, _)| *tag)
    }

    /// Label used by the remote workspace API.
    pub fn as_wire(self) -> &'static str {
        self.row().2
    }

    /// Parse a remote language label; unknown labels yield `None`.
    pub fn from_wire(label: &str) -> Option<Self> {
        TABLE
            .iter()
            .find(|(_, _, w)| *w == label)
            .map(|(tag, _, _)| *tag)
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_round_trip_for_every_tag() {
        for tag in LanguageTag::ALL {
            assert_eq!(LanguageTag::from_extension(tag.to_extension()), Some(tag));
            assert_eq!(LanguageTag::from_wire(tag.as_wire()), Some(tag));
        }
    }

    #[test]
    fn test_known_extensions() {
        assert_eq!(LanguageTag::Python.to_extension(), "py");
        assert_eq!(LanguageTag::Scala.to_extension(), "scala");
        assert_eq!(LanguageTag::Sql.to_extension(), "sql");
        assert_eq!(LanguageTag::R.to_extension(), "r");
    }

    #[test]
    fn test_unknown_inputs_are_none() {
        assert_eq!(LanguageTag::from_extension("txt"), None);
        assert_eq!(LanguageTag::from_extension("R"), None);
        assert_eq!(LanguageTag::from_extension(""), None);
        assert_eq!(LanguageTag::from_wire("JULIA"), None);
        assert_eq!(LanguageTag::from_wire("python"), None);
    }

    #[test]
    fn test_serde_uses_wire_labels() {
        let json = serde_json::to_string(&LanguageTag::Sql).unwrap();
        assert_eq!(json, "\"SQL\"");
        let tag: LanguageTag = serde_json::from_str("\"PYTHON\"").unwrap();
        assert_eq!(tag, LanguageTag::Python);
        assert_eq!(LanguageTag::Scala.to_string(), "SCALA");
    }
}
