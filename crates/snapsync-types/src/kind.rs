use std::fmt;

/// Discriminator for semantically different cached objects that may share a
/// cache key.
///
/// A single logical key (say, a project handle) can map to several cached
/// objects: its compile options, its parse options, its full hierarchical
/// state object. The `Kind` tells them apart. Kinds are static string tags;
/// two kinds are equal iff their tags are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(&'static str);

impl Kind {
    /// Create a kind with a custom tag.
    pub const fn new(tag: &'static str) -> Self {
        Self(tag)
    }

    /// The static tag for this kind.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kind({})", self.0)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Well-known object kinds used across snapsync hosts.
pub mod kinds {
    use super::Kind;

    /// Top-level workspace state object.
    pub const WORKSPACE: Kind = Kind::new("workspace");
    /// Per-project hierarchical state object.
    pub const PROJECT: Kind = Kind::new("project");
    /// Per-document hierarchical state object.
    pub const DOCUMENT: Kind = Kind::new("document");
    /// Document text content.
    pub const TEXT: Kind = Kind::new("text");
    /// Compilation options bag.
    pub const COMPILE_OPTIONS: Kind = Kind::new("compile-options");
    /// Parse options bag.
    pub const PARSE_OPTIONS: Kind = Kind::new("parse-options");
    /// Metadata reference payload.
    pub const METADATA_REFERENCE: Kind = Kind::new("metadata-reference");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_tag() {
        assert_eq!(Kind::new("text"), kinds::TEXT);
        assert_ne!(kinds::TEXT, kinds::PROJECT);
    }

    #[test]
    fn display_is_bare_tag() {
        assert_eq!(kinds::COMPILE_OPTIONS.to_string(), "compile-options");
    }
}
