use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Process-wide interner for element ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for elements in the scene graph.
///
/// This is the SVG `id` attribute. It is the identity used by selections,
/// snapshots and undo restores, so it survives a full re-parse of the
/// document, unlike a `NodeIndex`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a string as a NodeId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Split an id like `rect12` into its alphabetic prefix and numeric
    /// suffix. Ids without a trailing number return `None` for the suffix.
    pub fn split_numeric(&self) -> (&str, Option<u64>) {
        let s = self.as_str();
        let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return (s, None);
        }
        let (prefix, num) = s.split_at(s.len() - digits);
        (prefix, num.parse().ok())
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("layer1");
        let b = NodeId::intern("layer1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "layer1");
    }

    #[test]
    fn numeric_suffix_split() {
        assert_eq!(NodeId::intern("rect12").split_numeric(), ("rect", Some(12)));
        assert_eq!(NodeId::intern("outline").split_numeric(), ("outline", None));
    }

    #[test]
    fn ordering_follows_text() {
        let mut ids = vec![NodeId::intern("b"), NodeId::intern("a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }
}
