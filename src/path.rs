//! # Paths
//!
//! Absolute, component-based paths into the spec hierarchy, e.g. `/World/Geo/size`.
//! Paths are plain values - they do not borrow from any layer, so they can be
//! stored in inverse operations and looked up again at replay time.

/// Error produced when parsing or combining paths.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("path must start with '/'")]
    NotAbsolute,
    #[error("invalid component name {0:?}")]
    InvalidName(String),
    #[error("the root path has no parent")]
    RootHasNoParent,
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An absolute path addressing one spec in a layer.
///
/// The root path `/` has zero components and always addresses the layer's
/// root spec. Ordering is lexicographic by component, which conveniently puts
/// every ancestor before its descendants.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SpecPath {
    components: Vec<Box<str>>,
}

impl SpecPath {
    /// The path of the layer root, `/`.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }
    /// Number of components. Zero for the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.components.len()
    }
    /// The final component, or None for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.components.last().map(AsRef::as_ref)
    }
    /// The containing path.
    pub fn parent(&self) -> Result<Self, PathError> {
        if self.is_root() {
            return Err(PathError::RootHasNoParent);
        }
        Ok(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }
    /// Extend this path by one child component.
    pub fn append(&self, name: &str) -> Result<Self, PathError> {
        if !valid_name(name) {
            return Err(PathError::InvalidName(name.to_owned()));
        }
        let mut components = self.components.clone();
        components.push(name.into());
        Ok(Self { components })
    }
    /// True if `self` is a strict ancestor of `other`. A path is not its own
    /// ancestor; the root is an ancestor of everything else.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.components.len() > self.components.len()
            && other.components[..self.components.len()] == self.components[..]
    }
    /// Rewrite the `old_prefix` of this path to `new_prefix`, for rekeying a
    /// subtree during a spec move. Returns None if `old_prefix` is neither
    /// this path nor an ancestor of it.
    #[must_use]
    pub fn reparented(&self, old_prefix: &Self, new_prefix: &Self) -> Option<Self> {
        if self != old_prefix && !old_prefix.is_ancestor_of(self) {
            return None;
        }
        let mut components = new_prefix.components.clone();
        components.extend_from_slice(&self.components[old_prefix.components.len()..]);
        Some(Self { components })
    }
}

impl std::str::FromStr for SpecPath {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(PathError::NotAbsolute);
        };
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let mut components = Vec::new();
        for name in rest.split('/') {
            if !valid_name(name) {
                return Err(PathError::InvalidName(name.to_owned()));
            }
            components.push(name.into());
        }
        Ok(Self { components })
    }
}

impl std::fmt::Display for SpecPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}
impl std::fmt::Debug for SpecPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{self}>")
    }
}

#[cfg(test)]
mod tests {
    use super::{PathError, SpecPath};

    fn path(s: &str) -> SpecPath {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(path("/").to_string(), "/");
        assert_eq!(path("/World/Geo").to_string(), "/World/Geo");
        assert_eq!(path("/").depth(), 0);
        assert_eq!(path("/World/Geo").name(), Some("Geo"));
    }
    #[test]
    fn rejects_malformed() {
        assert_eq!("World".parse::<SpecPath>(), Err(PathError::NotAbsolute));
        assert!(matches!(
            "/World//Geo".parse::<SpecPath>(),
            Err(PathError::InvalidName(_))
        ));
        assert!(matches!(
            "/9lives".parse::<SpecPath>(),
            Err(PathError::InvalidName(_))
        ));
        assert!(matches!(
            "/a b".parse::<SpecPath>(),
            Err(PathError::InvalidName(_))
        ));
    }
    #[test]
    fn parent_and_append() {
        assert_eq!(path("/World/Geo").parent(), Ok(path("/World")));
        assert_eq!(path("/World").parent(), Ok(SpecPath::root()));
        assert_eq!(SpecPath::root().parent(), Err(PathError::RootHasNoParent));
        assert_eq!(path("/World").append("Geo"), Ok(path("/World/Geo")));
        assert!(path("/World").append("").is_err());
    }
    #[test]
    fn ancestry() {
        assert!(SpecPath::root().is_ancestor_of(&path("/A")));
        assert!(path("/A").is_ancestor_of(&path("/A/B/C")));
        assert!(!path("/A").is_ancestor_of(&path("/A")));
        assert!(!path("/A/B").is_ancestor_of(&path("/A")));
        assert!(!path("/A").is_ancestor_of(&path("/AB")));
    }
    #[test]
    fn reparent() {
        assert_eq!(
            path("/A/B/C").reparented(&path("/A"), &path("/X/Y")),
            Some(path("/X/Y/B/C"))
        );
        assert_eq!(
            path("/A").reparented(&path("/A"), &path("/B")),
            Some(path("/B"))
        );
        assert_eq!(path("/Z").reparented(&path("/A"), &path("/B")), None);
    }
    #[test]
    fn ordering_puts_ancestors_first() {
        let mut paths = vec![path("/A/B"), path("/A"), path("/A/B/C"), path("/")];
        paths.sort();
        assert_eq!(
            paths,
            vec![path("/"), path("/A"), path("/A/B"), path("/A/B/C")]
        );
    }
}
