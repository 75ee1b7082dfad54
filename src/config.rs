/// How a node's digest is derived from its payload and its children's digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestScheme {
    /// Every node commits to its own key and value as well as its children:
    ///
    /// `H(tag || len(key) || key || len(value) || value || left? || right?)`
    ///
    /// where `tag` records which children are present (`0` none, `1` left, `2` right,
    /// `3` both) and lengths are big-endian `u64`.
    #[default]
    Keyed,

    /// The plain structural rule:
    ///
    /// - leaf: `H(key || value)`
    /// - two children: `H(left || right)`
    /// - one child: `H(child)`
    ///
    /// Interior nodes do not commit to their own key or value, so two trees that only
    /// differ in an interior payload share a root digest. Only use this to reproduce
    /// digests computed with this rule elsewhere.
    Structural,
}

/// Run-time settings for an [`AvlTree`](crate::collections::AvlTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub scheme: DigestScheme,
}

impl Config {
    pub fn with_scheme(mut self, scheme: DigestScheme) -> Self {
        self.scheme = scheme;
        self
    }
}
