//! A self-balancing binary search tree with a Merkle root.
//!
//! [`AvlTree`] maps byte-string keys to byte-string values, ordered by the bytes of the
//! key. Every node caches its subtree height and a digest over its payload and its
//! children's digests, so after any mutation the root digest commits to the content of
//! the whole tree.
//!
//! Every public operation follows the same shape: a binary search from the root, a
//! mutation of at most one node's links or payload, and one walk back up to the root
//! where each ancestor gets its height and digest recomputed and, when its children
//! differ in height by more than one, a single or double rotation.
//!
//! ```
//! use merkle_avl::prelude::*;
//!
//! let mut tree = Sha3AvlTree::new();
//! tree.add(b"apple", b"red")?;
//! tree.set(b"banana", b"yellow")?;
//!
//! let before = tree.root_hash()?;
//! tree.update(b"apple", b"green")?;
//!
//! assert_eq!(tree.get(b"apple")?, b"green");
//! assert_ne!(tree.root_hash()?, before);
//! # Ok::<(), merkle_avl::prelude::Error>(())
//! ```
//!
//! The tree has no internal synchronization: share it between threads behind a lock.

mod node;

use std::fmt::Debug;

use proptest::prelude::*;
use tracing::debug;

use crate::{prelude::*, testing::entries};

use node::{NodeId, Nodes, Search};

/// An AVL tree over byte keys whose root digest is maintained on every mutation.
pub struct AvlTree<D: HashFunction> {
    nodes: Nodes<D>,
    root: Option<NodeId>,
    config: Config,
}

#[cfg(feature = "sha3")]
pub type Sha3AvlTree = AvlTree<sha3::Sha3_256>;

#[cfg(feature = "blake3")]
pub type Blake3AvlTree = AvlTree<blake3::Hasher>;

#[cfg(feature = "blake2")]
pub type Blake2sAvlTree = AvlTree<blake2::Blake2s256>;

#[cfg(feature = "sha2")]
pub type Sha256AvlTree = AvlTree<sha2::Sha256>;

impl<D: HashFunction> AvlTree<D> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            nodes: Nodes::new(config.scheme),
            root: None,
            config,
        }
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_ok()
    }

    /// Height of the root, where a single entry has height `0`.
    pub fn height(&self) -> Option<usize> {
        self.root.map(|root| self.nodes[root].height as usize)
    }

    /// Human readable dump of every node, one per line in key order.
    ///
    /// Meant for debugging; the format is not stable.
    pub fn tree_structure(&self) -> String {
        self.root
            .map(|root| self.nodes.render(root))
            .unwrap_or_default()
    }

    fn find(&self, key: &[u8]) -> Result<NodeId> {
        let root = self.root.ok_or(Error::EmptyTree)?;

        match self.nodes.search(root, key) {
            Search::Found(id) => Ok(id),
            Search::Vacant { .. } => Err(Error::KeyNotFound),
        }
    }

    /// Inserts a new leaf, or overwrites the value if `key` is present.
    fn upsert(&mut self, key: &[u8], value: &[u8]) {
        let Some(root) = self.root else {
            self.root = Some(self.nodes.leaf(None, key, value));
            debug!(key = %hex::encode(key), len = 1, "added root entry");
            return;
        };

        match self.nodes.search(root, key) {
            Search::Found(id) => self.overwrite(id, value),
            Search::Vacant { parent, side } => self.insert(parent, side, key, value),
        }
    }

    fn insert(&mut self, parent: NodeId, side: node::Side, key: &[u8], value: &[u8]) {
        let leaf = self.nodes.leaf(Some(parent), key, value);
        self.nodes.attach(parent, side, leaf);
        self.propagate(parent);

        debug!(key = %hex::encode(key), len = self.len(), "added entry");
    }

    fn overwrite(&mut self, id: NodeId, value: &[u8]) {
        self.nodes[id].value = value.to_vec();
        self.propagate(id);

        debug!(key = %hex::encode(&self.nodes[id].key), "updated entry");
    }

    /// Walks from `from` up to the root, refreshing and rebalancing every node on the
    /// way, then records the top of the walk as the root.
    fn propagate(&mut self, from: NodeId) {
        let mut current = from;

        loop {
            self.nodes.refresh(current);
            current = self.nodes.rebalance(current);

            match self.nodes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        self.root = Some(current);
    }
}

impl<D: HashFunction> Store for AvlTree<D> {
    fn get(&self, key: &[u8]) -> Result<&[u8]> {
        let id = self.find(key)?;
        Ok(&self.nodes[id].value)
    }

    fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let Some(root) = self.root else {
            self.upsert(key, value);
            return Ok(());
        };

        match self.nodes.search(root, key) {
            Search::Found(_) => Err(Error::DuplicateKey),
            Search::Vacant { parent, side } => {
                self.insert(parent, side, key, value);
                Ok(())
            }
        }
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let id = self.find(key)?;
        self.overwrite(id, value);
        Ok(())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.upsert(key, value);
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<()> {
        let id = self.find(key)?;

        let splice = self.nodes.splice(id);
        match splice.parent {
            Some(parent) => self.propagate(parent),
            None => self.root = splice.heir,
        }

        if let Some(relocation) = self.nodes.release(splice.detached) {
            if self.root == Some(relocation.from) {
                self.root = Some(relocation.to);
            }
        }

        debug!(key = %hex::encode(key), len = self.len(), "removed entry");
        Ok(())
    }

    fn root_hash(&self) -> Result<Hash> {
        self.root
            .map(|root| self.nodes[root].hash)
            .ok_or(Error::EmptyTree)
    }
}

impl<D: HashFunction> Default for AvlTree<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: HashFunction> Clone for AvlTree<D> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            config: self.config,
        }
    }
}

impl<D: HashFunction> PartialEq for AvlTree<D> {
    fn eq(&self, other: &Self) -> bool {
        self.root_hash().ok() == other.root_hash().ok()
    }
}

impl<D: HashFunction> Eq for AvlTree<D> {}

impl<D: HashFunction> Debug for AvlTree<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvlTree")
            .field("root", &self.root_hash().ok())
            .field("len", &self.len())
            .finish()
    }
}

impl<D, K, V> Extend<(K, V)> for AvlTree<D>
where
    D: HashFunction,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.upsert(key.as_ref(), value.as_ref());
        }
    }
}

impl<D, K, V> FromIterator<(K, V)> for AvlTree<D>
where
    D: HashFunction,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<D: HashFunction + 'static> Arbitrary for AvlTree<D> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        entries(0..64)
            .prop_map(|entries| entries.into_iter().collect::<Self>())
            .boxed()
    }
}
