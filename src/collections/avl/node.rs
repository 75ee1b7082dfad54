use std::{
    cmp::Ordering,
    marker::PhantomData,
    ops::{Index, IndexMut},
};

use digest::Digest;
use tracing::trace;

use crate::{
    config::DigestScheme,
    hash::{Hash, HashFunction},
};

/// Handle to a [`Node`] inside a [`Nodes`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// One of the two child slots of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Height of the subtree rooted here; a leaf is `0` and an absent child counts as `-1`.
    pub height: i32,
    pub hash: Hash,
    /// Non-owning back link, `None` only for the root and for detached nodes.
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
}

impl Node {
    pub fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn child_mut(&mut self, side: Side) -> &mut Option<NodeId> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Outcome of a key lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Search {
    Found(NodeId),
    /// The key is absent; a new leaf for it belongs in `parent`'s `side` slot.
    Vacant { parent: NodeId, side: Side },
}

/// Result of structurally removing a node from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Splice {
    /// The node that physically left the tree. Its arena slot is still allocated.
    pub detached: NodeId,
    /// Former parent of `detached`, where the upward walk has to start.
    pub parent: Option<NodeId>,
    /// The node that took over `detached`'s slot.
    pub heir: Option<NodeId>,
}

/// A node moved from `from` to `to` when an arena slot was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Relocation {
    pub from: NodeId,
    pub to: NodeId,
}

/// Computes a node digest from its payload and the digests of its children.
pub(crate) fn digest_of<D: HashFunction>(
    scheme: DigestScheme,
    key: &[u8],
    value: &[u8],
    left: Option<Hash>,
    right: Option<Hash>,
) -> Hash {
    match scheme {
        DigestScheme::Structural => match (left, right) {
            (None, None) => {
                let mut hasher = D::new();
                hasher.update(key);
                hasher.update(value);
                Hash::finish(hasher)
            }
            (Some(left), Some(right)) => Hash::combine::<D>(&left, &right),
            (Some(child), None) | (None, Some(child)) => Hash::digest::<D>(child.as_ref()),
        },
        DigestScheme::Keyed => {
            let tag = u8::from(left.is_some()) | (u8::from(right.is_some()) << 1);

            let mut hasher = D::new();
            hasher.update([tag]);
            hasher.update((key.len() as u64).to_be_bytes());
            hasher.update(key);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(value);
            for child in [left, right].into_iter().flatten() {
                hasher.update(child.as_ref());
            }
            Hash::finish(hasher)
        }
    }
}

/// Dense arena holding every node of a tree.
///
/// Links between nodes are [`NodeId`] handles. Releasing a slot moves the last node into
/// it, so handles stay valid only until the next [`Nodes::release`], which reports the
/// move.
pub(crate) struct Nodes<D> {
    nodes: Vec<Node>,
    scheme: DigestScheme,
    _digest: PhantomData<D>,
}

impl<D> Clone for Nodes<D> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            scheme: self.scheme,
            _digest: PhantomData,
        }
    }
}

impl<D> Index<NodeId> for Nodes<D> {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl<D> IndexMut<NodeId> for Nodes<D> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

impl<D: HashFunction> Nodes<D> {
    pub fn new(scheme: DigestScheme) -> Self {
        Self {
            nodes: Vec::new(),
            scheme,
            _digest: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Allocates a childless node with its digest already computed.
    pub fn leaf(&mut self, parent: Option<NodeId>, key: &[u8], value: &[u8]) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            key: key.to_vec(),
            value: value.to_vec(),
            height: 0,
            hash: Hash::zero(),
            parent,
            left: None,
            right: None,
        });
        self.update_hash(id);
        id
    }

    /// Puts `child` into the empty `side` slot of `parent`.
    pub fn attach(&mut self, parent: NodeId, side: Side, child: NodeId) {
        *self[parent].child_mut(side) = Some(child);
        self[child].parent = Some(parent);
    }

    pub fn search(&self, root: NodeId, key: &[u8]) -> Search {
        let mut current = root;

        loop {
            let node = &self[current];
            let side = match key.cmp(node.key.as_slice()) {
                Ordering::Equal => return Search::Found(current),
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
            };

            match node.child(side) {
                Some(child) => current = child,
                None => return Search::Vacant { parent: current, side },
            }
        }
    }

    /// The descendant of `id` with the smallest key.
    pub fn min(&self, id: NodeId) -> NodeId {
        self.outermost(id, Side::Left)
    }

    /// The descendant of `id` with the largest key.
    pub fn max(&self, id: NodeId) -> NodeId {
        self.outermost(id, Side::Right)
    }

    fn outermost(&self, mut id: NodeId, side: Side) -> NodeId {
        while let Some(child) = self[id].child(side) {
            id = child;
        }
        id
    }

    pub fn height(&self, id: Option<NodeId>) -> i32 {
        id.map_or(-1, |id| self[id].height)
    }

    pub fn update_height(&mut self, id: NodeId) {
        let node = &self[id];
        let height = 1 + self.height(node.left).max(self.height(node.right));
        self[id].height = height;
    }

    /// Right subtree height minus left subtree height.
    pub fn balance(&self, id: NodeId) -> i32 {
        let node = &self[id];
        self.height(node.right) - self.height(node.left)
    }

    pub fn update_hash(&mut self, id: NodeId) {
        let node = &self[id];
        let left = node.left.map(|child| self[child].hash);
        let right = node.right.map(|child| self[child].hash);
        let hash = digest_of::<D>(self.scheme, &node.key, &node.value, left, right);
        self[id].hash = hash;
    }

    /// Recomputes the cached height and digest of `id` from its children.
    pub fn refresh(&mut self, id: NodeId) {
        self.update_height(id);
        self.update_hash(id);
    }

    /// Restores the balance of `id` with a single or double rotation.
    ///
    /// Returns the node now at the top of the subtree `id` was rooted at.
    pub fn rebalance(&mut self, id: NodeId) -> NodeId {
        match self.balance(id) {
            balance if balance > 1 => self.restore(id, Side::Right),
            balance if balance < -1 => self.restore(id, Side::Left),
            _ => id,
        }
    }

    fn restore(&mut self, id: NodeId, heavy: Side) -> NodeId {
        let Some(child) = self[id].child(heavy) else {
            return id;
        };

        let inner_heavy = match heavy {
            Side::Right => self.balance(child) < 0,
            Side::Left => self.balance(child) > 0,
        };
        if inner_heavy {
            self.rotate(child, heavy);
        }

        self.rotate(id, heavy.opposite())
    }

    /// Single rotation of `id` toward `direction`.
    ///
    /// The child on the opposite side is promoted into `id`'s place and `id` adopts the
    /// promoted node's inner child. Returns the promoted node.
    pub fn rotate(&mut self, id: NodeId, direction: Side) -> NodeId {
        let lifted = direction.opposite();
        let Some(up) = self[id].child(lifted) else {
            return id;
        };
        let displaced = self[up].child(direction);

        *self[id].child_mut(lifted) = displaced;
        if let Some(displaced) = displaced {
            self[displaced].parent = Some(id);
        }
        *self[up].child_mut(direction) = Some(id);

        let parent = self[id].parent;
        self[up].parent = parent;
        self[id].parent = Some(up);
        if let Some(parent) = parent {
            self.replace_child(parent, id, Some(up));
        }

        // `up` hashes over `id`, so `id` goes first.
        self.refresh(id);
        self.refresh(up);

        trace!(
            direction = ?direction,
            pivot = %hex::encode(&self[id].key),
            promoted = %hex::encode(&self[up].key),
            "rotated"
        );

        up
    }

    fn replace_child(&mut self, parent: NodeId, old: NodeId, new: Option<NodeId>) {
        let node = &mut self[parent];
        if node.left == Some(old) {
            node.left = new;
        } else if node.right == Some(old) {
            node.right = new;
        }
    }

    /// Structurally removes the entry held by `id`.
    ///
    /// Nothing is rebalanced or rehashed; the caller walks up from [`Splice::parent`].
    /// With two children, the entry closest to `id` on its taller side (right on a tie)
    /// is moved into `id` and that node is removed instead.
    pub fn splice(&mut self, id: NodeId) -> Splice {
        let node = &self[id];
        let (Some(left), Some(right)) = (node.left, node.right) else {
            return self.unlink(id);
        };

        let source = if self.balance(id) >= 0 {
            self.min(right)
        } else {
            self.max(left)
        };

        let key = std::mem::take(&mut self[source].key);
        let value = std::mem::take(&mut self[source].value);
        trace!(
            removed = %hex::encode(&self[id].key),
            replacement = %hex::encode(&key),
            "replacing entry with nearest neighbor"
        );
        self[id].key = key;
        self[id].value = value;

        self.unlink(source)
    }

    /// Detaches a node with at most one child, letting the child take its place.
    fn unlink(&mut self, id: NodeId) -> Splice {
        let node = &self[id];
        let heir = node.left.or(node.right);
        let parent = node.parent;

        if let Some(heir) = heir {
            self[heir].parent = parent;
        }
        if let Some(parent) = parent {
            self.replace_child(parent, id, heir);
        }

        let node = &mut self[id];
        node.parent = None;
        node.left = None;
        node.right = None;

        Splice {
            detached: id,
            parent,
            heir,
        }
    }

    /// Frees the slot of a detached node.
    ///
    /// The last node of the arena is moved into the freed slot and every link to it is
    /// repointed; the move is returned so that handles held outside the arena can follow.
    pub fn release(&mut self, id: NodeId) -> Option<Relocation> {
        let last = NodeId(self.nodes.len() - 1);
        self.nodes.swap_remove(id.0);

        if id == last {
            return None;
        }

        let moved = &self[id];
        let (parent, left, right) = (moved.parent, moved.left, moved.right);
        if let Some(parent) = parent {
            self.replace_child(parent, last, Some(id));
        }
        for child in [left, right].into_iter().flatten() {
            self[child].parent = Some(id);
        }

        Some(Relocation { from: last, to: id })
    }

    /// Every node under `root`, in ascending key order.
    pub fn in_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        let mut current = Some(root);

        loop {
            while let Some(id) = current {
                stack.push(id);
                current = self[id].left;
            }

            match stack.pop() {
                Some(id) => {
                    ordered.push(id);
                    current = self[id].right;
                }
                None => break,
            }
        }

        ordered
    }

    /// One line per node under `root` with its key, value, height and neighbors.
    pub fn render(&self, root: NodeId) -> String {
        let label = |id: Option<NodeId>| {
            id.map_or_else(
                || "nil".to_string(),
                |id| String::from_utf8_lossy(&self[id].key).into_owned(),
            )
        };

        self.in_order(root)
            .into_iter()
            .map(|id| {
                let node = &self[id];
                format!(
                    "key: {} value: {} height: {} parent: {} leftChild: {} rightChild: {}\n",
                    String::from_utf8_lossy(&node.key),
                    String::from_utf8_lossy(&node.value),
                    node.height,
                    label(node.parent),
                    label(node.left),
                    label(node.right),
                )
            })
            .collect()
    }
}

#[cfg(all(test, feature = "sha3"))]
mod tests {
    use super::*;

    type Sha3 = sha3::Sha3_256;

    /// Links three leaves into the chain `a -> b -> c` down the right side.
    fn right_chain() -> (Nodes<Sha3>, NodeId, NodeId, NodeId) {
        let mut nodes = Nodes::<Sha3>::new(DigestScheme::Keyed);
        let a = nodes.leaf(None, b"a", b"vA");
        let b = nodes.leaf(None, b"b", b"vB");
        let c = nodes.leaf(None, b"c", b"vC");
        nodes.attach(a, Side::Right, b);
        nodes.attach(b, Side::Right, c);
        nodes.refresh(b);
        nodes.refresh(a);
        (nodes, a, b, c)
    }

    #[test]
    fn test_heights_and_balance() {
        let (nodes, a, b, c) = right_chain();

        assert_eq!(nodes.height(Some(c)), 0);
        assert_eq!(nodes.height(Some(b)), 1);
        assert_eq!(nodes.height(Some(a)), 2);
        assert_eq!(nodes.height(None), -1);
        assert_eq!(nodes.balance(a), 2);
        assert_eq!(nodes.balance(b), 1);
    }

    #[test]
    fn test_rebalance_right_chain() {
        let (mut nodes, a, b, c) = right_chain();

        let top = nodes.rebalance(a);

        assert_eq!(top, b);
        assert_eq!(nodes[b].parent, None);
        assert_eq!(nodes[b].left, Some(a));
        assert_eq!(nodes[b].right, Some(c));
        assert_eq!(nodes[a].parent, Some(b));
        assert_eq!(nodes.height(Some(b)), 1);
        assert_eq!(nodes.height(Some(a)), 0);
        assert_eq!(nodes.balance(b), 0);
    }

    #[test]
    fn test_double_rotation() {
        // a -> c, c.left = b: the right-left case.
        let mut nodes = Nodes::<Sha3>::new(DigestScheme::Keyed);
        let a = nodes.leaf(None, b"a", b"vA");
        let c = nodes.leaf(None, b"c", b"vC");
        let b = nodes.leaf(None, b"b", b"vB");
        nodes.attach(a, Side::Right, c);
        nodes.attach(c, Side::Left, b);
        nodes.refresh(c);
        nodes.refresh(a);

        let top = nodes.rebalance(a);

        assert_eq!(top, b);
        assert_eq!(nodes[b].left, Some(a));
        assert_eq!(nodes[b].right, Some(c));
        assert_eq!(nodes[c].left, None);
        assert_eq!(nodes[a].right, None);
        assert_eq!(nodes.height(Some(b)), 1);
    }

    #[test]
    fn test_double_rotation_left_right() {
        // c -> a down the left, a.right = b.
        let mut nodes = Nodes::<Sha3>::new(DigestScheme::Keyed);
        let c = nodes.leaf(None, b"c", b"vC");
        let a = nodes.leaf(None, b"a", b"vA");
        let b = nodes.leaf(None, b"b", b"vB");
        nodes.attach(c, Side::Left, a);
        nodes.attach(a, Side::Right, b);
        nodes.refresh(a);
        nodes.refresh(c);
        assert_eq!(nodes.balance(c), -2);
        assert_eq!(nodes.balance(a), 1);

        let top = nodes.rebalance(c);

        assert_eq!(top, b);
        assert_eq!(nodes[b].parent, None);
        assert_eq!(nodes[b].left, Some(a));
        assert_eq!(nodes[b].right, Some(c));
        assert_eq!(nodes[a].parent, Some(b));
        assert_eq!(nodes[c].parent, Some(b));
        assert_eq!(nodes[a].right, None);
        assert_eq!(nodes[c].left, None);
        assert_eq!(nodes.height(Some(b)), 1);
        assert_eq!(nodes.balance(b), 0);
    }

    #[test]
    fn test_rotation_reparents_displaced_child() {
        //     d            b
        //    / \          / \
        //   b   e  ->    a   d
        //  / \              / \
        // a   c            c   e
        let mut nodes = Nodes::<Sha3>::new(DigestScheme::Keyed);
        let d = nodes.leaf(None, b"d", b"");
        let b = nodes.leaf(None, b"b", b"");
        let e = nodes.leaf(None, b"e", b"");
        let a = nodes.leaf(None, b"a", b"");
        let c = nodes.leaf(None, b"c", b"");
        nodes.attach(d, Side::Left, b);
        nodes.attach(d, Side::Right, e);
        nodes.attach(b, Side::Left, a);
        nodes.attach(b, Side::Right, c);
        nodes.refresh(b);
        nodes.refresh(d);

        let top = nodes.rotate(d, Side::Right);

        assert_eq!(top, b);
        assert_eq!(nodes[c].parent, Some(d));
        assert_eq!(nodes[d].left, Some(c));
        assert_eq!(nodes[d].parent, Some(b));
        assert_eq!(nodes[b].right, Some(d));
    }

    #[test]
    fn test_search() {
        let (nodes, a, b, c) = right_chain();

        assert_eq!(nodes.search(a, b"a"), Search::Found(a));
        assert_eq!(nodes.search(a, b"c"), Search::Found(c));
        assert_eq!(
            nodes.search(a, b"bb"),
            Search::Vacant {
                parent: c,
                side: Side::Left
            }
        );
        assert_eq!(
            nodes.search(a, b""),
            Search::Vacant {
                parent: a,
                side: Side::Left
            }
        );
        assert_eq!(nodes.min(a), a);
        assert_eq!(nodes.max(a), c);
        assert_eq!(nodes.max(b), c);
    }

    #[test]
    fn test_structural_digest_rules() {
        let leaf = digest_of::<Sha3>(DigestScheme::Structural, b"k", b"v", None, None);
        assert_eq!(leaf, Hash::digest::<Sha3>(b"kv"));

        let child = Hash::digest::<Sha3>(b"child");
        let other = Hash::digest::<Sha3>(b"other");

        assert_eq!(
            digest_of::<Sha3>(DigestScheme::Structural, b"k", b"v", Some(child), None),
            Hash::digest::<Sha3>(child.as_ref())
        );
        assert_eq!(
            digest_of::<Sha3>(DigestScheme::Structural, b"k", b"v", Some(child), Some(other)),
            Hash::combine::<Sha3>(&child, &other)
        );
        // One-child nodes ignore their own payload under this rule.
        assert_eq!(
            digest_of::<Sha3>(DigestScheme::Structural, b"k", b"v", None, Some(child)),
            digest_of::<Sha3>(DigestScheme::Structural, b"x", b"y", Some(child), None)
        );
    }

    #[test]
    fn test_keyed_digest_binds_payload_and_shape() {
        let child = Hash::digest::<Sha3>(b"child");
        let keyed = |key: &[u8], value: &[u8], left, right| {
            digest_of::<Sha3>(DigestScheme::Keyed, key, value, left, right)
        };

        assert_ne!(keyed(b"ab", b"c", None, None), keyed(b"a", b"bc", None, None));
        assert_ne!(keyed(b"k", b"v", Some(child), None), keyed(b"k", b"w", Some(child), None));
        assert_ne!(keyed(b"k", b"v", Some(child), None), keyed(b"k", b"v", None, Some(child)));

        let mut forged = b"v".to_vec();
        forged.extend_from_slice(child.as_ref());
        assert_ne!(keyed(b"k", &forged, None, None), keyed(b"k", b"v", Some(child), None));
    }

    #[test]
    fn test_splice_two_children_pulls_from_right_on_tie() {
        let (mut nodes, a, b, c) = right_chain();
        assert_eq!(nodes.rebalance(a), b);

        let splice = nodes.splice(b);

        assert_eq!(nodes[b].key, b"c");
        assert_eq!(splice.detached, c);
        assert_eq!(splice.parent, Some(b));
        assert_eq!(splice.heir, None);
        assert_eq!(nodes[b].right, None);
        assert_eq!(nodes[b].left, Some(a));
    }

    #[test]
    fn test_splice_two_children_pulls_from_taller_left() {
        //     d            c
        //    / \          / \
        //   b   e  ->    b   e
        //    \
        //     c
        let mut nodes = Nodes::<Sha3>::new(DigestScheme::Keyed);
        let d = nodes.leaf(None, b"d", b"vD");
        let b = nodes.leaf(None, b"b", b"vB");
        let e = nodes.leaf(None, b"e", b"vE");
        let c = nodes.leaf(None, b"c", b"vC");
        nodes.attach(d, Side::Left, b);
        nodes.attach(d, Side::Right, e);
        nodes.attach(b, Side::Right, c);
        nodes.refresh(b);
        nodes.refresh(d);
        assert_eq!(nodes.balance(d), -1);

        let splice = nodes.splice(d);

        assert_eq!(nodes[d].key, b"c");
        assert_eq!(nodes[d].value, b"vC");
        assert_eq!(splice.detached, c);
        assert_eq!(splice.parent, Some(b));
        assert_eq!(splice.heir, None);
        assert_eq!(nodes[b].right, None);
        assert_eq!(nodes[d].left, Some(b));
        assert_eq!(nodes[d].right, Some(e));
    }

    #[test]
    fn test_release_repoints_moved_node() {
        let (mut nodes, a, b, c) = right_chain();

        // Detach the head and release it; `c` is the last slot and moves into `a`'s.
        let splice = nodes.splice(a);
        assert_eq!(splice.heir, Some(b));
        let relocation = nodes.release(splice.detached);

        assert_eq!(relocation, Some(Relocation { from: c, to: a }));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[b].right, Some(a));
        assert_eq!(nodes[a].key, b"c");
        assert_eq!(nodes[a].parent, Some(b));
    }

    #[test]
    fn test_render_in_order() {
        let (mut nodes, a, _, _) = right_chain();
        let top = nodes.rebalance(a);

        assert_eq!(
            nodes.render(top),
            "key: a value: vA height: 0 parent: b leftChild: nil rightChild: nil\n\
             key: b value: vB height: 1 parent: nil leftChild: a rightChild: c\n\
             key: c value: vC height: 0 parent: b leftChild: nil rightChild: nil\n"
        );
    }
}
