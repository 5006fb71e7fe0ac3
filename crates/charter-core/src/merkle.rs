//! Balanced binary Merkle tree over event hashes.
//!
//! Leaves are `sha256(LEAF_DOMAIN || event_hash)` and inner nodes are
//! `sha256(NODE_DOMAIN || left || right)`. A level with an odd number of nodes
//! pairs its last node with itself, so a tree over `n` leaves has
//! `ceil(log2(n))` levels above the leaves.

use charter_canonical::{hash_parts, Digest, DIGEST_LEN};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Domain separator for leaf hashes.
pub const LEAF_DOMAIN: &[u8] = b"charter:merkle:leaf:v1\0";
/// Domain separator for inner nodes.
pub const NODE_DOMAIN: &[u8] = b"charter:merkle:node:v1\0";
/// Domain separator for the root of an empty tree.
pub const EMPTY_DOMAIN: &[u8] = b"charter:merkle:empty:v1\0";

type Node = [u8; DIGEST_LEN];

/// Side on which a sibling sits relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Sibling is the left operand.
    Left,
    /// Sibling is the right operand.
    Right,
}

/// One level of a witness path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Sibling node hash at this level.
    pub sibling: Digest,
    /// Where the sibling sits.
    pub position: Position,
}

/// Inclusion proof for a single event hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Zero-based leaf index.
    pub leaf_index: u64,
    /// Number of leaves in the tree the proof was cut from.
    pub leaf_count: u64,
    /// The event hash being proven.
    pub event_hash: Digest,
    /// Sibling path from the leaf to the root.
    pub path: Vec<ProofStep>,
}

/// Merkle tree holding every level, leaves first.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    levels: Vec<Vec<Node>>,
}

fn leaf_hash(event_hash: &Node) -> Node {
    hash_parts(LEAF_DOMAIN, &[event_hash])
}

fn node_hash(left: &Node, right: &Node) -> Node {
    hash_parts(NODE_DOMAIN, &[left, right])
}

impl MerkleTree {
    /// Builds a tree over ordered event hashes.
    pub fn from_event_hashes(hashes: &[Digest]) -> Result<Self, CoreError> {
        let mut leaves = Vec::with_capacity(hashes.len());
        for hash in hashes {
            leaves.push(leaf_hash(&hash.to_bytes()?));
        }

        let mut levels = vec![leaves];
        while levels.last().map_or(false, |level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                next.push(node_hash(left, right));
            }
            levels.push(next);
        }

        Ok(Self { levels })
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Number of levels above the leaves.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Root digest; an empty tree has a fixed, domain-separated root.
    pub fn root(&self) -> Digest {
        match self.levels.last().and_then(|level| level.first()) {
            Some(root) => Digest::from_bytes(root),
            None => Digest::from_bytes(&hash_parts(EMPTY_DOMAIN, &[])),
        }
    }

    /// Builds the witness path for the leaf at `index`.
    pub fn proof(&self, index: u64, event_hash: &Digest) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut path = Vec::with_capacity(self.depth());
        let mut i = index as usize;
        for level in &self.levels[..self.depth()] {
            let sibling_index = i ^ 1;
            let sibling = level.get(sibling_index).unwrap_or(&level[i]);
            let position = if i % 2 == 0 {
                Position::Right
            } else {
                Position::Left
            };
            path.push(ProofStep {
                sibling: Digest::from_bytes(sibling),
                position,
            });
            i /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            leaf_count: self.leaf_count(),
            event_hash: event_hash.clone(),
            path,
        })
    }
}

/// Root of the tree over `hashes`.
pub fn merkle_root(hashes: &[Digest]) -> Result<Digest, CoreError> {
    Ok(MerkleTree::from_event_hashes(hashes)?.root())
}

/// Checks an inclusion proof against a published root.
///
/// Needs nothing but the proof and the root: the leaf hash is recomputed from
/// the event hash and folded up the path. Positions must agree with the bits
/// of `leaf_index`, and the path length must match `leaf_count`.
pub fn verify_inclusion(proof: &MerkleProof, root: &Digest) -> bool {
    if proof.leaf_index >= proof.leaf_count {
        return false;
    }
    if proof.path.len() != expected_depth(proof.leaf_count) {
        return false;
    }
    let Ok(event_hash) = proof.event_hash.to_bytes() else {
        return false;
    };

    let mut current = leaf_hash(&event_hash);
    for (level, step) in proof.path.iter().enumerate() {
        let expected = if (proof.leaf_index >> level) & 1 == 0 {
            Position::Right
        } else {
            Position::Left
        };
        if step.position != expected {
            return false;
        }
        let Ok(sibling) = step.sibling.to_bytes() else {
            return false;
        };
        current = match step.position {
            Position::Right => node_hash(&current, &sibling),
            Position::Left => node_hash(&sibling, &current),
        };
    }

    Digest::from_bytes(&current) == *root
}

fn expected_depth(leaf_count: u64) -> usize {
    let mut depth = 0;
    let mut width = leaf_count;
    while width > 1 {
        width = (width + 1) / 2;
        depth += 1;
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hashes(n: u8) -> Vec<Digest> {
        (0..n).map(|i| Digest::from_bytes(&[i; 32])).collect()
    }

    #[test]
    fn single_leaf_root_is_leaf_hash() {
        let h = hashes(1);
        let tree = MerkleTree::from_event_hashes(&h).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), Digest::from_bytes(&leaf_hash(&[0; 32])));
        let proof = tree.proof(0, &h[0]).unwrap();
        assert!(proof.path.is_empty());
        assert!(verify_inclusion(&proof, &tree.root()));
    }

    #[test]
    fn empty_tree_has_fixed_root() {
        let tree = MerkleTree::from_event_hashes(&[]).unwrap();
        assert_eq!(tree.root(), merkle_root(&[]).unwrap());
        assert!(tree.proof(0, &Digest::zero()).is_none());
    }

    #[test]
    fn odd_level_duplicates_last_node() {
        let h = hashes(3);
        let tree = MerkleTree::from_event_hashes(&h).unwrap();
        let l: Vec<Node> = h.iter().map(|d| leaf_hash(&d.to_bytes().unwrap())).collect();
        let left = node_hash(&l[0], &l[1]);
        let right = node_hash(&l[2], &l[2]);
        assert_eq!(tree.root(), Digest::from_bytes(&node_hash(&left, &right)));
    }

    #[test]
    fn depth_is_ceil_log2() {
        for (n, depth) in [(2u8, 1usize), (4, 2), (5, 3), (7, 3), (8, 3), (9, 4)] {
            let tree = MerkleTree::from_event_hashes(&hashes(n)).unwrap();
            assert_eq!(tree.depth(), depth, "n = {}", n);
            assert_eq!(expected_depth(n as u64), depth);
        }
    }

    #[test]
    fn rejects_swapped_positions() {
        let h = hashes(4);
        let tree = MerkleTree::from_event_hashes(&h).unwrap();
        let mut proof = tree.proof(1, &h[1]).unwrap();
        proof.path[0].position = Position::Right;
        assert!(!verify_inclusion(&proof, &tree.root()));
    }
}
