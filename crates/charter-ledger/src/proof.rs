//! Completeness proofs over the full ledger history.
//!
//! Proofs cover every stored event, orphans included: orphaning hides events
//! from default reads but never takes them out of the chain. None of these
//! reads consult the halt flag.

use std::sync::Arc;

use charter_canonical::{Digest, Timestamp};
use charter_core::{merkle_root, verify_chain_report, ChainBreak, Event, MerkleProof, MerkleTree};
use charter_store::EventStore;
use serde::{Deserialize, Serialize};

use crate::errors::LedgerError;

/// Summary of a full-chain verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChainProof {
    /// Hash of sequence 1, if any event exists.
    pub genesis_hash: Option<Digest>,
    /// Hash of the newest event.
    pub latest_hash: Option<Digest>,
    /// Events covered.
    pub total_count: u64,
    /// Whether every link verified.
    pub chain_valid: bool,
    /// First failure, when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_break: Option<ChainBreak>,
}

/// Hash chain proof plus Merkle root, optionally with one inclusion path.
///
/// The root and the path are cut from the same snapshot, so the path always
/// verifies against the root it travels with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessProof {
    /// Chain summary.
    pub hash_chain_proof: HashChainProof,
    /// Root over every event hash in sequence order.
    pub merkle_root: Digest,
    /// Leaves under `merkle_root`.
    pub leaf_count: u64,
    /// Inclusion path for the requested event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness_path: Option<MerkleProof>,
    /// When the proof was generated.
    pub generated_at: Timestamp,
}

/// Read-only proof generator.
pub struct ProofGenerator {
    store: Arc<EventStore>,
}

impl ProofGenerator {
    /// Creates a generator over `store`.
    pub fn new(store: Arc<EventStore>) -> Self {
        Self { store }
    }

    fn snapshot(&self) -> Vec<Event> {
        self.store.read_range(1, u64::MAX, true)
    }

    /// Walks the full range and verifies continuity.
    pub fn generate_hash_chain_proof(&self) -> HashChainProof {
        hash_chain_proof(&self.snapshot(), &self.store)
    }

    /// Merkle root over `events` in the order given.
    pub fn generate_merkle_root(&self, events: &[Event]) -> Result<Digest, LedgerError> {
        let hashes: Vec<Digest> = events.iter().map(|e| e.event_hash.clone()).collect();
        Ok(merkle_root(&hashes)?)
    }

    /// Inclusion path for the event at `sequence` in the tree over all events.
    pub fn generate_inclusion_proof(&self, sequence: u64) -> Result<MerkleProof, LedgerError> {
        let events = self.snapshot();
        let (tree, proof) = inclusion(&events, sequence)?;
        debug_assert!(charter_core::verify_inclusion(&proof, &tree.root()));
        Ok(proof)
    }

    /// Chain proof and Merkle root, plus an inclusion path when `sequence` is given.
    pub fn generate_completeness_proof(
        &self,
        sequence: Option<u64>,
    ) -> Result<CompletenessProof, LedgerError> {
        let events = self.snapshot();
        let hash_chain_proof = hash_chain_proof(&events, &self.store);

        let (tree, witness_path) = match sequence {
            Some(sequence) => {
                let (tree, proof) = inclusion(&events, sequence)?;
                (tree, Some(proof))
            }
            None => {
                let hashes: Vec<Digest> = events.iter().map(|e| e.event_hash.clone()).collect();
                (MerkleTree::from_event_hashes(&hashes)?, None)
            }
        };

        Ok(CompletenessProof {
            hash_chain_proof,
            merkle_root: tree.root(),
            leaf_count: tree.leaf_count(),
            witness_path,
            generated_at: Timestamp::now(),
        })
    }
}

fn hash_chain_proof(events: &[Event], store: &EventStore) -> HashChainProof {
    let report = verify_chain_report(events, store.canonicalizer());
    HashChainProof {
        genesis_hash: events.first().map(|e| e.event_hash.clone()),
        latest_hash: events.last().map(|e| e.event_hash.clone()),
        total_count: events.len() as u64,
        chain_valid: report.is_valid(),
        first_break: report.first_break,
    }
}

fn inclusion(events: &[Event], sequence: u64) -> Result<(MerkleTree, MerkleProof), LedgerError> {
    let hashes: Vec<Digest> = events.iter().map(|e| e.event_hash.clone()).collect();
    let tree = MerkleTree::from_event_hashes(&hashes)?;
    let index = sequence
        .checked_sub(1)
        .filter(|i| *i < tree.leaf_count())
        .ok_or(LedgerError::EventNotFound { sequence })?;
    let proof = tree
        .proof(index, &hashes[index as usize])
        .ok_or(LedgerError::EventNotFound { sequence })?;
    Ok((tree, proof))
}
