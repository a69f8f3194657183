//! Binary Merkle root over ordered store entries.
//!
//! Only the root is computed here; proofs are the concern of the embedding
//! chain. Hashing is domain-separated BLAKE3 so a leaf can never be
//! confused with an interior node.

/// Hash of one key/value entry.
///
/// The key is length-prefixed so `("ab", "c")` and `("a", "bc")` differ.
pub fn leaf_hash(key: &[u8], value: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"vmstate-leaf-v1:");
    hasher.update(&(key.len() as u64).to_be_bytes());
    hasher.update(key);
    hasher.update(value);
    *hasher.finalize().as_bytes()
}

/// Root of the binary tree over `leaves`.
///
/// An empty list produces the all-zero root. A single leaf is its own root.
/// An odd node at any level is paired with itself.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => hash_pair(left, right),
                [single] => hash_pair(single, single),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }
    level[0]
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"vmstate-node-v1:");
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}
