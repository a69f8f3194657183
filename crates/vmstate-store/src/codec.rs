use vmstate_types::{DeclaredType, MemPackage, Object};

use crate::error::{StoreError, StoreResult};

const OBJECT_HASH_DOMAIN: &[u8] = b"vmstate-object-v1:";

pub fn encode_package(pkg: &MemPackage) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(pkg).map_err(|e| StoreError::Codec(e.to_string()))
}

pub fn decode_package(bytes: &[u8]) -> StoreResult<MemPackage> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

pub fn encode_type(ty: &DeclaredType) -> StoreResult<Vec<u8>> {
    bincode::serialize(ty).map_err(|e| StoreError::Codec(e.to_string()))
}

pub fn decode_type(bytes: &[u8]) -> StoreResult<DeclaredType> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))
}

pub fn encode_object(obj: &Object) -> StoreResult<Vec<u8>> {
    bincode::serialize(obj).map_err(|e| StoreError::Codec(e.to_string()))
}

/// Decode an object. Map lookup indexes are rebuilt.
pub fn decode_object(bytes: &[u8]) -> StoreResult<Object> {
    let mut obj: Object =
        bincode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
    if let Object::Map(m) = &mut obj {
        m.rebuild_index();
    }
    Ok(obj)
}

/// Domain-separated BLAKE3 hash of encoded object bytes.
pub fn object_hash(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(OBJECT_HASH_DOMAIN);
    hasher.update(bytes);
    *hasher.finalize().as_bytes()
}
