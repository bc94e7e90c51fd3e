//! In-memory key custody.

use crate::error::{AttestationError, AttestationResult};
use crate::ports::{KeyCustody, KeyId};
use parking_lot::RwLock;
use rand::RngCore;
use shared_crypto::{keccak256, Secp256k1KeyPair};
use shared_types::{Address, Hash};
use std::collections::HashMap;

struct CustodyEntry {
    owner: Address,
    key: Secp256k1KeyPair,
}

/// Key custody held in enclave memory.
#[derive(Default)]
pub struct InMemoryKeyCustody {
    keys: RwLock<HashMap<KeyId, CustodyEntry>>,
}

impl InMemoryKeyCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

fn key_label(id: &KeyId) -> String {
    hex::encode(&id[..8])
}

impl KeyCustody for InMemoryKeyCustody {
    fn create_key(&self, owner: Address) -> AttestationResult<KeyId> {
        let key = Secp256k1KeyPair::generate();
        let mut preimage = key.public_key().to_uncompressed();
        preimage.extend_from_slice(&owner);
        let id = keccak256(&preimage);
        self.keys.write().insert(id, CustodyEntry { owner, key });
        Ok(id)
    }

    fn public_key(&self, id: &KeyId) -> AttestationResult<Vec<u8>> {
        self.keys
            .read()
            .get(id)
            .map(|entry| entry.key.public_key().to_uncompressed())
            .ok_or_else(|| AttestationError::KeyNotFound(key_label(id)))
    }

    fn sign(&self, id: &KeyId, caller: Address, prehash: &Hash) -> AttestationResult<[u8; 65]> {
        let keys = self.keys.read();
        let entry = keys
            .get(id)
            .ok_or_else(|| AttestationError::KeyNotFound(key_label(id)))?;
        if entry.owner != caller {
            return Err(AttestationError::PermissionDenied(key_label(id)));
        }
        Ok(*entry.key.sign_recoverable(prehash)?.as_bytes())
    }

    fn is_owner(&self, id: &KeyId, caller: Address) -> bool {
        self.keys
            .read()
            .get(id)
            .map(|entry| entry.owner == caller)
            .unwrap_or(false)
    }

    fn delete_key(&self, id: &KeyId, caller: Address) -> AttestationResult<()> {
        let mut keys = self.keys.write();
        match keys.get(id) {
            None => Err(AttestationError::KeyNotFound(key_label(id))),
            Some(entry) if entry.owner != caller => {
                Err(AttestationError::PermissionDenied(key_label(id)))
            }
            Some(_) => {
                keys.remove(id);
                Ok(())
            }
        }
    }

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut out);
        out
    }
}
