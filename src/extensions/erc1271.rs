use std::collections::HashMap;

use tracing::info;

use super::{check_access, check_initialize, Extension};
use crate::acl::Erc1271Flag;
use crate::error::{DaoError, DaoResult};
use crate::registry::DaoRegistry;
use crate::types::{sha256, Address};

pub const MAGIC_VALUE: u32 = 0x1626_ba7e;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaoSignature {
    pub signature_hash: [u8; 32],
    pub magic_value: u32,
}

/// Stores messages the DAO has approved so the DAO can act as a contract
/// signer.
#[derive(Debug, Clone)]
pub struct Erc1271Extension {
    address: Address,
    dao: Address,
    initialized: bool,
    signatures: HashMap<[u8; 32], DaoSignature>,
}

impl Erc1271Extension {
    pub fn new(address: Address, dao: Address) -> Self {
        Self {
            address,
            dao,
            initialized: false,
            signatures: HashMap::new(),
        }
    }

    pub fn sign(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        permission_hash: [u8; 32],
        signature_hash: [u8; 32],
        magic_value: u32,
    ) -> DaoResult<()> {
        check_access(
            registry,
            self.address,
            self.dao,
            self.initialized,
            caller,
            Erc1271Flag::Sign,
        )?;
        self.signatures.insert(
            permission_hash,
            DaoSignature {
                signature_hash,
                magic_value,
            },
        );
        info!("erc1271 {} signed {}", self.address, hex::encode(permission_hash));
        Ok(())
    }

    /// Returns the stored magic value when `signature` hashes to the approved
    /// signature hash.
    pub fn is_valid_signature(&self, permission_hash: [u8; 32], signature: &[u8]) -> DaoResult<u32> {
        let entry = self
            .signatures
            .get(&permission_hash)
            .filter(|entry| entry.magic_value != 0)
            .ok_or(DaoError::InvalidSignature)?;
        if entry.signature_hash != sha256(signature) {
            return Err(DaoError::InvalidSignatureHash);
        }
        Ok(entry.magic_value)
    }
}

impl Extension for Erc1271Extension {
    fn address(&self) -> Address {
        self.address
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn initialize(&mut self, registry: &DaoRegistry, creator: Address, _block: u64) -> DaoResult<()> {
        check_initialize(registry, self.dao, self.initialized, creator)?;
        self.initialized = true;
        Ok(())
    }
}
