use tracing::info;

use super::{require_active_member, Adapter};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::DaoResult;
use crate::types::{ids, Address};

/// Lets members manage their own registry entry.
#[derive(Debug, Clone)]
pub struct DaoRegistryAdapter {
    address: Address,
}

impl DaoRegistryAdapter {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Points the calling member's delegate key at `new_key`. The call may
    /// come from the member address or from its current delegate.
    pub fn update_delegate_key(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        msg: &Msg,
        new_key: Address,
    ) -> DaoResult<()> {
        require_active_member(dao, msg.sender)?;
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            let registry = dao.registry_mut();
            let member = registry.get_address_if_delegated(msg.sender);
            registry.update_delegate_key(adapter, member, new_key, chain.block_number())?;
            info!("delegate key of {} is now {}", member, new_key);
            Ok(())
        })
    }
}

impl Adapter for DaoRegistryAdapter {
    fn name(&self) -> &'static str {
        ids::DAO_REGISTRY_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
