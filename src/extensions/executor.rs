use tracing::info;

use super::{check_access, check_initialize, Extension};
use crate::acl::ExecutorFlag;
use crate::error::DaoResult;
use crate::registry::DaoRegistry;
use crate::types::Address;

/// Runs actions on behalf of authorized adapters with its own address as
/// the effective sender.
#[derive(Debug, Clone)]
pub struct ExecutorExtension {
    address: Address,
    dao: Address,
    initialized: bool,
}

impl ExecutorExtension {
    pub fn new(address: Address, dao: Address) -> Self {
        Self {
            address,
            dao,
            initialized: false,
        }
    }

    /// Checks that `caller` may execute through this extension.
    pub fn authorize(&self, registry: &DaoRegistry, caller: Address) -> DaoResult<Address> {
        check_access(
            registry,
            self.address,
            self.dao,
            self.initialized,
            caller,
            ExecutorFlag::Execute,
        )?;
        info!("executor {} acting for {}", self.address, caller);
        Ok(self.address)
    }
}

impl Extension for ExecutorExtension {
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
