//! Factories that stand up DAOs and the extensions bound to them. Each
//! factory only remembers what it created; instances never share state.

use std::collections::HashMap;

use tracing::info;

use crate::acl::{DaoFlag, Flags};
use crate::chain::{Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::extensions::bank::validate_max_external_tokens;
use crate::extensions::{BankExtension, Erc1271Extension, ExecutorExtension, ExtensionInstance};
use crate::types::{Address, ScopeId};

/// One adapter to install through [`DaoFactory::add_adapters`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterEntry {
    pub id: ScopeId,
    pub address: Address,
    pub flags: Flags<DaoFlag>,
}

#[derive(Debug, Clone, Default)]
pub struct DaoFactory {
    daos: HashMap<String, Address>,
}

impl DaoFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a DAO under a unique `name`. The creator and the caller become
    /// its first members.
    pub fn create_dao(
        &mut self,
        chain: &mut Chain,
        msg: &Msg,
        name: &str,
        creator: Address,
    ) -> DaoResult<Dao> {
        if self.daos.contains_key(name) {
            return Err(DaoError::DaoNameTaken(name.to_string()));
        }
        let address = chain.next_address("dao");
        let mut dao = Dao::new(name, address);
        dao.registry_mut().initialize(creator, msg.sender)?;
        self.daos.insert(name.to_string(), address);
        info!("DAO '{}' created at {} by {}", name, address, creator);
        Ok(dao)
    }

    /// Zero when no DAO was created under `name`.
    pub fn get_dao_address(&self, name: &str) -> Address {
        self.daos.get(name).copied().unwrap_or(Address::ZERO)
    }

    pub fn add_adapters(&self, dao: &mut Dao, msg: &Msg, entries: &[AdapterEntry]) -> DaoResult<()> {
        if !dao.registry().is_member(msg.sender) {
            return Err(DaoError::OnlyMember);
        }
        for entry in entries {
            dao.registry_mut()
                .replace_adapter(msg.sender, entry.id, entry.address, entry.flags, &[], &[])?;
        }
        Ok(())
    }

    /// Grants each `(adapter, flags)` pair access to `extension`.
    pub fn configure_extension(
        &self,
        dao: &mut Dao,
        msg: &Msg,
        extension: Address,
        entries: &[(Address, u128)],
    ) -> DaoResult<()> {
        if !dao.registry().is_member(msg.sender) {
            return Err(DaoError::OnlyMember);
        }
        for (adapter, flags) in entries {
            dao.registry_mut()
                .set_acl_to_extension_for_adapter(msg.sender, extension, *adapter, *flags)?;
        }
        Ok(())
    }
}

/// Creates banks, at most one tracked per DAO.
#[derive(Debug, Clone, Default)]
pub struct BankFactory {
    created: HashMap<Address, Address>,
}

impl BankFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, dao: &mut Dao, chain: &mut Chain, max_external_tokens: u8) -> DaoResult<Address> {
        validate_max_external_tokens(max_external_tokens)?;
        let address = chain.next_address("bank");
        let bank = BankExtension::new(address, dao.address(), max_external_tokens)?;
        dao.deploy_extension(ExtensionInstance::Bank(bank));
        self.created.insert(dao.address(), address);
        info!("bank {} created for DAO {}", address, dao.address());
        Ok(address)
    }

    pub fn get_extension_address(&self, dao: Address) -> Address {
        self.created.get(&dao).copied().unwrap_or(Address::ZERO)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorFactory {
    created: HashMap<Address, Address>,
}

impl ExecutorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, dao: &mut Dao, chain: &mut Chain) -> Address {
        let address = chain.next_address("executor");
        dao.deploy_extension(ExtensionInstance::Executor(ExecutorExtension::new(
            address,
            dao.address(),
        )));
        self.created.insert(dao.address(), address);
        info!("executor {} created for DAO {}", address, dao.address());
        address
    }

    pub fn get_extension_address(&self, dao: Address) -> Address {
        self.created.get(&dao).copied().unwrap_or(Address::ZERO)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Erc1271Factory {
    created: HashMap<Address, Address>,
}

impl Erc1271Factory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, dao: &mut Dao, chain: &mut Chain) -> Address {
        let address = chain.next_address("erc1271");
        dao.deploy_extension(ExtensionInstance::Erc1271(Erc1271Extension::new(
            address,
            dao.address(),
        )));
        self.created.insert(dao.address(), address);
        info!("erc1271 {} created for DAO {}", address, dao.address());
        address
    }

    pub fn get_extension_address(&self, dao: Address) -> Address {
        self.created.get(&dao).copied().unwrap_or(Address::ZERO)
    }
}
