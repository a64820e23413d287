//! One DAO instance: its registry plus every extension deployed for it.
//!
//! Adapters talk to a `Dao`. Calls that span the registry and an extension,
//! such as adding an extension or moving bank funds, go through here so the
//! extension sees the registry it guards itself against.

use std::collections::HashMap;

use num_traits::Zero;
use tracing::info;

use crate::chain::Chain;
use crate::error::{DaoError, DaoResult};
use crate::extensions::{
    BankExtension, Erc1271Extension, ExecutorExtension, Extension, ExtensionInstance,
};
use crate::registry::DaoRegistry;
use crate::types::{ids, AccountRef, Address, Amount, ProposalId, ScopeId, UNITS};

#[derive(Debug, Clone)]
pub struct Dao {
    name: String,
    registry: DaoRegistry,
    deployed: HashMap<Address, ExtensionInstance>,
}

impl Dao {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            registry: DaoRegistry::new(address),
            deployed: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.registry.address()
    }

    pub fn registry(&self) -> &DaoRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DaoRegistry {
        &mut self.registry
    }

    /// Makes a freshly built extension known to this DAO. It still has to be
    /// added under an id before adapters can reach it.
    pub(crate) fn deploy_extension(&mut self, instance: ExtensionInstance) -> Address {
        let address = instance.as_extension().address();
        self.deployed.insert(address, instance);
        address
    }

    pub fn deployed_extension(&self, address: Address) -> Option<&ExtensionInstance> {
        self.deployed.get(&address)
    }

    /// Registers `extension` under `id` and initializes it for `creator`.
    pub fn add_extension(
        &mut self,
        caller: Address,
        id: ScopeId,
        extension: Address,
        creator: Address,
        block: u64,
    ) -> DaoResult<()> {
        let instance = self
            .deployed
            .get(&extension)
            .ok_or(DaoError::ExtensionNotFound)?;
        if instance.as_extension().is_initialized() {
            return Err(DaoError::AlreadyInitialized);
        }
        if !self.registry.is_member(creator) {
            return Err(DaoError::NotAMember(creator));
        }

        self.registry.add_extension(caller, id, extension)?;
        if let Some(instance) = self.deployed.get_mut(&extension) {
            instance
                .as_extension_mut()
                .initialize(&self.registry, creator, block)?;
        }
        Ok(())
    }

    pub fn remove_extension(&mut self, caller: Address, id: ScopeId) -> DaoResult<()> {
        self.registry.remove_extension(caller, id)
    }

    fn extension(&self, id: &ScopeId) -> DaoResult<&ExtensionInstance> {
        let address = self.registry.get_extension_address(id)?;
        self.deployed.get(&address).ok_or(DaoError::ExtensionNotFound)
    }

    fn extension_mut(&mut self, id: &ScopeId) -> DaoResult<(&DaoRegistry, &mut ExtensionInstance)> {
        let address = self.registry.get_extension_address(id)?;
        let instance = self
            .deployed
            .get_mut(&address)
            .ok_or(DaoError::ExtensionNotFound)?;
        Ok((&self.registry, instance))
    }

    pub fn bank(&self) -> DaoResult<&BankExtension> {
        match self.extension(&ids::BANK)? {
            ExtensionInstance::Bank(bank) => Ok(bank),
            _ => Err(DaoError::ExtensionNotFound),
        }
    }

    fn bank_mut(&mut self) -> DaoResult<(&DaoRegistry, &mut BankExtension)> {
        match self.extension_mut(&ids::BANK)? {
            (registry, ExtensionInstance::Bank(bank)) => Ok((registry, bank)),
            _ => Err(DaoError::ExtensionNotFound),
        }
    }

    pub fn executor(&self) -> DaoResult<&ExecutorExtension> {
        match self.extension(&ids::EXECUTOR)? {
            ExtensionInstance::Executor(executor) => Ok(executor),
            _ => Err(DaoError::ExtensionNotFound),
        }
    }

    pub fn erc1271(&self) -> DaoResult<&Erc1271Extension> {
        match self.extension(&ids::ERC1271)? {
            ExtensionInstance::Erc1271(ext) => Ok(ext),
            _ => Err(DaoError::ExtensionNotFound),
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Holds UNITS when a bank is installed, otherwise plain registry
    /// membership. Delegate keys resolve to their member.
    pub fn is_active_member(&self, address: Address) -> bool {
        match self.bank() {
            Ok(bank) => {
                let member = self.registry.get_address_if_delegated(address);
                !bank.balance_of(member, UNITS).is_zero()
            }
            Err(_) => self.registry.is_member(address),
        }
    }

    pub fn sponsor_proposal(
        &mut self,
        caller: Address,
        proposal_id: ProposalId,
        sponsor: Address,
        voting_adapter: Address,
    ) -> DaoResult<()> {
        if !self.is_active_member(sponsor) {
            return Err(DaoError::OnlyMember);
        }
        self.registry
            .sponsor_proposal(caller, proposal_id, sponsor, voting_adapter)
    }

    /// Ends the creation phase. Only active members and adapters may do so.
    pub fn finalize_dao(&mut self, caller: Address) -> DaoResult<()> {
        if !self.is_active_member(caller) && !self.registry.is_adapter(caller) {
            return Err(DaoError::OnlyMember);
        }
        self.registry.finalize()?;
        info!("DAO {} ({}) is ready", self.name, self.address());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bank passthroughs
    // ------------------------------------------------------------------

    pub fn add_to_balance(
        &mut self,
        caller: Address,
        account: AccountRef,
        token: Address,
        amount: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        bank.add_to_balance(registry, caller, account, token, amount, block)
    }

    pub fn subtract_from_balance(
        &mut self,
        caller: Address,
        account: AccountRef,
        token: Address,
        amount: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        bank.subtract_from_balance(registry, caller, account, token, amount, block)
    }

    pub fn internal_transfer(
        &mut self,
        caller: Address,
        from: AccountRef,
        to: AccountRef,
        token: Address,
        amount: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        bank.internal_transfer(registry, caller, from, to, token, amount, block)
    }

    pub fn withdraw(
        &mut self,
        chain: &mut Chain,
        caller: Address,
        account: Address,
        token: Address,
        amount: &Amount,
    ) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        bank.withdraw(registry, chain, caller, account, token, amount)
    }

    pub fn register_potential_new_token(&mut self, caller: Address, token: Address) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        bank.register_potential_new_token(registry, caller, token)
    }

    pub fn register_potential_new_internal_token(
        &mut self,
        caller: Address,
        token: Address,
    ) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        bank.register_potential_new_internal_token(registry, caller, token)
    }

    /// Reconciles the ledger with what the bank holds on `chain`.
    pub fn update_token(&mut self, chain: &Chain, caller: Address, token: Address) -> DaoResult<()> {
        let (registry, bank) = self.bank_mut()?;
        let held = chain.balance_of(bank.address(), token);
        bank.update_token(registry, caller, token, &held, chain.block_number())
    }

    // ------------------------------------------------------------------
    // Executor and ERC1271 passthroughs
    // ------------------------------------------------------------------

    /// Runs `action` with the executor's address as the acting sender.
    pub fn execute<T>(
        &mut self,
        caller: Address,
        action: impl FnOnce(&mut Dao, Address) -> DaoResult<T>,
    ) -> DaoResult<T> {
        let executor = self.executor()?.authorize(&self.registry, caller)?;
        action(self, executor)
    }

    pub fn sign(
        &mut self,
        caller: Address,
        permission_hash: [u8; 32],
        signature_hash: [u8; 32],
        magic_value: u32,
    ) -> DaoResult<()> {
        match self.extension_mut(&ids::ERC1271)? {
            (registry, ExtensionInstance::Erc1271(ext)) => {
                ext.sign(registry, caller, permission_hash, signature_hash, magic_value)
            }
            _ => Err(DaoError::ExtensionNotFound),
        }
    }
}
