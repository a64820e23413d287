//! DAO registry: members and delegate keys, the adapter and extension
//! directories, ACL flags, proposal lifecycle, governance roles and the
//! configuration store. One registry per DAO; nothing is shared between DAOs.

use std::collections::{HashMap, HashSet};

use num_traits::Zero;
use tracing::{debug, info, warn};

use crate::acl::{flag_enum, has_flag, DaoFlag, Flag, Flags};
use crate::error::{DaoError, DaoResult};
use crate::types::{Address, Amount, ProposalId, ScopeId};

flag_enum! {
    /// Lifecycle bits of a proposal.
    pub enum ProposalFlag {
        Exists => "EXISTS",
        Sponsored => "SPONSORED",
        Processed => "PROCESSED",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaoState {
    Creation,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Adapter that submitted the proposal; only it may move the lifecycle on.
    pub adapter: Address,
    pub flags: Flags<ProposalFlag>,
    pub vetoed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateCheckpoint {
    pub from_block: u64,
    pub delegate_key: Address,
}

#[derive(Debug, Clone)]
struct AdapterEntry {
    id: ScopeId,
    acl: Flags<DaoFlag>,
}

#[derive(Debug, Clone)]
struct ExtensionEntry {
    id: ScopeId,
    deleted: bool,
    /// adapter -> raw flag bits for this extension's own permission set
    acl: HashMap<Address, u128>,
}

#[derive(Debug, Clone)]
pub struct DaoRegistry {
    address: Address,
    state: DaoState,
    initialized: bool,

    members: HashSet<Address>,
    member_list: Vec<Address>,
    member_by_delegate: HashMap<Address, Address>,
    delegate_checkpoints: HashMap<Address, Vec<DelegateCheckpoint>>,

    proposals: HashMap<ProposalId, Proposal>,
    voting_adapters: HashMap<ProposalId, Address>,

    adapter_ids: HashMap<ScopeId, Address>,
    adapters: HashMap<Address, AdapterEntry>,
    extension_ids: HashMap<ScopeId, Address>,
    extensions: HashMap<Address, ExtensionEntry>,

    vetoers: HashSet<Address>,
    service_providers: HashSet<Address>,

    main_config: HashMap<ScopeId, Amount>,
    address_config: HashMap<ScopeId, Address>,
}

impl DaoRegistry {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: DaoState::Creation,
            initialized: false,
            members: HashSet::new(),
            member_list: Vec::new(),
            member_by_delegate: HashMap::new(),
            delegate_checkpoints: HashMap::new(),
            proposals: HashMap::new(),
            voting_adapters: HashMap::new(),
            adapter_ids: HashMap::new(),
            adapters: HashMap::new(),
            extension_ids: HashMap::new(),
            extensions: HashMap::new(),
            vetoers: HashSet::new(),
            service_providers: HashSet::new(),
            main_config: HashMap::new(),
            address_config: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state(&self) -> DaoState {
        self.state
    }

    /// Registers the creator and the payer as the first members.
    pub fn initialize(&mut self, creator: Address, payer: Address) -> DaoResult<()> {
        if self.initialized {
            return Err(DaoError::AlreadyInitialized);
        }
        if creator.is_zero() {
            return Err(DaoError::InvalidMemberAddress(creator));
        }
        self.initialized = true;
        self.add_member(creator)?;
        if !payer.is_zero() && payer != creator {
            self.add_member(payer)?;
        }
        info!("DAO {} initialized by {}", self.address, creator);
        Ok(())
    }

    pub(crate) fn finalize(&mut self) -> DaoResult<()> {
        if self.state == DaoState::Ready {
            return Err(DaoError::DaoAlreadyFinalized);
        }
        self.state = DaoState::Ready;
        info!("DAO {} finalized", self.address);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Access control
    // ------------------------------------------------------------------

    /// While in creation, the first members and the adapters may configure
    /// the DAO without holding any flag.
    pub fn in_creation_mode_with_access(&self, caller: Address) -> bool {
        self.state == DaoState::Creation
            && (self.member_list.is_empty() || self.is_member(caller) || self.is_adapter(caller))
    }

    pub fn has_access(&self, caller: Address, flag: DaoFlag) -> bool {
        self.in_creation_mode_with_access(caller)
            || self
                .adapters
                .get(&caller)
                .map_or(false, |entry| entry.acl.has(flag))
    }

    fn require_access(&self, caller: Address, flag: DaoFlag) -> DaoResult<()> {
        if self.has_access(caller, flag) {
            Ok(())
        } else {
            Err(DaoError::AccessDenied {
                caller,
                permission: flag.name(),
            })
        }
    }

    pub fn has_adapter_access(&self, adapter: Address, flag: DaoFlag) -> bool {
        self.adapters
            .get(&adapter)
            .map_or(false, |entry| entry.acl.has(flag))
    }

    pub fn has_adapter_access_to_extension(
        &self,
        adapter: Address,
        extension: Address,
        flag_bit: u8,
    ) -> bool {
        self.is_adapter(adapter)
            && self
                .extensions
                .get(&extension)
                .and_then(|entry| entry.acl.get(&adapter))
                .map_or(false, |bits| has_flag(*bits, flag_bit))
    }

    // ------------------------------------------------------------------
    // Members and delegate keys
    // ------------------------------------------------------------------

    fn add_member(&mut self, member: Address) -> DaoResult<bool> {
        if self.members.contains(&member) {
            return Ok(false);
        }
        if self.member_by_delegate.contains_key(&member) {
            return Err(DaoError::AddressAlreadyTakenAsDelegatedKey);
        }
        self.members.insert(member);
        self.member_by_delegate.insert(member, member);
        self.member_list.push(member);
        info!("new member {} in DAO {}", member, self.address);
        Ok(true)
    }

    /// Adds `member` if unknown. Returns whether it was new.
    pub fn potential_new_member(&mut self, caller: Address, member: Address) -> DaoResult<bool> {
        self.require_access(caller, DaoFlag::NewMember)?;
        if member.is_zero() {
            return Err(DaoError::InvalidMemberAddress(member));
        }
        if member.is_reserved() {
            return Err(DaoError::ReservedAddress(member));
        }
        self.add_member(member)
    }

    /// True for members and for active delegate keys of members.
    pub fn is_member(&self, address: Address) -> bool {
        self.members.contains(&address)
            || self
                .member_by_delegate
                .get(&address)
                .map_or(false, |member| self.members.contains(member))
    }

    pub fn get_address_if_delegated(&self, address: Address) -> Address {
        self.member_by_delegate
            .get(&address)
            .copied()
            .unwrap_or(address)
    }

    pub fn get_current_delegate_key(&self, member: Address) -> Address {
        self.delegate_checkpoints
            .get(&member)
            .and_then(|checkpoints| checkpoints.last())
            .map_or(member, |cp| cp.delegate_key)
    }

    /// Delegate key in force at the end of `block`.
    pub fn get_prior_delegate_key(&self, member: Address, block: u64) -> Address {
        let Some(checkpoints) = self.delegate_checkpoints.get(&member) else {
            return member;
        };
        let idx = checkpoints.partition_point(|cp| cp.from_block <= block);
        if idx == 0 {
            member
        } else {
            checkpoints[idx - 1].delegate_key
        }
    }

    pub fn update_delegate_key(
        &mut self,
        caller: Address,
        member: Address,
        new_key: Address,
        block: u64,
    ) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::UpdateDelegateKey)?;
        if new_key.is_zero() {
            return Err(DaoError::InvalidAddress(new_key.to_string()));
        }
        if new_key != member {
            // A member's own address stays bound to that member.
            if self.member_by_delegate.contains_key(&new_key) || self.members.contains(&new_key) {
                return Err(DaoError::CannotOverwriteExistingDelegatedKey);
            }
        } else if self.member_by_delegate.contains_key(&member) {
            return Err(DaoError::AddressAlreadyTakenAsDelegatedKey);
        }
        if !self.members.contains(&member) {
            return Err(DaoError::NotAMember(member));
        }

        let previous = self.get_current_delegate_key(member);
        self.member_by_delegate.remove(&previous);
        self.member_by_delegate.insert(new_key, member);

        let checkpoints = self.delegate_checkpoints.entry(member).or_default();
        match checkpoints.last_mut() {
            Some(last) if last.from_block == block => last.delegate_key = new_key,
            _ => checkpoints.push(DelegateCheckpoint {
                from_block: block,
                delegate_key: new_key,
            }),
        }
        info!("member {} delegated to {}", member, new_key);
        Ok(())
    }

    pub fn nb_members(&self) -> usize {
        self.member_list.len()
    }

    pub fn get_member_address(&self, index: usize) -> Option<Address> {
        self.member_list.get(index).copied()
    }

    pub fn members(&self) -> &[Address] {
        &self.member_list
    }

    // ------------------------------------------------------------------
    // Proposals
    // ------------------------------------------------------------------

    pub fn submit_proposal(&mut self, caller: Address, proposal_id: ProposalId) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::SubmitProposal)?;
        if proposal_id.is_zero() {
            return Err(DaoError::ProposalIdInvalid);
        }
        if self.proposals.contains_key(&proposal_id) {
            return Err(DaoError::ProposalIdMustBeUnique(proposal_id));
        }
        self.proposals.insert(
            proposal_id,
            Proposal {
                adapter: caller,
                flags: Flags::of(&[ProposalFlag::Exists]),
                vetoed: false,
            },
        );
        info!("proposal {} submitted by adapter {}", proposal_id, caller);
        Ok(())
    }

    fn proposal_for_adapter(
        &self,
        caller: Address,
        proposal_id: ProposalId,
    ) -> DaoResult<&Proposal> {
        let proposal = self
            .proposals
            .get(&proposal_id)
            .ok_or(DaoError::ProposalDoesNotExist)?;
        if proposal.adapter != caller {
            return Err(DaoError::AdapterMismatch);
        }
        Ok(proposal)
    }

    /// Membership of `sponsor` is checked by the caller.
    pub(crate) fn sponsor_proposal(
        &mut self,
        caller: Address,
        proposal_id: ProposalId,
        sponsor: Address,
        voting_adapter: Address,
    ) -> DaoResult<()> {
        let proposal = self.proposal_for_adapter(caller, proposal_id)?;
        if proposal.flags.has(ProposalFlag::Sponsored) {
            return Err(DaoError::FlagAlreadySet(ProposalFlag::Sponsored.name()));
        }
        if proposal.flags.has(ProposalFlag::Processed) {
            return Err(DaoError::FlagAlreadySet(ProposalFlag::Processed.name()));
        }
        if let Some(proposal) = self.proposals.get_mut(&proposal_id) {
            proposal.flags.insert(ProposalFlag::Sponsored);
        }
        self.voting_adapters.insert(proposal_id, voting_adapter);
        info!("proposal {} sponsored by {}", proposal_id, sponsor);
        Ok(())
    }

    pub fn process_proposal(&mut self, caller: Address, proposal_id: ProposalId) -> DaoResult<()> {
        let proposal = self
            .proposals
            .get(&proposal_id)
            .ok_or(DaoError::ProposalDoesNotExist)?;
        if proposal.flags.has(ProposalFlag::Processed) {
            return Err(DaoError::FlagAlreadySet(ProposalFlag::Processed.name()));
        }
        if proposal.adapter != caller {
            return Err(DaoError::AdapterMismatch);
        }
        if proposal.vetoed {
            return Err(DaoError::ProposalVetoed);
        }
        if let Some(proposal) = self.proposals.get_mut(&proposal_id) {
            proposal.flags.insert(ProposalFlag::Processed);
        }
        info!("proposal {} processed", proposal_id);
        Ok(())
    }

    pub fn veto_proposal(&mut self, vetoer: Address, proposal_id: ProposalId) -> DaoResult<()> {
        let vetoer = self.get_address_if_delegated(vetoer);
        if !self.vetoers.contains(&vetoer) {
            return Err(DaoError::NotAVetoer(vetoer));
        }
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(DaoError::ProposalDoesNotExist)?;
        if proposal.flags.has(ProposalFlag::Processed) {
            return Err(DaoError::FlagAlreadySet(ProposalFlag::Processed.name()));
        }
        proposal.vetoed = true;
        info!("proposal {} vetoed by {}", proposal_id, vetoer);
        Ok(())
    }

    pub fn get_proposal_flag(&self, proposal_id: ProposalId, flag: ProposalFlag) -> bool {
        self.proposals
            .get(&proposal_id)
            .map_or(false, |p| p.flags.has(flag))
    }

    pub fn proposal(&self, proposal_id: ProposalId) -> Option<&Proposal> {
        self.proposals.get(&proposal_id)
    }

    pub fn is_vetoed(&self, proposal_id: ProposalId) -> bool {
        self.proposals
            .get(&proposal_id)
            .map_or(false, |p| p.vetoed)
    }

    /// Voting adapter recorded when the proposal was sponsored.
    pub fn voting_adapter(&self, proposal_id: ProposalId) -> Option<Address> {
        self.voting_adapters.get(&proposal_id).copied()
    }

    // ------------------------------------------------------------------
    // Adapter and extension directory
    // ------------------------------------------------------------------

    /// Removes whatever is registered under `id`, then installs `address`
    /// there unless it is zero. Config pairs are written either way.
    pub fn replace_adapter(
        &mut self,
        caller: Address,
        id: ScopeId,
        address: Address,
        acl: Flags<DaoFlag>,
        keys: &[ScopeId],
        values: &[Amount],
    ) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::ReplaceAdapter)?;
        if id.is_zero() {
            return Err(DaoError::EmptyId);
        }
        if keys.len() != values.len() {
            return Err(DaoError::KeyValueCountMismatch);
        }
        if !address.is_zero() {
            if address.is_reserved() {
                return Err(DaoError::ReservedAddress(address));
            }
            let taken = self
                .adapters
                .get(&address)
                .map_or(false, |entry| entry.id != id);
            if taken || self.extensions.contains_key(&address) {
                return Err(DaoError::AddressAlreadyInUse(address));
            }
        }

        if let Some(previous) = self.adapter_ids.remove(&id) {
            self.adapters.remove(&previous);
            info!("adapter {} removed from DAO {}", previous, self.address);
        }
        for (key, value) in keys.iter().zip(values) {
            self.main_config.insert(*key, value.clone());
        }
        if !address.is_zero() {
            self.adapter_ids.insert(id, address);
            self.adapters.insert(address, AdapterEntry { id, acl });
            info!("adapter {} added to DAO {} with {:?}", address, self.address, acl);
        }
        Ok(())
    }

    pub fn is_adapter(&self, address: Address) -> bool {
        self.adapters.contains_key(&address)
    }

    pub fn get_adapter_address(&self, id: &ScopeId) -> DaoResult<Address> {
        self.adapter_ids
            .get(id)
            .copied()
            .ok_or(DaoError::AdapterNotFound)
    }

    pub fn adapter_acl(&self, adapter: Address) -> Option<Flags<DaoFlag>> {
        self.adapters.get(&adapter).map(|entry| entry.acl)
    }

    pub fn adapter_id(&self, adapter: Address) -> Option<ScopeId> {
        self.adapters.get(&adapter).map(|entry| entry.id)
    }

    pub(crate) fn add_extension(
        &mut self,
        caller: Address,
        id: ScopeId,
        extension: Address,
    ) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::AddExtension)?;
        if id.is_zero() {
            return Err(DaoError::EmptyId);
        }
        if self.extension_ids.contains_key(&id) {
            return Err(DaoError::ExtensionIdInUse);
        }
        if let Some(entry) = self.extensions.get(&extension) {
            return Err(if entry.deleted {
                DaoError::ExtensionDeleted(extension)
            } else {
                DaoError::AddressAlreadyInUse(extension)
            });
        }
        if self.adapters.contains_key(&extension) {
            return Err(DaoError::AddressAlreadyInUse(extension));
        }
        self.extension_ids.insert(id, extension);
        self.extensions.insert(
            extension,
            ExtensionEntry {
                id,
                deleted: false,
                acl: HashMap::new(),
            },
        );
        info!("extension {} added to DAO {}", extension, self.address);
        Ok(())
    }

    pub fn remove_extension(&mut self, caller: Address, id: ScopeId) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::RemoveExtension)?;
        if id.is_zero() {
            return Err(DaoError::EmptyId);
        }
        let extension = self
            .extension_ids
            .remove(&id)
            .ok_or(DaoError::ExtensionNotFound)?;
        if let Some(entry) = self.extensions.get_mut(&extension) {
            entry.deleted = true;
        }
        info!("extension {} removed from DAO {}", extension, self.address);
        Ok(())
    }

    pub fn is_extension(&self, address: Address) -> bool {
        self.extensions
            .get(&address)
            .map_or(false, |entry| !entry.deleted)
    }

    pub fn get_extension_address(&self, id: &ScopeId) -> DaoResult<Address> {
        self.extension_ids
            .get(id)
            .copied()
            .ok_or(DaoError::ExtensionNotFound)
    }

    pub fn extension_id(&self, extension: Address) -> Option<ScopeId> {
        self.extensions
            .get(&extension)
            .filter(|entry| !entry.deleted)
            .map(|entry| entry.id)
    }

    pub fn set_acl_to_extension_for_adapter(
        &mut self,
        caller: Address,
        extension: Address,
        adapter: Address,
        acl: u128,
    ) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::AddExtension)?;
        if adapter.is_reserved() {
            return Err(DaoError::ReservedAddress(adapter));
        }
        if !self.is_adapter(adapter) {
            return Err(DaoError::AdapterNotFound);
        }
        let entry = self
            .extensions
            .get_mut(&extension)
            .filter(|entry| !entry.deleted)
            .ok_or(DaoError::ExtensionNotFound)?;
        entry.acl.insert(adapter, acl);
        debug!(
            "adapter {} granted {:#b} on extension {}",
            adapter, acl, extension
        );
        Ok(())
    }

    /// Raw flag bits `adapter` holds on `extension`.
    pub fn extension_acl(&self, extension: Address, adapter: Address) -> u128 {
        self.extensions
            .get(&extension)
            .and_then(|entry| entry.acl.get(&adapter))
            .copied()
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Governance roles
    // ------------------------------------------------------------------

    /// Non-members are ignored and `false` is returned.
    pub fn add_vetoer(&mut self, caller: Address, vetoer: Address) -> DaoResult<bool> {
        self.require_access(caller, DaoFlag::AddVetoer)?;
        if !self.is_member(vetoer) {
            warn!("ignoring vetoer {}: not a member", vetoer);
            return Ok(false);
        }
        self.vetoers.insert(vetoer);
        info!("vetoer {} added", vetoer);
        Ok(true)
    }

    pub fn remove_vetoer(&mut self, caller: Address, vetoer: Address) -> DaoResult<bool> {
        self.require_access(caller, DaoFlag::RemoveVetoer)?;
        if !self.is_member(vetoer) {
            warn!("ignoring vetoer removal {}: not a member", vetoer);
            return Ok(false);
        }
        let removed = self.vetoers.remove(&vetoer);
        info!("vetoer {} removed", vetoer);
        Ok(removed)
    }

    pub fn is_vetoer(&self, address: Address) -> bool {
        self.vetoers.contains(&address)
    }

    pub fn add_service_provider(&mut self, caller: Address, provider: Address) -> DaoResult<bool> {
        self.require_access(caller, DaoFlag::AddServiceProvider)?;
        if !self.is_member(provider) {
            warn!("ignoring service provider {}: not a member", provider);
            return Ok(false);
        }
        self.service_providers.insert(provider);
        info!("service provider {} added", provider);
        Ok(true)
    }

    pub fn remove_service_provider(
        &mut self,
        caller: Address,
        provider: Address,
    ) -> DaoResult<bool> {
        self.require_access(caller, DaoFlag::RemoveServiceProvider)?;
        if !self.is_member(provider) {
            warn!("ignoring service provider removal {}: not a member", provider);
            return Ok(false);
        }
        Ok(self.service_providers.remove(&provider))
    }

    pub fn is_service_provider(&self, address: Address) -> bool {
        self.service_providers.contains(&address)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn set_configuration(
        &mut self,
        caller: Address,
        key: ScopeId,
        value: Amount,
    ) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::SetConfiguration)?;
        debug!("config {} = {}", key, value);
        self.main_config.insert(key, value);
        Ok(())
    }

    /// Zero when unset.
    pub fn get_configuration(&self, key: &ScopeId) -> Amount {
        self.main_config.get(key).cloned().unwrap_or_else(Amount::zero)
    }

    pub fn set_address_configuration(
        &mut self,
        caller: Address,
        key: ScopeId,
        value: Address,
    ) -> DaoResult<()> {
        self.require_access(caller, DaoFlag::SetConfiguration)?;
        debug!("address config {} = {}", key, value);
        self.address_config.insert(key, value);
        Ok(())
    }

    pub fn get_address_configuration(&self, key: &ScopeId) -> Address {
        self.address_config.get(key).copied().unwrap_or_default()
    }
}
