use std::collections::HashMap;

use tracing::info;

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::acl::{DaoFlag, Flags};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address, Amount, ProposalId, ScopeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateType {
    Unknown = 0,
    Adapter = 1,
    Extension = 2,
}

impl TryFrom<u8> for UpdateType {
    type Error = DaoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UpdateType::Unknown),
            1 => Ok(UpdateType::Adapter),
            2 => Ok(UpdateType::Extension),
            other => Err(DaoError::UnknownUpdateType(other)),
        }
    }
}

/// A change to the DAO's adapter or extension directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDetails {
    pub id: ScopeId,
    /// Zero removes whatever is registered under `id`.
    pub address: Address,
    pub update_type: UpdateType,
    pub flags: Flags<DaoFlag>,
    pub keys: Vec<ScopeId>,
    pub values: Vec<Amount>,
    /// Extension grants for a new adapter, as raw flag bits.
    pub extension_acls: Vec<(Address, u128)>,
}

#[derive(Debug, Clone)]
struct StoredProposal {
    details: ProposalDetails,
    proposer: Address,
}

/// Changes the DAO's own structure by proposal: swaps adapters in and out,
/// and installs or removes extensions.
#[derive(Debug, Clone)]
pub struct ManagingAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), StoredProposal>,
}

impl ManagingAdapter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            proposals: HashMap::new(),
        }
    }

    pub fn submit_proposal(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &mut dyn VotingAdapter,
        msg: &Msg,
        proposal_id: ProposalId,
        details: ProposalDetails,
    ) -> DaoResult<()> {
        if details.keys.len() != details.values.len() {
            return Err(DaoError::KeyValueCountMismatch);
        }
        if details.address.is_reserved() {
            return Err(DaoError::ReservedAddress(details.address));
        }
        require_active_member(dao, msg.sender)?;
        let proposer = voting.get_sender_address(dao, msg.sender);

        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!(
            "managing proposal {}: {:?} {} -> {}",
            proposal_id, details.update_type, details.id, details.address
        );
        self.proposals.insert(
            (dao.address(), proposal_id),
            StoredProposal { details, proposer },
        );
        Ok(())
    }

    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<()> {
        let stored = self
            .proposals
            .get(&(dao.address(), proposal_id))
            .cloned()
            .ok_or(DaoError::ProposalDoesNotExist)?;
        let adapter = self.address;

        atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            if settled_result(dao, chain, voting, proposal_id)? != VotingState::Pass {
                return Err(DaoError::ProposalDidNotPass);
            }
            dao.registry_mut().process_proposal(adapter, proposal_id)?;

            let details = &stored.details;
            match details.update_type {
                UpdateType::Adapter => {
                    dao.registry_mut().replace_adapter(
                        adapter,
                        details.id,
                        details.address,
                        details.flags,
                        &details.keys,
                        &details.values,
                    )?;
                    for (extension, acl) in &details.extension_acls {
                        dao.registry_mut().set_acl_to_extension_for_adapter(
                            adapter,
                            *extension,
                            details.address,
                            *acl,
                        )?;
                    }
                }
                UpdateType::Extension => {
                    if dao.registry().get_extension_address(&details.id).is_ok() {
                        dao.remove_extension(adapter, details.id)?;
                    }
                    if !details.address.is_zero() {
                        dao.add_extension(
                            adapter,
                            details.id,
                            details.address,
                            stored.proposer,
                            chain.block_number(),
                        )?;
                    }
                }
                UpdateType::Unknown => {
                    return Err(DaoError::UnknownUpdateType(UpdateType::Unknown as u8));
                }
            }
            info!("managing proposal {} applied", proposal_id);
            Ok(())
        })
    }

    pub fn proposal(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&ProposalDetails> {
        self.proposals
            .get(&(dao.address(), proposal_id))
            .map(|stored| &stored.details)
    }
}

impl Adapter for ManagingAdapter {
    fn name(&self) -> &'static str {
        ids::MANAGING_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
