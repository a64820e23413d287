use std::collections::HashMap;

use tracing::info;

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address, Amount, ProposalId, ScopeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEntry {
    Numeric { key: ScopeId, value: Amount },
    Address { key: ScopeId, value: Address },
}

/// Updates DAO configuration values by vote.
#[derive(Debug, Clone)]
pub struct ConfigurationAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), Vec<ConfigEntry>>,
}

impl ConfigurationAdapter {
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
        entries: Vec<ConfigEntry>,
    ) -> DaoResult<()> {
        if entries.is_empty() {
            return Err(DaoError::NothingToConfigure);
        }
        require_active_member(dao, msg.sender)?;

        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!("configuration proposal {} with {} entries", proposal_id, entries.len());
        self.proposals.insert((dao.address(), proposal_id), entries);
        Ok(())
    }

    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<()> {
        let entries = self
            .proposals
            .get(&(dao.address(), proposal_id))
            .cloned()
            .ok_or(DaoError::ProposalDoesNotExist)?;
        let adapter = self.address;

        atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            if settled_result(dao, chain, voting, proposal_id)? != VotingState::Pass {
                return Err(DaoError::ProposalNeedsToPass);
            }
            let registry = dao.registry_mut();
            registry.process_proposal(adapter, proposal_id)?;
            for entry in entries {
                match entry {
                    ConfigEntry::Numeric { key, value } => {
                        registry.set_configuration(adapter, key, value)?
                    }
                    ConfigEntry::Address { key, value } => {
                        registry.set_address_configuration(adapter, key, value)?
                    }
                }
            }
            Ok(())
        })
    }

    pub fn proposal(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&[ConfigEntry]> {
        self.proposals
            .get(&(dao.address(), proposal_id))
            .map(Vec::as_slice)
    }
}

impl Adapter for ConfigurationAdapter {
    fn name(&self) -> &'static str {
        ids::CONFIGURATION_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
