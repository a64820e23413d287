use std::collections::HashMap;

use tracing::info;

use super::vetoer::RoleAction;
use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address, ProposalId};

/// Adds and removes service providers by vote.
#[derive(Debug, Clone)]
pub struct ServiceProviderAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), (RoleAction, Address)>,
}

impl ServiceProviderAdapter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            proposals: HashMap::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_proposal(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &mut dyn VotingAdapter,
        msg: &Msg,
        proposal_id: ProposalId,
        action: RoleAction,
        provider: Address,
    ) -> DaoResult<()> {
        require_active_member(dao, msg.sender)?;
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!("service provider proposal {}: {:?} {}", proposal_id, action, provider);
        self.proposals
            .insert((dao.address(), proposal_id), (action, provider));
        Ok(())
    }

    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<bool> {
        let (action, provider) = *self
            .proposals
            .get(&(dao.address(), proposal_id))
            .ok_or(DaoError::ProposalDoesNotExist)?;
        let adapter = self.address;

        atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            if settled_result(dao, chain, voting, proposal_id)? != VotingState::Pass {
                return Err(DaoError::ProposalNeedsToPass);
            }
            let registry = dao.registry_mut();
            registry.process_proposal(adapter, proposal_id)?;
            match action {
                RoleAction::Add => registry.add_service_provider(adapter, provider),
                RoleAction::Remove => registry.remove_service_provider(adapter, provider),
            }
        })
    }
}

impl Adapter for ServiceProviderAdapter {
    fn name(&self) -> &'static str {
        ids::SERVICE_PROVIDER_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
