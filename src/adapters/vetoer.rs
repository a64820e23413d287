use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address, ProposalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleAction {
    Add,
    Remove,
}

/// Grants and revokes the vetoer role by vote, and lets vetoers block
/// pending proposals.
#[derive(Debug, Clone)]
pub struct VetoerAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), (RoleAction, Address)>,
}

impl VetoerAdapter {
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
        vetoer: Address,
    ) -> DaoResult<()> {
        require_active_member(dao, msg.sender)?;
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!("vetoer proposal {}: {:?} {}", proposal_id, action, vetoer);
        self.proposals
            .insert((dao.address(), proposal_id), (action, vetoer));
        Ok(())
    }

    /// Returns whether the role actually changed. Targets that are not
    /// members leave it untouched.
    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<bool> {
        let (action, vetoer) = *self
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
                RoleAction::Add => registry.add_vetoer(adapter, vetoer),
                RoleAction::Remove => registry.remove_vetoer(adapter, vetoer),
            }
        })
    }

    /// Blocks `proposal_id`. Only vetoers, or their delegates, may do this.
    pub fn veto_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        msg: &Msg,
        proposal_id: ProposalId,
    ) -> DaoResult<()> {
        atomically(dao, chain, |dao, _| {
            dao.registry_mut().veto_proposal(msg.sender, proposal_id)
        })
    }
}

impl Adapter for VetoerAdapter {
    fn name(&self) -> &'static str {
        ids::VETOER_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
