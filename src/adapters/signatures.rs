use std::collections::HashMap;

use tracing::info;

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address, ProposalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureRequest {
    pub permission_hash: [u8; 32],
    pub signature_hash: [u8; 32],
    pub magic_value: u32,
}

/// Has the DAO sign a message through the ERC1271 extension once the
/// members approve it.
#[derive(Debug, Clone)]
pub struct SignaturesAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), SignatureRequest>,
}

impl SignaturesAdapter {
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
        request: SignatureRequest,
    ) -> DaoResult<()> {
        require_active_member(dao, msg.sender)?;
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!(
            "signature proposal {} for permission {}",
            proposal_id,
            hex::encode(request.permission_hash)
        );
        self.proposals.insert((dao.address(), proposal_id), request);
        Ok(())
    }

    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<()> {
        let request = *self
            .proposals
            .get(&(dao.address(), proposal_id))
            .ok_or(DaoError::ProposalDoesNotExist)?;
        let adapter = self.address;

        atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            if settled_result(dao, chain, voting, proposal_id)? != VotingState::Pass {
                return Err(DaoError::ProposalNeedsToPass);
            }
            dao.registry_mut().process_proposal(adapter, proposal_id)?;
            dao.sign(
                adapter,
                request.permission_hash,
                request.signature_hash,
                request.magic_value,
            )
        })
    }
}

impl Adapter for SignaturesAdapter {
    fn name(&self) -> &'static str {
        ids::SIGNATURES_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
