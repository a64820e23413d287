use std::collections::HashMap;

use num_traits::Zero;
use tracing::info;

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, AccountRef, Address, Amount, ProposalId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDetails {
    pub applicant: Address,
    pub token: Address,
    pub amount: Amount,
}

/// Pays an applicant out of the guild treasury once the members agree.
#[derive(Debug, Clone)]
pub struct FinancingAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), ProposalDetails>,
}

impl FinancingAdapter {
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
        applicant: Address,
        token: Address,
        amount: Amount,
    ) -> DaoResult<()> {
        if amount.is_zero() {
            return Err(DaoError::InvalidAmount);
        }
        if applicant.is_reserved() {
            return Err(DaoError::ReservedAddress(applicant));
        }
        if !dao.bank()?.is_token_allowed(token) {
            return Err(DaoError::TokenNotAllowed(token));
        }
        require_active_member(dao, msg.sender)?;

        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!(
            "financing proposal {}: {} of {} for {}",
            proposal_id, amount, token, applicant
        );
        self.proposals.insert(
            (dao.address(), proposal_id),
            ProposalDetails {
                applicant,
                token,
                amount,
            },
        );
        Ok(())
    }

    /// Moves the requested funds from GUILD to the applicant. Anyone may
    /// process a passed proposal.
    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<()> {
        let details = self
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
            dao.registry_mut().process_proposal(adapter, proposal_id)?;
            dao.internal_transfer(
                adapter,
                AccountRef::GUILD,
                AccountRef::Member(details.applicant),
                details.token,
                &details.amount,
                chain.block_number(),
            )
        })?;
        info!("financing proposal {} paid out", proposal_id);
        Ok(())
    }

    pub fn proposal(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&ProposalDetails> {
        self.proposals.get(&(dao.address(), proposal_id))
    }
}

impl Adapter for FinancingAdapter {
    fn name(&self) -> &'static str {
        ids::FINANCING_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::deploy::deploy_dao;
    use crate::types::{ETH_TOKEN, GUILD_ADDRESS};

    #[test]
    fn test_submit_validation() {
        let mut chain = Chain::new();
        let mut d = deploy_dao(&mut chain, &DeploymentConfig::default()).unwrap();
        let owner = Msg::sender(d.owner);
        let applicant = Address::from_low_u64(0xa11ce);
        let unknown_token = Address::from_low_u64(0x7070);

        let mut submit = |id: u64, applicant: Address, token: Address, amount: u64| {
            d.adapters.financing.submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                ProposalId::from_u64(id),
                applicant,
                token,
                Amount::from(amount),
            )
        };

        assert_eq!(submit(1, applicant, ETH_TOKEN, 0), Err(DaoError::InvalidAmount));
        assert_eq!(
            submit(2, GUILD_ADDRESS, ETH_TOKEN, 10),
            Err(DaoError::ReservedAddress(GUILD_ADDRESS))
        );
        assert_eq!(
            submit(3, applicant, unknown_token, 10),
            Err(DaoError::TokenNotAllowed(unknown_token))
        );
    }

    #[test]
    fn test_process_requires_settled_vote() {
        let mut chain = Chain::new();
        let mut d = deploy_dao(&mut chain, &DeploymentConfig::default()).unwrap();
        let owner = Msg::sender(d.owner);
        let id = ProposalId::from_u64(1);

        assert_eq!(
            d.adapters
                .financing
                .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
            Err(DaoError::ProposalDoesNotExist)
        );

        d.adapters
            .financing
            .submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                id,
                Address::from_low_u64(0xa11ce),
                ETH_TOKEN,
                Amount::from(10u32),
            )
            .unwrap();
        assert_eq!(
            d.adapters
                .financing
                .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
            Err(DaoError::ProposalHasNotBeenVotedOnYet)
        );

        chain.advance_time(100);
        assert_eq!(
            d.adapters
                .financing
                .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
            Err(DaoError::ProposalNeedsToPass)
        );
    }
}
