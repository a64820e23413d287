use std::collections::HashMap;

use num_traits::Zero;
use serde::Serialize;
use tracing::info;

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, AccountRef, Address, Amount, ProposalId};

/// One tranche of an initiative, payable once `date` has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Milestone {
    pub date: u64,
    pub amount: Amount,
    pub executed: bool,
}

impl Milestone {
    pub fn new(date: u64, amount: Amount) -> Self {
        Self {
            date,
            amount,
            executed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InitiativeStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initiative {
    pub token: Address,
    pub receiver: Address,
    pub milestones: Vec<Milestone>,
    pub status: InitiativeStatus,
}

/// Funds a receiver out of the guild in dated milestones. The vote approves
/// the whole schedule; each milestone is then released on its own once due.
#[derive(Debug, Clone)]
pub struct InitiativeAdapter {
    address: Address,
    initiatives: HashMap<(Address, ProposalId), Initiative>,
}

impl InitiativeAdapter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            initiatives: HashMap::new(),
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
        token: Address,
        receiver: Address,
        milestones: Vec<Milestone>,
    ) -> DaoResult<()> {
        if milestones.is_empty() {
            return Err(DaoError::MilestonesMustBeNonEmpty);
        }
        if milestones.iter().any(|m| m.amount.is_zero()) {
            return Err(DaoError::InvalidAmount);
        }
        if receiver.is_zero() {
            return Err(DaoError::InvalidAddress(receiver.to_string()));
        }
        if receiver.is_reserved() {
            return Err(DaoError::ReservedAddress(receiver));
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
            "initiative proposal {}: {} milestones of {} for {}",
            proposal_id,
            milestones.len(),
            token,
            receiver
        );
        let milestones = milestones
            .into_iter()
            .map(|m| Milestone::new(m.date, m.amount))
            .collect();
        self.initiatives.insert(
            (dao.address(), proposal_id),
            Initiative {
                token,
                receiver,
                milestones,
                status: InitiativeStatus::Pending,
            },
        );
        Ok(())
    }

    /// Records the outcome. Nothing moves here; an approved initiative pays
    /// out through [`execute_milestone`](Self::execute_milestone).
    pub fn process_proposal(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<VotingState> {
        let key = (dao.address(), proposal_id);
        if !self.initiatives.contains_key(&key) {
            return Err(DaoError::ProposalDoesNotExist);
        }
        let adapter = self.address;

        let result = atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            let result = settled_result(dao, chain, voting, proposal_id)?;
            dao.registry_mut().process_proposal(adapter, proposal_id)?;
            Ok(result)
        })?;

        if let Some(initiative) = self.initiatives.get_mut(&key) {
            initiative.status = if result == VotingState::Pass {
                InitiativeStatus::Approved
            } else {
                InitiativeStatus::Rejected
            };
        }
        info!("initiative proposal {} processed: {:?}", proposal_id, result);
        Ok(result)
    }

    /// Moves milestone `index` from GUILD to the receiver. Callable by anyone
    /// once the initiative is approved and the milestone date has passed.
    pub fn execute_milestone(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        proposal_id: ProposalId,
        index: usize,
    ) -> DaoResult<()> {
        let key = (dao.address(), proposal_id);
        let initiative = self
            .initiatives
            .get(&key)
            .ok_or(DaoError::MilestonesNotFound)?;
        if initiative.status != InitiativeStatus::Approved {
            return Err(DaoError::ProposalDidNotPass);
        }
        let milestone = initiative
            .milestones
            .get(index)
            .ok_or(DaoError::MilestonesNotFound)?;
        if milestone.executed {
            return Err(DaoError::MilestoneAlreadyExecuted(index));
        }
        if chain.timestamp() < milestone.date {
            return Err(DaoError::MilestoneNotDue(milestone.date));
        }

        let (token, receiver) = (initiative.token, initiative.receiver);
        let amount = milestone.amount.clone();
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.internal_transfer(
                adapter,
                AccountRef::GUILD,
                AccountRef::Member(receiver),
                token,
                &amount,
                chain.block_number(),
            )
        })?;

        if let Some(milestone) = self
            .initiatives
            .get_mut(&key)
            .and_then(|initiative| initiative.milestones.get_mut(index))
        {
            milestone.executed = true;
        }
        info!(
            "initiative {} milestone {} released {} to {}",
            proposal_id, index, amount, receiver
        );
        Ok(())
    }

    pub fn get_milestone(
        &self,
        dao: &Dao,
        proposal_id: ProposalId,
        index: usize,
    ) -> DaoResult<&Milestone> {
        self.initiatives
            .get(&(dao.address(), proposal_id))
            .and_then(|initiative| initiative.milestones.get(index))
            .ok_or(DaoError::MilestonesNotFound)
    }

    /// Zero for an unknown proposal.
    pub fn get_count_milestone(&self, dao: &Dao, proposal_id: ProposalId) -> usize {
        self.initiatives
            .get(&(dao.address(), proposal_id))
            .map_or(0, |initiative| initiative.milestones.len())
    }

    pub fn initiative(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&Initiative> {
        self.initiatives.get(&(dao.address(), proposal_id))
    }
}

impl Adapter for InitiativeAdapter {
    fn name(&self) -> &'static str {
        ids::INITIATIVE_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentConfig;
    use crate::deploy::{deploy_dao, Deployment};
    use crate::types::ETH_TOKEN;

    const RECEIVER: Address = Address::from_low_u64(0x1a17);

    fn setup() -> (Deployment, Chain) {
        let mut chain = Chain::new();
        let d = deploy_dao(&mut chain, &DeploymentConfig::default()).unwrap();
        (d, chain)
    }

    fn submit(d: &mut Deployment, chain: &mut Chain, id: u64, milestones: Vec<Milestone>) -> DaoResult<()> {
        let owner = Msg::sender(d.owner);
        d.adapters.initiative.submit_proposal(
            &mut d.dao,
            chain,
            &mut d.adapters.voting,
            &owner,
            ProposalId::from_u64(id),
            ETH_TOKEN,
            RECEIVER,
            milestones,
        )
    }

    #[test]
    fn test_unknown_proposal_has_no_milestones() {
        let (d, _chain) = setup();
        let id = ProposalId::from_u64(1);
        assert_eq!(
            d.adapters.initiative.get_milestone(&d.dao, id, 0),
            Err(DaoError::MilestonesNotFound)
        );
        assert_eq!(d.adapters.initiative.get_count_milestone(&d.dao, id), 0);
    }

    #[test]
    fn test_submit_rejects_empty_milestones() {
        let (mut d, mut chain) = setup();
        assert_eq!(
            submit(&mut d, &mut chain, 1, Vec::new()),
            Err(DaoError::MilestonesMustBeNonEmpty)
        );
        assert_eq!(
            submit(&mut d, &mut chain, 1, vec![Milestone::new(0, Amount::zero())]),
            Err(DaoError::InvalidAmount)
        );
        assert!(d.dao.registry().proposal(ProposalId::from_u64(1)).is_none());
    }

    #[test]
    fn test_process_waits_for_the_vote() {
        let (mut d, mut chain) = setup();
        let due = chain.timestamp() + 10_000;
        submit(&mut d, &mut chain, 1, vec![Milestone::new(due, Amount::from(10u32))]).unwrap();
        let id = ProposalId::from_u64(1);
        let owner = Msg::sender(d.owner);
        d.adapters
            .voting
            .submit_vote(&d.dao, &chain, &owner, id, 1)
            .unwrap();

        assert_eq!(
            d.adapters
                .initiative
                .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
            Err(DaoError::ProposalHasNotBeenVotedOnYet)
        );
        chain.advance_time(100);
        assert_eq!(
            d.adapters
                .initiative
                .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
            Ok(VotingState::Pass)
        );

        let initiative = d.adapters.initiative.initiative(&d.dao, id).unwrap();
        assert_eq!(initiative.status, InitiativeStatus::Approved);
        assert_eq!(d.adapters.initiative.get_count_milestone(&d.dao, id), 1);
        let milestone = d.adapters.initiative.get_milestone(&d.dao, id, 0).unwrap();
        assert_eq!(milestone.amount, Amount::from(10u32));
        assert!(!milestone.executed);
        let bank = d.dao.bank().unwrap();
        assert!(bank.balance_of(AccountRef::GUILD, ETH_TOKEN).is_zero());
        assert!(bank.balance_of(RECEIVER, ETH_TOKEN).is_zero());
    }
}
