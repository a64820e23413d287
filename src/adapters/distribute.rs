use std::collections::HashMap;

use num_traits::Zero;
use serde::Serialize;
use tracing::{debug, info};

use super::{
    ensure_processable, require_active_member, settled_result, sponsor_and_start_voting, Adapter,
    VotingAdapter, VotingState,
};
use crate::chain::{atomically, Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, AccountRef, Address, Amount, ProposalId, UNITS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DistributionStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub token: Address,
    pub amount: Amount,
    /// Zero pays every member pro rata.
    pub unit_holder: Address,
    pub status: DistributionStatus,
    pub current_index: usize,
    pub block_number: u64,
}

/// Splits guild funds among unit holders. A passed proposal parks the
/// amount in ESCROW; `distribute` then pays it out in batches.
#[derive(Debug, Clone)]
pub struct DistributeAdapter {
    address: Address,
    distributions: HashMap<(Address, ProposalId), Distribution>,
    ongoing: HashMap<Address, ProposalId>,
}

impl DistributeAdapter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            distributions: HashMap::new(),
            ongoing: HashMap::new(),
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
        unit_holder: Address,
        token: Address,
        amount: Amount,
    ) -> DaoResult<()> {
        require_active_member(dao, msg.sender)?;
        if amount.is_zero() {
            return Err(DaoError::InvalidAmount);
        }
        let bank = dao.bank()?;
        if !bank.is_token_allowed(token) {
            return Err(DaoError::TokenNotAllowed(token));
        }
        if !unit_holder.is_zero() {
            if unit_holder.is_reserved() {
                return Err(DaoError::ReservedAddress(unit_holder));
            }
            if bank.balance_of(unit_holder, UNITS).is_zero() {
                return Err(DaoError::NotEnoughUnits);
            }
        }

        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!("distribution proposal {}: {} of {}", proposal_id, amount, token);
        self.distributions.insert(
            (dao.address(), proposal_id),
            Distribution {
                token,
                amount,
                unit_holder,
                status: DistributionStatus::NotStarted,
                current_index: 0,
                block_number: 0,
            },
        );
        Ok(())
    }

    /// On a pass, moves the amount from GUILD to ESCROW and opens the
    /// distribution. Any other outcome marks it failed.
    pub fn process_proposal(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        proposal_id: ProposalId,
    ) -> DaoResult<VotingState> {
        let key = (dao.address(), proposal_id);
        let distribution = self
            .distributions
            .get(&key)
            .cloned()
            .ok_or(DaoError::ProposalDoesNotExist)?;
        if self.ongoing.contains_key(&dao.address()) {
            return Err(DaoError::AnotherProposalInProgress);
        }
        let adapter = self.address;

        let (result, block) = atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            let result = settled_result(dao, chain, voting, proposal_id)?;
            let block = chain.block_number();
            if result == VotingState::Pass {
                dao.internal_transfer(
                    adapter,
                    AccountRef::GUILD,
                    AccountRef::ESCROW,
                    distribution.token,
                    &distribution.amount,
                    block,
                )?;
            }
            dao.registry_mut().process_proposal(adapter, proposal_id)?;
            Ok((result, block))
        })?;

        if let Some(entry) = self.distributions.get_mut(&key) {
            if result == VotingState::Pass {
                entry.status = DistributionStatus::InProgress;
                entry.block_number = block;
                self.ongoing.insert(key.0, proposal_id);
            } else {
                entry.status = DistributionStatus::Failed;
            }
        }
        info!("distribution proposal {} processed: {:?}", proposal_id, result);
        Ok(result)
    }

    /// Pays members up to, but not including, index `to_index`. Completes the
    /// distribution once every member has been visited, or right away when
    /// it targets a single unit holder. Callable by anyone.
    pub fn distribute(&mut self, dao: &mut Dao, chain: &mut Chain, to_index: usize) -> DaoResult<()> {
        let dao_address = dao.address();
        let proposal_id = *self
            .ongoing
            .get(&dao_address)
            .ok_or(DaoError::DistributionNotInProgress)?;
        let key = (dao_address, proposal_id);
        let distribution = self
            .distributions
            .get(&key)
            .cloned()
            .filter(|d| d.status == DistributionStatus::InProgress)
            .ok_or(DaoError::DistributionNotInProgress)?;

        let nb_members = dao.registry().nb_members();
        let max_index = to_index.min(nb_members);
        let adapter = self.address;

        atomically(dao, chain, |dao, chain| {
            let block = chain.block_number();
            if !distribution.unit_holder.is_zero() {
                if distribution.current_index == 0 {
                    dao.internal_transfer(
                        adapter,
                        AccountRef::ESCROW,
                        AccountRef::Member(distribution.unit_holder),
                        distribution.token,
                        &distribution.amount,
                        block,
                    )?;
                }
                return Ok(());
            }

            let payouts = Self::pro_rata_payouts(dao, &distribution, max_index)?;
            for (member, amount) in payouts {
                dao.internal_transfer(
                    adapter,
                    AccountRef::ESCROW,
                    AccountRef::Member(member),
                    distribution.token,
                    &amount,
                    block,
                )?;
                debug!("distributed {} of {} to {}", amount, distribution.token, member);
            }
            Ok(())
        })?;

        if let Some(entry) = self.distributions.get_mut(&key) {
            let single_holder = !entry.unit_holder.is_zero();
            let visited = if single_holder { max_index.max(1) } else { max_index };
            entry.current_index = visited.max(entry.current_index);
            if single_holder || max_index == nb_members {
                entry.status = DistributionStatus::Completed;
                self.ongoing.remove(&dao_address);
                info!("distribution {} completed", proposal_id);
            }
        }
        Ok(())
    }

    /// Each member's floor share of the amount, weighted by UNITS at the
    /// block the distribution opened. Rounding dust stays in ESCROW.
    fn pro_rata_payouts(
        dao: &Dao,
        distribution: &Distribution,
        max_index: usize,
    ) -> DaoResult<Vec<(Address, Amount)>> {
        let bank = dao.bank()?;
        let registry = dao.registry();
        let block = distribution.block_number;
        let total = bank.balance_of_at(AccountRef::TOTAL, UNITS, block)
            - bank.balance_of_at(AccountRef::GUILD, UNITS, block);
        if total.is_zero() {
            return Ok(Vec::new());
        }

        let mut payouts = Vec::new();
        for index in distribution.current_index..max_index {
            let Some(member) = registry.get_member_address(index) else {
                continue;
            };
            let units = bank.balance_of_at(member, UNITS, block);
            let amount = &distribution.amount * units / &total;
            if !amount.is_zero() {
                payouts.push((member, amount));
            }
        }
        Ok(payouts)
    }

    pub fn distribution(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&Distribution> {
        self.distributions.get(&(dao.address(), proposal_id))
    }

    pub fn ongoing_distribution(&self, dao: &Dao) -> Option<ProposalId> {
        self.ongoing.get(&dao.address()).copied()
    }
}

impl Adapter for DistributeAdapter {
    fn name(&self) -> &'static str {
        ids::DISTRIBUTE_NAME
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
    use crate::types::ETH_TOKEN;

    #[test]
    fn test_distribute_without_distribution() {
        let mut chain = Chain::new();
        let mut d = deploy_dao(&mut chain, &DeploymentConfig::default()).unwrap();
        assert_eq!(
            d.adapters.distribute.distribute(&mut d.dao, &mut chain, 10),
            Err(DaoError::DistributionNotInProgress)
        );
    }

    #[test]
    fn test_submit_validation() {
        let mut chain = Chain::new();
        let mut d = deploy_dao(&mut chain, &DeploymentConfig::default()).unwrap();
        let owner = Msg::sender(d.owner);
        let holder = Address::from_low_u64(0x404);

        let err = d
            .adapters
            .distribute
            .submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                ProposalId::from_u64(1),
                Address::ZERO,
                ETH_TOKEN,
                Amount::zero(),
            )
            .unwrap_err();
        assert_eq!(err, DaoError::InvalidAmount);

        let err = d
            .adapters
            .distribute
            .submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                ProposalId::from_u64(2),
                holder,
                ETH_TOKEN,
                Amount::from(15u32),
            )
            .unwrap_err();
        assert_eq!(err, DaoError::NotEnoughUnits);
    }
}
