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
use crate::types::{ids, AccountRef, Address, Amount, ProposalId, LOOT, UNITS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KickDetails {
    pub member_to_kick: Address,
    pub proposer: Address,
}

/// Removes a member by vote and pays out their share of the guild in the
/// same transaction (ragekick).
#[derive(Debug, Clone)]
pub struct GuildKickAdapter {
    address: Address,
    kicks: HashMap<(Address, ProposalId), KickDetails>,
}

/// `balance * share / total`, rounded down. Zero when nothing is held.
pub fn fair_share(balance: &Amount, share: &Amount, total: &Amount) -> DaoResult<Amount> {
    if total.is_zero() {
        return Err(DaoError::NoUnitsOrLoot);
    }
    if share > total {
        return Err(DaoError::NotEnoughUnits);
    }
    Ok(balance * share / total)
}

impl GuildKickAdapter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            kicks: HashMap::new(),
        }
    }

    pub fn submit_proposal(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &mut dyn VotingAdapter,
        msg: &Msg,
        proposal_id: ProposalId,
        member_to_kick: Address,
    ) -> DaoResult<()> {
        require_active_member(dao, msg.sender)?;
        let proposer = voting.get_sender_address(dao, msg.sender);
        if proposer == member_to_kick {
            return Err(DaoError::UseRagequit);
        }
        let bank = dao.bank()?;
        if bank.balance_of(member_to_kick, UNITS).is_zero()
            && bank.balance_of(member_to_kick, LOOT).is_zero()
        {
            return Err(DaoError::NoUnitsOrLoot);
        }

        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!("guild kick proposal {} against {}", proposal_id, member_to_kick);
        self.kicks.insert(
            (dao.address(), proposal_id),
            KickDetails {
                member_to_kick,
                proposer,
            },
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
        let kick = self
            .kicks
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
            Self::rage_kick(dao, adapter, kick.member_to_kick, chain.block_number())
        })
    }

    /// Burns the member's UNITS and LOOT and moves their pro-rata share of
    /// every external token from GUILD to them.
    fn rage_kick(dao: &mut Dao, adapter: Address, member: Address, block: u64) -> DaoResult<()> {
        let bank = dao.bank()?;
        let outstanding = |token: Address| {
            bank.balance_of(AccountRef::TOTAL, token) - bank.balance_of(AccountRef::GUILD, token)
        };
        let initial_total = outstanding(UNITS) + outstanding(LOOT);
        let units = bank.balance_of(member, UNITS);
        let loot = bank.balance_of(member, LOOT);
        let to_burn = &units + &loot;

        let mut payouts = Vec::new();
        for &token in bank.get_tokens() {
            let amount = fair_share(&bank.balance_of(AccountRef::GUILD, token), &to_burn, &initial_total)?;
            if !amount.is_zero() {
                payouts.push((token, amount));
            }
        }

        for (token, amount) in &payouts {
            dao.internal_transfer(
                adapter,
                AccountRef::GUILD,
                AccountRef::Member(member),
                *token,
                amount,
                block,
            )?;
        }
        for (token, amount) in [(UNITS, units), (LOOT, loot)] {
            if !amount.is_zero() {
                dao.subtract_from_balance(adapter, AccountRef::Member(member), token, &amount, block)?;
            }
        }
        info!("member {} kicked, {} token payouts", member, payouts.len());
        Ok(())
    }

    pub fn kick(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&KickDetails> {
        self.kicks.get(&(dao.address(), proposal_id))
    }
}

impl Adapter for GuildKickAdapter {
    fn name(&self) -> &'static str {
        ids::GUILDKICK_NAME
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

    #[test]
    fn test_fair_share_rounds_down() {
        let guild = Amount::from(1_200_000_000_000_000_000u64);
        let share = Amount::from(10_000_000_000_000_000u64);
        let total = &share + 1u32;
        assert_eq!(
            fair_share(&guild, &share, &total).unwrap(),
            Amount::from(1_199_999_999_999_999_880u64)
        );
        assert_eq!(
            fair_share(&Amount::zero(), &share, &total).unwrap(),
            Amount::zero()
        );
        assert_eq!(
            fair_share(&guild, &share, &Amount::zero()),
            Err(DaoError::NoUnitsOrLoot)
        );
    }

    #[test]
    fn test_cannot_kick_self_or_empty_account() {
        let mut chain = Chain::new();
        let mut d = deploy_dao(&mut chain, &DeploymentConfig::default()).unwrap();
        let owner = Msg::sender(d.owner);

        let err = d
            .adapters
            .guildkick
            .submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                ProposalId::from_u64(1),
                d.owner,
            )
            .unwrap_err();
        assert_eq!(err, DaoError::UseRagequit);

        let nobody = Address::from_low_u64(0x404);
        let err = d
            .adapters
            .guildkick
            .submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                ProposalId::from_u64(2),
                nobody,
            )
            .unwrap_err();
        assert_eq!(err, DaoError::NoUnitsOrLoot);
    }
}
