use std::collections::HashMap;

use num_traits::{ToPrimitive, Zero};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

use super::{require_active_member, Adapter};
use crate::acl::Flag;
use crate::chain::{Chain, Msg};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::registry::ProposalFlag;
use crate::types::{ids, Address, Amount, ProposalId, ScopeId, UNITS};

pub static VOTING_PERIOD_KEY: Lazy<ScopeId> =
    Lazy::new(|| ScopeId::from_name("voting.votingPeriod"));
pub static GRACE_PERIOD_KEY: Lazy<ScopeId> =
    Lazy::new(|| ScopeId::from_name("voting.gracePeriod"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VotingState {
    NotStarted,
    Tie,
    Pass,
    NotPass,
    InProgress,
    GracePeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum VoteChoice {
    Yes = 1,
    No = 2,
}

impl TryFrom<u8> for VoteChoice {
    type Error = DaoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VoteChoice::Yes),
            2 => Ok(VoteChoice::No),
            other => Err(DaoError::InvalidVoteChoice(other)),
        }
    }
}

/// What proposal adapters need from a voting mechanism.
pub trait VotingAdapter: Adapter {
    /// Opens the vote. Only adapters registered in `dao` may do this.
    fn start_new_voting_for_proposal(
        &mut self,
        dao: &Dao,
        chain: &Chain,
        caller: Address,
        proposal_id: ProposalId,
    ) -> DaoResult<()>;

    /// Member on whose behalf `sender` acts.
    fn get_sender_address(&self, dao: &Dao, sender: Address) -> Address;

    fn vote_result(&self, dao: &Dao, chain: &Chain, proposal_id: ProposalId) -> VotingState;
}

#[derive(Debug, Clone)]
struct Ballot {
    nb_yes: Amount,
    nb_no: Amount,
    starting_time: u64,
    block_number: u64,
    voters: HashMap<Address, VoteChoice>,
}

/// Simple majority voting weighted by UNITS held when the vote opened.
#[derive(Debug, Clone)]
pub struct Voting {
    address: Address,
    ballots: HashMap<(Address, ProposalId), Ballot>,
}

impl Voting {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ballots: HashMap::new(),
        }
    }

    /// Sets the voting and grace periods, in seconds, for `dao`.
    pub fn configure_dao(
        &self,
        dao: &mut Dao,
        caller: Address,
        voting_period: u64,
        grace_period: u64,
    ) -> DaoResult<()> {
        let registry = dao.registry();
        if !registry.in_creation_mode_with_access(caller) && !registry.is_adapter(caller) {
            return Err(DaoError::AccessDenied {
                caller,
                permission: "CONFIGURE_DAO",
            });
        }
        let registry = dao.registry_mut();
        registry.set_configuration(caller, *VOTING_PERIOD_KEY, Amount::from(voting_period))?;
        registry.set_configuration(caller, *GRACE_PERIOD_KEY, Amount::from(grace_period))?;
        info!(
            "voting configured for DAO {}: period {}s, grace {}s",
            dao.address(),
            voting_period,
            grace_period
        );
        Ok(())
    }

    pub fn voting_period(dao: &Dao) -> u64 {
        period(dao, &VOTING_PERIOD_KEY)
    }

    pub fn grace_period(dao: &Dao) -> u64 {
        period(dao, &GRACE_PERIOD_KEY)
    }

    pub fn submit_vote(
        &mut self,
        dao: &Dao,
        chain: &Chain,
        msg: &Msg,
        proposal_id: ProposalId,
        choice: u8,
    ) -> DaoResult<()> {
        let registry = dao.registry();
        if !registry.get_proposal_flag(proposal_id, ProposalFlag::Sponsored) {
            return Err(DaoError::ProposalNotSponsored);
        }
        if registry.get_proposal_flag(proposal_id, ProposalFlag::Processed) {
            return Err(DaoError::FlagAlreadySet(ProposalFlag::Processed.name()));
        }
        if registry.is_vetoed(proposal_id) {
            return Err(DaoError::ProposalVetoed);
        }
        require_active_member(dao, msg.sender)?;
        let choice = VoteChoice::try_from(choice)?;

        let key = (dao.address(), proposal_id);
        let ballot = self.ballots.get(&key).ok_or(DaoError::VotingNotStarted)?;
        let closes_at = ballot
            .starting_time
            .saturating_add(Self::voting_period(dao));
        if chain.timestamp() >= closes_at {
            return Err(DaoError::VotingPeriodOver);
        }

        let member = registry.get_address_if_delegated(msg.sender);
        if ballot.voters.contains_key(&member) {
            return Err(DaoError::AlreadyVoted(member));
        }
        let weight = dao
            .bank()?
            .balance_of_at(member, UNITS, ballot.block_number);
        if weight.is_zero() {
            return Err(DaoError::NoVotingWeight);
        }

        if let Some(ballot) = self.ballots.get_mut(&key) {
            match choice {
                VoteChoice::Yes => ballot.nb_yes += &weight,
                VoteChoice::No => ballot.nb_no += &weight,
            }
            ballot.voters.insert(member, choice);
        }
        debug!("{} voted {:?} on {} with weight {}", member, choice, proposal_id, weight);
        Ok(())
    }

    pub fn get_vote(&self, dao: &Dao, proposal_id: ProposalId, member: Address) -> Option<VoteChoice> {
        self.ballots
            .get(&(dao.address(), proposal_id))
            .and_then(|ballot| ballot.voters.get(&member).copied())
    }

    /// Yes and no weights cast so far.
    pub fn tally(&self, dao: &Dao, proposal_id: ProposalId) -> Option<(Amount, Amount)> {
        self.ballots
            .get(&(dao.address(), proposal_id))
            .map(|ballot| (ballot.nb_yes.clone(), ballot.nb_no.clone()))
    }
}

fn period(dao: &Dao, key: &ScopeId) -> u64 {
    dao.registry()
        .get_configuration(key)
        .to_u64()
        .unwrap_or(u64::MAX)
}

impl Adapter for Voting {
    fn name(&self) -> &'static str {
        ids::VOTING_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}

impl VotingAdapter for Voting {
    fn start_new_voting_for_proposal(
        &mut self,
        dao: &Dao,
        chain: &Chain,
        caller: Address,
        proposal_id: ProposalId,
    ) -> DaoResult<()> {
        if !dao.registry().is_adapter(caller) {
            return Err(DaoError::AdapterNotFound);
        }
        self.ballots.insert(
            (dao.address(), proposal_id),
            Ballot {
                nb_yes: Amount::zero(),
                nb_no: Amount::zero(),
                starting_time: chain.timestamp(),
                block_number: chain.block_number(),
                voters: HashMap::new(),
            },
        );
        info!("voting started for proposal {} at block {}", proposal_id, chain.block_number());
        Ok(())
    }

    fn get_sender_address(&self, dao: &Dao, sender: Address) -> Address {
        dao.registry().get_address_if_delegated(sender)
    }

    fn vote_result(&self, dao: &Dao, chain: &Chain, proposal_id: ProposalId) -> VotingState {
        let Some(ballot) = self.ballots.get(&(dao.address(), proposal_id)) else {
            return VotingState::NotStarted;
        };
        let closes_at = ballot
            .starting_time
            .saturating_add(Self::voting_period(dao));
        let settles_at = closes_at.saturating_add(Self::grace_period(dao));
        let now = chain.timestamp();
        if now < closes_at {
            return VotingState::InProgress;
        }
        if now < settles_at {
            return VotingState::GracePeriod;
        }
        match ballot.nb_yes.cmp(&ballot.nb_no) {
            std::cmp::Ordering::Greater => VotingState::Pass,
            std::cmp::Ordering::Less => VotingState::NotPass,
            std::cmp::Ordering::Equal => VotingState::Tie,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{DaoFlag, Flags};
    use crate::extensions::{BankExtension, ExtensionInstance};
    use crate::types::AccountRef;

    const OWNER: Address = Address::from_low_u64(0x100);
    const MEMBER: Address = Address::from_low_u64(0x300);
    const VOTING: Address = Address::from_low_u64(0x400);
    const PROPOSER: Address = Address::from_low_u64(0x500);

    /// DAO in creation mode with a bank, a proposer adapter and the voting
    /// adapter registered. MEMBER holds 3 UNITS, OWNER 1.
    fn setup() -> (Dao, Chain, Voting) {
        let mut chain = Chain::new();
        let mut dao = Dao::new("voting-test", Address::from_low_u64(0xda0));
        dao.registry_mut().initialize(OWNER, OWNER).unwrap();
        let bank = BankExtension::new(Address::from_low_u64(0xba), dao.address(), 10).unwrap();
        let bank_addr = dao.deploy_extension(ExtensionInstance::Bank(bank));
        dao.add_extension(OWNER, *ids::BANK, bank_addr, OWNER, chain.block_number())
            .unwrap();
        let registry = dao.registry_mut();
        registry
            .replace_adapter(OWNER, *ids::VOTING, VOTING, Flags::empty(), &[], &[])
            .unwrap();
        registry
            .replace_adapter(
                OWNER,
                ScopeId::from_name("proposer"),
                PROPOSER,
                Flags::of(&[DaoFlag::SubmitProposal]),
                &[],
                &[],
            )
            .unwrap();
        dao.add_to_balance(OWNER, AccountRef::Member(MEMBER), UNITS, &Amount::from(3u32), 1)
            .unwrap();

        let voting = Voting::new(VOTING);
        voting.configure_dao(&mut dao, OWNER, 10, 5).unwrap();
        chain.mine();
        (dao, chain, voting)
    }

    fn open(dao: &mut Dao, chain: &Chain, voting: &mut Voting, id: u64) -> ProposalId {
        let id = ProposalId::from_u64(id);
        dao.registry_mut().submit_proposal(PROPOSER, id).unwrap();
        dao.sponsor_proposal(PROPOSER, id, OWNER, VOTING).unwrap();
        voting
            .start_new_voting_for_proposal(dao, chain, PROPOSER, id)
            .unwrap();
        id
    }

    #[test]
    fn test_vote_lifecycle() {
        let (mut dao, mut chain, mut voting) = setup();
        let id = open(&mut dao, &chain, &mut voting, 1);

        assert_eq!(voting.vote_result(&dao, &chain, id), VotingState::InProgress);
        voting
            .submit_vote(&dao, &chain, &Msg::sender(MEMBER), id, 1)
            .unwrap();
        voting
            .submit_vote(&dao, &chain, &Msg::sender(OWNER), id, 2)
            .unwrap();
        assert_eq!(
            voting.tally(&dao, id),
            Some((Amount::from(3u32), Amount::from(1u32)))
        );

        chain.advance_time(10);
        assert_eq!(voting.vote_result(&dao, &chain, id), VotingState::GracePeriod);
        chain.advance_time(5);
        assert_eq!(voting.vote_result(&dao, &chain, id), VotingState::Pass);
    }

    #[test]
    fn test_vote_rejections() {
        let (mut dao, mut chain, mut voting) = setup();
        let id = open(&mut dao, &chain, &mut voting, 1);

        let stranger = Address::from_low_u64(0x999);
        assert_eq!(
            voting.submit_vote(&dao, &chain, &Msg::sender(stranger), id, 1),
            Err(DaoError::OnlyMember)
        );
        assert_eq!(
            voting.submit_vote(&dao, &chain, &Msg::sender(OWNER), id, 3),
            Err(DaoError::InvalidVoteChoice(3))
        );
        voting
            .submit_vote(&dao, &chain, &Msg::sender(OWNER), id, 1)
            .unwrap();
        assert_eq!(
            voting.submit_vote(&dao, &chain, &Msg::sender(OWNER), id, 1),
            Err(DaoError::AlreadyVoted(OWNER))
        );
        assert_eq!(
            voting.submit_vote(&dao, &chain, &Msg::sender(MEMBER), ProposalId::from_u64(9), 1),
            Err(DaoError::ProposalNotSponsored)
        );

        chain.advance_time(10);
        assert_eq!(
            voting.submit_vote(&dao, &chain, &Msg::sender(MEMBER), id, 1),
            Err(DaoError::VotingPeriodOver)
        );
    }

    #[test]
    fn test_weight_is_snapshotted_at_start() {
        let (mut dao, mut chain, mut voting) = setup();
        let id = open(&mut dao, &chain, &mut voting, 1);
        chain.mine();

        let late = Address::from_low_u64(0x301);
        dao.add_to_balance(
            OWNER,
            AccountRef::Member(late),
            UNITS,
            &Amount::from(50u32),
            chain.block_number(),
        )
        .unwrap();
        assert_eq!(
            voting.submit_vote(&dao, &chain, &Msg::sender(late), id, 1),
            Err(DaoError::NoVotingWeight)
        );
    }

    #[test]
    fn test_tie_without_votes() {
        let (mut dao, mut chain, mut voting) = setup();
        let id = open(&mut dao, &chain, &mut voting, 1);
        chain.advance_time(100);
        assert_eq!(voting.vote_result(&dao, &chain, id), VotingState::Tie);
        assert_eq!(
            voting.vote_result(&dao, &chain, ProposalId::from_u64(2)),
            VotingState::NotStarted
        );
    }

    #[test]
    fn test_only_adapters_start_votes() {
        let (mut dao, chain, mut voting) = setup();
        let id = ProposalId::from_u64(1);
        dao.registry_mut().submit_proposal(PROPOSER, id).unwrap();
        assert_eq!(
            voting.start_new_voting_for_proposal(&dao, &chain, OWNER, id),
            Err(DaoError::AdapterNotFound)
        );
    }
}
