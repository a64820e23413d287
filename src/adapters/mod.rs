//! Governance adapters. Each one encodes a single action as a proposal that
//! is submitted, sponsored, voted on and then processed against a DAO.
//!
//! Adapters are multi-tenant: one instance serves any number of DAOs and
//! keys its own proposal cache by DAO address. Every entry point runs as one
//! transaction through [`atomically`](crate::chain::atomically); the adapter's
//! own cache is only written once the DAO side has succeeded.

pub mod bank_adapter;
pub mod configuration;
pub mod dao_registry_adapter;
pub mod distribute;
pub mod financing;
pub mod guild_kick;
pub mod initiative;
pub mod managing;
pub mod onboarding;
pub mod service_provider;
pub mod signatures;
pub mod vetoer;
pub mod voting;

use crate::acl::Flag;
use crate::chain::Chain;
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::registry::ProposalFlag;
use crate::types::{ids, Address, ProposalId, ScopeId};

pub use bank_adapter::BankAdapter;
pub use configuration::{ConfigEntry, ConfigurationAdapter};
pub use dao_registry_adapter::DaoRegistryAdapter;
pub use distribute::{DistributeAdapter, DistributionStatus};
pub use financing::FinancingAdapter;
pub use guild_kick::GuildKickAdapter;
pub use initiative::{InitiativeAdapter, InitiativeStatus, Milestone};
pub use managing::{ManagingAdapter, ProposalDetails as ManagingProposal, UpdateType};
pub use onboarding::OnboardingAdapter;
pub use service_provider::ServiceProviderAdapter;
pub use signatures::{SignatureRequest, SignaturesAdapter};
pub use vetoer::{RoleAction, VetoerAdapter};
pub use voting::{VoteChoice, Voting, VotingAdapter, VotingState};

/// Common identity of every adapter.
pub trait Adapter {
    /// Name the adapter is registered under in a DAO.
    fn name(&self) -> &'static str;

    fn address(&self) -> Address;

    fn id(&self) -> ScopeId {
        ScopeId::from_name(self.name())
    }
}

pub(crate) fn require_active_member(dao: &Dao, sender: Address) -> DaoResult<()> {
    if dao.is_active_member(sender) {
        Ok(())
    } else {
        Err(DaoError::OnlyMember)
    }
}

/// The voting adapter must be the one registered for the DAO.
pub(crate) fn require_registered_voting(dao: &Dao, voting: &dyn VotingAdapter) -> DaoResult<()> {
    if dao.registry().get_adapter_address(&ids::VOTING)? != voting.address() {
        return Err(DaoError::AdapterNotFound);
    }
    Ok(())
}

/// Sponsors `proposal_id` on behalf of `sender` and opens its vote.
pub(crate) fn sponsor_and_start_voting(
    dao: &mut Dao,
    chain: &Chain,
    voting: &mut dyn VotingAdapter,
    adapter: Address,
    sender: Address,
    proposal_id: ProposalId,
) -> DaoResult<()> {
    require_registered_voting(dao, voting)?;
    let sponsor = voting.get_sender_address(dao, sender);
    dao.sponsor_proposal(adapter, proposal_id, sponsor, voting.address())?;
    voting.start_new_voting_for_proposal(dao, chain, adapter, proposal_id)
}

/// Rejects proposals that cannot be processed regardless of the vote.
pub(crate) fn ensure_processable(dao: &Dao, proposal_id: ProposalId) -> DaoResult<()> {
    let registry = dao.registry();
    if !registry.get_proposal_flag(proposal_id, ProposalFlag::Exists) {
        return Err(DaoError::ProposalDoesNotExist);
    }
    if registry.get_proposal_flag(proposal_id, ProposalFlag::Processed) {
        return Err(DaoError::FlagAlreadySet(ProposalFlag::Processed.name()));
    }
    if registry.is_vetoed(proposal_id) {
        return Err(DaoError::ProposalVetoed);
    }
    Ok(())
}

/// Final outcome of the vote on `proposal_id`. Fails while the vote or its
/// grace period is still running.
pub(crate) fn settled_result(
    dao: &Dao,
    chain: &Chain,
    voting: &dyn VotingAdapter,
    proposal_id: ProposalId,
) -> DaoResult<VotingState> {
    if dao.registry().voting_adapter(proposal_id) != Some(voting.address()) {
        return Err(DaoError::AdapterNotFound);
    }
    match voting.vote_result(dao, chain, proposal_id) {
        VotingState::NotStarted | VotingState::InProgress | VotingState::GracePeriod => {
            Err(DaoError::ProposalHasNotBeenVotedOnYet)
        }
        settled => Ok(settled),
    }
}
