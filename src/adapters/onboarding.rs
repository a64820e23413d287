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
use crate::extensions::Extension;
use crate::types::{ids, AccountRef, Address, Amount, ProposalId, ScopeId, ETH_TOKEN};

pub const UNIT_PRICE: &str = "onboarding.unitPrice";
pub const UNITS_PER_CHUNK: &str = "onboarding.nbUnits";
pub const MAX_CHUNKS: &str = "onboarding.maxChunks";
pub const PAYMENT_TOKEN: &str = "onboarding.tokenAddr";

/// Price list for minting one internal token, read from the DAO's
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingTerms {
    pub unit_price: Amount,
    pub units_per_chunk: Amount,
    pub max_chunks: Amount,
    pub payment_token: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalDetails {
    pub applicant: Address,
    pub proposer: Address,
    pub token_to_mint: Address,
    pub payment_token: Address,
    /// Whole chunks only; anything above is refunded.
    pub amount: Amount,
    pub units_requested: Amount,
}

/// Admits new members, or tops up existing ones, in exchange for ETH or an
/// ERC20 token paid into the guild.
#[derive(Debug, Clone)]
pub struct OnboardingAdapter {
    address: Address,
    proposals: HashMap<(Address, ProposalId), ProposalDetails>,
}

impl OnboardingAdapter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            proposals: HashMap::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn configure_dao(
        &self,
        dao: &mut Dao,
        caller: Address,
        token_to_mint: Address,
        unit_price: Amount,
        units_per_chunk: Amount,
        max_chunks: Amount,
        payment_token: Address,
    ) -> DaoResult<()> {
        let registry = dao.registry();
        if !registry.in_creation_mode_with_access(caller) && !registry.is_adapter(caller) {
            return Err(DaoError::AccessDenied {
                caller,
                permission: "CONFIGURE_DAO",
            });
        }
        if unit_price.is_zero() || units_per_chunk.is_zero() || max_chunks.is_zero() {
            return Err(DaoError::InvalidAmount);
        }

        dao.register_potential_new_internal_token(caller, token_to_mint)?;
        dao.register_potential_new_token(caller, payment_token)?;
        let registry = dao.registry_mut();
        registry.set_configuration(caller, ScopeId::for_token(UNIT_PRICE, &token_to_mint), unit_price)?;
        registry.set_configuration(
            caller,
            ScopeId::for_token(UNITS_PER_CHUNK, &token_to_mint),
            units_per_chunk,
        )?;
        registry.set_configuration(caller, ScopeId::for_token(MAX_CHUNKS, &token_to_mint), max_chunks)?;
        registry.set_address_configuration(
            caller,
            ScopeId::for_token(PAYMENT_TOKEN, &token_to_mint),
            payment_token,
        )?;
        info!("onboarding configured for {} paid in {}", token_to_mint, payment_token);
        Ok(())
    }

    pub fn terms(dao: &Dao, token_to_mint: Address) -> DaoResult<OnboardingTerms> {
        let registry = dao.registry();
        let read = |name: &'static str| -> DaoResult<Amount> {
            let value = registry.get_configuration(&ScopeId::for_token(name, &token_to_mint));
            if value.is_zero() {
                Err(DaoError::ConfigurationMissing(name))
            } else {
                Ok(value)
            }
        };
        Ok(OnboardingTerms {
            unit_price: read(UNIT_PRICE)?,
            units_per_chunk: read(UNITS_PER_CHUNK)?,
            max_chunks: read(MAX_CHUNKS)?,
            payment_token: registry
                .get_address_configuration(&ScopeId::for_token(PAYMENT_TOKEN, &token_to_mint)),
        })
    }

    /// Proposes minting `token_to_mint` for `applicant` against `amount` of
    /// the configured payment token.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_proposal(
        &mut self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &mut dyn VotingAdapter,
        msg: &Msg,
        proposal_id: ProposalId,
        applicant: Address,
        token_to_mint: Address,
        amount: Amount,
    ) -> DaoResult<()> {
        if applicant.is_zero() {
            return Err(DaoError::InvalidMemberAddress(applicant));
        }
        if applicant.is_reserved() {
            return Err(DaoError::ReservedAddress(applicant));
        }
        require_active_member(dao, msg.sender)?;

        let terms = Self::terms(dao, token_to_mint)?;
        let chunks = &amount / &terms.unit_price;
        if chunks.is_zero() {
            return Err(DaoError::InvalidAmount);
        }
        let units_requested = &chunks * &terms.units_per_chunk;
        let held = dao.bank()?.balance_of(applicant, token_to_mint);
        if (held + &units_requested) / &terms.units_per_chunk >= terms.max_chunks {
            return Err(DaoError::MemberUnitsCapExceeded);
        }

        let details = ProposalDetails {
            applicant,
            proposer: dao.registry().get_address_if_delegated(msg.sender),
            token_to_mint,
            payment_token: terms.payment_token,
            amount: chunks * &terms.unit_price,
            units_requested,
        };

        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.registry_mut().submit_proposal(adapter, proposal_id)?;
            dao.registry_mut().potential_new_member(adapter, applicant)?;
            sponsor_and_start_voting(dao, chain, voting, adapter, msg.sender, proposal_id)
        })?;
        info!(
            "onboarding proposal {} for {}: {} units",
            proposal_id, applicant, details.units_requested
        );
        self.proposals.insert((dao.address(), proposal_id), details);
        Ok(())
    }

    /// Settles the proposal. ETH attached to `msg` pays for a passed ETH
    /// proposal; the excess, or everything on rejection, goes back to the
    /// sender. ERC20 payments are pulled from the sender's allowance.
    pub fn process_proposal(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        voting: &dyn VotingAdapter,
        msg: &Msg,
        proposal_id: ProposalId,
    ) -> DaoResult<VotingState> {
        let details = self
            .proposals
            .get(&(dao.address(), proposal_id))
            .cloned()
            .ok_or(DaoError::ProposalDoesNotExist)?;
        let adapter = self.address;

        atomically(dao, chain, |dao, chain| {
            ensure_processable(dao, proposal_id)?;
            let result = settled_result(dao, chain, voting, proposal_id)?;
            dao.registry_mut().process_proposal(adapter, proposal_id)?;
            chain.transfer(msg.sender, adapter, ETH_TOKEN, &msg.value)?;

            if result == VotingState::Pass {
                Self::mint_and_collect(dao, chain, adapter, msg, &details)?;
            } else {
                chain.transfer(adapter, msg.sender, ETH_TOKEN, &msg.value)?;
            }
            info!("onboarding proposal {} processed: {:?}", proposal_id, result);
            Ok(result)
        })
    }

    fn mint_and_collect(
        dao: &mut Dao,
        chain: &mut Chain,
        adapter: Address,
        msg: &Msg,
        details: &ProposalDetails,
    ) -> DaoResult<()> {
        let bank = dao.bank()?;
        if !bank.is_internal_token(details.token_to_mint) {
            return Err(DaoError::TokenNotAllowed(details.token_to_mint));
        }
        let bank_address = bank.address();
        let block = chain.block_number();

        dao.registry_mut()
            .potential_new_member(adapter, details.applicant)?;
        dao.add_to_balance(
            adapter,
            AccountRef::Member(details.applicant),
            details.token_to_mint,
            &details.units_requested,
            block,
        )?;

        if details.payment_token == ETH_TOKEN {
            if msg.value < details.amount {
                return Err(DaoError::InsufficientBalance);
            }
            chain.transfer(adapter, bank_address, ETH_TOKEN, &details.amount)?;
            chain.transfer(adapter, msg.sender, ETH_TOKEN, &(&msg.value - &details.amount))?;
        } else {
            chain.transfer_from(
                adapter,
                msg.sender,
                bank_address,
                details.payment_token,
                &details.amount,
            )?;
            chain.transfer(adapter, msg.sender, ETH_TOKEN, &msg.value)?;
        }
        dao.add_to_balance(
            adapter,
            AccountRef::GUILD,
            details.payment_token,
            &details.amount,
            block,
        )
    }

    pub fn proposal(&self, dao: &Dao, proposal_id: ProposalId) -> Option<&ProposalDetails> {
        self.proposals.get(&(dao.address(), proposal_id))
    }
}

impl Adapter for OnboardingAdapter {
    fn name(&self) -> &'static str {
        ids::ONBOARDING_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
