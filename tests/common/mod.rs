// Shared fixtures for the DAO integration tests.
#![allow(dead_code)]

use aegis_dao::adapters::onboarding::OnboardingAdapter;
use aegis_dao::adapters::VoteChoice;
use aegis_dao::config::DeploymentConfig;
use aegis_dao::types::{Address, Amount, ProposalId, ETH_TOKEN, UNITS};
use aegis_dao::{deploy_dao, Chain, Deployment, Msg};

/// Long enough to clear the default voting and grace periods.
pub const SETTLE: u64 = 20;

pub fn setup() -> (Deployment, Chain) {
    setup_with(&DeploymentConfig::default())
}

pub fn setup_with(config: &DeploymentConfig) -> (Deployment, Chain) {
    let mut chain = Chain::new();
    let deployment = deploy_dao(&mut chain, config).expect("deployment");
    (deployment, chain)
}

/// Cheap units: 5 units per chunk at 10 wei a chunk.
pub fn cheap_units_config() -> DeploymentConfig {
    let mut config = DeploymentConfig::default();
    config.onboarding[0].unit_price = "10".to_string();
    config.onboarding[0].units_per_chunk = "5".to_string();
    config.onboarding[0].max_chunks = "1000".to_string();
    config
}

pub fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

pub fn vote(d: &mut Deployment, chain: &Chain, voter: Address, id: ProposalId, choice: VoteChoice) {
    d.adapters
        .voting
        .submit_vote(&d.dao, chain, &Msg::sender(voter), id, choice as u8)
        .expect("vote");
}

/// Onboards `applicant` for `chunks` chunks of UNITS, paid in ETH by the
/// owner, and waits out the vote.
pub fn onboard(d: &mut Deployment, chain: &mut Chain, id: ProposalId, applicant: Address, chunks: u32) {
    let price = OnboardingAdapter::terms(&d.dao, UNITS)
        .expect("onboarding terms")
        .unit_price;
    let amount = price * chunks;
    let owner = d.owner_msg();
    let owner_address = d.owner;

    d.adapters
        .onboarding
        .submit_proposal(
            &mut d.dao,
            chain,
            &mut d.adapters.voting,
            &owner,
            id,
            applicant,
            UNITS,
            amount.clone(),
        )
        .expect("submit onboarding");
    vote(d, chain, owner_address, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);

    chain.mint(owner_address, ETH_TOKEN, &amount);
    d.adapters
        .onboarding
        .process_proposal(
            &mut d.dao,
            chain,
            &d.adapters.voting,
            &owner.with_value(amount),
            id,
        )
        .expect("process onboarding");
}

pub fn units(d: &Deployment, holder: Address) -> Amount {
    d.dao.bank().expect("bank").balance_of(holder, UNITS)
}
