// Proposal lifecycle, access control and role management on a deployed DAO.

mod common;

use aegis_dao::acl::{BankFlag, DaoFlag, ExecutorFlag, Flags};
use aegis_dao::adapters::{
    Adapter, ConfigEntry, InitiativeStatus, ManagingProposal, Milestone, RoleAction,
    SignatureRequest, UpdateType, VoteChoice, VotingState,
};
use aegis_dao::extensions::erc1271::MAGIC_VALUE;
use aegis_dao::types::{
    ids, sha256, AccountRef, Amount, ProposalId, ScopeId, ETH_TOKEN, UNITS,
};
use aegis_dao::{DaoError, Deployment, Msg};
use common::{addr, onboard, setup, units, vote, SETTLE};

fn submit_financing(d: &mut Deployment, chain: &mut aegis_dao::Chain, id: ProposalId, amount: u32) {
    let owner = d.owner_msg();
    d.adapters
        .financing
        .submit_proposal(
            &mut d.dao,
            chain,
            &mut d.adapters.voting,
            &owner,
            id,
            addr(0xfa),
            ETH_TOKEN,
            Amount::from(amount),
        )
        .unwrap();
}

#[test]
fn test_processing_twice_is_rejected() {
    let (mut d, mut chain) = setup();
    let applicant = addr(0x11);
    let id = ProposalId::from_u64(1);
    onboard(&mut d, &mut chain, id, applicant, 2);
    let minted = units(&d, applicant);

    let owner = d.owner_msg();
    let err = d
        .adapters
        .onboarding
        .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, &owner, id)
        .unwrap_err();

    assert_eq!(err, DaoError::FlagAlreadySet("PROCESSED"));
    assert_eq!(units(&d, applicant), minted);
}

#[test]
fn test_proposal_ids_are_unique_across_adapters() {
    let (mut d, mut chain) = setup();
    let id = ProposalId::from_u64(7);
    submit_financing(&mut d, &mut chain, id, 100);

    let owner = d.owner_msg();
    let err = d
        .adapters
        .configuration
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            vec![ConfigEntry::Numeric {
                key: ScopeId::from_name("quorum"),
                value: Amount::from(1u32),
            }],
        )
        .unwrap_err();
    assert_eq!(err, DaoError::ProposalIdMustBeUnique(id));
    assert_eq!(
        d.dao.registry().proposal(id).map(|p| p.adapter),
        Some(d.adapters.financing.address())
    );
}

#[test]
fn test_rejected_proposal_cannot_be_processed() {
    let (mut d, mut chain) = setup();
    let id = ProposalId::from_u64(3);
    submit_financing(&mut d, &mut chain, id, 100);

    let voter = d.owner;
    vote(&mut d, &chain, voter, id, VoteChoice::No);
    assert_eq!(
        d.adapters
            .financing
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
        Err(DaoError::ProposalHasNotBeenVotedOnYet)
    );

    chain.advance_time(SETTLE);
    assert_eq!(
        d.adapters
            .financing
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
        Err(DaoError::ProposalNeedsToPass)
    );
    assert!(!d
        .dao
        .registry()
        .get_proposal_flag(id, aegis_dao::registry::ProposalFlag::Processed));
}

#[test]
fn test_non_members_cannot_submit() {
    let (mut d, mut chain) = setup();
    let stranger = Msg::sender(addr(0x99));
    let err = d
        .adapters
        .financing
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &stranger,
            ProposalId::from_u64(1),
            addr(0x99),
            ETH_TOKEN,
            Amount::from(1u32),
        )
        .unwrap_err();
    assert_eq!(err, DaoError::OnlyMember);
}

#[test]
fn test_extension_acl_gates_bank_calls() {
    let (mut d, chain) = setup();
    let distribute = d.adapters.distribute.address();
    let managing = d.adapters.managing.address();
    let bank = d.dao.registry().get_extension_address(&ids::BANK).unwrap();
    let member = AccountRef::Member(addr(0x21));
    let block = chain.block_number();

    let err = d
        .dao
        .add_to_balance(distribute, member, ETH_TOKEN, &Amount::from(5u32), block)
        .unwrap_err();
    assert!(matches!(
        err,
        DaoError::AccessDenied {
            permission: "ADD_TO_BALANCE",
            ..
        }
    ));

    let bits = Flags::of(&[BankFlag::AddToBalance, BankFlag::InternalTransfer]).bits();
    d.dao
        .registry_mut()
        .set_acl_to_extension_for_adapter(managing, bank, distribute, bits)
        .unwrap();
    d.dao
        .add_to_balance(distribute, member, ETH_TOKEN, &Amount::from(5u32), block)
        .unwrap();
    assert_eq!(
        d.dao.bank().unwrap().balance_of(member, ETH_TOKEN),
        Amount::from(5u32)
    );

    // Granting requires ADD_EXTENSION on the DAO itself.
    assert!(matches!(
        d.dao
            .registry_mut()
            .set_acl_to_extension_for_adapter(distribute, bank, distribute, bits),
        Err(DaoError::AccessDenied {
            permission: "ADD_EXTENSION",
            ..
        })
    ));
}

#[test]
fn test_vetoed_proposal_is_blocked() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;

    let role_id = ProposalId::from_u64(1);
    d.adapters
        .vetoer
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            role_id,
            RoleAction::Add,
            d.owner,
        )
        .unwrap();
    vote(&mut d, &chain, voter, role_id, VoteChoice::Yes);
    chain.advance_time(SETTLE);
    assert_eq!(
        d.adapters
            .vetoer
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, role_id),
        Ok(true)
    );
    assert!(d.dao.registry().is_vetoer(d.owner));

    let id = ProposalId::from_u64(2);
    submit_financing(&mut d, &mut chain, id, 100);
    assert_eq!(
        d.adapters
            .vetoer
            .veto_proposal(&mut d.dao, &mut chain, &Msg::sender(addr(0x31)), id),
        Err(DaoError::NotAVetoer(addr(0x31)))
    );
    d.adapters
        .vetoer
        .veto_proposal(&mut d.dao, &mut chain, &owner, id)
        .unwrap();
    assert!(d.dao.registry().is_vetoed(id));

    assert_eq!(
        d.adapters
            .voting
            .submit_vote(&d.dao, &chain, &owner, id, VoteChoice::Yes as u8),
        Err(DaoError::ProposalVetoed)
    );
    chain.advance_time(SETTLE);
    assert_eq!(
        d.adapters
            .financing
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
        Err(DaoError::ProposalVetoed)
    );
}

#[test]
fn test_vetoer_role_ignores_non_members() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;
    let outsider = addr(0x77);
    let id = ProposalId::from_u64(1);

    d.adapters
        .vetoer
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            RoleAction::Add,
            outsider,
        )
        .unwrap();
    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);

    assert_eq!(
        d.adapters
            .vetoer
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
        Ok(false)
    );
    assert!(!d.dao.registry().is_vetoer(outsider));
    assert!(d
        .dao
        .registry()
        .get_proposal_flag(id, aegis_dao::registry::ProposalFlag::Processed));
}

#[test]
fn test_service_provider_added_then_removed() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;

    for (n, action) in [(1u64, RoleAction::Add), (2, RoleAction::Remove)] {
        let id = ProposalId::from_u64(n);
        d.adapters
            .service_provider
            .submit_proposal(
                &mut d.dao,
                &mut chain,
                &mut d.adapters.voting,
                &owner,
                id,
                action,
                d.owner,
            )
            .unwrap();
        vote(&mut d, &chain, voter, id, VoteChoice::Yes);
        chain.advance_time(SETTLE);
        assert_eq!(
            d.adapters.service_provider.process_proposal(
                &mut d.dao,
                &mut chain,
                &d.adapters.voting,
                id
            ),
            Ok(true)
        );
        assert_eq!(
            d.dao.registry().is_service_provider(d.owner),
            action == RoleAction::Add
        );
    }
}

#[test]
fn test_delegate_key_votes_for_its_member() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let delegate = addr(0xde1e);
    let before = chain.block_number();
    chain.mine();

    d.adapters
        .dao_registry
        .update_delegate_key(&mut d.dao, &mut chain, &owner, delegate)
        .unwrap();
    let registry = d.dao.registry();
    assert_eq!(registry.get_current_delegate_key(d.owner), delegate);
    assert_eq!(registry.get_prior_delegate_key(d.owner, before), d.owner);
    assert_eq!(
        registry.get_prior_delegate_key(d.owner, chain.block_number()),
        delegate
    );
    assert_eq!(registry.get_address_if_delegated(delegate), d.owner);
    assert!(d.dao.is_active_member(delegate));

    let id = ProposalId::from_u64(1);
    submit_financing(&mut d, &mut chain, id, 100);
    vote(&mut d, &chain, delegate, id, VoteChoice::Yes);
    assert_eq!(
        d.adapters.voting.get_vote(&d.dao, id, d.owner),
        Some(VoteChoice::Yes)
    );
    assert_eq!(
        d.adapters
            .voting
            .submit_vote(&d.dao, &chain, &owner, id, VoteChoice::No as u8),
        Err(DaoError::AlreadyVoted(d.owner))
    );
    let (yes, no) = d.adapters.voting.tally(&d.dao, id).unwrap();
    assert_eq!(yes, units(&d, d.owner));
    assert_eq!(no, Amount::from(0u32));
}

#[test]
fn test_delegate_key_cannot_be_a_member() {
    let (mut d, mut chain) = setup();
    let member = addr(0x41);
    onboard(&mut d, &mut chain, ProposalId::from_u64(1), member, 1);

    let owner = d.owner_msg();
    assert_eq!(
        d.adapters
            .dao_registry
            .update_delegate_key(&mut d.dao, &mut chain, &owner, member),
        Err(DaoError::CannotOverwriteExistingDelegatedKey)
    );
    assert_eq!(d.dao.registry().get_current_delegate_key(d.owner), d.owner);
}

#[test]
fn test_member_address_stays_bound_after_delegating() {
    let (mut d, mut chain) = setup();
    let member = addr(0x41);
    onboard(&mut d, &mut chain, ProposalId::from_u64(1), member, 1);
    let owner = d.owner_msg();

    d.adapters
        .dao_registry
        .update_delegate_key(&mut d.dao, &mut chain, &owner, addr(0x99))
        .unwrap();
    assert_eq!(
        d.adapters.dao_registry.update_delegate_key(
            &mut d.dao,
            &mut chain,
            &Msg::sender(member),
            d.owner
        ),
        Err(DaoError::CannotOverwriteExistingDelegatedKey)
    );
    assert_eq!(d.dao.registry().get_address_if_delegated(d.owner), d.owner);
    assert_eq!(d.dao.registry().get_current_delegate_key(member), member);

    let id = ProposalId::from_u64(2);
    submit_financing(&mut d, &mut chain, id, 100);
    d.adapters
        .voting
        .submit_vote(&d.dao, &chain, &owner, id, VoteChoice::Yes as u8)
        .unwrap();
    assert_eq!(
        d.adapters.voting.get_vote(&d.dao, id, d.owner),
        Some(VoteChoice::Yes)
    );
    assert_eq!(d.adapters.voting.get_vote(&d.dao, id, member), None);
}

#[test]
fn test_pending_applicant_cannot_become_delegate_key() {
    let (mut d, mut chain) = setup();
    let applicant = addr(0x51);
    let owner = d.owner_msg();
    let price = aegis_dao::adapters::OnboardingAdapter::terms(&d.dao, UNITS)
        .unwrap()
        .unit_price;

    d.adapters
        .onboarding
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            ProposalId::from_u64(1),
            applicant,
            UNITS,
            price,
        )
        .unwrap();
    assert!(d.dao.registry().is_member(applicant));
    assert!(!d.dao.is_active_member(applicant));

    assert_eq!(
        d.adapters
            .dao_registry
            .update_delegate_key(&mut d.dao, &mut chain, &owner, applicant),
        Err(DaoError::CannotOverwriteExistingDelegatedKey)
    );
    assert_eq!(d.dao.registry().get_current_delegate_key(d.owner), d.owner);
}

#[test]
fn test_configuration_proposal_sets_values() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;
    let id = ProposalId::from_u64(1);
    let quorum = ScopeId::from_name("quorum");
    let treasury = ScopeId::from_name("treasury");

    assert_eq!(
        d.adapters.configuration.submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            Vec::new()
        ),
        Err(DaoError::NothingToConfigure)
    );
    assert!(d.dao.registry().proposal(id).is_none());

    d.adapters
        .configuration
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            vec![
                ConfigEntry::Numeric {
                    key: quorum,
                    value: Amount::from(42u32),
                },
                ConfigEntry::Address {
                    key: treasury,
                    value: addr(0x7e),
                },
            ],
        )
        .unwrap();
    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);
    d.adapters
        .configuration
        .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id)
        .unwrap();

    assert_eq!(d.dao.registry().get_configuration(&quorum), Amount::from(42u32));
    assert_eq!(d.dao.registry().get_address_configuration(&treasury), addr(0x7e));
}

#[test]
fn test_signature_proposal_makes_dao_a_signer() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;
    let id = ProposalId::from_u64(1);
    let permission_hash = sha256(b"transfer 10 tokens");
    let signature = b"dao approved signature";

    assert_eq!(
        d.dao.erc1271().unwrap().is_valid_signature(permission_hash, signature),
        Err(DaoError::InvalidSignature)
    );

    d.adapters
        .signatures
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            SignatureRequest {
                permission_hash,
                signature_hash: sha256(signature),
                magic_value: MAGIC_VALUE,
            },
        )
        .unwrap();
    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);
    d.adapters
        .signatures
        .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id)
        .unwrap();

    let erc1271 = d.dao.erc1271().unwrap();
    assert_eq!(
        erc1271.is_valid_signature(permission_hash, signature),
        Ok(MAGIC_VALUE)
    );
    assert_eq!(
        erc1271.is_valid_signature(permission_hash, b"forged"),
        Err(DaoError::InvalidSignatureHash)
    );
}

#[test]
fn test_executor_requires_execute_flag() {
    let (mut d, _chain) = setup();
    let caller = d.adapters.financing.address();
    let managing = d.adapters.managing.address();
    let executor = d.dao.registry().get_extension_address(&ids::EXECUTOR).unwrap();

    assert!(matches!(
        d.dao.execute(caller, |_, acting| Ok(acting)),
        Err(DaoError::AccessDenied {
            permission: "EXECUTE",
            ..
        })
    ));

    d.dao
        .registry_mut()
        .set_acl_to_extension_for_adapter(
            managing,
            executor,
            caller,
            Flags::of(&[ExecutorFlag::Execute]).bits(),
        )
        .unwrap();
    assert_eq!(d.dao.execute(caller, |_, acting| Ok(acting)), Ok(executor));
}

#[test]
fn test_managing_replaces_adapter_and_writes_config() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;
    let old_financing = d.adapters.financing.address();
    let new_financing = addr(0xf1);
    let limit = ScopeId::from_name("financing.limit");
    let id = ProposalId::from_u64(1);

    d.adapters
        .managing
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            ManagingProposal {
                id: *ids::FINANCING,
                address: new_financing,
                update_type: UpdateType::Adapter,
                flags: Flags::of(&[DaoFlag::SubmitProposal]),
                keys: vec![limit],
                values: vec![Amount::from(500u32)],
                extension_acls: Vec::new(),
            },
        )
        .unwrap();
    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);
    d.adapters
        .managing
        .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id)
        .unwrap();

    let registry = d.dao.registry();
    assert_eq!(registry.get_adapter_address(&ids::FINANCING), Ok(new_financing));
    assert!(!registry.is_adapter(old_financing));
    assert!(registry.has_adapter_access(new_financing, DaoFlag::SubmitProposal));
    assert_eq!(registry.get_configuration(&limit), Amount::from(500u32));

    // The old instance lost its rights with its registration.
    let err = d
        .adapters
        .financing
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            ProposalId::from_u64(2),
            addr(0xfa),
            ETH_TOKEN,
            Amount::from(1u32),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        DaoError::AccessDenied {
            permission: "SUBMIT_PROPOSAL",
            ..
        }
    ));
}

#[test]
fn test_managing_swaps_extension() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;
    let old = d.dao.registry().get_extension_address(&ids::ERC1271).unwrap();
    let new = d.factories.erc1271.create(&mut d.dao, &mut chain);
    let id = ProposalId::from_u64(1);

    d.adapters
        .managing
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            ManagingProposal {
                id: *ids::ERC1271,
                address: new,
                update_type: UpdateType::Extension,
                flags: Flags::empty(),
                keys: Vec::new(),
                values: Vec::new(),
                extension_acls: Vec::new(),
            },
        )
        .unwrap();
    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);
    d.adapters
        .managing
        .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id)
        .unwrap();

    let registry = d.dao.registry();
    assert_eq!(registry.get_extension_address(&ids::ERC1271), Ok(new));
    assert!(registry.is_extension(new));
    assert!(!registry.is_extension(old));
    assert_eq!(registry.extension_id(old), None);
    assert_eq!(
        d.factories.erc1271.get_extension_address(d.dao.address()),
        new
    );
}

#[test]
fn test_unknown_update_type_fails_at_processing() {
    let (mut d, mut chain) = setup();
    let owner = d.owner_msg();
    let voter = d.owner;
    let id = ProposalId::from_u64(1);

    d.adapters
        .managing
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            ManagingProposal {
                id: ScopeId::from_name("mystery"),
                address: addr(0xab),
                update_type: UpdateType::Unknown,
                flags: Flags::empty(),
                keys: Vec::new(),
                values: Vec::new(),
                extension_acls: Vec::new(),
            },
        )
        .unwrap();
    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);

    assert_eq!(
        d.adapters
            .managing
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
        Err(DaoError::UnknownUpdateType(0))
    );
    // The failed call left the proposal unprocessed.
    assert!(!d
        .dao
        .registry()
        .get_proposal_flag(id, aegis_dao::registry::ProposalFlag::Processed));
}

#[test]
fn test_voting_weight_is_taken_at_start_block() {
    let (mut d, mut chain) = setup();
    let id = ProposalId::from_u64(50);
    submit_financing(&mut d, &mut chain, id, 100);

    // Units credited after the vote opened carry no weight on it.
    let late = addr(0x51);
    let onboarding = d.adapters.onboarding.address();
    chain.mine();
    d.dao
        .add_to_balance(
            onboarding,
            AccountRef::Member(late),
            UNITS,
            &Amount::from(1_000u32),
            chain.block_number(),
        )
        .unwrap();
    assert!(d.dao.is_active_member(late));
    assert_eq!(
        d.adapters
            .voting
            .submit_vote(&d.dao, &chain, &Msg::sender(late), id, VoteChoice::Yes as u8),
        Err(DaoError::NoVotingWeight)
    );
    assert_eq!(
        d.dao.bank().unwrap().balance_of(AccountRef::TOTAL, UNITS),
        units(&d, d.owner) + units(&d, late)
    );
}

#[test]
fn test_initiative_releases_milestones_when_due() {
    let (mut d, mut chain) = setup();
    onboard(&mut d, &mut chain, ProposalId::from_u64(1), addr(0x61), 1);
    let owner = d.owner_msg();
    let voter = d.owner;
    let receiver = addr(0x62);
    let id = ProposalId::from_u64(2);
    let due = chain.timestamp() + 1_000;

    d.adapters
        .initiative
        .submit_proposal(
            &mut d.dao,
            &mut chain,
            &mut d.adapters.voting,
            &owner,
            id,
            ETH_TOKEN,
            receiver,
            vec![
                Milestone::new(due, Amount::from(10u32)),
                Milestone::new(due + 1_000, Amount::from(5u32)),
            ],
        )
        .unwrap();
    assert_eq!(d.adapters.initiative.get_count_milestone(&d.dao, id), 2);
    assert_eq!(
        d.adapters
            .initiative
            .execute_milestone(&mut d.dao, &mut chain, id, 0),
        Err(DaoError::ProposalDidNotPass)
    );

    vote(&mut d, &chain, voter, id, VoteChoice::Yes);
    chain.advance_time(SETTLE);
    assert_eq!(
        d.adapters
            .initiative
            .process_proposal(&mut d.dao, &mut chain, &d.adapters.voting, id),
        Ok(VotingState::Pass)
    );
    assert_eq!(
        d.adapters.initiative.initiative(&d.dao, id).map(|i| i.status),
        Some(InitiativeStatus::Approved)
    );

    let guild_before = d.dao.bank().unwrap().balance_of(AccountRef::GUILD, ETH_TOKEN);
    assert_eq!(
        d.adapters
            .initiative
            .execute_milestone(&mut d.dao, &mut chain, id, 0),
        Err(DaoError::MilestoneNotDue(due))
    );

    chain.advance_time(1_000);
    d.adapters
        .initiative
        .execute_milestone(&mut d.dao, &mut chain, id, 0)
        .unwrap();
    let bank = d.dao.bank().unwrap();
    assert_eq!(bank.balance_of(receiver, ETH_TOKEN), Amount::from(10u32));
    assert_eq!(
        bank.balance_of(AccountRef::GUILD, ETH_TOKEN),
        guild_before - Amount::from(10u32)
    );
    assert!(d.adapters.initiative.get_milestone(&d.dao, id, 0).unwrap().executed);

    assert_eq!(
        d.adapters
            .initiative
            .execute_milestone(&mut d.dao, &mut chain, id, 0),
        Err(DaoError::MilestoneAlreadyExecuted(0))
    );
    assert_eq!(
        d.adapters
            .initiative
            .execute_milestone(&mut d.dao, &mut chain, id, 1),
        Err(DaoError::MilestoneNotDue(due + 1_000))
    );
    assert_eq!(
        d.adapters.initiative.get_milestone(&d.dao, id, 2),
        Err(DaoError::MilestonesNotFound)
    );
}
