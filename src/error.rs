use thiserror::Error;

use crate::types::{Address, ProposalId};

/// Every failure a DAO call can surface. A returned error means the whole call
/// was reverted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DaoError {
    // Identity and uniqueness
    #[error("invalid proposal id")]
    ProposalIdInvalid,

    #[error("proposal id {0} must be unique")]
    ProposalIdMustBeUnique(ProposalId),

    #[error("address {0} already in use")]
    AddressAlreadyInUse(Address),

    #[error("adapter not found")]
    AdapterNotFound,

    #[error("extension not found")]
    ExtensionNotFound,

    #[error("extension id already in use")]
    ExtensionIdInUse,

    #[error("extension {0} can not be re-added")]
    ExtensionDeleted(Address),

    #[error("id must not be empty")]
    EmptyId,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid member address {0}")]
    InvalidMemberAddress(Address),

    #[error("dao name {0} already taken")]
    DaoNameTaken(String),

    // Authorization
    #[error("onlyMember")]
    OnlyMember,

    #[error("access denied: {caller} lacks {permission}")]
    AccessDenied {
        caller: Address,
        permission: &'static str,
    },

    #[error("address {0} is reserved")]
    ReservedAddress(Address),

    #[error("{0} is not a member")]
    NotAMember(Address),

    #[error("{0} is not a vetoer")]
    NotAVetoer(Address),

    #[error("invalid adapter try to set flag")]
    AdapterMismatch,

    // Proposal lifecycle
    #[error("proposal does not exist")]
    ProposalDoesNotExist,

    #[error("flag {0} already set")]
    FlagAlreadySet(&'static str),

    #[error("proposal has not been sponsored")]
    ProposalNotSponsored,

    #[error("proposal has not been voted on yet")]
    ProposalHasNotBeenVotedOnYet,

    #[error("proposal needs to pass")]
    ProposalNeedsToPass,

    #[error("proposal did not pass")]
    ProposalDidNotPass,

    #[error("proposal vetoed")]
    ProposalVetoed,

    #[error("another proposal already in progress")]
    AnotherProposalInProgress,

    #[error("dao already finalized")]
    DaoAlreadyFinalized,

    // Voting
    #[error("this proposal has no vote going on at the moment")]
    VotingNotStarted,

    #[error("vote has already ended")]
    VotingPeriodOver,

    #[error("member {0} has already voted")]
    AlreadyVoted(Address),

    #[error("vote not allowed: no voting weight")]
    NoVotingWeight,

    #[error("invalid vote choice {0}")]
    InvalidVoteChoice(u8),

    // Accounting
    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("insufficient allowance")]
    InsufficientAllowance,

    #[error("token {0} not allowed")]
    TokenNotAllowed(Address),

    #[error("exceeds the maximum tokens allowed")]
    TokenLimitExceeded,

    #[error("token {0} already registered with a different class")]
    TokenClassConflict(Address),

    #[error("max number of external tokens should be (0,200], got {0}")]
    InvalidMaxExternalTokens(u8),

    #[error("value would overflow the balance bound")]
    Overflow,

    #[error("invalid amount")]
    InvalidAmount,

    #[error("nothing to withdraw")]
    NothingToWithdraw,

    #[error("total units for this member must be lower than the maximum")]
    MemberUnitsCapExceeded,

    #[error("use ragequit")]
    UseRagequit,

    #[error("no units or loot")]
    NoUnitsOrLoot,

    #[error("not enough units")]
    NotEnoughUnits,

    #[error("distribution completed or does not exist")]
    DistributionNotInProgress,

    // Initiatives
    #[error("milestones must be non empty")]
    MilestonesMustBeNonEmpty,

    #[error("not found milestones")]
    MilestonesNotFound,

    #[error("milestone {0} already executed")]
    MilestoneAlreadyExecuted(usize),

    #[error("milestone not due before {0}")]
    MilestoneNotDue(u64),

    // Configuration
    #[error("must be an equal number of keys and values")]
    KeyValueCountMismatch,

    #[error("unknown update type {0}")]
    UnknownUpdateType(u8),

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("invalid flag name {0}")]
    InvalidFlagName(String),

    #[error("configuration {0} missing")]
    ConfigurationMissing(&'static str),

    #[error("missing configs")]
    NothingToConfigure,

    // Delegation
    #[error("cannot overwrite existing delegated keys")]
    CannotOverwriteExistingDelegatedKey,

    #[error("address already taken as delegated key")]
    AddressAlreadyTakenAsDelegatedKey,

    // Signatures
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid signature hash")]
    InvalidSignatureHash,
}

pub type DaoResult<T> = Result<T, DaoError>;
