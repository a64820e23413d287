//! Internal multi-token ledger with per-block checkpoints.
//!
//! Every (account, token) pair keeps a history of balances. TOTAL mirrors the
//! sum of every add and subtract. Internal tokens (UNITS, LOOT, ...) are
//! bounded at 2^88-1 and external tokens at 2^160-1.

use std::collections::{HashMap, HashSet};

use num_traits::Zero;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use super::{check_access, check_initialize, Extension};
use crate::acl::BankFlag;
use crate::chain::Chain;
use crate::error::{DaoError, DaoResult};
use crate::registry::DaoRegistry;
use crate::types::{AccountRef, Address, Amount, UNITS};

pub const MAX_TOKENS_LIMIT: u8 = 200;

pub const INTERNAL_TOKEN_BITS: u64 = 88;
pub const EXTERNAL_TOKEN_BITS: u64 = 160;

pub static MAX_INTERNAL_BALANCE: Lazy<Amount> =
    Lazy::new(|| (Amount::from(1u8) << INTERNAL_TOKEN_BITS) - 1u32);
pub static MAX_EXTERNAL_BALANCE: Lazy<Amount> =
    Lazy::new(|| (Amount::from(1u8) << EXTERNAL_TOKEN_BITS) - 1u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub from_block: u64,
    pub amount: Amount,
}

#[derive(Debug, Clone)]
pub struct BankExtension {
    address: Address,
    dao: Address,
    initialized: bool,
    max_external_tokens: u8,
    tokens: Vec<Address>,
    internal_tokens: Vec<Address>,
    available_tokens: HashSet<Address>,
    available_internal_tokens: HashSet<Address>,
    checkpoints: HashMap<(AccountRef, Address), Vec<Checkpoint>>,
}

pub fn validate_max_external_tokens(max: u8) -> DaoResult<()> {
    if max == 0 || max > MAX_TOKENS_LIMIT {
        return Err(DaoError::InvalidMaxExternalTokens(max));
    }
    Ok(())
}

impl BankExtension {
    pub fn new(address: Address, dao: Address, max_external_tokens: u8) -> DaoResult<Self> {
        validate_max_external_tokens(max_external_tokens)?;
        Ok(Self {
            address,
            dao,
            initialized: false,
            max_external_tokens,
            tokens: Vec::new(),
            internal_tokens: Vec::new(),
            available_tokens: HashSet::new(),
            available_internal_tokens: HashSet::new(),
            checkpoints: HashMap::new(),
        })
    }

    pub fn dao(&self) -> Address {
        self.dao
    }

    pub fn max_external_tokens(&self) -> u8 {
        self.max_external_tokens
    }

    pub fn set_max_external_tokens(&mut self, max: u8) -> DaoResult<()> {
        if self.initialized {
            return Err(DaoError::AlreadyInitialized);
        }
        validate_max_external_tokens(max)?;
        self.max_external_tokens = max;
        Ok(())
    }

    fn check(&self, registry: &DaoRegistry, caller: Address, flag: BankFlag) -> DaoResult<()> {
        check_access(
            registry,
            self.address,
            self.dao,
            self.initialized,
            caller,
            flag,
        )
    }

    // ------------------------------------------------------------------
    // Token registry
    // ------------------------------------------------------------------

    pub fn is_token_allowed(&self, token: Address) -> bool {
        self.available_tokens.contains(&token)
    }

    pub fn is_internal_token(&self, token: Address) -> bool {
        self.available_internal_tokens.contains(&token)
    }

    pub fn get_tokens(&self) -> &[Address] {
        &self.tokens
    }

    pub fn get_token(&self, index: usize) -> Option<Address> {
        self.tokens.get(index).copied()
    }

    pub fn nb_tokens(&self) -> usize {
        self.tokens.len()
    }

    pub fn get_internal_tokens(&self) -> &[Address] {
        &self.internal_tokens
    }

    pub fn get_internal_token(&self, index: usize) -> Option<Address> {
        self.internal_tokens.get(index).copied()
    }

    pub fn nb_internal_tokens(&self) -> usize {
        self.internal_tokens.len()
    }

    fn ensure_external_token(&mut self, token: Address) -> DaoResult<()> {
        if self.available_tokens.contains(&token) {
            return Ok(());
        }
        if token.is_reserved() {
            return Err(DaoError::ReservedAddress(token));
        }
        if self.available_internal_tokens.contains(&token) {
            return Err(DaoError::TokenClassConflict(token));
        }
        if self.tokens.len() >= usize::from(self.max_external_tokens) {
            return Err(DaoError::TokenLimitExceeded);
        }
        self.available_tokens.insert(token);
        self.tokens.push(token);
        info!("bank {} registered token {}", self.address, token);
        Ok(())
    }

    fn ensure_internal_token(&mut self, token: Address) -> DaoResult<()> {
        if self.available_internal_tokens.contains(&token) {
            return Ok(());
        }
        if token.is_reserved() {
            return Err(DaoError::ReservedAddress(token));
        }
        if self.available_tokens.contains(&token) {
            return Err(DaoError::TokenClassConflict(token));
        }
        self.available_internal_tokens.insert(token);
        self.internal_tokens.push(token);
        info!("bank {} registered internal token {}", self.address, token);
        Ok(())
    }

    pub fn register_potential_new_token(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        token: Address,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::RegisterNewToken)?;
        self.ensure_external_token(token)
    }

    pub fn register_potential_new_internal_token(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        token: Address,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::RegisterNewInternalToken)?;
        self.ensure_internal_token(token)
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    pub fn balance_of(&self, account: impl Into<AccountRef>, token: Address) -> Amount {
        self.checkpoints
            .get(&(account.into(), token))
            .and_then(|history| history.last())
            .map(|cp| cp.amount.clone())
            .unwrap_or_default()
    }

    /// Balance as of the end of `block`.
    pub fn balance_of_at(&self, account: impl Into<AccountRef>, token: Address, block: u64) -> Amount {
        let Some(history) = self.checkpoints.get(&(account.into(), token)) else {
            return Amount::zero();
        };
        let idx = history.partition_point(|cp| cp.from_block <= block);
        if idx == 0 {
            Amount::zero()
        } else {
            history[idx - 1].amount.clone()
        }
    }

    pub fn num_checkpoints(&self, account: impl Into<AccountRef>, token: Address) -> usize {
        self.checkpoints
            .get(&(account.into(), token))
            .map_or(0, Vec::len)
    }

    fn bound_for(&self, token: Address) -> &'static Amount {
        if self.is_internal_token(token) {
            &MAX_INTERNAL_BALANCE
        } else {
            &MAX_EXTERNAL_BALANCE
        }
    }

    fn checked_bound(&self, token: Address, value: Amount) -> DaoResult<Amount> {
        if value > *self.bound_for(token) {
            return Err(DaoError::Overflow);
        }
        Ok(value)
    }

    fn write_checkpoint(&mut self, account: AccountRef, token: Address, amount: Amount, block: u64) {
        let history = self.checkpoints.entry((account, token)).or_default();
        match history.last_mut() {
            Some(last) if last.from_block == block => last.amount = amount,
            _ => history.push(Checkpoint {
                from_block: block,
                amount,
            }),
        }
    }

    fn ledger_account(account: AccountRef) -> DaoResult<AccountRef> {
        match account {
            AccountRef::Reserved(_) if account == AccountRef::TOTAL => {
                Err(DaoError::ReservedAddress(crate::types::TOTAL_ADDRESS))
            }
            AccountRef::Member(address) if address.is_reserved() => {
                Err(DaoError::ReservedAddress(address))
            }
            _ => Ok(account),
        }
    }

    pub fn add_to_balance(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        account: AccountRef,
        token: Address,
        amount: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::AddToBalance)?;
        let account = Self::ledger_account(account)?;

        let needs_registration =
            !self.is_internal_token(token) && !self.is_token_allowed(token);
        if needs_registration {
            if token.is_reserved() {
                return Err(DaoError::ReservedAddress(token));
            }
            if self.tokens.len() >= usize::from(self.max_external_tokens) {
                return Err(DaoError::TokenLimitExceeded);
            }
        }

        // Unregistered tokens become external, so the external bound applies.
        let bound = self.bound_for(token);
        let new_balance = self.balance_of(account, token) + amount;
        let new_total = self.balance_of(AccountRef::TOTAL, token) + amount;
        if new_balance > *bound || new_total > *bound {
            return Err(DaoError::Overflow);
        }

        if needs_registration {
            self.ensure_external_token(token)?;
        }
        self.write_checkpoint(account, token, new_balance, block);
        self.write_checkpoint(AccountRef::TOTAL, token, new_total, block);
        debug!("bank +{} {} to {}", amount, token, account);
        Ok(())
    }

    pub fn subtract_from_balance(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        account: AccountRef,
        token: Address,
        amount: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::SubFromBalance)?;
        let account = Self::ledger_account(account)?;
        self.debit(account, token, amount, block)
    }

    fn debit(&mut self, account: AccountRef, token: Address, amount: &Amount, block: u64) -> DaoResult<()> {
        let balance = self.balance_of(account, token);
        if balance < *amount {
            return Err(DaoError::InsufficientBalance);
        }
        let total = self.balance_of(AccountRef::TOTAL, token);
        if total < *amount {
            return Err(DaoError::InsufficientBalance);
        }
        self.write_checkpoint(account, token, balance - amount, block);
        self.write_checkpoint(AccountRef::TOTAL, token, total - amount, block);
        debug!("bank -{} {} from {}", amount, token, account);
        Ok(())
    }

    /// Moves funds between two ledger accounts without touching TOTAL.
    /// Two ordinary accounts must both be active members.
    #[allow(clippy::too_many_arguments)]
    pub fn internal_transfer(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        from: AccountRef,
        to: AccountRef,
        token: Address,
        amount: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::InternalTransfer)?;
        let from = Self::ledger_account(from)?;
        let to = Self::ledger_account(to)?;

        if let (AccountRef::Member(sender), AccountRef::Member(receiver)) = (from, to) {
            for party in [sender, receiver] {
                let member = registry.get_address_if_delegated(party);
                if self.balance_of(member, UNITS).is_zero() {
                    return Err(DaoError::NotAMember(party));
                }
            }
        }

        let from_balance = self.balance_of(from, token);
        if from_balance < *amount {
            return Err(DaoError::InsufficientBalance);
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self.checked_bound(token, self.balance_of(to, token) + amount)?;

        self.write_checkpoint(from, token, from_balance - amount, block);
        self.write_checkpoint(to, token, to_balance, block);
        debug!("bank transfer {} {} from {} to {}", amount, token, from, to);
        Ok(())
    }

    /// Debits `account` and releases the external asset held by the bank.
    pub fn withdraw(
        &mut self,
        registry: &DaoRegistry,
        chain: &mut Chain,
        caller: Address,
        account: Address,
        token: Address,
        amount: &Amount,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::Withdraw)?;
        if account.is_zero() || account.is_reserved() {
            return Err(DaoError::ReservedAddress(account));
        }
        if self.is_internal_token(token) {
            return Err(DaoError::TokenNotAllowed(token));
        }
        self.debit(AccountRef::Member(account), token, amount, chain.block_number())?;
        chain.transfer(self.address, account, token, amount)?;
        info!("bank {} withdrew {} of {} to {}", self.address, amount, token, account);
        Ok(())
    }

    /// Credits or debits GUILD so TOTAL matches what the bank really holds.
    pub fn update_token(
        &mut self,
        registry: &DaoRegistry,
        caller: Address,
        token: Address,
        held: &Amount,
        block: u64,
    ) -> DaoResult<()> {
        self.check(registry, caller, BankFlag::UpdateToken)?;
        if !self.is_token_allowed(token) {
            return Err(DaoError::TokenNotAllowed(token));
        }
        let total = self.balance_of(AccountRef::TOTAL, token);
        if *held > total {
            let delta = held - &total;
            let guild = self.checked_bound(token, self.balance_of(AccountRef::GUILD, token) + &delta)?;
            let total = self.checked_bound(token, total + &delta)?;
            self.write_checkpoint(AccountRef::GUILD, token, guild, block);
            self.write_checkpoint(AccountRef::TOTAL, token, total, block);
        } else if *held < total {
            let delta = &total - held;
            self.debit(AccountRef::GUILD, token, &delta, block)?;
        }
        Ok(())
    }
}

impl Extension for BankExtension {
    fn address(&self) -> Address {
        self.address
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn initialize(&mut self, registry: &DaoRegistry, creator: Address, block: u64) -> DaoResult<()> {
        check_initialize(registry, self.dao, self.initialized, creator)?;
        self.ensure_internal_token(UNITS)?;
        let one = Amount::from(1u8);
        self.write_checkpoint(AccountRef::Member(creator), UNITS, one.clone(), block);
        self.write_checkpoint(AccountRef::TOTAL, UNITS, one, block);
        self.initialized = true;
        info!("bank {} initialized for DAO {}", self.address, self.dao);
        Ok(())
    }
}
