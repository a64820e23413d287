//! In-process stand-in for the host chain: clock, external asset balances,
//! ERC20-style allowances and deterministic deployment addresses.

use std::collections::HashMap;

use num_traits::Zero;
use tracing::debug;

use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{Address, Amount};

pub const GENESIS_TIMESTAMP: u64 = 1_600_000_000;

#[derive(Debug, Clone)]
pub struct Chain {
    block_number: u64,
    timestamp: u64,
    /// (owner, asset) -> balance. ETH is the zero asset address.
    balances: HashMap<(Address, Address), Amount>,
    /// (owner, spender, asset) -> remaining allowance.
    allowances: HashMap<(Address, Address, Address), Amount>,
    deployments: u64,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self {
            block_number: 1,
            timestamp: GENESIS_TIMESTAMP,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            deployments: 0,
        }
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Seals the current block.
    pub fn mine(&mut self) {
        self.block_number += 1;
        self.timestamp += 1;
    }

    /// Moves the clock forward and seals a block.
    pub fn advance_time(&mut self, seconds: u64) {
        self.timestamp += seconds;
        self.block_number += 1;
    }

    pub fn next_address(&mut self, label: &str) -> Address {
        self.deployments += 1;
        Address::derive(label, self.deployments)
    }

    pub fn balance_of(&self, owner: Address, asset: Address) -> Amount {
        self.balances
            .get(&(owner, asset))
            .cloned()
            .unwrap_or_default()
    }

    /// Credits `owner` out of thin air. Test and simulation faucet.
    pub fn mint(&mut self, owner: Address, asset: Address, amount: &Amount) {
        *self.balances.entry((owner, asset)).or_default() += amount;
    }

    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        asset: Address,
        amount: &Amount,
    ) -> DaoResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.balance_of(from, asset);
        if balance < *amount {
            return Err(DaoError::InsufficientBalance);
        }
        self.balances.insert((from, asset), balance - amount);
        *self.balances.entry((to, asset)).or_default() += amount;
        debug!("chain transfer {} of {} from {} to {}", amount, asset, from, to);
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, asset: Address, amount: Amount) {
        self.allowances.insert((owner, spender, asset), amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address, asset: Address) -> Amount {
        self.allowances
            .get(&(owner, spender, asset))
            .cloned()
            .unwrap_or_default()
    }

    /// Spends `spender`'s allowance on `owner`'s funds.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        owner: Address,
        to: Address,
        asset: Address,
        amount: &Amount,
    ) -> DaoResult<()> {
        let allowance = self.allowance(owner, spender, asset);
        if allowance < *amount {
            return Err(DaoError::InsufficientAllowance);
        }
        self.transfer(owner, to, asset, amount)?;
        self.allowances
            .insert((owner, spender, asset), allowance - amount);
        Ok(())
    }
}

/// Sender and attached ETH of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    pub sender: Address,
    pub value: Amount,
}

impl Msg {
    pub fn sender(sender: Address) -> Self {
        Self {
            sender,
            value: Amount::zero(),
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Runs one transaction. On error the DAO and the chain are put back exactly
/// as they were.
pub fn atomically<T>(
    dao: &mut Dao,
    chain: &mut Chain,
    f: impl FnOnce(&mut Dao, &mut Chain) -> DaoResult<T>,
) -> DaoResult<T> {
    let dao_snapshot = dao.clone();
    let chain_snapshot = chain.clone();
    let result = f(dao, chain);
    if result.is_err() {
        *dao = dao_snapshot;
        *chain = chain_snapshot;
    }
    result
}
