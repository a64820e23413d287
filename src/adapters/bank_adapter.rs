use num_traits::Zero;
use tracing::info;

use super::Adapter;
use crate::chain::{atomically, Chain};
use crate::dao::Dao;
use crate::error::{DaoError, DaoResult};
use crate::types::{ids, Address};

/// Public entry points to the bank that need no vote: cashing out an
/// internal balance and syncing the ledger with real holdings.
#[derive(Debug, Clone)]
pub struct BankAdapter {
    address: Address,
}

impl BankAdapter {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Withdraws the full internal `token` balance of `account` to its
    /// external address. Anyone may trigger it; funds only go to `account`.
    pub fn withdraw(
        &self,
        dao: &mut Dao,
        chain: &mut Chain,
        account: Address,
        token: Address,
    ) -> DaoResult<()> {
        if account.is_reserved() {
            return Err(DaoError::ReservedAddress(account));
        }
        let balance = dao.bank()?.balance_of(account, token);
        if balance.is_zero() {
            return Err(DaoError::NothingToWithdraw);
        }
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| {
            dao.withdraw(chain, adapter, account, token, &balance)
        })?;
        info!("{} withdrew {} of {}", account, balance, token);
        Ok(())
    }

    pub fn update_token(&self, dao: &mut Dao, chain: &mut Chain, token: Address) -> DaoResult<()> {
        let adapter = self.address;
        atomically(dao, chain, |dao, chain| dao.update_token(chain, adapter, token))
    }
}

impl Adapter for BankAdapter {
    fn name(&self) -> &'static str {
        ids::BANK_ADAPTER_NAME
    }

    fn address(&self) -> Address {
        self.address
    }
}
