//! Account service
//!
//! Account management: create, rename, re-base the starting balance, delete
//! with cascade, and list with balances.

use crate::error::{EngineError, EngineResult};
use crate::models::{Account, AccountId, AccountKind, EntityRef, Money};
use crate::storage::{Dataset, DeleteOutcome, Storage};

/// Service for account management
pub struct AccountService<'a> {
    storage: &'a Storage,
}

/// Summary of an account with computed fields
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account: Account,
    /// Starting balance plus every entry, computed from the ledger
    pub balance: Money,
    /// Number of ledger entries touching the account
    pub entry_count: usize,
}

fn name_taken(data: &Dataset, name: &str, exclude: Option<AccountId>) -> bool {
    data.accounts
        .iter()
        .any(|a| Some(a.id) != exclude && a.name.eq_ignore_ascii_case(name))
}

impl<'a> AccountService<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create a new account
    pub fn create(&self, name: &str, kind: AccountKind, starting_balance: Money) -> EngineResult<Account> {
        let account = Account::new(name.trim(), kind, starting_balance);
        account
            .validate()
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let created = account.clone();
        self.storage.write(|txn| {
            if name_taken(txn, &account.name, None) {
                return Err(EngineError::duplicate("Account", &account.name));
            }
            txn.insert(account)
        })?;
        Ok(created)
    }

    pub fn get(&self, id: AccountId) -> EngineResult<Account> {
        self.storage.read(|data| data.accounts.require(id).cloned())?
    }

    /// Find an account by name (case-insensitive) or ID string
    pub fn find(&self, identifier: &str) -> EngineResult<Option<Account>> {
        self.storage.read(|data| {
            if let Some(account) = data
                .accounts
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(identifier))
            {
                return Some(account.clone());
            }
            identifier
                .parse::<AccountId>()
                .ok()
                .and_then(|id| data.accounts.get(id).cloned())
        })
    }

    /// All accounts sorted by name
    pub fn list(&self) -> EngineResult<Vec<Account>> {
        self.storage.read(|data| {
            let mut accounts: Vec<Account> = data.accounts.iter().cloned().collect();
            accounts.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            accounts
        })
    }

    /// All accounts with their ledger-computed balances
    pub fn list_with_balances(&self) -> EngineResult<Vec<AccountSummary>> {
        let accounts = self.list()?;
        self.storage.read(|data| {
            accounts
                .into_iter()
                .map(|account| {
                    let balance = data.ledger_balance(account.id, None)?;
                    let entry_count = data.transactions_for_account(account.id).count();
                    Ok(AccountSummary {
                        account,
                        balance,
                        entry_count,
                    })
                })
                .collect()
        })?
    }

    pub fn rename(&self, id: AccountId, name: &str) -> EngineResult<Account> {
        let name = name.trim().to_string();
        self.storage.write(|txn| {
            if name_taken(txn, &name, Some(id)) {
                return Err(EngineError::duplicate("Account", &name));
            }
            let mut account = txn.accounts.require(id)?.clone();
            account.name = name;
            account
                .validate()
                .map_err(|e| EngineError::Validation(e.to_string()))?;
            account.updated_at = chrono::Utc::now();
            txn.update(account.clone())?;
            Ok(account)
        })
    }

    /// Change the starting balance; the cached balance follows
    pub fn set_starting_balance(&self, id: AccountId, starting_balance: Money) -> EngineResult<Account> {
        self.storage.write(|txn| {
            txn.modify::<Account>(id, |a| {
                a.starting_balance = starting_balance;
                a.updated_at = chrono::Utc::now();
            })?;
            txn.refresh_balance(id)?;
            txn.accounts.require(id).cloned()
        })
    }

    /// Delete an account and every entry that touches it
    pub fn delete(&self, id: AccountId) -> EngineResult<DeleteOutcome> {
        self.storage.write(|txn| txn.delete(EntityRef::Account(id)))
    }
}
