//! Per-worker ledger and staged transaction table
//!
//! Balances live behind a read/write lock so balance queries and partition
//! sums never wait on a transaction. Every mutation (staging, commit, abort)
//! goes through [`LedgerTxn`], which holds the worker-wide mutation lock for
//! its whole lifetime.

use crate::common::{AccountId, Amount, Error, OpDescriptor, OpKind, Result};
use crate::worker::snapshot::Balances;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::HashMap;

/// A single staged ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Debit { account: AccountId, amount: Amount },
    Credit { account: AccountId, amount: Amount },
    Create { account: AccountId, initial: Amount },
    Delete { account: AccountId },
}

impl Op {
    pub fn account(&self) -> AccountId {
        match *self {
            Op::Debit { account, .. }
            | Op::Credit { account, .. }
            | Op::Create { account, .. }
            | Op::Delete { account } => account,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Debit { .. } => OpKind::Debit,
            Op::Credit { .. } => OpKind::Credit,
            Op::Create { .. } => OpKind::Create,
            Op::Delete { .. } => OpKind::Delete,
        }
    }

    /// Effect on the balance as recorded in the audit log.
    pub fn signed_amount(&self) -> Amount {
        match *self {
            Op::Debit { amount, .. } => amount.negated(),
            Op::Credit { amount, .. } => amount,
            Op::Create { initial, .. } => initial,
            Op::Delete { .. } => Amount::ZERO,
        }
    }
}

type StagedTable = HashMap<String, Vec<Op>>;

#[derive(Default)]
pub struct Ledger {
    balances: RwLock<Balances>,
    staged: Mutex<StagedTable>,
}

impl Ledger {
    pub fn new(balances: Balances) -> Self {
        Self {
            balances: RwLock::new(balances),
            staged: Mutex::new(StagedTable::new()),
        }
    }

    pub fn holds(&self, account: AccountId) -> bool {
        self.balances.read().contains_key(&account)
    }

    pub fn query(&self, account: AccountId) -> Result<Amount> {
        self.balances
            .read()
            .get(&account)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("account {}", account)))
    }

    /// Total of every balance. Overflow is an internal failure, never a wrapped sum.
    pub fn sum_all(&self) -> Result<Amount> {
        Amount::checked_sum(self.balances.read().values())
            .map_err(|e| Error::Internal(format!("partition sum: {}", e)))
    }

    pub fn len(&self) -> usize {
        self.balances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every balance.
    pub fn balances(&self) -> Balances {
        self.balances.read().clone()
    }

    /// Take the mutation lock.
    pub fn lock(&self) -> LedgerTxn<'_> {
        LedgerTxn {
            balances: &self.balances,
            staged: self.staged.lock(),
        }
    }

    pub fn is_staged(&self, tx_id: &str) -> bool {
        self.staged.lock().contains_key(tx_id)
    }

    pub fn staged_ops(&self, tx_id: &str) -> Option<Vec<Op>> {
        self.staged.lock().get(tx_id).cloned()
    }

    pub fn staged_count(&self) -> usize {
        self.staged.lock().len()
    }
}

/// Exclusive access to the staged table, plus write access to balances.
pub struct LedgerTxn<'a> {
    balances: &'a RwLock<Balances>,
    staged: MutexGuard<'a, StagedTable>,
}

impl LedgerTxn<'_> {
    /// Validate `desc` against current balances and stage the ops this
    /// ledger is responsible for. Balances are not touched. A rejected
    /// prepare leaves any earlier staging of `tx_id` in place; an accepted
    /// one replaces it.
    pub fn prepare(&mut self, tx_id: &str, desc: &OpDescriptor) -> Result<&[Op]> {
        desc.validate()?;
        let ops = {
            let balances = self.balances.read();
            stage_ops(&balances, desc)?
        };
        let slot = self.staged.entry(tx_id.to_string()).or_default();
        *slot = ops;
        Ok(slot.as_slice())
    }

    /// Remove and return the staged ops of `tx_id`.
    pub fn take(&mut self, tx_id: &str) -> Option<Vec<Op>> {
        self.staged.remove(tx_id)
    }

    /// Drop `tx_id` if staged. Returns whether anything was staged.
    pub fn discard(&mut self, tx_id: &str) -> bool {
        self.staged.remove(tx_id).is_some()
    }

    /// Apply one op to the balances.
    ///
    /// Validation happened at prepare time against the balances of that
    /// moment, so an op can find its account already gone (a concurrent
    /// delete committed first). Such an op fails here and changes nothing.
    pub fn apply(&mut self, op: &Op) -> Result<()> {
        let mut balances = self.balances.write();
        match *op {
            Op::Debit { account, amount } => {
                let balance = balances
                    .get_mut(&account)
                    .ok_or_else(|| Error::NotFound(format!("account {}", account)))?;
                *balance = balance.checked_sub(amount)?;
            }
            Op::Credit { account, amount } => {
                let balance = balances.entry(account).or_insert(Amount::ZERO);
                *balance = balance.checked_add(amount)?;
            }
            Op::Create { account, initial } => {
                balances.insert(account, initial);
            }
            Op::Delete { account } => {
                balances
                    .remove(&account)
                    .ok_or_else(|| Error::NotFound(format!("account {}", account)))?;
            }
        }
        Ok(())
    }

    pub fn balances(&self) -> Balances {
        self.balances.read().clone()
    }
}

fn stage_ops(balances: &Balances, desc: &OpDescriptor) -> Result<Vec<Op>> {
    let mut ops = Vec::with_capacity(2);
    match *desc {
        OpDescriptor::Transfer { from, to, amount } => {
            if let Some(&balance) = balances.get(&from) {
                if balance < amount {
                    return Err(Error::Validation(format!(
                        "insufficient balance in account {}: {} < {}",
                        from, balance, amount
                    )));
                }
                ops.push(Op::Debit {
                    account: from,
                    amount,
                });
            }
            if balances.contains_key(&to) {
                ops.push(Op::Credit { account: to, amount });
            }
        }
        OpDescriptor::Create { account, initial } => {
            if balances.contains_key(&account) {
                return Err(Error::Validation(format!("account {} already exists", account)));
            }
            ops.push(Op::Create { account, initial });
        }
        OpDescriptor::Delete { account } => {
            if !balances.contains_key(&account) {
                return Err(Error::Validation(format!("account {} does not exist", account)));
            }
            ops.push(Op::Delete { account });
        }
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> Amount {
        s.parse().unwrap()
    }

    fn ledger(accounts: &[(AccountId, &str)]) -> Ledger {
        Ledger::new(accounts.iter().map(|&(id, b)| (id, amount(b))).collect())
    }

    fn transfer(from: AccountId, to: AccountId, value: &str) -> OpDescriptor {
        OpDescriptor::Transfer {
            from,
            to,
            amount: amount(value),
        }
    }

    fn commit(ledger: &Ledger, tx_id: &str) -> Vec<Op> {
        let mut txn = ledger.lock();
        let ops = txn.take(tx_id).unwrap();
        for op in &ops {
            txn.apply(op).unwrap();
        }
        ops
    }

    #[test]
    fn test_prepare_does_not_touch_balances() {
        let ledger = ledger(&[(7, "100"), (9, "5")]);
        for i in 0..5 {
            ledger
                .lock()
                .prepare(&format!("tx_{}", i), &transfer(7, 9, "30"))
                .unwrap();
        }
        assert_eq!(ledger.query(7).unwrap(), amount("100"));
        assert_eq!(ledger.query(9).unwrap(), amount("5"));
        assert_eq!(ledger.staged_count(), 5);
    }

    #[test]
    fn test_transfer_stages_only_held_sides() {
        let ledger = ledger(&[(7, "100")]);
        let ops = ledger
            .lock()
            .prepare("tx_1", &transfer(7, 9, "30"))
            .unwrap()
            .to_vec();
        assert_eq!(
            ops,
            vec![Op::Debit {
                account: 7,
                amount: amount("30")
            }]
        );
        commit(&ledger, "tx_1");
        assert_eq!(ledger.query(7).unwrap(), amount("70"));
        assert!(!ledger.holds(9));

        let ops = ledger
            .lock()
            .prepare("tx_2", &transfer(1, 2, "30"))
            .unwrap()
            .to_vec();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let ledger = ledger(&[(7, "100")]);
        let err = ledger
            .lock()
            .prepare("tx_1", &transfer(7, 9, "100.01"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!ledger.is_staged("tx_1"));
        assert!(ledger.lock().prepare("tx_2", &transfer(7, 9, "100")).is_ok());
    }

    #[test]
    fn test_non_positive_transfer_rejected() {
        let ledger = ledger(&[(7, "100")]);
        assert!(ledger.lock().prepare("tx_1", &transfer(7, 9, "0")).is_err());
        assert!(ledger.lock().prepare("tx_2", &transfer(7, 9, "-5")).is_err());
    }

    #[test]
    fn test_create_and_delete_rules() {
        let ledger = ledger(&[(7, "100")]);
        let dup = OpDescriptor::Create {
            account: 7,
            initial: Amount::ZERO,
        };
        assert!(ledger.lock().prepare("tx_1", &dup).is_err());

        let missing = OpDescriptor::Delete { account: 8 };
        assert!(ledger.lock().prepare("tx_2", &missing).is_err());

        let create = OpDescriptor::Create {
            account: 8,
            initial: amount("12.50"),
        };
        ledger.lock().prepare("tx_3", &create).unwrap();
        commit(&ledger, "tx_3");
        assert_eq!(ledger.query(8).unwrap(), amount("12.50"));

        ledger
            .lock()
            .prepare("tx_4", &OpDescriptor::Delete { account: 8 })
            .unwrap();
        commit(&ledger, "tx_4");
        assert!(matches!(ledger.query(8), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reprepare_last_wins() {
        let ledger = ledger(&[(7, "100"), (9, "0")]);
        ledger.lock().prepare("tx_1", &transfer(7, 9, "10")).unwrap();
        ledger.lock().prepare("tx_1", &transfer(9, 7, "0.00")).unwrap_err();
        assert_eq!(
            ledger.staged_ops("tx_1").unwrap()[0],
            Op::Debit {
                account: 7,
                amount: amount("10")
            }
        );
        ledger.lock().prepare("tx_1", &transfer(7, 9, "40")).unwrap();
        commit(&ledger, "tx_1");
        assert_eq!(ledger.query(7).unwrap(), amount("60"));
        assert_eq!(ledger.query(9).unwrap(), amount("40"));
    }

    #[test]
    fn test_discard_is_like_no_prepare() {
        let ledger = ledger(&[(7, "100")]);
        let before = ledger.balances();
        ledger.lock().prepare("tx_1", &transfer(7, 9, "30")).unwrap();
        assert!(ledger.lock().discard("tx_1"));
        assert!(!ledger.lock().discard("tx_1"));
        assert_eq!(ledger.balances(), before);
        assert!(ledger.lock().take("tx_1").is_none());
    }

    #[test]
    fn test_apply_on_vanished_account_fails_cleanly() {
        let ledger = ledger(&[(7, "100")]);
        let mut txn = ledger.lock();
        assert!(txn.apply(&Op::Delete { account: 7 }).is_ok());
        assert!(txn
            .apply(&Op::Debit {
                account: 7,
                amount: amount("1")
            })
            .is_err());
        assert!(txn
            .apply(&Op::Credit {
                account: 5,
                amount: amount("1")
            })
            .is_ok());
        drop(txn);
        assert_eq!(ledger.query(5).unwrap(), amount("1"));
        assert!(!ledger.holds(7));
    }

    #[test]
    fn test_queries_do_not_wait_on_mutation_lock() {
        let ledger = ledger(&[(1, "1.10"), (2, "2.20")]);
        let _txn = ledger.lock();
        assert_eq!(ledger.query(1).unwrap(), amount("1.10"));
        assert_eq!(ledger.sum_all().unwrap(), amount("3.30"));
    }

    #[test]
    fn test_signed_amounts() {
        let debit = Op::Debit {
            account: 1,
            amount: amount("30"),
        };
        assert_eq!(debit.signed_amount(), amount("-30"));
        assert_eq!(debit.kind(), OpKind::Debit);
        assert_eq!(Op::Delete { account: 1 }.signed_amount(), Amount::ZERO);
    }
}
