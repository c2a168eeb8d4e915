//! Credit ledger collaborator.
//!
//! Members pay one credit per seat. The ledger is owned elsewhere; the engine
//! only asks for a debit when a seat is granted and a refund when a seated
//! member's claim is released.

use crate::types::MemberId;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Result of a debit request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebitOutcome {
    /// One credit was taken
    Debited,
    /// The member has no credit left
    Insufficient,
}

/// Ledger call failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreditError {
    /// The ledger could not be reached
    #[error("Credit ledger unavailable: {0}")]
    Unavailable(String),
}

/// Credit ledger interface.
pub trait CreditLedger: Send + Sync {
    /// Take one credit from `member`.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError`] if the ledger cannot be reached.
    fn debit_one(
        &self,
        member: MemberId,
    ) -> Pin<Box<dyn Future<Output = Result<DebitOutcome, CreditError>> + Send>>;

    /// Give one credit back to `member`.
    ///
    /// # Errors
    ///
    /// Returns [`CreditError`] if the ledger cannot be reached.
    fn refund_one(
        &self,
        member: MemberId,
    ) -> Pin<Box<dyn Future<Output = Result<(), CreditError>> + Send>>;
}

/// In-process ledger used by the development server and tests.
///
/// Members without an explicit balance start with `opening_balance`.
#[derive(Clone, Debug)]
pub struct InMemoryCreditLedger {
    balances: Arc<Mutex<HashMap<MemberId, u32>>>,
    opening_balance: u32,
    unavailable: Arc<AtomicBool>,
    debits: Arc<AtomicUsize>,
    refunds: Arc<AtomicUsize>,
}

impl InMemoryCreditLedger {
    /// Ledger where every new member starts with `opening_balance` credits
    #[must_use]
    pub fn new(opening_balance: u32) -> Self {
        Self {
            balances: Arc::new(Mutex::new(HashMap::new())),
            opening_balance,
            unavailable: Arc::new(AtomicBool::new(false)),
            debits: Arc::new(AtomicUsize::new(0)),
            refunds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set a member's balance
    pub fn set_balance(&self, member: MemberId, credits: u32) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(member, credits);
        }
    }

    /// Current balance of `member`
    #[must_use]
    pub fn balance(&self, member: MemberId) -> u32 {
        self.balances
            .lock()
            .map(|balances| balances.get(&member).copied().unwrap_or(self.opening_balance))
            .unwrap_or(0)
    }

    /// Simulate an outage (or end one)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Successful debits so far
    #[must_use]
    pub fn debit_count(&self) -> usize {
        self.debits.load(Ordering::SeqCst)
    }

    /// Refunds so far
    #[must_use]
    pub fn refund_count(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), CreditError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CreditError::Unavailable("ledger switched off".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryCreditLedger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl CreditLedger for InMemoryCreditLedger {
    fn debit_one(
        &self,
        member: MemberId,
    ) -> Pin<Box<dyn Future<Output = Result<DebitOutcome, CreditError>> + Send>> {
        let ledger = self.clone();
        Box::pin(async move {
            ledger.check_available()?;
            let mut balances = ledger
                .balances
                .lock()
                .map_err(|_| CreditError::Unavailable("ledger lock poisoned".to_string()))?;
            let balance = balances.entry(member).or_insert(ledger.opening_balance);
            if *balance == 0 {
                tracing::debug!(member_id = %member, "Debit declined, balance is zero");
                return Ok(DebitOutcome::Insufficient);
            }
            *balance -= 1;
            ledger.debits.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(member_id = %member, balance = *balance, "Credit debited");
            Ok(DebitOutcome::Debited)
        })
    }

    fn refund_one(
        &self,
        member: MemberId,
    ) -> Pin<Box<dyn Future<Output = Result<(), CreditError>> + Send>> {
        let ledger = self.clone();
        Box::pin(async move {
            ledger.check_available()?;
            let mut balances = ledger
                .balances
                .lock()
                .map_err(|_| CreditError::Unavailable("ledger lock poisoned".to_string()))?;
            let balance = balances.entry(member).or_insert(ledger.opening_balance);
            *balance += 1;
            ledger.refunds.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(member_id = %member, balance = *balance, "Credit refunded");
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn debit_until_empty_then_refund() {
        let ledger = InMemoryCreditLedger::new(1);
        let member = MemberId::new();

        assert_eq!(ledger.debit_one(member).await.unwrap(), DebitOutcome::Debited);
        assert_eq!(ledger.debit_one(member).await.unwrap(), DebitOutcome::Insufficient);
        assert_eq!(ledger.balance(member), 0);

        ledger.refund_one(member).await.unwrap();
        assert_eq!(ledger.balance(member), 1);
        assert_eq!((ledger.debit_count(), ledger.refund_count()), (1, 1));
    }

    #[tokio::test]
    async fn outage_fails_calls() {
        let ledger = InMemoryCreditLedger::default();
        ledger.set_unavailable(true);
        assert!(ledger.debit_one(MemberId::new()).await.is_err());
        assert!(ledger.refund_one(MemberId::new()).await.is_err());
        assert_eq!(ledger.debit_count(), 0);
    }
}
