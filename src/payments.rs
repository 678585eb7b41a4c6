//! Payment allocation ledger
//!
//! Splits a grand total across payment methods. A method may appear at most once; the ledger
//! only balances when the allocated sum equals the total exactly.

use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    ids::PaymentMethodId,
    pricing::{self, Amount, PricingError},
};

/// Errors related to ledger edits.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    /// The method already has an entry.
    #[error("payment method {0} is already in use")]
    DuplicateMethod(PaymentMethodId),

    /// The amount was negative.
    #[error("payment amount {0} must not be negative")]
    InvalidAmount(Amount),

    /// The amount's currency differs from the ledger currency (amount currency, ledger currency).
    #[error("payment has currency {0}, but ledger has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// No entry at this position.
    #[error("no payment entry at position {0}")]
    EntryNotFound(usize),

    /// Money arithmetic failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// A payment method offered by the payment methods catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Method id
    pub id: PaymentMethodId,

    /// Display name
    pub name: String,
}

/// One method/amount pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEntry {
    /// Payment method
    pub method: PaymentMethodId,

    /// Allocated amount
    pub amount: Amount,
}

/// Where the allocated sum stands relative to the amount owed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Balance {
    /// Amount still to be allocated ("faltante").
    Due(Amount),

    /// Allocations match the total exactly.
    Settled,

    /// Amount allocated beyond the total ("exceso").
    Over(Amount),
}

/// Ordered payment entries for one checkout.
#[derive(Debug, Clone)]
pub struct PaymentLedger {
    currency: &'static Currency,
    entries: SmallVec<[PaymentEntry; 4]>,
}

impl PaymentLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            currency,
            entries: SmallVec::new(),
        }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateMethod`] if the method is already used, or
    /// [`LedgerError::InvalidAmount`] if the amount is negative.
    pub fn add(&mut self, method: PaymentMethodId, amount: Amount) -> Result<(), LedgerError> {
        if self.contains(&method) {
            return Err(LedgerError::DuplicateMethod(method));
        }

        self.check_amount(&amount)?;
        self.entries.push(PaymentEntry { method, amount });

        Ok(())
    }

    /// Change the amount of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EntryNotFound`] or [`LedgerError::InvalidAmount`].
    pub fn edit_amount(&mut self, index: usize, amount: Amount) -> Result<(), LedgerError> {
        self.check_amount(&amount)?;

        let entry = self
            .entries
            .get_mut(index)
            .ok_or(LedgerError::EntryNotFound(index))?;

        entry.amount = amount;

        Ok(())
    }

    /// Switch the method of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EntryNotFound`], or [`LedgerError::DuplicateMethod`] if another
    /// entry already uses `method`.
    pub fn change_method(
        &mut self,
        index: usize,
        method: PaymentMethodId,
    ) -> Result<(), LedgerError> {
        let taken = self
            .entries
            .iter()
            .enumerate()
            .any(|(idx, entry)| idx != index && entry.method == method);

        if taken {
            return Err(LedgerError::DuplicateMethod(method));
        }

        let entry = self
            .entries
            .get_mut(index)
            .ok_or(LedgerError::EntryNotFound(index))?;

        entry.method = method;

        Ok(())
    }

    /// Remove an entry; later entries shift down.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EntryNotFound`] if there is no entry at `index`.
    pub fn remove(&mut self, index: usize) -> Result<PaymentEntry, LedgerError> {
        if index >= self.entries.len() {
            return Err(LedgerError::EntryNotFound(index));
        }

        Ok(self.entries.remove(index))
    }

    /// Sum of all entry amounts.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] on currency mismatch.
    pub fn total_allocated(&self) -> Result<Amount, PricingError> {
        pricing::sum(self.entries.iter().map(|entry| &entry.amount), self.currency)
    }

    /// Signed remaining balance: positive means still due, negative means over-allocated.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] on currency mismatch.
    pub fn remaining(&self, total: &Amount) -> Result<Amount, PricingError> {
        Ok(total.sub(self.total_allocated()?)?)
    }

    /// Classify the remaining balance against `total`.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] on currency mismatch.
    pub fn balance(&self, total: &Amount) -> Result<Balance, PricingError> {
        let remaining = self.remaining(total)?;
        let minor = remaining.to_minor_units();

        Ok(match minor {
            0 => Balance::Settled,
            m if m > 0 => Balance::Due(remaining),
            m => Balance::Over(Money::from_minor(-m, self.currency)),
        })
    }

    /// Whether a method already has an entry.
    pub fn contains(&self, method: &PaymentMethodId) -> bool {
        self.entries.iter().any(|entry| &entry.method == method)
    }

    /// Entries in the order they were added.
    pub fn entries(&self) -> &[PaymentEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_amount(&self, amount: &Amount) -> Result<(), LedgerError> {
        if amount.currency() != self.currency {
            return Err(LedgerError::CurrencyMismatch(
                amount.currency().iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        if pricing::is_negative(amount) {
            return Err(LedgerError::InvalidAmount(*amount));
        }

        Ok(())
    }
}
