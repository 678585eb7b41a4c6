//! Checkout errors
//!
//! Every failure a session can report, grouped by [`ErrorKind`] so a caller can tell "fix this
//! input" apart from "try again" and from its own misuse of the session.

use jiff::civil::Date;
use thiserror::Error;

use crate::{
    cart::CartError,
    ids::{ItemId, OrderId, PaymentMethodId},
    payments::LedgerError,
    pricing::{Amount, PricingError},
    providers::ExternalError,
    session::SessionState,
    stock::{Shortfalls, StockError},
    totals::TotalsError,
};

/// Broad class of a [`CheckoutError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input broke a business rule; the user should correct it.
    Validation,

    /// Cart asks for more than is in stock.
    StockConflict,

    /// A collaborator failed transiently; the same call may be retried.
    External,

    /// The order sink refused the order.
    Rejected,

    /// The caller invoked an operation the session state does not allow.
    Contract,

    /// An order exists server-side for a session that was abandoned locally.
    RequiresReview,
}

/// Errors reported by a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Cart edit rejected.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Ledger edit rejected.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Totals could not be derived.
    #[error(transparent)]
    Totals(#[from] TotalsError),

    /// Stock could not be checked.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// Money arithmetic failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Checkout needs at least one cart line.
    #[error("cart is empty")]
    EmptyCart,

    /// The item is not in the loaded catalog snapshot.
    #[error("item {0} is not in the catalog")]
    ItemNotInCatalog(ItemId),

    /// The catalog has not been loaded for this session.
    #[error("catalog not loaded")]
    CatalogNotLoaded,

    /// Some lines ask for more than is in stock.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Shortfalls),

    /// Warranty expiration missing or not after today.
    #[error("warranty expiration {expiration:?} must be after {today}")]
    InvalidWarrantyDate {
        /// Requested expiration
        expiration: Option<Date>,
        /// Current date
        today: Date,
    },

    /// Allocations do not match the grand total. Positive means still due, negative means
    /// over-allocated.
    #[error("payments do not match the total, remaining {remaining}")]
    PaymentIncomplete {
        /// Signed remaining balance
        remaining: Amount,
    },

    /// An entry references a method the catalog does not know.
    #[error("payment method {0} not found")]
    PaymentNotFound(PaymentMethodId),

    /// A collaborator failed; nothing changed.
    #[error(transparent)]
    External(#[from] ExternalError),

    /// The order sink refused the order; nothing changed.
    #[error("order rejected: {reason}")]
    Rejected {
        /// Reason from the sink
        reason: String,
    },

    /// The sink accepted the order after the session was cancelled.
    #[error("order {order_id} was created after the checkout was cancelled")]
    ConfirmedAfterCancel {
        /// Id of the orphaned order
        order_id: OrderId,
    },

    /// Operation not allowed in the current state.
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// State at the time
        state: SessionState,
    },

    /// A confirmation is waiting on the order sink.
    #[error("{0} is not allowed while an order submission is in flight")]
    SubmissionInFlight(&'static str),

    /// No confirmation was staged.
    #[error("no order submission is in flight")]
    NothingInFlight,
}

impl CheckoutError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Cart(_)
            | CheckoutError::Ledger(_)
            | CheckoutError::Totals(_)
            | CheckoutError::Pricing(_)
            | CheckoutError::EmptyCart
            | CheckoutError::ItemNotInCatalog(_)
            | CheckoutError::InvalidWarrantyDate { .. }
            | CheckoutError::PaymentIncomplete { .. }
            | CheckoutError::PaymentNotFound(_) => ErrorKind::Validation,
            CheckoutError::InsufficientStock(_) => ErrorKind::StockConflict,
            CheckoutError::External(_) => ErrorKind::External,
            CheckoutError::Rejected { .. } => ErrorKind::Rejected,
            CheckoutError::ConfirmedAfterCancel { .. } => ErrorKind::RequiresReview,
            CheckoutError::Stock(_)
            | CheckoutError::CatalogNotLoaded
            | CheckoutError::InvalidState { .. }
            | CheckoutError::SubmissionInFlight(_)
            | CheckoutError::NothingInFlight => ErrorKind::Contract,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::External
    }

    /// Whether the error points at a bug in the caller rather than at user input.
    pub fn is_contract_violation(&self) -> bool {
        self.kind() == ErrorKind::Contract
    }
}
