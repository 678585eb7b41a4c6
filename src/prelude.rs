//! Checkout prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, CartLine},
    catalog::{CatalogError, CatalogItem, CatalogSnapshot, StockLevels, TaxSpec},
    clock::{Clock, FixedClock, SystemClock},
    config::{CheckoutConfig, ConfigError},
    context::{CheckoutContext, Operator, Role},
    customers::{Customer, CustomerKind},
    errors::{CheckoutError, ErrorKind},
    ids::{CustomerId, ItemId, LocationId, OperatorId, OrderId, PaymentMethodId},
    invoice::{DocumentKind, Invoice, InvoiceError},
    order::{OrderPayload, OrderRecord},
    payments::{Balance, LedgerError, PaymentEntry, PaymentLedger, PaymentMethod},
    pricing::{Amount, PricingError},
    providers::{ExternalError, InventoryProvider, OrderSink, PaymentMethodsCatalog, SubmitOutcome},
    session::{CheckoutSession, PendingOrder, SessionState, handle::SharedSession},
    stock::{Shortfall, Shortfalls, StockError},
    totals::{OrderTotals, TaxTreatment, TotalsError},
};
