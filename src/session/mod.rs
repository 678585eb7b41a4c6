//! Checkout Session
//!
//! Drives one checkout from cart review through payment allocation to a confirmed order.
//!
//! ```text
//! Reviewing --proceed_to_payment--> AllocatingPayment --confirm--> Confirmed
//!     |                                   |
//!     +--------------cancel---------------+--> Abandoned
//! ```
//!
//! Calls to collaborators are the only await points. Each one is staged, awaited, and then
//! applied in a single step, so a failed call leaves the session exactly as it was.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use jiff::civil::Date;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    cart::Cart,
    catalog::{CatalogSnapshot, StockLevels},
    context::{CheckoutContext, Operator},
    errors::CheckoutError,
    ids::{ItemId, LocationId, OrderId, PaymentMethodId},
    order::OrderRecord,
    payments::{Balance, PaymentEntry, PaymentLedger, PaymentMethod},
    pricing::Amount,
    providers::{ExternalError, SubmitOutcome},
    stock,
    totals::OrderTotals,
};

pub mod handle;

/// Lifecycle state of a [`CheckoutSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Cart is being edited.
    Reviewing,

    /// Totals are frozen and payments are being allocated.
    AllocatingPayment,

    /// The order sink accepted the order.
    Confirmed,

    /// The checkout was cancelled.
    Abandoned,
}

impl SessionState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Confirmed | SessionState::Abandoned)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Reviewing => "reviewing",
            SessionState::AllocatingPayment => "allocating payment",
            SessionState::Confirmed => "confirmed",
            SessionState::Abandoned => "abandoned",
        })
    }
}

/// One checkout, driven sequentially by a single user flow.
#[derive(Debug)]
pub struct CheckoutSession {
    id: Uuid,
    context: CheckoutContext,
    operator: Operator,
    state: SessionState,
    cart: Cart,
    catalog: Option<CatalogSnapshot>,
    totals: Option<OrderTotals>,
    ledger: PaymentLedger,
    payment_methods: Vec<PaymentMethod>,
    warranty_expires: Option<Date>,
    in_flight: Option<Weak<OrderRecord>>,
    order: Option<(OrderId, OrderRecord)>,
    orphaned_order: Option<OrderId>,
}

impl CheckoutSession {
    /// Start a checkout at `location` with an empty cart in the configured currency.
    pub fn new(context: CheckoutContext, operator: Operator, location: LocationId) -> Self {
        let currency = context.config.currency;
        let id = Uuid::now_v7();

        debug!(session = %id, location = %location, operator = %operator.id, "started checkout");

        Self {
            id,
            operator,
            state: SessionState::Reviewing,
            cart: Cart::new(location, currency),
            catalog: None,
            totals: None,
            ledger: PaymentLedger::new(currency),
            payment_methods: Vec::new(),
            warranty_expires: None,
            in_flight: None,
            order: None,
            orphaned_order: None,
            context,
        }
    }

    /// Session id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Person running the checkout
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Selling location
    pub fn location(&self) -> &LocationId {
        self.cart.location()
    }

    /// Collaborators and settings
    pub fn context(&self) -> &CheckoutContext {
        &self.context
    }

    /// Cart, readable in every state
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Loaded catalog snapshot
    pub fn catalog(&self) -> Option<&CatalogSnapshot> {
        self.catalog.as_ref()
    }

    /// Totals frozen by [`proceed_to_payment`](Self::proceed_to_payment)
    pub fn totals(&self) -> Option<&OrderTotals> {
        self.totals.as_ref()
    }

    /// Payment allocations
    pub fn ledger(&self) -> &PaymentLedger {
        &self.ledger
    }

    /// Payment methods fetched when payment started
    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    /// Warranty expiration, when a warranty applies
    pub fn warranty_expires(&self) -> Option<Date> {
        self.warranty_expires
    }

    /// Whether a confirmation is waiting on the order sink
    pub fn is_submitting(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|staged| staged.strong_count() > 0)
    }

    /// Id the order sink assigned, once confirmed
    pub fn order_id(&self) -> Option<&OrderId> {
        self.order.as_ref().map(|(id, _)| id)
    }

    /// Confirmed order
    pub fn order(&self) -> Option<&OrderRecord> {
        self.order.as_ref().map(|(_, record)| record)
    }

    /// Order the sink created after this session was cancelled
    pub fn orphaned_order(&self) -> Option<&OrderId> {
        self.orphaned_order.as_ref()
    }

    /// Whether an orphaned order needs manual review.
    pub fn needs_review(&self) -> bool {
        self.orphaned_order.is_some()
    }

    /// Fetch the catalog for this location, unless one is already loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] outside `Reviewing`, or
    /// [`CheckoutError::External`] if the inventory provider fails.
    pub async fn load_catalog(&mut self) -> Result<&CatalogSnapshot, CheckoutError> {
        self.require("load_catalog", SessionState::Reviewing)?;

        if self.catalog.is_none() {
            let snapshot = fetch_catalog(&self.context, self.cart.location()).await?;
            self.apply_catalog("load_catalog", snapshot)?;
        }

        self.catalog.as_ref().ok_or(CheckoutError::CatalogNotLoaded)
    }

    /// Fetch the catalog again, replacing any loaded snapshot. Cart lines keep the price they
    /// were added with until the item is added again.
    ///
    /// # Errors
    ///
    /// Same as [`load_catalog`](Self::load_catalog). A failed refresh keeps the old snapshot.
    pub async fn refresh_catalog(&mut self) -> Result<&CatalogSnapshot, CheckoutError> {
        self.require("refresh_catalog", SessionState::Reviewing)?;

        let snapshot = fetch_catalog(&self.context, self.cart.location()).await?;

        self.apply_catalog("refresh_catalog", snapshot)
    }

    /// Install a fetched catalog snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] if the session left `Reviewing` while the
    /// snapshot was being fetched.
    pub fn apply_catalog(
        &mut self,
        operation: &'static str,
        snapshot: CatalogSnapshot,
    ) -> Result<&CatalogSnapshot, CheckoutError> {
        self.require(operation, SessionState::Reviewing)?;

        Ok(self.catalog.insert(snapshot))
    }

    /// Fails outside `Reviewing`.
    pub(crate) fn require_reviewing(&self, operation: &'static str) -> Result<(), CheckoutError> {
        self.require(operation, SessionState::Reviewing)
    }

    /// Add `quantity` units of a catalog item to the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::CatalogNotLoaded`] before the catalog is loaded,
    /// [`CheckoutError::ItemNotInCatalog`] for unknown ids, or the cart's rejection.
    pub fn add_item(&mut self, item: &ItemId, quantity: u32) -> Result<(), CheckoutError> {
        self.require("add_item", SessionState::Reviewing)?;

        let catalog = self.catalog.as_ref().ok_or(CheckoutError::CatalogNotLoaded)?;
        let item = catalog
            .get(item.as_str())
            .ok_or_else(|| CheckoutError::ItemNotInCatalog(item.clone()))?;

        self.cart.add_item(item, quantity)?;

        Ok(())
    }

    /// Direct cart access for quantity, discount and customer edits.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] once totals are frozen.
    pub fn cart_mut(&mut self) -> Result<&mut Cart, CheckoutError> {
        self.require("cart_mut", SessionState::Reviewing)?;

        Ok(&mut self.cart)
    }

    /// Validate the cart against live stock, fetch payment methods, freeze totals, and start
    /// allocating payment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`], an invalid discount,
    /// [`CheckoutError::InsufficientStock`], or [`CheckoutError::External`]. The session stays
    /// in `Reviewing` on any failure.
    #[tracing::instrument(skip_all, fields(session = %self.id, location = %self.cart.location()))]
    pub async fn proceed_to_payment(&mut self) -> Result<OrderTotals, CheckoutError> {
        self.check_ready_for_payment()?;

        let (stock, methods) = fetch_payment_inputs(&self.context, self.cart.location()).await?;

        self.enter_payment(&stock, methods)
    }

    /// Local preconditions of [`proceed_to_payment`](Self::proceed_to_payment).
    pub(crate) fn check_ready_for_payment(&self) -> Result<(), CheckoutError> {
        self.require("proceed_to_payment", SessionState::Reviewing)?;

        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.cart.validate_discount()?;

        Ok(())
    }

    /// Apply fetched stock levels and payment methods. Every check runs again against the
    /// current cart before anything changes.
    ///
    /// # Errors
    ///
    /// Same local failures as [`proceed_to_payment`](Self::proceed_to_payment).
    pub fn enter_payment(
        &mut self,
        stock: &StockLevels,
        methods: Vec<PaymentMethod>,
    ) -> Result<OrderTotals, CheckoutError> {
        self.check_ready_for_payment()?;

        let shortfalls = stock::validate(&self.cart, stock)?;

        if !shortfalls.is_empty() {
            info!(
                session = %self.id,
                shortfalls = shortfalls.len(),
                "stock check blocked checkout"
            );

            return Err(CheckoutError::InsufficientStock(shortfalls));
        }

        let totals = OrderTotals::calculate(&self.cart, self.context.config.tax_treatment)?;

        self.totals = Some(totals);
        self.payment_methods = methods;
        self.ledger = PaymentLedger::new(self.cart.currency());
        self.state = SessionState::AllocatingPayment;

        info!(
            session = %self.id,
            grand_total = %totals.grand_total,
            "allocating payment"
        );

        Ok(totals)
    }

    /// Allocate `amount` to a payment method.
    ///
    /// # Errors
    ///
    /// Returns a ledger error for duplicate methods or negative amounts.
    pub fn add_payment_entry(
        &mut self,
        method: PaymentMethodId,
        amount: Amount,
    ) -> Result<(), CheckoutError> {
        self.require_open_ledger("add_payment_entry")?;

        debug!(session = %self.id, method = %method, amount = %amount, "adding payment");
        self.ledger.add(method, amount)?;

        Ok(())
    }

    /// Change the amount of the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns a ledger error for a missing entry or a negative amount.
    pub fn edit_payment_entry(&mut self, index: usize, amount: Amount) -> Result<(), CheckoutError> {
        self.require_open_ledger("edit_payment_entry")?;

        self.ledger.edit_amount(index, amount)?;

        Ok(())
    }

    /// Switch the method of the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns a ledger error for a missing entry or a method already in use.
    pub fn change_payment_method(
        &mut self,
        index: usize,
        method: PaymentMethodId,
    ) -> Result<(), CheckoutError> {
        self.require_open_ledger("change_payment_method")?;

        self.ledger.change_method(index, method)?;

        Ok(())
    }

    /// Remove the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns a ledger error for a missing entry.
    pub fn remove_payment_entry(&mut self, index: usize) -> Result<PaymentEntry, CheckoutError> {
        self.require_open_ledger("remove_payment_entry")?;

        Ok(self.ledger.remove(index)?)
    }

    /// Turn the warranty on or off. An applying warranty needs an expiration strictly after
    /// today.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidWarrantyDate`] if the date is missing or not in the
    /// future.
    pub fn set_warranty(
        &mut self,
        applies: bool,
        expiration: Option<Date>,
    ) -> Result<(), CheckoutError> {
        self.require_open_ledger("set_warranty")?;

        self.warranty_expires = if applies {
            Some(self.check_warranty(expiration)?)
        } else {
            None
        };

        Ok(())
    }

    fn check_warranty(&self, expiration: Option<Date>) -> Result<Date, CheckoutError> {
        let today = self.context.clock.today();

        match expiration {
            Some(date) if date > today => Ok(date),
            _ => Err(CheckoutError::InvalidWarrantyDate { expiration, today }),
        }
    }

    /// Allocated sum against the frozen grand total.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] before totals are frozen.
    pub fn balance(&self) -> Result<Balance, CheckoutError> {
        let totals = self.frozen_totals("balance")?;

        Ok(self.ledger.balance(&totals.grand_total)?)
    }

    /// Validate the allocation and submit the order.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentIncomplete`] or [`CheckoutError::PaymentNotFound`] for
    /// local failures, [`CheckoutError::Rejected`] if the sink refuses the order, or
    /// [`CheckoutError::External`] if it cannot be reached. The session stays in
    /// `AllocatingPayment` on any failure.
    ///
    /// Dropping the future before it completes, on a timeout for instance, unstages the order
    /// and leaves the session open for another attempt. Whether the sink received the dropped
    /// submission is unknown.
    #[tracing::instrument(skip_all, fields(session = %self.id, location = %self.cart.location()))]
    pub async fn confirm(&mut self) -> Result<OrderId, CheckoutError> {
        let pending = self.prepare_order()?;
        let orders = Arc::clone(&self.context.orders);

        let result = orders.submit_order(pending.record().clone()).await;

        self.resolve_submission(pending, result)
    }

    /// Check confirmation preconditions and stage the order record. The session refuses ledger
    /// edits while the returned [`PendingOrder`] is alive, until it is handed to
    /// [`resolve_submission`](Self::resolve_submission). Dropping it unstages the order.
    ///
    /// # Errors
    ///
    /// Same local failures as [`confirm`](Self::confirm), plus
    /// [`CheckoutError::SubmissionInFlight`] if a submission is already staged.
    pub fn prepare_order(&mut self) -> Result<PendingOrder, CheckoutError> {
        self.require_open_ledger("confirm")?;

        if self.in_flight.take().is_some() {
            warn!(
                session = %self.id,
                "previous submission was dropped before the order sink answered"
            );
        }

        let totals = self.frozen_totals("confirm")?;

        let remaining = self.ledger.remaining(&totals.grand_total)?;

        if self.ledger.is_empty() || remaining.to_minor_units() != 0 {
            return Err(CheckoutError::PaymentIncomplete { remaining });
        }

        if let Some(entry) = self
            .ledger
            .entries()
            .iter()
            .find(|entry| !self.payment_methods.iter().any(|m| m.id == entry.method))
        {
            return Err(CheckoutError::PaymentNotFound(entry.method.clone()));
        }

        if self.warranty_expires.is_some() {
            self.check_warranty(self.warranty_expires)?;
        }

        let record = OrderRecord {
            session: self.id,
            location: self.cart.location().clone(),
            operator: self.operator.id.clone(),
            customer: self.cart.customer().cloned(),
            lines: self.cart.lines().to_vec(),
            totals,
            payments: self.ledger.entries().to_vec(),
            warranty_expires: self.warranty_expires,
            created_at: self.context.clock.now().timestamp(),
        };

        debug!(session = %self.id, total = %record.total(), "submitting order");

        let record = Arc::new(record);
        self.in_flight = Some(Arc::downgrade(&record));

        Ok(PendingOrder { record })
    }

    /// Apply the order sink's answer to a staged submission.
    ///
    /// An acceptance that arrives after [`cancel`](Self::cancel) leaves the session
    /// `Abandoned`, records the order for review, and returns
    /// [`CheckoutError::ConfirmedAfterCancel`].
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NothingInFlight`] if `pending` is not the submission this
    /// session staged, otherwise the failure the sink reported.
    pub fn resolve_submission(
        &mut self,
        pending: PendingOrder,
        result: Result<SubmitOutcome, ExternalError>,
    ) -> Result<OrderId, CheckoutError> {
        let staged_here = self
            .in_flight
            .as_ref()
            .is_some_and(|staged| std::ptr::eq(staged.as_ptr(), Arc::as_ptr(&pending.record)));

        if !staged_here {
            return Err(CheckoutError::NothingInFlight);
        }

        self.in_flight = None;

        let record = Arc::unwrap_or_clone(pending.record);

        match result {
            Ok(SubmitOutcome::Accepted { order_id }) if self.state == SessionState::Abandoned => {
                warn!(
                    session = %self.id,
                    order_id = %order_id,
                    "order created after checkout was cancelled, flagged for review"
                );

                self.orphaned_order = Some(order_id.clone());

                Err(CheckoutError::ConfirmedAfterCancel { order_id })
            }
            Ok(SubmitOutcome::Accepted { order_id }) => {
                info!(session = %self.id, order_id = %order_id, "order confirmed");

                self.state = SessionState::Confirmed;
                self.order = Some((order_id.clone(), record));

                Ok(order_id)
            }
            Ok(SubmitOutcome::Rejected { reason }) => {
                info!(session = %self.id, reason = %reason, "order rejected");

                Err(CheckoutError::Rejected { reason })
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "order submission failed");

                Err(err.into())
            }
        }
    }

    /// Abandon the checkout. The cart is kept as it is. A staged submission stays staged so
    /// its answer can still be reconciled.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] if the session already ended.
    pub fn cancel(&mut self) -> Result<(), CheckoutError> {
        if self.state.is_terminal() {
            return Err(CheckoutError::InvalidState {
                operation: "cancel",
                state: self.state,
            });
        }

        info!(
            session = %self.id,
            from = %self.state,
            submitting = self.is_submitting(),
            "checkout cancelled"
        );

        self.state = SessionState::Abandoned;

        Ok(())
    }

    fn require(&self, operation: &'static str, state: SessionState) -> Result<(), CheckoutError> {
        if self.state == state {
            Ok(())
        } else {
            Err(CheckoutError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn require_open_ledger(&self, operation: &'static str) -> Result<(), CheckoutError> {
        self.require(operation, SessionState::AllocatingPayment)?;

        if self.is_submitting() {
            return Err(CheckoutError::SubmissionInFlight(operation));
        }

        Ok(())
    }

    fn frozen_totals(&self, operation: &'static str) -> Result<OrderTotals, CheckoutError> {
        self.totals.ok_or(CheckoutError::InvalidState {
            operation,
            state: self.state,
        })
    }
}

/// An order staged by [`CheckoutSession::prepare_order`] and not yet resolved.
///
/// The session counts the submission as in flight only while this value is alive.
#[derive(Debug)]
pub struct PendingOrder {
    record: Arc<OrderRecord>,
}

impl PendingOrder {
    /// Record to hand to the order sink
    pub fn record(&self) -> &OrderRecord {
        &self.record
    }
}

/// Fetch the catalog snapshot for `location`, checking it was listed for that location.
#[tracing::instrument(skip_all, fields(location = %location))]
pub(crate) async fn fetch_catalog(
    context: &CheckoutContext,
    location: &LocationId,
) -> Result<CatalogSnapshot, CheckoutError> {
    let snapshot = context
        .inventory
        .list_items_for_location(location)
        .await
        .inspect_err(|err| warn!(error = %err, "catalog fetch failed"))?;

    if snapshot.location() != location {
        return Err(ExternalError::InvalidResponse {
            service: "inventory",
            reason: format!("catalog for {} returned for {location}", snapshot.location()),
        }
        .into());
    }

    debug!(items = snapshot.len(), "loaded catalog");

    Ok(snapshot)
}

/// Read live stock and the payment methods catalog for `location`.
pub(crate) async fn fetch_payment_inputs(
    context: &CheckoutContext,
    location: &LocationId,
) -> Result<(StockLevels, Vec<PaymentMethod>), CheckoutError> {
    let stock = context
        .inventory
        .stock_for_location(location)
        .await
        .inspect_err(|err| warn!(error = %err, "stock fetch failed"))?;

    let methods = context
        .payment_methods
        .list_payment_methods()
        .await
        .inspect_err(|err| warn!(error = %err, "payment methods fetch failed"))?;

    Ok((stock, methods))
}
