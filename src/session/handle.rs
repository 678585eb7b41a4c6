//! Shared session handle
//!
//! Lets a UI cancel a checkout while a collaborator call is still outstanding. The lock is
//! released for every await, and each answer is applied against whatever state the session is
//! in when it arrives.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::{
    errors::CheckoutError,
    ids::OrderId,
    session::{CheckoutSession, SessionState, fetch_catalog, fetch_payment_inputs},
    totals::OrderTotals,
};

/// Cloneable handle to a [`CheckoutSession`].
#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<CheckoutSession>>,
}

impl SharedSession {
    /// Wrap a session.
    pub fn new(session: CheckoutSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Exclusive access for synchronous edits. Do not hold the guard across collaborator calls.
    pub async fn lock(&self) -> MutexGuard<'_, CheckoutSession> {
        self.inner.lock().await
    }

    /// Current state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state()
    }

    /// [`CheckoutSession::load_catalog`] without holding the lock while the inventory provider
    /// answers.
    ///
    /// # Errors
    ///
    /// Same as [`CheckoutSession::load_catalog`]; a session cancelled in the meantime reports
    /// [`CheckoutError::InvalidState`].
    pub async fn load_catalog(&self) -> Result<(), CheckoutError> {
        self.fetch_and_apply_catalog("load_catalog", false).await
    }

    /// [`CheckoutSession::refresh_catalog`] without holding the lock while the inventory
    /// provider answers.
    ///
    /// # Errors
    ///
    /// Same as [`load_catalog`](Self::load_catalog).
    pub async fn refresh_catalog(&self) -> Result<(), CheckoutError> {
        self.fetch_and_apply_catalog("refresh_catalog", true).await
    }

    async fn fetch_and_apply_catalog(
        &self,
        operation: &'static str,
        replace: bool,
    ) -> Result<(), CheckoutError> {
        let (context, location) = {
            let session = self.inner.lock().await;
            session.require_reviewing(operation)?;

            if !replace && session.catalog().is_some() {
                return Ok(());
            }

            (session.context().clone(), session.location().clone())
        };

        let snapshot = fetch_catalog(&context, &location).await?;

        self.inner.lock().await.apply_catalog(operation, snapshot)?;

        Ok(())
    }

    /// [`CheckoutSession::proceed_to_payment`] without holding the lock while stock and payment
    /// methods are fetched. The cart is checked again once the answers are in.
    ///
    /// # Errors
    ///
    /// Same as [`CheckoutSession::proceed_to_payment`]; a session cancelled in the meantime
    /// reports [`CheckoutError::InvalidState`].
    pub async fn proceed_to_payment(&self) -> Result<OrderTotals, CheckoutError> {
        let (context, location) = {
            let session = self.inner.lock().await;
            session.check_ready_for_payment()?;

            (session.context().clone(), session.location().clone())
        };

        let (stock, methods) = fetch_payment_inputs(&context, &location).await?;

        self.inner.lock().await.enter_payment(&stock, methods)
    }

    /// [`CheckoutSession::confirm`] without holding the lock while the order sink answers.
    ///
    /// # Errors
    ///
    /// Same as [`CheckoutSession::confirm`], plus [`CheckoutError::ConfirmedAfterCancel`] when
    /// the sink accepts an order for a session cancelled in the meantime. Dropping the future
    /// unstages the order the same way.
    pub async fn confirm(&self) -> Result<OrderId, CheckoutError> {
        let (pending, orders) = {
            let mut session = self.inner.lock().await;
            let pending = session.prepare_order()?;

            (pending, Arc::clone(&session.context().orders))
        };

        debug!(session = %pending.record().session, "awaiting order sink");

        let result = orders.submit_order(pending.record().clone()).await;

        self.inner.lock().await.resolve_submission(pending, result)
    }

    /// Cancel the checkout, even while a confirmation is outstanding.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidState`] if the session already ended.
    pub async fn cancel(&self) -> Result<(), CheckoutError> {
        self.inner.lock().await.cancel()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::{civil::date, tz::TimeZone};
    use rusty_money::{Money, iso::CLP};
    use testresult::TestResult;

    use crate::{
        catalog::{CatalogSnapshot, StockLevels},
        clock::FixedClock,
        config::CheckoutConfig,
        context::{CheckoutContext, Operator, Role},
        ids::{ItemId, LocationId},
        payments::PaymentMethod,
        providers::{
            ExternalError, MockInventoryProvider, MockOrderSink, MockPaymentMethodsCatalog,
        },
    };

    use super::*;

    fn shared(inventory: MockInventoryProvider) -> Result<SharedSession, jiff::Error> {
        let mut methods = MockPaymentMethodsCatalog::new();
        methods.expect_list_payment_methods().returning(|| {
            Ok(vec![PaymentMethod {
                id: "cash".into(),
                name: "Efectivo".into(),
            }])
        });

        let now = date(2026, 10, 18).at(12, 0, 0, 0).to_zoned(TimeZone::UTC)?;
        let context = CheckoutContext::new(
            Arc::new(inventory),
            Arc::new(methods),
            Arc::new(MockOrderSink::new()),
            CheckoutConfig::default(),
        )
        .with_clock(Arc::new(FixedClock::new(now)));

        let operator = Operator {
            id: "emp-1".into(),
            role: Role::Administrator,
        };

        Ok(SharedSession::new(CheckoutSession::new(
            context,
            operator,
            LocationId::from("main"),
        )))
    }

    #[tokio::test]
    async fn proceeds_through_the_handle() -> TestResult {
        let mut inventory = MockInventoryProvider::new();
        inventory.expect_stock_for_location().returning(|location| {
            Ok(StockLevels::new(location.clone(), [(ItemId::from("A"), 5)]))
        });
        inventory.expect_list_items_for_location().returning(|location| {
            let item = crate::catalog::CatalogItem::new(
                "A".into(),
                "Pantalla",
                Money::from_minor(15_000, CLP),
                crate::catalog::TaxSpec::Exempt,
                5,
                location.clone(),
            );

            item.and_then(|item| CatalogSnapshot::new(location.clone(), [item]))
                .map_err(|err| ExternalError::InvalidResponse {
                    service: "inventory",
                    reason: err.to_string(),
                })
        });

        let handle = shared(inventory)?;

        handle.load_catalog().await?;
        handle.lock().await.add_item(&"A".into(), 2)?;

        let totals = handle.proceed_to_payment().await?;

        assert_eq!(totals.grand_total, Money::from_minor(30_000, CLP));
        assert_eq!(handle.state().await, SessionState::AllocatingPayment);

        Ok(())
    }

    #[tokio::test]
    async fn handle_loads_catalog_once_and_refreshes_on_demand() -> TestResult {
        let mut inventory = MockInventoryProvider::new();
        inventory
            .expect_list_items_for_location()
            .times(2)
            .returning(|location| {
                CatalogSnapshot::new(
                    location.clone(),
                    std::iter::empty::<crate::catalog::CatalogItem>(),
                )
                    .map_err(|err| ExternalError::InvalidResponse {
                        service: "inventory",
                        reason: err.to_string(),
                    })
            });

        let handle = shared(inventory)?;

        handle.load_catalog().await?;
        handle.load_catalog().await?;
        handle.refresh_catalog().await?;

        assert!(handle.lock().await.catalog().is_some());

        Ok(())
    }

    #[tokio::test]
    async fn cancel_then_cancel_again_fails() -> TestResult {
        let handle = shared(MockInventoryProvider::new())?;

        handle.cancel().await?;

        assert_eq!(handle.state().await, SessionState::Abandoned);
        assert!(matches!(
            handle.cancel().await,
            Err(CheckoutError::InvalidState { .. })
        ));
        assert!(matches!(
            handle.proceed_to_payment().await,
            Err(CheckoutError::InvalidState { .. })
        ));

        Ok(())
    }
}
