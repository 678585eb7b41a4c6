//! End-to-end checkout flows against the `checkout` fixture set.
//!
//! The fixture plays inventory backend, payment methods catalog and order store at once, and
//! keeps its own stock so orders it accepts are decremented like a real backend would.

use std::sync::Arc;

use jiff::{
    civil::{Date, date},
    tz::TimeZone,
};
use rusty_money::{Money, iso::CLP};
use testresult::TestResult;

use checkout::{
    clock::FixedClock,
    fixtures::Fixture,
    prelude::*,
    providers::MockOrderSink,
};

const TODAY: Date = date(2026, 10, 18);

fn clp(minor: i64) -> Amount {
    Money::from_minor(minor, CLP)
}

fn context_with(
    fixture: &Arc<Fixture>,
    orders: Arc<dyn OrderSink>,
    config: CheckoutConfig,
) -> Result<CheckoutContext, jiff::Error> {
    let now = TODAY
        .at(15, 30, 0, 0)
        .to_zoned(TimeZone::get("America/Santiago")?)?;

    Ok(CheckoutContext::new(
        Arc::clone(fixture) as Arc<dyn InventoryProvider>,
        Arc::clone(fixture) as Arc<dyn PaymentMethodsCatalog>,
        orders,
        config,
    )
    .with_clock(Arc::new(FixedClock::new(now))))
}

fn session(fixture: &Arc<Fixture>) -> Result<CheckoutSession, jiff::Error> {
    let context = context_with(
        fixture,
        Arc::clone(fixture) as Arc<dyn OrderSink>,
        CheckoutConfig::default(),
    )?;

    Ok(CheckoutSession::new(context, operator(), LocationId::from("main")))
}

fn operator() -> Operator {
    Operator {
        id: OperatorId::from("emp-7"),
        role: Role::Employee,
    }
}

#[tokio::test]
async fn full_happy_path() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"screen-a10".into(), 2)?;

    let totals = session.proceed_to_payment().await?;

    assert_eq!(totals.subtotal, clp(30_000));
    assert_eq!(totals.grand_total, clp(30_000));

    session.add_payment_entry("cash".into(), clp(30_000))?;
    let order_id = session.confirm().await?;

    assert_eq!(session.state(), SessionState::Confirmed);

    let orders = fixture.orders().await;
    assert_eq!(orders.len(), 1);

    let (stored_id, record) = orders.first().ok_or("no order stored")?;
    assert_eq!(stored_id, &order_id);
    assert_eq!(record.total(), clp(30_000));
    assert_eq!(record.operator, OperatorId::from("emp-7"));
    assert_eq!(fixture.available("main", "screen-a10").await, 3);

    Ok(())
}

#[tokio::test]
async fn split_payment_confirms() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"screen-a10".into(), 2)?;
    session.proceed_to_payment().await?;

    session.add_payment_entry("cash".into(), clp(20_000))?;
    assert_eq!(session.balance()?, Balance::Due(clp(10_000)));

    session.add_payment_entry("card".into(), clp(10_000))?;
    assert_eq!(session.balance()?, Balance::Settled);

    session.confirm().await?;

    let payload = session.order().ok_or("no order")?.to_payload();
    let json = serde_json::to_value(&payload)?;

    assert_eq!(json["total"], 30_000);
    assert_eq!(json["payments"][0]["method"], "cash");
    assert_eq!(json["payments"][1]["amount"], 10_000);

    Ok(())
}

#[tokio::test]
async fn payment_must_match_grand_total_exactly() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"screen-a10".into(), 5)?;
    session.add_item(&"battery-a10".into(), 3)?;
    session.cart_mut()?.set_discount(clp(11_000))?;

    assert_eq!(session.proceed_to_payment().await?.grand_total, clp(100_000));

    session.add_payment_entry("cash".into(), clp(60_000))?;
    session.add_payment_entry("card".into(), clp(39_999))?;

    for (amount, remaining) in [(39_999, 1), (40_001, -1)] {
        session.edit_payment_entry(1, clp(amount))?;

        let err = session.confirm().await.err().ok_or("expected mismatch")?;

        assert!(matches!(
            err,
            CheckoutError::PaymentIncomplete { remaining: r } if r == clp(remaining)
        ));
        assert_eq!(session.state(), SessionState::AllocatingPayment);
    }

    session.edit_payment_entry(1, clp(40_000))?;
    session.confirm().await?;

    assert_eq!(session.state(), SessionState::Confirmed);

    Ok(())
}

#[tokio::test]
async fn duplicate_method_is_rejected() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"screen-a10".into(), 1)?;
    session.proceed_to_payment().await?;
    session.add_payment_entry("cash".into(), clp(10_000))?;

    let err = session
        .add_payment_entry("cash".into(), clp(5_000))
        .err()
        .ok_or("expected duplicate")?;

    assert!(matches!(
        err,
        CheckoutError::Ledger(LedgerError::DuplicateMethod(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(session.ledger().len(), 1);

    Ok(())
}

#[tokio::test]
async fn warranty_dates_are_checked_against_the_clock() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"battery-a10".into(), 1)?;
    session.proceed_to_payment().await?;

    let yesterday = TODAY.yesterday()?;
    let tomorrow = TODAY.tomorrow()?;

    assert!(matches!(
        session.set_warranty(true, Some(yesterday)),
        Err(CheckoutError::InvalidWarrantyDate { .. })
    ));

    session.set_warranty(true, Some(tomorrow))?;
    session.add_payment_entry("transfer".into(), clp(12_000))?;
    session.confirm().await?;

    assert_eq!(
        session.order().and_then(|order| order.warranty_expires),
        Some(tomorrow)
    );

    Ok(())
}

#[tokio::test]
async fn stock_gate_reports_shortfalls() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"battery-a10".into(), 10)?;
    session.add_item(&"usb-c-cable".into(), 1)?;
    session.add_item(&"case-silicone".into(), 2)?;

    let err = session
        .proceed_to_payment()
        .await
        .err()
        .ok_or("expected shortfall")?;

    assert_eq!(err.kind(), ErrorKind::StockConflict);

    let CheckoutError::InsufficientStock(shortfalls) = err else {
        return Err("expected insufficient stock".into());
    };

    assert_eq!(
        shortfalls.as_slice(),
        [
            Shortfall {
                item_id: "battery-a10".into(),
                requested: 10,
                available: 3,
            },
            Shortfall {
                item_id: "usb-c-cable".into(),
                requested: 1,
                available: 0,
            },
        ]
    );
    assert_eq!(session.state(), SessionState::Reviewing);

    Ok(())
}

#[tokio::test]
async fn sink_rejects_when_stock_moved() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;

    session.load_catalog().await?;
    session.add_item(&"screen-a10".into(), 2)?;
    session.proceed_to_payment().await?;
    session.add_payment_entry("cash".into(), clp(30_000))?;

    fixture
        .set_stock(&LocationId::from("main"), "screen-a10".into(), 1)
        .await;

    let err = session.confirm().await.err().ok_or("expected rejection")?;

    assert_eq!(err.kind(), ErrorKind::Rejected);
    assert!(!err.is_retriable());
    assert_eq!(session.state(), SessionState::AllocatingPayment);
    assert!(fixture.orders().await.is_empty());

    session.cancel()?;

    assert_eq!(session.state(), SessionState::Abandoned);
    assert_eq!(session.cart().len(), 1);

    Ok(())
}

#[tokio::test]
async fn sink_outage_can_be_retried() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);

    let mut orders = MockOrderSink::new();
    let mut calls = 0;
    orders.expect_submit_order().times(2).returning(move |_| {
        calls += 1;

        if calls == 1 {
            Err(ExternalError::Timeout { service: "orders" })
        } else {
            Ok(SubmitOutcome::Accepted {
                order_id: "remote-1".into(),
            })
        }
    });

    let context = context_with(&fixture, Arc::new(orders), CheckoutConfig::default())?;
    let mut session = CheckoutSession::new(context, operator(), LocationId::from("main"));

    session.load_catalog().await?;
    session.add_item(&"case-silicone".into(), 1)?;
    session.proceed_to_payment().await?;
    session.add_payment_entry("card".into(), clp(4_990))?;

    let err = session.confirm().await.err().ok_or("expected timeout")?;

    assert!(err.is_retriable());
    assert_eq!(session.state(), SessionState::AllocatingPayment);
    assert!(!session.is_submitting());

    assert_eq!(session.confirm().await?, OrderId::from("remote-1"));

    Ok(())
}

#[tokio::test]
async fn configured_tax_treatment_adds_tax() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let config = CheckoutConfig::from_yaml_str(
        "currency: CLP\ntax_treatment: added\ntime_zone: America/Santiago\n",
    )?;
    let context = context_with(&fixture, Arc::clone(&fixture) as Arc<dyn OrderSink>, config)?;
    let mut session = CheckoutSession::new(context, operator(), LocationId::from("main"));

    session.load_catalog().await?;
    session.add_item(&"battery-a10".into(), 1)?;
    session.cart_mut()?.set_discount(clp(2_000))?;

    let totals = session.proceed_to_payment().await?;

    assert_eq!(totals.subtotal, clp(12_000));
    assert_eq!(totals.tax_total, clp(2_280));
    assert_eq!(totals.discount, clp(2_000));
    assert_eq!(totals.grand_total, clp(12_280));

    Ok(())
}

#[tokio::test]
async fn customer_and_invoice() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let mut session = session(&fixture)?;
    let customer = Customer {
        id: CustomerId::from("c-42"),
        kind: CustomerKind::Business,
        name: "Reparaciones del Sur Ltda".into(),
        document: "77.654.321-0".into(),
    };

    session.load_catalog().await?;
    session.add_item(&"case-silicone".into(), 2)?;
    session.cart_mut()?.attach_customer(&customer);
    session.proceed_to_payment().await?;
    session.add_payment_entry("cash".into(), clp(9_980))?;
    session.confirm().await?;

    let invoice = Invoice::from_session(&session)?.with_customer(&customer)?;

    assert_eq!(invoice.kind(), DocumentKind::Invoice);

    let mut out = Vec::new();
    invoice.write_to(&mut out)?;
    let output = String::from_utf8(out)?;

    assert!(output.contains("Funda silicona"));
    assert!(output.contains("Efectivo"));
    assert!(output.contains("Reparaciones del Sur Ltda"));

    Ok(())
}

#[tokio::test]
async fn invoice_requires_confirmation() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let session = session(&fixture)?;

    assert!(matches!(
        Invoice::from_session(&session),
        Err(InvoiceError::NotConfirmed(SessionState::Reviewing))
    ));

    Ok(())
}

#[tokio::test]
async fn other_location_sells_from_its_own_catalog() -> TestResult {
    let fixture = Arc::new(Fixture::from_set("checkout")?);
    let context = context_with(
        &fixture,
        Arc::clone(&fixture) as Arc<dyn OrderSink>,
        CheckoutConfig::default(),
    )?;
    let mut session = CheckoutSession::new(context, operator(), LocationId::from("branch"));

    session.load_catalog().await?;

    assert!(matches!(
        session.add_item(&"battery-a10".into(), 1),
        Err(CheckoutError::ItemNotInCatalog(_))
    ));

    session.add_item(&"screen-a10".into(), 1)?;

    assert_eq!(session.proceed_to_payment().await?.grand_total, clp(15_500));

    Ok(())
}
