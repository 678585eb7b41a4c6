//! Invoice
//!
//! Terminal rendering of a confirmed order: sold lines, payment split and totals.

use std::io;

use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    customers::Customer,
    ids::OrderId,
    order::OrderRecord,
    payments::PaymentMethod,
    pricing::PricingError,
    session::{CheckoutSession, SessionState},
};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

/// Errors that can occur when rendering an invoice.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// The session has no confirmed order.
    #[error("session is {0}, no confirmed order to invoice")]
    NotConfirmed(SessionState),

    /// The customer passed in is not the one on the order.
    #[error("customer {0} is not the customer on this order")]
    CustomerMismatch(String),

    /// Line totals could not be computed.
    #[error(transparent)]
    Pricing(#[from] PricingError),

    /// Output could not be written.
    #[error("failed to write invoice: {0}")]
    Io(#[from] io::Error),
}

/// Tax document issued for the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Issued to businesses, itemizes tax.
    Invoice,

    /// Issued to individuals and anonymous sales.
    Receipt,
}

impl DocumentKind {
    fn title(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "Invoice",
            DocumentKind::Receipt => "Receipt",
        }
    }
}

/// Printable view of a confirmed order.
#[derive(Debug, Clone, Copy)]
pub struct Invoice<'a> {
    order_id: &'a OrderId,
    record: &'a OrderRecord,
    customer: Option<&'a Customer>,
    methods: &'a [PaymentMethod],
}

impl<'a> Invoice<'a> {
    /// Invoice for an order the sink accepted under `order_id`.
    pub fn new(order_id: &'a OrderId, record: &'a OrderRecord) -> Self {
        Self {
            order_id,
            record,
            customer: None,
            methods: &[],
        }
    }

    /// Invoice for a confirmed session, naming payment methods as the session fetched them.
    ///
    /// # Errors
    ///
    /// Returns [`InvoiceError::NotConfirmed`] unless the session is confirmed.
    pub fn from_session(session: &'a CheckoutSession) -> Result<Self, InvoiceError> {
        let (Some(order_id), Some(record)) = (session.order_id(), session.order()) else {
            return Err(InvoiceError::NotConfirmed(session.state()));
        };

        Ok(Self::new(order_id, record).with_payment_methods(session.payment_methods()))
    }

    /// Show the customer's name and document.
    ///
    /// # Errors
    ///
    /// Returns [`InvoiceError::CustomerMismatch`] if the order belongs to someone else.
    pub fn with_customer(mut self, customer: &'a Customer) -> Result<Self, InvoiceError> {
        if self.record.customer.as_ref() != Some(&customer.id) {
            return Err(InvoiceError::CustomerMismatch(customer.id.to_string()));
        }

        self.customer = Some(customer);

        Ok(self)
    }

    /// Names to show for payment method ids.
    #[must_use]
    pub fn with_payment_methods(mut self, methods: &'a [PaymentMethod]) -> Self {
        self.methods = methods;
        self
    }

    /// Document type, by customer kind.
    pub fn kind(&self) -> DocumentKind {
        match self.customer {
            Some(customer) if customer.is_business() => DocumentKind::Invoice,
            _ => DocumentKind::Receipt,
        }
    }

    /// Write the invoice.
    ///
    /// # Errors
    ///
    /// Returns an [`InvoiceError`] if a line total overflows or the output fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), InvoiceError> {
        self.write_heading(&mut out)?;

        let lines = self.lines_table()?;
        writeln!(out, "\n{}", dim_borders(&lines))?;

        let payments = self.payments_table();
        writeln!(out, "{}", dim_borders(&payments))?;

        self.write_summary(&mut out)?;

        Ok(())
    }

    fn write_heading(&self, out: &mut impl io::Write) -> Result<(), InvoiceError> {
        let record = self.record;

        writeln!(
            out,
            "{BOLD}{} {}{RESET}  {}",
            self.kind().title(),
            self.order_id,
            record.created_at
        )?;
        writeln!(out, " Location: {}", record.location)?;
        writeln!(out, " Operator: {}", record.operator)?;

        match (self.customer, &record.customer) {
            (Some(customer), _) => {
                writeln!(out, " Customer: {} ({})", customer.name, customer.document)?;
            }
            (None, Some(id)) => writeln!(out, " Customer: {id}")?,
            (None, None) => {}
        }

        Ok(())
    }

    fn lines_table(&self) -> Result<String, InvoiceError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Qty", "Unit Price", "Tax", "Total"]);

        for (idx, line) in self.record.lines.iter().enumerate() {
            builder.push_record([
                format!("#{:<3}", idx + 1),
                line.name().to_string(),
                line.quantity().to_string(),
                line.unit_price().to_string(),
                line.line_tax()?.to_string(),
                line.line_total()?.to_string(),
            ]);
        }

        let mut table = builder.build();

        table.with(theme());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(2..6), Alignment::right());

        Ok(table.to_string())
    }

    fn payments_table(&self) -> String {
        let mut builder = Builder::default();

        builder.push_record(["Payment", "Amount"]);

        for entry in &self.record.payments {
            let name = self
                .methods
                .iter()
                .find(|method| method.id == entry.method)
                .map_or_else(|| entry.method.to_string(), |method| method.name.clone());

            builder.push_record([name, entry.amount.to_string()]);
        }

        let mut table = builder.build();

        table.with(theme());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(1..2), Alignment::right());

        table.to_string()
    }

    fn write_summary(&self, out: &mut impl io::Write) -> Result<(), InvoiceError> {
        let totals = &self.record.totals;

        let rows = [
            ("Subtotal:", totals.subtotal.to_string(), false),
            ("Discount:", format!("-{}", totals.discount), false),
            ("Tax:", totals.tax_total.to_string(), false),
            ("Total:", totals.grand_total.to_string(), true),
        ];

        let label_width = rows
            .iter()
            .map(|(label, ..)| label.len())
            .max()
            .unwrap_or_default();
        let value_width = rows
            .iter()
            .map(|(_, value, _)| value.chars().count())
            .max()
            .unwrap_or_default();

        for (label, value, emphasis) in &rows {
            let (on, off) = if *emphasis { (BOLD, RESET) } else { ("", "") };

            writeln!(
                out,
                " {on}{label:>label_width$}{off}  {on}{value:>value_width$}{off}"
            )?;
        }

        if let Some(expires) = self.record.warranty_expires {
            writeln!(out, " Warranty until {expires}")?;
        }

        writeln!(out)?;

        Ok(())
    }
}

fn theme() -> Theme {
    let mut theme = Theme::from(Style::modern_rounded());

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(
        1,
        HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
    );

    theme
}

/// Dim every run of box-drawing characters in a rendered table.
fn dim_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut rest = table;

    while let Some(start) = rest.find(is_border) {
        let (plain, tail) = rest.split_at(start);
        let end = tail.find(|ch| !is_border(ch)).unwrap_or(tail.len());
        let (border, tail) = tail.split_at(end);

        out.push_str(plain);
        out.push_str(DIM);
        out.push_str(border);
        out.push_str(RESET);

        rest = tail;
    }

    out.push_str(rest);
    out
}

fn is_border(ch: char) -> bool {
    matches!(ch, '\u{2500}'..='\u{257F}')
}
