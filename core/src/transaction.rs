//! The raw transaction log as the engine receives it.

use crate::types::{CustomerId, InvoiceId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One line of the transaction log. Immutable once handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub invoice:     InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub timestamp:   NaiveDateTime,
    pub quantity:    f64,
    pub unit_price:  f64,
    #[serde(default)]
    pub cancelled:   bool,
}

impl TransactionRecord {
    /// Build a record, flagging it as a cancellation when the invoice
    /// identifier carries the reversal marker `C`.
    pub fn new(
        invoice: impl Into<InvoiceId>,
        customer_id: Option<CustomerId>,
        timestamp: NaiveDateTime,
        quantity: f64,
        unit_price: f64,
    ) -> Self {
        let invoice = invoice.into();
        let cancelled = is_cancellation_invoice(&invoice);
        Self { invoice, customer_id, timestamp, quantity, unit_price, cancelled }
    }

    /// quantity x unit price.
    pub fn value(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

pub fn is_cancellation_invoice(invoice: &str) -> bool {
    invoice.contains('C')
}
