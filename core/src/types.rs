//! Shared primitive types used across the entire engine.

/// A stable, unique customer identifier.
pub type CustomerId = String;

/// An invoice identifier. One invoice = one transaction.
pub type InvoiceId = String;

/// A duration expressed in the model time unit (weeks by default).
pub type ModelTime = f64;
