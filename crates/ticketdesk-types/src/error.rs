//! Common error types

use thiserror::Error;

/// Errors raised while encoding buyer identity into a ticket reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// A field contains the reference delimiter and could not be decoded back
    #[error("{field} must not contain '{delimiter}'")]
    DelimiterInField {
        /// Which field was rejected
        field: &'static str,
        /// The reserved delimiter
        delimiter: char,
    },
}

/// Errors raised while pricing a checkout or free order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// A line carries a price below zero
    #[error("ticket type {ticket_type_id} has a negative price")]
    NegativePrice {
        /// Offending line
        ticket_type_id: String,
    },

    /// Price × quantity or the order sum does not fit in minor units
    #[error("order total is too large")]
    Overflow,
}
