//! REST API handlers

pub mod check_ins;
pub mod discounts;
pub mod events;
pub mod health;
pub mod orders;
pub mod payments;
pub mod series;
pub mod ticket_types;

pub use check_ins::*;
pub use discounts::*;
pub use events::*;
pub use health::*;
pub use orders::*;
pub use payments::*;
pub use series::*;
pub use ticket_types::*;
