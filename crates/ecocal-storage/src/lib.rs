//! SQLite persistence for calendar events, category rules and the
//! notification log.
//!
//! [`store::Store`] wraps a SeaORM connection, runs the schema migrations on
//! startup and implements the matcher's `EventSource`, `RuleSource` and
//! `NotificationLog` ports.

pub mod entities;
pub mod error;
pub mod store;


pub use store::{NewEconomicEvent, Store};
