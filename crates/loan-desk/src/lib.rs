//! Loan application ticketing.
//!
//! Applications are submitted, tracked by ticket and approved through
//! [`ticketing::TicketingService`], which persists records via an
//! [`ticketing::ApplicationStore`].

pub mod config;
pub mod error;
pub mod telemetry;
pub mod ticketing;
