//! Loan application ticketing: identifiers, storage, the pending → approved
//! lifecycle and its HTTP surface.

pub mod domain;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{ApplicationNo, ApplicationState, LoanApplication, Ticket};
pub use router::{ticketing_router, ActionQuery, AmountInput, SubmitRequest};
pub use service::{TicketingError, TicketingService};
pub use store::{ApplicationStore, FileBackend, MemoryBackend, RecordBackend, StoreError};
