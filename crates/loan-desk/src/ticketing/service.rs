use std::sync::Arc;

use tracing::{debug, info, warn};

use super::domain::{ApplicationNo, LoanApplication, Ticket};
use super::store::{ApplicationStore, RecordBackend, StoreError};

/// Submit, fetch and approve loan applications over an [`ApplicationStore`].
pub struct TicketingService<B> {
    store: Arc<ApplicationStore<B>>,
}

impl<B> Clone for TicketingService<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<B> TicketingService<B>
where
    B: RecordBackend + 'static,
{
    pub fn new(store: Arc<ApplicationStore<B>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ApplicationStore<B> {
        &self.store
    }

    /// Register a new pending application and hand back its ticket.
    ///
    /// Nothing is allocated or persisted unless both inputs are well formed.
    pub fn submit(
        &self,
        contact: Option<&str>,
        amount: Option<&str>,
    ) -> Result<Ticket, TicketingError> {
        let (contact, amount) = match (parse_contact(contact), parse_amount(amount)) {
            (Some(contact), Some(amount)) => (contact, amount),
            _ => {
                warn!("rejected loan submission with missing or malformed parameters");
                return Err(TicketingError::incorrect_parameters());
            }
        };

        let application = self.store.insert_new(|application_no| {
            LoanApplication::pending(application_no, contact.clone(), amount)
        })?;

        info!(application_no = %application.application_no, "loan application submitted");
        Ok(application.ticket())
    }

    /// Current record for `ticket_id`, approval state included.
    pub fn fetch(&self, ticket_id: &str) -> Result<LoanApplication, TicketingError> {
        let application_no = parse_ticket(ticket_id)?;
        let application = self.store.get(application_no)?;
        debug!(%application_no, state = application.state().label(), "loan application fetched");
        Ok(application)
    }

    /// Mark the application approved. Approving twice is a successful no-op.
    pub fn approve(&self, ticket_id: &str) -> Result<Ticket, TicketingError> {
        let application_no = parse_ticket(ticket_id)?;
        let mut changed = false;
        let application = self.store.update(application_no, |application| {
            changed = application.approve();
            changed
        })?;

        if changed {
            info!(%application_no, "loan application approved");
        } else {
            debug!(%application_no, "loan application already approved");
        }
        Ok(application.ticket())
    }
}

fn parse_contact(raw: Option<&str>) -> Option<String> {
    let contact = raw?.trim();
    if contact.is_empty() {
        None
    } else {
        Some(contact.to_string())
    }
}

fn parse_amount(raw: Option<&str>) -> Option<f64> {
    raw?.trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}

fn parse_ticket(raw: &str) -> Result<ApplicationNo, TicketingError> {
    raw.parse::<ApplicationNo>().map_err(|_| {
        warn!(ticket_id = raw, "rejected malformed ticket id");
        TicketingError::incorrect_parameters()
    })
}

/// Error raised by the ticketing service.
#[derive(Debug, thiserror::Error)]
pub enum TicketingError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Ticket not found")]
    NotFound(ApplicationNo),
    #[error("Could not store application: {0}")]
    Storage(#[source] StoreError),
}

impl TicketingError {
    /// The rejection returned for any missing or malformed request parameter.
    pub fn incorrect_parameters() -> Self {
        Self::InvalidRequest("Incorrect parameters provided".to_string())
    }
}

impl From<StoreError> for TicketingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(application_no) => Self::NotFound(application_no),
            other => Self::Storage(other),
        }
    }
}
