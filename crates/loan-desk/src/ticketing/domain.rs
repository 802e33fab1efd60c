use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationNo(pub u64);

impl ApplicationNo {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ApplicationNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ApplicationNo {
    type Err = std::num::ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim().parse::<u64>().map(Self)
    }
}

/// A submitted loan request and its approval flag.
///
/// Field names are camelCase on disk and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    pub application_no: ApplicationNo,
    pub contact: String,
    pub amount: f64,
    pub approved: bool,
}

impl LoanApplication {
    /// A freshly submitted, still pending application.
    pub fn pending(application_no: ApplicationNo, contact: String, amount: f64) -> Self {
        Self {
            application_no,
            contact,
            amount,
            approved: false,
        }
    }

    /// Move to [`ApplicationState::Approved`]. Returns `false` when already approved.
    pub fn approve(&mut self) -> bool {
        let changed = !self.approved;
        self.approved = true;
        changed
    }

    pub fn state(&self) -> ApplicationState {
        if self.approved {
            ApplicationState::Approved
        } else {
            ApplicationState::Pending
        }
    }

    pub fn ticket(&self) -> Ticket {
        Ticket {
            id: self.application_no,
        }
    }
}

/// Lifecycle position of an application; derived from [`LoanApplication::approved`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    Pending,
    Approved,
}

impl ApplicationState {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationState::Pending => "pending",
            ApplicationState::Approved => "approved",
        }
    }
}

/// Caller-facing handle returned by submit and approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: ApplicationNo,
}
