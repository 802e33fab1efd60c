use crate::infra::{apply_store_root, build_service};
use clap::{Args, Subcommand};
use loan_desk::config::{AppConfig, StorageBackend};
use loan_desk::error::AppError;
use loan_desk::ticketing::{RecordBackend, TicketingService};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub(crate) enum LoanCommand {
    /// Submit a new application and print its ticket
    Submit(SubmitArgs),
    /// Print the current record behind a ticket
    Fetch(TicketArgs),
    /// Approve the application behind a ticket
    Approve(TicketArgs),
}

#[derive(Args, Debug)]
pub(crate) struct SubmitArgs {
    /// Applicant contact, e.g. an email address
    #[arg(long)]
    pub(crate) contact: Option<String>,
    /// Requested amount
    #[arg(long)]
    pub(crate) amount: Option<String>,
    /// Override the directory holding `.loan` records
    #[arg(long)]
    pub(crate) store_root: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct TicketArgs {
    /// Ticket id returned by `loan submit`
    #[arg(long)]
    pub(crate) ticket: String,
    /// Override the directory holding `.loan` records
    #[arg(long)]
    pub(crate) store_root: Option<PathBuf>,
}

impl LoanCommand {
    fn store_root(&self) -> Option<PathBuf> {
        match self {
            LoanCommand::Submit(args) => args.store_root.clone(),
            LoanCommand::Fetch(args) | LoanCommand::Approve(args) => args.store_root.clone(),
        }
    }
}

/// One-shot commands always go to the file store; a memory store would not
/// outlive the process.
pub(crate) fn run_loan_command(command: LoanCommand) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    config.storage.backend = StorageBackend::File;
    apply_store_root(&mut config.storage, command.store_root());

    let service = build_service(&config.storage)?;
    let output = execute(&service, command)?;
    println!("{output}");
    Ok(())
}

pub(crate) fn execute<B>(
    service: &TicketingService<B>,
    command: LoanCommand,
) -> Result<String, AppError>
where
    B: RecordBackend + 'static,
{
    match command {
        LoanCommand::Submit(args) => {
            let ticket = service.submit(args.contact.as_deref(), args.amount.as_deref())?;
            render(&ticket)
        }
        LoanCommand::Fetch(args) => {
            let application = service.fetch(&args.ticket)?;
            render(&application)
        }
        LoanCommand::Approve(args) => {
            let ticket = service.approve(&args.ticket)?;
            render(&ticket)
        }
    }
}

fn render<T: Serialize>(value: &T) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(value)?)
}
