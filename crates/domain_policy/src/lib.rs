//! Policy Administration Domain
//!
//! This crate implements the policy side of the lifecycle: acceptance
//! (validate, adjust, price, bind), quotation, reads, endorsement,
//! cancellation and renewal. Every rule the operations enforce comes from
//! the resolved business configuration; pricing goes through the formula
//! registry; persistence and cross-instance coordination go through ports.
//!
//! # Acceptance pipeline
//!
//! ```text
//! request -> basal screen -> request lock -> replay check -> catalog
//!         -> config resolve -> first screen -> adjust -> second screen
//!         -> insured locks -> duplicate check -> charge -> bind
//! ```

pub mod adjust;
pub mod catalog;
pub mod draft;
pub mod endorsement;
pub mod formula;
pub mod idempotency;
pub mod ports;
pub mod responses;
pub mod schema;
pub mod services;

pub use catalog::{CatalogStore, Contract, Plan, Producer, Product};
pub use draft::{
    AcceptRequest, ApplicantDraft, ApplicantRecord, InsuredDraft, InsuredRecord, PolicyBundle,
    PolicyDraft, PolicyRecord, PolicyStatus,
};
pub use endorsement::{
    DetailScope, EndorsementDetail, EndorsementRecord, EndorsementSave, EndorsementType,
    PolicySnapshot,
};
pub use formula::{
    ChargeLine, CoverageWindow, DefaultFormula, FactorRange, FactorTable, Formula,
    FormulaRegistry, Operator, PayoutLine, RefundLine,
};
pub use ports::{PolicyStore, RepeatInsuredQuery};
pub use responses::{
    AcceptOutcome, ApplicantView, CancelResponse, EndorseResponse, InsuredView, PolicyResponse,
    QuoteResponse,
};
pub use services::{EndorseRequest, PartyChange, PolicyService};
