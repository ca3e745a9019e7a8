//! Claims Domain
//!
//! This crate implements claims against bound policies: application and
//! reads, automatic compensation, and producer notification. A claim
//! freezes the claim section of the policy's configuration snapshot at
//! application time; when automatic compensation is enabled, a deferred
//! task settles the payout and queues a signed webhook telling the
//! producer the claim is paying.

pub mod apply;
pub mod compensate;
pub mod model;
pub mod notifier;
pub mod ports;

pub use apply::{
    ClaimInsuredSubmission, ClaimInsuredView, ClaimRequest, ClaimResponse, ClaimService,
};
pub use compensate::CompensationJob;
pub use model::{
    ClaimInsuredRecord, ClaimRecord, ClaimStatus, CompensationTask, NotifyStatus, NotifyTask,
    TaskStatus, NOTIFY_CLAIM_STATUS_CHANGE,
};
pub use notifier::{sign_request, NotifierJob};
pub use ports::{
    ClaimStore, CompensationOutcome, CompensationWorkItem, DeliveryError, NotifyStore,
    WebhookRequest, WebhookTransport,
};
