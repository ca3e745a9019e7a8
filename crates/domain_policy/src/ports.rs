//! Persistence ports for policy lifecycle state

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::ServiceResult;
use uuid::Uuid;

use crate::draft::PolicyBundle;
use crate::endorsement::EndorsementSave;

/// Lookup for insureds already covered by an overlapping policy window
/// on the same plan. `keys` holds one primary-field map per insured in
/// the incoming request, values already normalised (birth as `YYYYMMDD`).
#[derive(Debug, Clone)]
pub struct RepeatInsuredQuery {
    pub product_id: Uuid,
    pub product_version: String,
    pub plan_id: Uuid,
    pub effective_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub keys: Vec<BTreeMap<String, String>>,
}

/// Storage for bound policies and their endorsements.
///
/// `create_policy` and `apply_endorsement` must be atomic: either every row
/// in the bundle or save lands, or none do.
#[async_trait]
pub trait PolicyStore: Send + Sync + 'static {
    /// Fetches the policy a producer bound for an order number, if any.
    async fn find_by_order_no(
        &self,
        order_no: &str,
        producer_id: Uuid,
    ) -> ServiceResult<Option<PolicyBundle>>;

    async fn find_by_policy_no(&self, policy_no: &str) -> ServiceResult<Option<PolicyBundle>>;

    async fn policy_no_exists(&self, policy_no: &str) -> ServiceResult<bool>;

    /// Returns the subset of `query.keys` matching an insured on a valid
    /// policy whose coverage window overlaps the queried one.
    async fn repeat_insureds(
        &self,
        query: &RepeatInsuredQuery,
    ) -> ServiceResult<Vec<BTreeMap<String, String>>>;

    async fn create_policy(&self, bundle: &PolicyBundle) -> ServiceResult<()>;

    async fn apply_endorsement(&self, save: &EndorsementSave) -> ServiceResult<()>;
}
