//! Policy lifecycle services
//!
//! One service struct orchestrates every lifecycle operation, wired to the
//! catalog, the policy store, the coordination ports and the formula
//! registry. Each operation lives in its own submodule.

mod accept;
mod cancel;
mod endorse;
mod quote;
mod renew;

pub use endorse::{EndorseRequest, PartyChange};

use std::sync::Arc;

use biz_config::{CalculateMode, PremiumRule};
use chrono::{DateTime, Utc};
use core_kernel::{LockStore, SequenceStore, ServiceError, ServiceResult};
use rust_decimal::Decimal;

use crate::catalog::{CatalogStore, Producer};
use crate::draft::{PolicyBundle, PolicyDraft};
use crate::formula::{ChargeLine, CoverageWindow, FormulaRegistry};
use crate::ports::PolicyStore;
use crate::responses::PolicyResponse;
use crate::schema;

const POLICY_NO_PREFIX: &str = "OPC";
const POLICY_NO_SEQUENCE: &str = "policy-no-incr";

/// Who is blamed when a charging figure falls outside its bounds: the
/// caller for fresh submissions, the system for derived ones (renewal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChargeBlame {
    Client,
    System,
}

pub struct PolicyService {
    catalog: Arc<dyn CatalogStore>,
    policies: Arc<dyn PolicyStore>,
    locks: Arc<dyn LockStore>,
    sequences: Arc<dyn SequenceStore>,
    formulas: Arc<FormulaRegistry>,
}

impl PolicyService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        policies: Arc<dyn PolicyStore>,
        locks: Arc<dyn LockStore>,
        sequences: Arc<dyn SequenceStore>,
        formulas: Arc<FormulaRegistry>,
    ) -> Self {
        Self { catalog, policies, locks, sequences, formulas }
    }

    /// Fetches a bound policy owned by the calling producer.
    pub async fn get(&self, producer_code: &str, policy_no: &str) -> ServiceResult<PolicyResponse> {
        let producer = self.identify_producer(producer_code).await?;
        let bundle = self.load_owned_policy(policy_no, &producer).await?;
        Ok(PolicyResponse::from_bundle(&bundle))
    }

    /// Resolves the calling producer. An unknown code is an authentication
    /// failure, not a lookup miss.
    pub(crate) async fn identify_producer(&self, code: &str) -> ServiceResult<Producer> {
        self.catalog
            .producer_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("unknown producer"))
    }

    pub(crate) async fn load_owned_policy(
        &self,
        policy_no: &str,
        producer: &Producer,
    ) -> ServiceResult<PolicyBundle> {
        schema::validate_policy_no(policy_no)?;
        let bundle = self
            .policies
            .find_by_policy_no(policy_no)
            .await?
            .ok_or_else(|| ServiceError::not_found("policy not found").with_target("policyNo"))?;
        if bundle.policy.producer_id != producer.id {
            return Err(ServiceError::access_denied(
                "the policy belongs to another producer",
            ));
        }
        Ok(bundle)
    }

    pub(crate) async fn next_policy_no(&self, now: DateTime<Utc>) -> ServiceResult<String> {
        let seq = self.sequences.next(POLICY_NO_SEQUENCE).await?;
        Ok(format!(
            "{POLICY_NO_PREFIX}{}{seq:08}",
            now.format("%Y%m%d")
        ))
    }

    /// Runs the configured charging mode over an adjusted draft, then checks
    /// that insured premiums sum to the aggregate and that the aggregate
    /// respects the configured bounds.
    pub(crate) fn charge_draft(
        &self,
        draft: &mut PolicyDraft,
        rule: &PremiumRule,
        blame: ChargeBlame,
    ) -> ServiceResult<()> {
        if rule.calculate_mode == CalculateMode::Formula {
            let window = draft_window(draft)?;
            let formula = self.formulas.get(&rule.formula.name)?;
            let mut lines: Vec<ChargeLine> = draft
                .insureds
                .iter()
                .map(|i| ChargeLine { birth: i.birth, premium: Decimal::ZERO })
                .collect();
            let total = formula.charge(&rule.formula.params, window, &mut lines)?;
            for (insured, line) in draft.insureds.iter_mut().zip(&lines) {
                insured.premium = Some(line.premium);
            }
            draft.premium = Some(total);
        }

        let total = draft.premium.ok_or_else(|| {
            ServiceError::internal("no aggregate premium after charging").untrusted()
        })?;
        let sum: Decimal = draft
            .insureds
            .iter()
            .map(|i| i.premium.unwrap_or_default())
            .sum();
        if sum != total {
            return Err(if rule.calculate_mode == CalculateMode::AdoptClient {
                ServiceError::invalid_request(
                    "premium does not equal the sum of insured premiums",
                )
                .with_target("premium")
            } else {
                ServiceError::internal("charged premiums do not sum to the aggregate")
                    .untrusted()
            });
        }

        check_premium_bounds(total, rule, blame, "premium")
    }
}

/// Bounds check shared by fresh charging and endorsement differences.
pub(crate) fn check_premium_bounds(
    amount: Decimal,
    rule: &PremiumRule,
    blame: ChargeBlame,
    target: &str,
) -> ServiceResult<()> {
    let out_of_bounds = rule.minimum.is_some_and(|min| amount < min)
        || rule.maximum.is_some_and(|max| amount > max);
    if !out_of_bounds {
        return Ok(());
    }
    let details = serde_json::json!({ "minimum": rule.minimum, "maximum": rule.maximum });
    Err(match blame {
        ChargeBlame::Client => {
            ServiceError::invalid_request("premium is out of the allowed range")
                .with_target(target)
                .with_details(details)
        }
        ChargeBlame::System => ServiceError::internal("premium is out of the allowed range")
            .with_details(details),
    })
}

/// The coverage window of an adjusted draft. Absence this late is a bug in
/// the adjustment pass, not a caller mistake.
pub(crate) fn draft_window(draft: &PolicyDraft) -> ServiceResult<CoverageWindow> {
    match (draft.effective_time, draft.expiry_time) {
        (Some(effective_time), Some(expiry_time)) => {
            Ok(CoverageWindow { effective_time, expiry_time })
        }
        _ => Err(ServiceError::internal("coverage period missing after adjustment").untrusted()),
    }
}
