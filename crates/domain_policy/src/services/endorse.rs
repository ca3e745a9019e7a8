//! Endorsement: controlled field changes on a bound policy
//!
//! The configuration snapshot decides which fields may change and how far
//! the coverage period may move from its original instants. Changes are
//! diffed against the stored rows; an endorsement that changes nothing is
//! refused. The changed policy is then repriced and the premium difference
//! recorded on the endorsement.

use biz_config::{CalculateMode, EndorseConfig, EndorsePartiesRule};
use chrono::{DateTime, Utc};
use core_kernel::{ServiceError, ServiceResult};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::draft::PolicyBundle;
use crate::endorsement::{
    next_endorse_no, EndorsementDetail, EndorsementRecord, EndorsementSave, EndorsementType,
    PolicySnapshot,
};
use crate::formula::{ChargeLine, CoverageWindow};
use crate::responses::EndorseResponse;
use crate::services::{check_premium_bounds, ChargeBlame, PolicyService};

/// One party row the endorsement touches, addressed by its party number.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartyChange {
    pub no: Option<String>,
    pub relationship: Option<String>,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndorseRequest {
    pub plan_code: Option<String>,
    pub effective_time: Option<DateTime<Utc>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub applicants: Vec<PartyChange>,
    pub insureds: Vec<PartyChange>,
}

impl PolicyService {
    pub async fn endorse(
        &self,
        producer_code: &str,
        policy_no: &str,
        request: EndorseRequest,
    ) -> ServiceResult<EndorseResponse> {
        let producer = self.identify_producer(producer_code).await?;
        let bundle = self.load_owned_policy(policy_no, &producer).await?;
        let cfg = bundle.policy.biz_config.endorse.clone();
        if !cfg.allow_endorse {
            return Err(ServiceError::invalid_request("endorsement is not allowed")
                .with_target("policyNo"));
        }

        let request = screen_request(request, &cfg, &bundle)?;
        let (mut details, updated) = self.diff_and_apply(&bundle, &request).await?;
        if details.is_empty() {
            return Err(ServiceError::invalid_request("no effective endorse items"));
        }

        let mut updated = updated;
        let difference = self.reprice(&cfg, &mut updated, &mut details)?;

        let now = Utc::now();
        let endorse_no = next_endorse_no(&bundle.policy.endorse_no)?;
        let snapshot = PolicySnapshot::capture(&bundle, &endorse_no);
        updated.policy.endorse_no = endorse_no.clone();

        let save = EndorsementSave {
            endorsement: EndorsementRecord {
                id: Uuid::new_v4(),
                policy_id: bundle.policy.id,
                endorse_no: endorse_no.clone(),
                kind: EndorsementType::Endorse,
                difference,
                details: details.clone(),
                created_at: now,
            },
            snapshot,
            updated,
        };
        self.policies.apply_endorsement(&save).await?;
        tracing::info!(
            policy_no = %bundle.policy.policy_no,
            endorse_no = %endorse_no,
            changes = details.len(),
            difference = %difference,
            "policy endorsed"
        );

        Ok(EndorseResponse {
            policy_no: bundle.policy.policy_no.clone(),
            endorse_no,
            difference,
            details,
        })
    }

    /// Builds the detail rows and the changed bundle in one walk.
    async fn diff_and_apply(
        &self,
        bundle: &PolicyBundle,
        request: &EndorseRequest,
    ) -> ServiceResult<(Vec<EndorsementDetail>, PolicyBundle)> {
        let mut details = Vec::new();
        let mut updated = bundle.clone();

        if let Some(plan_code) = &request.plan_code {
            if *plan_code != bundle.policy.plan_code {
                let plan = self
                    .catalog
                    .plan_by_code(plan_code, &bundle.policy.product_version)
                    .await?
                    .filter(|p| p.product_id == bundle.policy.product_id)
                    .ok_or_else(|| {
                        ServiceError::invalid_request("plan not found").with_target("planCode")
                    })?;
                details.push(EndorsementDetail::policy(
                    "planCode",
                    json!(bundle.policy.plan_code),
                    json!(plan.code),
                ));
                updated.policy.plan_id = plan.id;
                updated.policy.plan_code = plan.code;
            }
        }
        if let Some(effective) = request.effective_time {
            if effective != bundle.policy.effective_time {
                details.push(EndorsementDetail::policy(
                    "effectiveTime",
                    json!(bundle.policy.effective_time),
                    json!(effective),
                ));
                updated.policy.effective_time = effective;
            }
        }
        if let Some(expiry) = request.expiry_time {
            if expiry != bundle.policy.expiry_time {
                details.push(EndorsementDetail::policy(
                    "expiryTime",
                    json!(bundle.policy.expiry_time),
                    json!(expiry),
                ));
                updated.policy.expiry_time = expiry;
            }
        }

        for change in &request.applicants {
            let no = change.no.as_deref().unwrap_or_default();
            let record = updated
                .applicants
                .iter_mut()
                .find(|a| a.no == no)
                .ok_or_else(|| {
                    ServiceError::invalid_request("applicant does not exist on the policy")
                        .with_target("applicants")
                        .with_details(json!({ "no": no }))
                })?;
            diff_text(&mut details, Scope::Applicant, no, "name", &mut record.name, &change.name);
            diff_text(&mut details, Scope::Applicant, no, "idType", &mut record.id_type, &change.id_type);
            diff_text(&mut details, Scope::Applicant, no, "idNo", &mut record.id_no, &change.id_no);
            diff_text(&mut details, Scope::Applicant, no, "gender", &mut record.gender, &change.gender);
            diff_time(&mut details, Scope::Applicant, no, "birth", &mut record.birth, change.birth);
            diff_text(&mut details, Scope::Applicant, no, "contactNo", &mut record.contact_no, &change.contact_no);
            diff_text(&mut details, Scope::Applicant, no, "email", &mut record.email, &change.email);
        }
        for change in &request.insureds {
            let no = change.no.as_deref().unwrap_or_default();
            let record = updated
                .insureds
                .iter_mut()
                .find(|i| i.no == no)
                .ok_or_else(|| {
                    ServiceError::invalid_request("insured does not exist on the policy")
                        .with_target("insureds")
                        .with_details(json!({ "no": no }))
                })?;
            diff_text(&mut details, Scope::Insured, no, "relationship", &mut record.relationship, &change.relationship);
            diff_text(&mut details, Scope::Insured, no, "name", &mut record.name, &change.name);
            diff_text(&mut details, Scope::Insured, no, "idType", &mut record.id_type, &change.id_type);
            diff_text(&mut details, Scope::Insured, no, "idNo", &mut record.id_no, &change.id_no);
            diff_text(&mut details, Scope::Insured, no, "gender", &mut record.gender, &change.gender);
            diff_time(&mut details, Scope::Insured, no, "birth", &mut record.birth, change.birth);
            diff_text(&mut details, Scope::Insured, no, "contactNo", &mut record.contact_no, &change.contact_no);
            diff_text(&mut details, Scope::Insured, no, "email", &mut record.email, &change.email);
        }

        Ok((details, updated))
    }

    /// Reprices the changed policy and appends premium details when the
    /// aggregate moved. Returns the premium difference.
    fn reprice(
        &self,
        cfg: &EndorseConfig,
        updated: &mut PolicyBundle,
        details: &mut Vec<EndorsementDetail>,
    ) -> ServiceResult<Decimal> {
        if cfg.premium.calculate_mode != CalculateMode::Formula {
            return Err(ServiceError::internal(
                "endorsement supports only formula repricing",
            )
            .untrusted());
        }
        let formula = self.formulas.get(&cfg.premium.formula.name)?;
        let window = CoverageWindow {
            effective_time: updated.policy.effective_time,
            expiry_time: updated.policy.expiry_time,
        };
        let mut lines: Vec<ChargeLine> = updated
            .insureds
            .iter()
            .map(|i| ChargeLine { birth: i.birth, premium: Decimal::ZERO })
            .collect();
        let total = formula.charge(&cfg.premium.formula.params, window, &mut lines)?;
        let sum: Decimal = lines.iter().map(|l| l.premium).sum();
        if sum != total {
            return Err(ServiceError::internal(
                "repriced premiums do not sum to the aggregate",
            )
            .untrusted());
        }

        let difference = total - updated.policy.premium;
        check_premium_bounds(difference, &cfg.premium, ChargeBlame::Client, "premium")?;

        if difference != Decimal::ZERO {
            details.push(EndorsementDetail::policy(
                "premium",
                json!(updated.policy.premium),
                json!(total),
            ));
            for (insured, line) in updated.insureds.iter_mut().zip(&lines) {
                if insured.premium != line.premium {
                    details.push(EndorsementDetail::insured(
                        &insured.no,
                        "premium",
                        json!(insured.premium),
                        json!(line.premium),
                    ));
                    insured.premium = line.premium;
                }
            }
            updated.policy.premium = total;
        }
        Ok(difference)
    }
}

enum Scope {
    Applicant,
    Insured,
}

fn push_detail(
    details: &mut Vec<EndorsementDetail>,
    scope: &Scope,
    no: &str,
    field: &str,
    original: serde_json::Value,
    current: serde_json::Value,
) {
    details.push(match scope {
        Scope::Applicant => EndorsementDetail::applicant(no, field, original, current),
        Scope::Insured => EndorsementDetail::insured(no, field, original, current),
    });
}

fn diff_text(
    details: &mut Vec<EndorsementDetail>,
    scope: Scope,
    no: &str,
    field: &str,
    record: &mut Option<String>,
    change: &Option<String>,
) {
    if let Some(new_value) = change {
        if record.as_deref() != Some(new_value.as_str()) {
            push_detail(details, &scope, no, field, json!(record), json!(new_value));
            *record = Some(new_value.clone());
        }
    }
}

fn diff_time(
    details: &mut Vec<EndorsementDetail>,
    scope: Scope,
    no: &str,
    field: &str,
    record: &mut Option<DateTime<Utc>>,
    change: Option<DateTime<Utc>>,
) {
    if let Some(new_value) = change {
        if *record != Some(new_value) {
            push_detail(details, &scope, no, field, json!(record), json!(new_value));
            *record = Some(new_value);
        }
    }
}

/// Strips fields the configuration forbids endorsing, checks the party-count
/// ceiling, requires party numbers and rejects duplicates, and holds the
/// coverage instants inside their configured distance from the originals.
fn screen_request(
    mut request: EndorseRequest,
    cfg: &EndorseConfig,
    bundle: &PolicyBundle,
) -> ServiceResult<EndorseRequest> {
    if !cfg.policy.allow_endorse || !cfg.policy.plan.allow_endorse {
        request.plan_code = None;
    }
    if !cfg.policy.allow_endorse || !cfg.policy.effective_time.allow_endorse {
        request.effective_time = None;
    }
    if !cfg.policy.allow_endorse || !cfg.policy.expiry_time.allow_endorse {
        request.expiry_time = None;
    }

    if let Some(effective) = request.effective_time {
        let rule = &cfg.policy.effective_time;
        let min = rule.minimum.apply(bundle.policy.effective_time);
        let max = rule.maximum.apply(bundle.policy.effective_time);
        if effective < min || effective > max {
            return Err(ServiceError::invalid_request(
                "effectiveTime is out of the allowed endorse range",
            )
            .with_target("effectiveTime")
            .with_details(json!({ "minimum": min, "maximum": max })));
        }
    }
    if let Some(expiry) = request.expiry_time {
        let rule = &cfg.policy.expiry_time;
        let min = rule.minimum.apply(bundle.policy.expiry_time);
        let max = rule.maximum.apply(bundle.policy.expiry_time);
        if expiry < min || expiry > max {
            return Err(ServiceError::invalid_request(
                "expiryTime is out of the allowed endorse range",
            )
            .with_target("expiryTime")
            .with_details(json!({ "minimum": min, "maximum": max })));
        }
        let effective = request
            .effective_time
            .unwrap_or(bundle.policy.effective_time);
        if expiry <= effective {
            return Err(ServiceError::invalid_request(
                "expiryTime must be after effectiveTime",
            )
            .with_target("expiryTime"));
        }
    }

    screen_parties(&mut request.applicants, &cfg.applicants, "applicants", false)?;
    screen_parties(&mut request.insureds, &cfg.insureds, "insureds", true)?;
    Ok(request)
}

fn screen_parties(
    changes: &mut Vec<PartyChange>,
    rule: &EndorsePartiesRule,
    path: &str,
    relationship_applies: bool,
) -> ServiceResult<()> {
    if !rule.allow_endorse {
        changes.clear();
        return Ok(());
    }
    if changes.len() > rule.maximum as usize {
        return Err(ServiceError::invalid_request(format!(
            "{path} may change at most {} records",
            rule.maximum
        ))
        .with_target(path));
    }
    let mut seen = std::collections::HashSet::new();
    for (i, change) in changes.iter_mut().enumerate() {
        let no = change
            .no
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ServiceError::invalid_request(format!("{path}[{i}].no is required"))
                    .with_target(format!("{path}[{i}].no"))
            })?;
        if !seen.insert(no) {
            return Err(ServiceError::invalid_request(format!(
                "{path} addresses the same record twice"
            ))
            .with_target(path));
        }

        if !relationship_applies || !rule.relationship.allow_endorse {
            change.relationship = None;
        }
        if !rule.name.allow_endorse {
            change.name = None;
        }
        if !rule.id_type.allow_endorse {
            change.id_type = None;
        }
        if !rule.id_no.allow_endorse {
            change.id_no = None;
        }
        if !rule.gender.allow_endorse {
            change.gender = None;
        }
        if !rule.birth.allow_endorse {
            change.birth = None;
        }
        if !rule.contact_no.allow_endorse {
            change.contact_no = None;
        }
        if !rule.email.allow_endorse {
            change.email = None;
        }
    }
    Ok(())
}
