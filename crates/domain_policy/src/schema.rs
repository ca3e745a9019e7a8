//! Configuration-driven request validation
//!
//! Acceptance input is screened twice: once against the raw submission
//! (required fields, option lists, effective-time bounds) and once after the
//! adjustment pass has filled defaults (expiry bounds, insured-age windows).
//! Fields the configuration does not let clients set are stripped silently
//! rather than rejected.

use biz_config::{AcceptConfig, CalculateMode, FieldRule, TimePointRule};
use chrono::{DateTime, Utc};
use core_kernel::temporal::RelativeDuration;
use core_kernel::{ServiceError, ServiceResult};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::draft::{AcceptRequest, ApplicantDraft, InsuredDraft, PolicyDraft};

const MAX_NO_LENGTH: usize = 64;

fn invalid(message: impl Into<String>, target: impl Into<String>) -> ServiceError {
    ServiceError::invalid_request(message).with_target(target)
}

fn is_order_no_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_policy_no_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Screens the fields every acceptance needs before any catalog lookup.
pub fn validate_basal(req: AcceptRequest) -> ServiceResult<PolicyDraft> {
    let order_no = req
        .order_no
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("orderNo is required", "orderNo"))?;
    if order_no.len() > MAX_NO_LENGTH {
        return Err(invalid("orderNo is longer than 64 characters", "orderNo"));
    }
    if !order_no.chars().all(is_order_no_char) {
        return Err(invalid(
            "orderNo may only contain letters, digits and underscores",
            "orderNo",
        ));
    }
    build_draft(req, order_no)
}

/// Quotation variant: no order number takes part, nothing is persisted.
pub fn validate_quote(req: AcceptRequest) -> ServiceResult<PolicyDraft> {
    build_draft(req, String::new())
}

fn build_draft(req: AcceptRequest, order_no: String) -> ServiceResult<PolicyDraft> {
    let contract_code = req
        .contract_code
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("contractCode is required", "contractCode"))?;
    let plan_code = req
        .plan_code
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("planCode is required", "planCode"))?;

    let extensions = match req.extensions {
        None => Value::Object(Map::new()),
        Some(v @ Value::Object(_)) => v,
        Some(_) => return Err(invalid("extensions must be an object", "extensions")),
    };

    Ok(PolicyDraft {
        order_no,
        contract_code,
        contract_version: req.contract_version,
        plan_code,
        effective_time: req.effective_time,
        expiry_time: req.expiry_time,
        premium: req.premium,
        extensions,
        applicants: req.applicants,
        insureds: req.insureds,
    })
}

/// Screens a policy number taken from the request path.
pub fn validate_policy_no(policy_no: &str) -> ServiceResult<()> {
    if policy_no.is_empty() {
        return Err(invalid("policyNo is required", "policyNo"));
    }
    if policy_no.len() > MAX_NO_LENGTH {
        return Err(invalid("policyNo is longer than 64 characters", "policyNo"));
    }
    if !policy_no.chars().all(is_policy_no_char) {
        return Err(invalid(
            "policyNo may only contain letters, digits and hyphens",
            "policyNo",
        ));
    }
    Ok(())
}

/// First screening pass, over the raw submission.
pub fn validate_draft(
    draft: &mut PolicyDraft,
    cfg: &AcceptConfig,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    screen_effective_time(draft, cfg, now)?;
    screen_expiry_presence(draft, cfg)?;
    screen_premium(draft, cfg)?;
    screen_extensions(&mut draft.extensions, &cfg.extensions)?;

    check_count(
        draft.applicants.len(),
        cfg.applicants.minimum,
        cfg.applicants.maximum,
        "applicants",
    )?;
    check_count(
        draft.insureds.len(),
        cfg.insureds.minimum,
        cfg.insureds.maximum,
        "insureds",
    )?;

    for (i, applicant) in draft.applicants.iter_mut().enumerate() {
        screen_applicant(applicant, cfg, i)?;
    }
    for (i, insured) in draft.insureds.iter_mut().enumerate() {
        screen_insured(insured, cfg, i)?;
    }
    Ok(())
}

/// Second screening pass, after adjustment. Checks only the figures the
/// adjustment pass could have produced or moved.
pub fn validate_adjusted(draft: &PolicyDraft, cfg: &AcceptConfig) -> ServiceResult<()> {
    let effective = match draft.effective_time {
        Some(t) => t,
        None => return Ok(()),
    };

    if let Some(expiry) = draft.expiry_time {
        let rule = &cfg.period.expiry_time;
        let min = corrected_expiry_bound(rule, &rule.minimum, effective);
        let max = corrected_expiry_bound(rule, &rule.maximum, effective);
        if expiry < min || expiry > max {
            return Err(invalid("expiryTime is out of the allowed range", "expiryTime")
                .with_details(serde_json::json!({ "minimum": min, "maximum": max })));
        }
    }

    for (i, applicant) in draft.applicants.iter().enumerate() {
        check_birth_window(
            applicant.birth,
            &cfg.applicants.fields.birth,
            effective,
            &format!("applicants[{i}].birth"),
        )?;
    }
    for (i, insured) in draft.insureds.iter().enumerate() {
        check_birth_window(
            insured.birth,
            &cfg.insureds.fields.birth,
            effective,
            &format!("insureds[{i}].birth"),
        )?;
    }
    Ok(())
}

/// Expiry bounds are anchored one second short of the offset so a "1 year
/// after" bound means the last instant of the final day, then snapped to the
/// configured granularity.
fn corrected_expiry_bound(
    rule: &TimePointRule,
    offset: &RelativeDuration,
    effective: DateTime<Utc>,
) -> DateTime<Utc> {
    rule.correct_to
        .correct_to(offset.apply(effective) - chrono::Duration::seconds(1))
}

fn screen_effective_time(
    draft: &mut PolicyDraft,
    cfg: &AcceptConfig,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let rule = &cfg.period.effective_time;
    if !rule.allow_client_to_set {
        draft.effective_time = None;
        return Ok(());
    }
    match draft.effective_time {
        None if cfg.period.required => Err(invalid("effectiveTime is required", "effectiveTime")),
        None => Ok(()),
        Some(t) => {
            let min = rule.correct_to.correct_to(rule.minimum.apply(now));
            let max = rule.correct_to.correct_to(rule.maximum.apply(now));
            if t < min || t > max {
                return Err(invalid(
                    "effectiveTime is out of the allowed range",
                    "effectiveTime",
                )
                .with_details(serde_json::json!({ "minimum": min, "maximum": max })));
            }
            Ok(())
        }
    }
}

fn screen_expiry_presence(draft: &mut PolicyDraft, cfg: &AcceptConfig) -> ServiceResult<()> {
    let rule = &cfg.period.expiry_time;
    if !rule.allow_client_to_set {
        draft.expiry_time = None;
        return Ok(());
    }
    match draft.expiry_time {
        None if cfg.period.required => Err(invalid("expiryTime is required", "expiryTime")),
        None => Ok(()),
        Some(expiry) => {
            if let Some(effective) = draft.effective_time {
                if expiry <= effective {
                    return Err(invalid(
                        "expiryTime must be after effectiveTime",
                        "expiryTime",
                    ));
                }
            }
            Ok(())
        }
    }
}

fn screen_premium(draft: &mut PolicyDraft, cfg: &AcceptConfig) -> ServiceResult<()> {
    let adopt_client = cfg.premium.calculate_mode == CalculateMode::AdoptClient;

    if adopt_client && draft.premium.is_none() {
        return Err(invalid("premium is required", "premium"));
    }
    if let Some(p) = draft.premium {
        draft.premium = Some(positive_amount(p, "premium")?);
    }
    for (i, insured) in draft.insureds.iter_mut().enumerate() {
        let path = format!("insureds[{i}].premium");
        if adopt_client && insured.premium.is_none() {
            return Err(invalid(format!("{path} is required"), path));
        }
        if let Some(p) = insured.premium {
            insured.premium = Some(positive_amount(p, &path)?);
        }
    }
    Ok(())
}

fn positive_amount(amount: Decimal, path: &str) -> ServiceResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(invalid(format!("{path} must be positive"), path));
    }
    // Amounts are currency: anything past two decimal places is rounded away.
    Ok(amount.round_dp(2))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExtensionRule {
    required: bool,
    allow_client_to_set: bool,
    data_type: Option<String>,
}

impl Default for ExtensionRule {
    fn default() -> Self {
        Self { required: false, allow_client_to_set: true, data_type: None }
    }
}

fn screen_extensions(extensions: &mut Value, rules: &Value) -> ServiceResult<()> {
    let rules = match rules.as_object() {
        Some(map) => map,
        None => {
            *extensions = Value::Object(Map::new());
            return Ok(());
        }
    };
    let supplied = match extensions.as_object_mut() {
        Some(map) => map,
        None => return Ok(()),
    };

    // Keys the configuration does not know about are dropped, not rejected.
    supplied.retain(|key, _| rules.contains_key(key));

    for (key, rule_value) in rules {
        let rule: ExtensionRule = serde_json::from_value(rule_value.clone()).map_err(|err| {
            ServiceError::internal("malformed extension rule in bizConfig")
                .with_target(format!("extensions.{key}"))
                .with_inner(err.to_string())
                .untrusted()
        })?;
        let path = format!("extensions.{key}");

        if !rule.allow_client_to_set {
            supplied.remove(key);
        }
        match supplied.get(key) {
            None if rule.required => {
                return Err(invalid(format!("{path} is required"), path));
            }
            Some(value) => {
                let ok = match rule.data_type.as_deref() {
                    Some("string") | None => value.is_string(),
                    Some("number") => value.is_number(),
                    Some("boolean") => value.is_boolean(),
                    Some(_) => true,
                };
                if !ok {
                    return Err(invalid(format!("{path} has the wrong type"), path));
                }
            }
            None => {}
        }
    }
    Ok(())
}

fn check_count(len: usize, minimum: u32, maximum: u32, path: &str) -> ServiceResult<()> {
    if len < minimum as usize || len > maximum as usize {
        return Err(
            invalid(format!("{path} must contain {minimum} to {maximum} entries"), path)
                .with_details(serde_json::json!({ "minimum": minimum, "maximum": maximum })),
        );
    }
    Ok(())
}

fn screen_applicant(applicant: &mut ApplicantDraft, cfg: &AcceptConfig, i: usize) -> ServiceResult<()> {
    let fields = &cfg.applicants.fields;
    let prefix = format!("applicants[{i}]");
    screen_text(&mut applicant.name, &fields.name, &prefix, "name")?;
    screen_text(&mut applicant.id_type, &fields.id_type, &prefix, "idType")?;
    screen_text(&mut applicant.id_no, &fields.id_no, &prefix, "idNo")?;
    screen_text(&mut applicant.gender, &fields.gender, &prefix, "gender")?;
    screen_time(&mut applicant.birth, &fields.birth, &prefix, "birth")?;
    screen_text(&mut applicant.contact_no, &fields.contact_no, &prefix, "contactNo")?;
    screen_email(&mut applicant.email, &fields.email, &prefix)?;
    Ok(())
}

fn screen_insured(insured: &mut InsuredDraft, cfg: &AcceptConfig, i: usize) -> ServiceResult<()> {
    let rule = &cfg.insureds;
    let prefix = format!("insureds[{i}]");
    screen_text(&mut insured.relationship, &rule.relationship, &prefix, "relationship")?;
    screen_text(&mut insured.name, &rule.fields.name, &prefix, "name")?;
    screen_text(&mut insured.id_type, &rule.fields.id_type, &prefix, "idType")?;
    screen_text(&mut insured.id_no, &rule.fields.id_no, &prefix, "idNo")?;
    screen_text(&mut insured.gender, &rule.fields.gender, &prefix, "gender")?;
    screen_time(&mut insured.birth, &rule.fields.birth, &prefix, "birth")?;
    screen_text(&mut insured.contact_no, &rule.fields.contact_no, &prefix, "contactNo")?;
    screen_email(&mut insured.email, &rule.fields.email, &prefix)?;
    Ok(())
}

fn screen_text(
    value: &mut Option<String>,
    rule: &FieldRule,
    prefix: &str,
    field: &str,
) -> ServiceResult<()> {
    if !rule.allow_client_to_set {
        *value = None;
        return Ok(());
    }
    let path = format!("{prefix}.{field}");
    match value {
        None if rule.required && rule.default.is_none() && !rule.adopt_id_card => {
            Err(invalid(format!("{path} is required"), path))
        }
        Some(v) => {
            if let Some(options) = &rule.options {
                if !options.iter().any(|o| o == v) {
                    return Err(invalid(
                        format!("{path} must be one of: {}", options.join(", ")),
                        path,
                    ));
                }
            }
            Ok(())
        }
        None => Ok(()),
    }
}

fn screen_time(
    value: &mut Option<DateTime<Utc>>,
    rule: &FieldRule,
    prefix: &str,
    field: &str,
) -> ServiceResult<()> {
    if !rule.allow_client_to_set {
        *value = None;
        return Ok(());
    }
    if value.is_none() && rule.required && rule.default.is_none() && !rule.adopt_id_card {
        let path = format!("{prefix}.{field}");
        return Err(invalid(format!("{path} is required"), path));
    }
    Ok(())
}

fn screen_email(value: &mut Option<String>, rule: &FieldRule, prefix: &str) -> ServiceResult<()> {
    screen_text(value, rule, prefix, "email")?;
    if let Some(email) = value.as_deref() {
        if !looks_like_email(email) {
            let path = format!("{prefix}.email");
            return Err(invalid(format!("{path} is not a valid email address"), path));
        }
    }
    Ok(())
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn check_birth_window(
    birth: Option<DateTime<Utc>>,
    rule: &FieldRule,
    effective: DateTime<Utc>,
    path: &str,
) -> ServiceResult<()> {
    let birth = match birth {
        Some(b) => b,
        None => return Ok(()),
    };
    let earliest = rule
        .allow_max_age
        .map(|age| RelativeDuration::before(age.value, age.unit).apply(effective));
    let latest = rule
        .allow_min_age
        .map(|age| RelativeDuration::before(age.value, age.unit).apply(effective));

    if earliest.is_some_and(|e| birth < e) || latest.is_some_and(|l| birth > l) {
        return Err(invalid("age is out of the allowed range", path).with_details(
            serde_json::json!({ "earliestBirth": earliest, "latestBirth": latest }),
        ));
    }
    Ok(())
}
