//! Draft adjustment
//!
//! Between the two screening passes the draft is normalised: coverage period
//! defaults are filled and snapped to the configured granularity, fixed-mode
//! premiums are written, party field defaults are applied, and fields marked
//! `adoptIdCard` are overwritten from the national ID number. The whole pass
//! is idempotent so a replayed request adjusts to the same draft.

use biz_config::{AcceptConfig, CalculateMode, FieldRule, PartyFieldsRule};
use chrono::{DateTime, Utc};
use core_kernel::{parse_id_card, ServiceError, ServiceResult};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::draft::{ApplicantDraft, InsuredDraft, PolicyDraft};

pub fn adjust(draft: &mut PolicyDraft, cfg: &AcceptConfig, now: DateTime<Utc>) -> ServiceResult<()> {
    adjust_period(draft, cfg, now);
    adjust_premium(draft, cfg);
    adjust_applicants(draft, cfg)?;
    adjust_insureds(draft, cfg)?;
    Ok(())
}

fn adjust_period(draft: &mut PolicyDraft, cfg: &AcceptConfig, now: DateTime<Utc>) {
    let rule = &cfg.period.effective_time;
    let effective = draft.effective_time.unwrap_or_else(|| rule.default.apply(now));
    let effective = rule.correct_to.correct_to(effective);
    draft.effective_time = Some(effective);

    let rule = &cfg.period.expiry_time;
    let expiry = draft.expiry_time.unwrap_or_else(|| rule.default.apply(effective));
    draft.expiry_time = Some(rule.correct_to.correct_to(expiry));
}

fn adjust_premium(draft: &mut PolicyDraft, cfg: &AcceptConfig) {
    if cfg.premium.calculate_mode != CalculateMode::Fixed {
        return;
    }
    for insured in &mut draft.insureds {
        insured.premium = Some(cfg.premium.fixed);
    }
    draft.premium = Some(cfg.premium.fixed * Decimal::from(draft.insureds.len() as u64));
}

fn adjust_applicants(draft: &mut PolicyDraft, cfg: &AcceptConfig) -> ServiceResult<()> {
    for applicant in &mut draft.applicants {
        adjust_applicant_fields(applicant, &cfg.applicants.fields)?;
    }
    for value in &cfg.applicants.default {
        let default: ApplicantDraft = parse_default_party(value, "applicants")?;
        let exists = draft.applicants.iter().any(|a| {
            a.name == default.name && a.id_type == default.id_type && a.id_no == default.id_no
        });
        if !exists {
            draft.applicants.push(default);
        }
    }
    Ok(())
}

fn adjust_insureds(draft: &mut PolicyDraft, cfg: &AcceptConfig) -> ServiceResult<()> {
    for insured in &mut draft.insureds {
        if insured.relationship.is_none() {
            insured.relationship = default_text(&cfg.insureds.relationship);
        }
        adjust_insured_fields(insured, &cfg.insureds.fields)?;
    }
    for value in &cfg.insureds.default {
        let default: InsuredDraft = parse_default_party(value, "insureds")?;
        let exists = draft.insureds.iter().any(|i| {
            i.name == default.name && i.id_type == default.id_type && i.id_no == default.id_no
        });
        if !exists {
            draft.insureds.push(default);
        }
    }
    Ok(())
}

fn adjust_applicant_fields(a: &mut ApplicantDraft, rules: &PartyFieldsRule) -> ServiceResult<()> {
    fill_common_fields(
        rules,
        &mut a.name,
        &mut a.id_type,
        &mut a.id_no,
        &mut a.gender,
        &mut a.birth,
        &mut a.contact_no,
        &mut a.email,
    )
}

fn adjust_insured_fields(i: &mut InsuredDraft, rules: &PartyFieldsRule) -> ServiceResult<()> {
    fill_common_fields(
        rules,
        &mut i.name,
        &mut i.id_type,
        &mut i.id_no,
        &mut i.gender,
        &mut i.birth,
        &mut i.contact_no,
        &mut i.email,
    )
}

#[allow(clippy::too_many_arguments)]
fn fill_common_fields(
    rules: &PartyFieldsRule,
    name: &mut Option<String>,
    id_type: &mut Option<String>,
    id_no: &mut Option<String>,
    gender: &mut Option<String>,
    birth: &mut Option<DateTime<Utc>>,
    contact_no: &mut Option<String>,
    email: &mut Option<String>,
) -> ServiceResult<()> {
    fill_text(name, &rules.name);
    fill_text(id_type, &rules.id_type);
    fill_text(id_no, &rules.id_no);
    fill_text(gender, &rules.gender);
    fill_time(birth, &rules.birth)?;
    fill_text(contact_no, &rules.contact_no);
    fill_text(email, &rules.email);

    // ID-derived values overwrite whatever the client or a default supplied.
    if id_type.as_deref() == Some("idcard") {
        if let Some(id_no) = id_no.as_deref() {
            let parsed = parse_id_card(id_no);
            if rules.gender.adopt_id_card {
                *gender = Some(parsed.gender.as_str().to_string());
            }
            if rules.birth.adopt_id_card {
                if let Some(parsed_birth) = parsed.birth {
                    *birth = Some(parsed_birth);
                }
            }
        }
    }
    Ok(())
}

fn fill_text(value: &mut Option<String>, rule: &FieldRule) {
    if value.is_none() {
        *value = default_text(rule);
    }
}

fn default_text(rule: &FieldRule) -> Option<String> {
    rule.default
        .as_ref()
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn fill_time(value: &mut Option<DateTime<Utc>>, rule: &FieldRule) -> ServiceResult<()> {
    if value.is_some() {
        return Ok(());
    }
    if let Some(default) = &rule.default {
        let parsed: DateTime<Utc> = serde_json::from_value(default.clone()).map_err(|err| {
            ServiceError::internal("malformed time default in bizConfig")
                .with_inner(err.to_string())
                .untrusted()
        })?;
        *value = Some(parsed);
    }
    Ok(())
}

fn parse_default_party<T: serde::de::DeserializeOwned>(
    value: &Value,
    section: &str,
) -> ServiceResult<T> {
    serde_json::from_value(value.clone()).map_err(|err| {
        ServiceError::internal(format!("malformed default party in bizConfig {section}"))
            .with_inner(err.to_string())
            .untrusted()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use biz_config::BizConfig;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn empty_draft() -> PolicyDraft {
        PolicyDraft {
            order_no: "ORD_1".into(),
            contract_code: "C01".into(),
            contract_version: None,
            plan_code: "P01".into(),
            effective_time: None,
            expiry_time: None,
            premium: None,
            extensions: json!({}),
            applicants: Vec::new(),
            insureds: Vec::new(),
        }
    }

    #[test]
    fn fills_and_snaps_the_coverage_period() {
        let cfg = BizConfig::default().accept;
        let now = at(2026, 3, 10, 14, 30, 45);
        let mut draft = empty_draft();
        adjust(&mut draft, &cfg, now).unwrap();

        // Default effective is a day ahead, snapped to midnight; default
        // expiry is a day after that, kept to the second.
        assert_eq!(draft.effective_time, Some(at(2026, 3, 11, 0, 0, 0)));
        assert_eq!(draft.expiry_time, Some(at(2026, 3, 12, 0, 0, 0)));
    }

    #[test]
    fn snaps_a_client_supplied_effective_time() {
        let cfg = BizConfig::default().accept;
        let now = at(2026, 3, 10, 0, 0, 0);
        let mut draft = empty_draft();
        draft.effective_time = Some(at(2026, 3, 15, 13, 45, 27));
        adjust(&mut draft, &cfg, now).unwrap();
        assert_eq!(draft.effective_time, Some(at(2026, 3, 15, 0, 0, 0)));
    }

    #[test]
    fn fixed_mode_overwrites_premiums() {
        let mut cfg = BizConfig::default().accept;
        cfg.premium.calculate_mode = CalculateMode::Fixed;
        cfg.premium.fixed = dec!(12.5);

        let mut draft = empty_draft();
        draft.insureds = vec![
            InsuredDraft { premium: Some(dec!(1)), ..Default::default() },
            InsuredDraft::default(),
        ];
        adjust(&mut draft, &cfg, at(2026, 3, 10, 0, 0, 0)).unwrap();
        assert_eq!(draft.insureds[0].premium, Some(dec!(12.5)));
        assert_eq!(draft.insureds[1].premium, Some(dec!(12.5)));
        assert_eq!(draft.premium, Some(dec!(25)));
    }

    #[test]
    fn adopts_gender_and_birth_from_the_id_card() {
        let cfg = BizConfig::default().accept;
        let mut draft = empty_draft();
        draft.insureds = vec![InsuredDraft {
            id_type: Some("idcard".into()),
            id_no: Some("110101199006154213".into()),
            gender: Some("female".into()),
            birth: Some(at(2000, 1, 1, 0, 0, 0)),
            ..Default::default()
        }];
        adjust(&mut draft, &cfg, at(2026, 3, 10, 0, 0, 0)).unwrap();

        let insured = &draft.insureds[0];
        assert_eq!(insured.gender.as_deref(), Some("man"));
        assert_eq!(insured.birth, Some(at(1990, 6, 15, 0, 0, 0)));
    }

    #[test]
    fn other_id_types_keep_client_values() {
        let cfg = BizConfig::default().accept;
        let mut draft = empty_draft();
        draft.insureds = vec![InsuredDraft {
            id_type: Some("passport".into()),
            id_no: Some("E12345678".into()),
            gender: Some("female".into()),
            ..Default::default()
        }];
        adjust(&mut draft, &cfg, at(2026, 3, 10, 0, 0, 0)).unwrap();
        assert_eq!(draft.insureds[0].gender.as_deref(), Some("female"));
    }

    #[test]
    fn fills_field_defaults_and_relationship() {
        let mut cfg = BizConfig::default().accept;
        cfg.insureds.relationship.default = Some(json!("self"));
        cfg.insureds.fields.contact_no.default = Some(json!("000"));

        let mut draft = empty_draft();
        draft.insureds = vec![InsuredDraft::default()];
        adjust(&mut draft, &cfg, at(2026, 3, 10, 0, 0, 0)).unwrap();
        assert_eq!(draft.insureds[0].relationship.as_deref(), Some("self"));
        assert_eq!(draft.insureds[0].contact_no.as_deref(), Some("000"));
    }

    #[test]
    fn appends_configured_default_applicants_once() {
        let mut cfg = BizConfig::default().accept;
        cfg.applicants.default = vec![json!({
            "name": "Platform Co",
            "idType": "passport",
            "idNo": "B0001",
        })];

        let now = at(2026, 3, 10, 0, 0, 0);
        let mut draft = empty_draft();
        adjust(&mut draft, &cfg, now).unwrap();
        assert_eq!(draft.applicants.len(), 1);
        assert_eq!(draft.applicants[0].name.as_deref(), Some("Platform Co"));

        // Re-running the pass must not duplicate the appended party.
        adjust(&mut draft, &cfg, now).unwrap();
        assert_eq!(draft.applicants.len(), 1);
    }

    #[test]
    fn is_idempotent_for_a_fully_adjusted_draft() {
        let cfg = BizConfig::default().accept;
        let now = at(2026, 3, 10, 14, 30, 45);
        let mut draft = empty_draft();
        draft.insureds = vec![InsuredDraft {
            id_type: Some("idcard".into()),
            id_no: Some("110101199006154213".into()),
            ..Default::default()
        }];
        adjust(&mut draft, &cfg, now).unwrap();
        let first = draft.clone();
        adjust(&mut draft, &cfg, now).unwrap();
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            serde_json::to_value(&first).unwrap()
        );
    }
}
