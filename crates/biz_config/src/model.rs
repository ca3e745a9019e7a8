//! Typed business-rule configuration tree
//!
//! The shapes mirror the JSON stored on catalog rows. `Default` impls encode
//! the built-in bottom layer; every field also carries a serde default so
//! partially-specified override layers deserialize cleanly after merging.

use core_kernel::temporal::{RelativeDuration, TimeUnit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How a premium (or refund, or payout) is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalculateMode {
    /// A configured constant per insured
    Fixed,
    /// Trust the client-supplied figures as-is
    AdoptClient,
    /// Run the named formula
    Formula,
    /// Carry the previous term's figures forward (renewal only)
    Continue,
}

/// Named formula plus its opaque parameter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaSpec {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl Default for FormulaSpec {
    fn default() -> Self {
        Self { name: "default".into(), params: json!({}) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PremiumRule {
    pub calculate_mode: CalculateMode,
    pub fixed: Decimal,
    pub formula: FormulaSpec,
    pub minimum: Option<Decimal>,
    pub maximum: Option<Decimal>,
}

impl Default for PremiumRule {
    fn default() -> Self {
        Self {
            calculate_mode: CalculateMode::Formula,
            fixed: Decimal::ZERO,
            formula: FormulaSpec::default(),
            minimum: None,
            maximum: None,
        }
    }
}

/// Age bound expressed in whole units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeLimit {
    pub unit: TimeUnit,
    pub value: u32,
}

/// Rules for a single settable field of a party record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldRule {
    pub required: bool,
    pub default: Option<Value>,
    pub allow_client_to_set: bool,
    pub options: Option<Vec<String>>,
    /// Overwrite with the value derived from an `idcard` ID number
    pub adopt_id_card: bool,
    pub allow_min_age: Option<AgeLimit>,
    pub allow_max_age: Option<AgeLimit>,
}

impl Default for FieldRule {
    fn default() -> Self {
        Self {
            required: false,
            default: None,
            allow_client_to_set: true,
            options: None,
            adopt_id_card: false,
            allow_min_age: None,
            allow_max_age: None,
        }
    }
}

impl FieldRule {
    fn required() -> Self {
        Self { required: true, ..Self::default() }
    }

    fn with_options(options: &[&str]) -> Self {
        Self {
            required: true,
            options: Some(options.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }
}

/// Rules for one boundary instant of the coverage period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimePointRule {
    pub correct_to: TimeUnit,
    pub default: RelativeDuration,
    pub minimum: RelativeDuration,
    pub maximum: RelativeDuration,
    pub allow_client_to_set: bool,
}

impl Default for TimePointRule {
    fn default() -> Self {
        Self {
            correct_to: TimeUnit::Second,
            default: RelativeDuration::after(1, TimeUnit::Day),
            minimum: RelativeDuration::after(1, TimeUnit::Day),
            maximum: RelativeDuration::after(1, TimeUnit::Year),
            allow_client_to_set: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodRule {
    pub required: bool,
    /// Bounds relative to the instant of binding
    pub effective_time: TimePointRule,
    /// Bounds relative to the effective time
    pub expiry_time: TimePointRule,
}

impl Default for PeriodRule {
    fn default() -> Self {
        Self {
            required: true,
            effective_time: TimePointRule {
                correct_to: TimeUnit::Day,
                default: RelativeDuration::after(1, TimeUnit::Day),
                minimum: RelativeDuration::after(1, TimeUnit::Day),
                maximum: RelativeDuration::after(30, TimeUnit::Day),
                allow_client_to_set: true,
            },
            expiry_time: TimePointRule::default(),
        }
    }
}

/// The field rules shared by applicant and insured records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartyFieldsRule {
    pub name: FieldRule,
    pub id_type: FieldRule,
    pub id_no: FieldRule,
    pub gender: FieldRule,
    pub birth: FieldRule,
    pub contact_no: FieldRule,
    pub email: FieldRule,
}

impl Default for PartyFieldsRule {
    fn default() -> Self {
        Self {
            name: FieldRule::required(),
            id_type: FieldRule::with_options(&["idcard", "passport"]),
            id_no: FieldRule::required(),
            gender: FieldRule {
                adopt_id_card: true,
                ..FieldRule::with_options(&["man", "female", "other", "unknown"])
            },
            birth: FieldRule {
                adopt_id_card: true,
                allow_min_age: Some(AgeLimit { unit: TimeUnit::Year, value: 18 }),
                allow_max_age: Some(AgeLimit { unit: TimeUnit::Year, value: 60 }),
                ..FieldRule::required()
            },
            contact_no: FieldRule::required(),
            email: FieldRule::required(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicantsRule {
    #[serde(flatten)]
    pub fields: PartyFieldsRule,
    /// Parties appended to every submission
    pub default: Vec<Value>,
    pub minimum: u32,
    pub maximum: u32,
}

impl Default for ApplicantsRule {
    fn default() -> Self {
        Self { fields: PartyFieldsRule::default(), default: Vec::new(), minimum: 1, maximum: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsuredsRule {
    /// Identity key for duplicate-coverage detection
    pub primary_fields: Vec<String>,
    pub relationship: FieldRule,
    #[serde(flatten)]
    pub fields: PartyFieldsRule,
    pub default: Vec<Value>,
    pub minimum: u32,
    pub maximum: u32,
}

impl Default for InsuredsRule {
    fn default() -> Self {
        Self {
            primary_fields: vec!["name".into(), "idType".into(), "idNo".into()],
            relationship: FieldRule::with_options(&["self", "parents", "brothers", "sisters"]),
            fields: PartyFieldsRule::default(),
            default: Vec::new(),
            minimum: 1,
            maximum: 99,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcceptConfig {
    pub period: PeriodRule,
    pub premium: PremiumRule,
    /// Free-form per-deployment extension field rules, keyed by field name
    pub extensions: Value,
    pub applicants: ApplicantsRule,
    pub insureds: InsuredsRule,
}

impl Default for AcceptConfig {
    fn default() -> Self {
        Self {
            period: PeriodRule::default(),
            premium: PremiumRule {
                calculate_mode: CalculateMode::Formula,
                fixed: Decimal::ZERO,
                formula: FormulaSpec {
                    name: "default".into(),
                    params: json!({
                        "cardinal": 0,
                        "days": { "ranges": [
                            { "start": 0, "end": 10, "operator": "add", "value": 10 },
                            { "start": 11, "end": 365, "operator": "add", "value": 20 },
                        ]},
                        "insuredAge": { "ranges": [
                            { "start": 0, "end": 18, "operator": "add", "value": 5 },
                            { "start": 19, "end": 200, "operator": "add", "value": 15 },
                        ]},
                    }),
                },
                minimum: Some(Decimal::new(1, 1)),
                maximum: Some(Decimal::new(9999, 0)),
            },
            extensions: json!({
                "trackingNo": { "required": false, "allowClientToSet": true },
            }),
            applicants: ApplicantsRule::default(),
            insureds: InsuredsRule::default(),
        }
    }
}

/// How the renewal coverage period is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenewPeriodMode {
    /// Same coverage length, starting where the old term ended
    Continue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenewPeriodRule {
    pub mode: RenewPeriodMode,
}

impl Default for RenewPeriodRule {
    fn default() -> Self {
        Self { mode: RenewPeriodMode::Continue }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenewConfig {
    pub allow_renew: bool,
    pub period: RenewPeriodRule,
    pub premium: PremiumRule,
}

impl Default for RenewConfig {
    fn default() -> Self {
        Self {
            allow_renew: false,
            period: RenewPeriodRule::default(),
            premium: PremiumRule {
                calculate_mode: CalculateMode::Formula,
                fixed: Decimal::ZERO,
                formula: FormulaSpec {
                    name: "default".into(),
                    params: json!({
                        "cardinal": 0,
                        "days": { "ranges": [
                            { "start": 0, "end": 10, "operator": "add", "value": 10 },
                        ]},
                        "insuredAge": { "ranges": [
                            { "start": 0, "end": 18, "operator": "add", "value": 5 },
                        ]},
                    }),
                },
                minimum: Some(Decimal::ZERO),
                maximum: Some(Decimal::new(9999, 0)),
            },
        }
    }
}

/// Per-field endorse permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllowRule {
    pub allow_endorse: bool,
}

impl Default for AllowRule {
    fn default() -> Self {
        Self { allow_endorse: true }
    }
}

/// Endorse permission plus bounds relative to the field's original value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndorseTimeRule {
    pub allow_endorse: bool,
    pub minimum: RelativeDuration,
    pub maximum: RelativeDuration,
}

impl Default for EndorseTimeRule {
    fn default() -> Self {
        Self {
            allow_endorse: true,
            minimum: RelativeDuration::after(1, TimeUnit::Second),
            maximum: RelativeDuration::after(30, TimeUnit::Day),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndorsePolicyRule {
    pub allow_endorse: bool,
    pub plan: AllowRule,
    pub effective_time: EndorseTimeRule,
    pub expiry_time: EndorseTimeRule,
}

impl Default for EndorsePolicyRule {
    fn default() -> Self {
        Self {
            allow_endorse: true,
            plan: AllowRule::default(),
            effective_time: EndorseTimeRule::default(),
            expiry_time: EndorseTimeRule {
                allow_endorse: true,
                minimum: RelativeDuration::before(30, TimeUnit::Day),
                maximum: RelativeDuration::after(30, TimeUnit::Day),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndorsePartiesRule {
    pub allow_endorse: bool,
    /// Most party records one endorsement may touch
    pub maximum: u32,
    pub relationship: AllowRule,
    pub name: AllowRule,
    pub id_type: AllowRule,
    pub id_no: AllowRule,
    pub gender: AllowRule,
    pub birth: AllowRule,
    pub contact_no: AllowRule,
    pub email: AllowRule,
}

impl Default for EndorsePartiesRule {
    fn default() -> Self {
        Self {
            allow_endorse: true,
            maximum: 10,
            relationship: AllowRule::default(),
            name: AllowRule::default(),
            id_type: AllowRule::default(),
            id_no: AllowRule::default(),
            gender: AllowRule::default(),
            birth: AllowRule::default(),
            contact_no: AllowRule::default(),
            email: AllowRule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndorseConfig {
    pub allow_endorse: bool,
    pub policy: EndorsePolicyRule,
    pub applicants: EndorsePartiesRule,
    pub insureds: EndorsePartiesRule,
    pub premium: PremiumRule,
}

impl Default for EndorseConfig {
    fn default() -> Self {
        Self {
            allow_endorse: true,
            policy: EndorsePolicyRule::default(),
            applicants: EndorsePartiesRule::default(),
            insureds: EndorsePartiesRule::default(),
            premium: PremiumRule {
                calculate_mode: CalculateMode::Formula,
                fixed: Decimal::ZERO,
                formula: FormulaSpec {
                    name: "default".into(),
                    params: json!({
                        "days": { "ranges": [
                            { "start": 0, "end": 10, "operator": "add", "value": 10 },
                            { "start": 11, "end": 365, "operator": "add", "value": 20 },
                        ]},
                        "insuredAge": { "ranges": [
                            { "start": 0, "end": 18, "operator": "add", "value": 5 },
                            { "start": 19, "end": 200, "operator": "add", "value": 15 },
                        ]},
                    }),
                },
                minimum: Some(Decimal::new(-1000, 0)),
                maximum: Some(Decimal::new(1000, 0)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelPeriodRule {
    /// Permit cancelling a policy that is already in force
    pub allow_effective: bool,
    /// Permit cancelling a policy past its expiry
    pub allow_expired: bool,
}

impl Default for CancelPeriodRule {
    fn default() -> Self {
        Self { allow_effective: false, allow_expired: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancelConfig {
    pub allow_cancel: bool,
    pub period: CancelPeriodRule,
    pub premium: PremiumRule,
}

impl Default for CancelConfig {
    fn default() -> Self {
        Self {
            allow_cancel: true,
            period: CancelPeriodRule::default(),
            premium: PremiumRule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimInsuredsRule {
    pub no: FieldRule,
    pub relationship: FieldRule,
    pub name: FieldRule,
    pub id_type: FieldRule,
    pub id_no: FieldRule,
    pub gender: FieldRule,
    pub birth: FieldRule,
}

impl Default for ClaimInsuredsRule {
    fn default() -> Self {
        Self {
            no: FieldRule::required(),
            relationship: FieldRule::required(),
            name: FieldRule::required(),
            id_type: FieldRule::required(),
            id_no: FieldRule::required(),
            gender: FieldRule::required(),
            birth: FieldRule::required(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoCompensateRule {
    pub enable: bool,
    /// Largest sum insured eligible for automatic payout
    pub maximum: Decimal,
    pub compensator: String,
}

impl Default for AutoCompensateRule {
    fn default() -> Self {
        Self { enable: false, maximum: Decimal::new(100, 0), compensator: "default".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimConfig {
    /// Sum-insured computation for payouts
    pub premium: PremiumRule,
    pub insureds: ClaimInsuredsRule,
    pub auto_compensate: AutoCompensateRule,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            premium: PremiumRule {
                calculate_mode: CalculateMode::Formula,
                fixed: Decimal::ZERO,
                formula: FormulaSpec {
                    name: "default".into(),
                    params: json!({
                        "cardinal": 0,
                        "insuredAge": { "ranges": [
                            { "start": 0, "end": 18, "operator": "add", "value": 10 },
                            { "start": 19, "end": 200, "operator": "add", "value": 50 },
                        ]},
                    }),
                },
                minimum: None,
                maximum: None,
            },
            insureds: ClaimInsuredsRule::default(),
            auto_compensate: AutoCompensateRule::default(),
        }
    }
}

/// The fully-resolved rule tree for one product/plan/producer/contract tuple
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BizConfig {
    pub accept: AcceptConfig,
    pub renew: RenewConfig,
    pub endorse: EndorseConfig,
    pub cancel: CancelConfig,
    pub claim: ClaimConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_round_trip_through_json() {
        let config = BizConfig::default();
        let value = serde_json::to_value(&config).unwrap();
        let back: BizConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn default_accept_bounds_match_built_ins() {
        let accept = AcceptConfig::default();
        assert_eq!(accept.premium.minimum, Some(dec!(0.1)));
        assert_eq!(accept.premium.maximum, Some(dec!(9999)));
        assert_eq!(accept.applicants.maximum, 1);
        assert_eq!(accept.insureds.maximum, 99);
        assert_eq!(accept.period.effective_time.correct_to, TimeUnit::Day);
        assert_eq!(accept.period.expiry_time.correct_to, TimeUnit::Second);
    }

    #[test]
    fn empty_layer_deserializes_to_defaults() {
        let config: BizConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, BizConfig::default());
    }

    #[test]
    fn renewal_is_disabled_by_default() {
        assert!(!RenewConfig::default().allow_renew);
        assert!(!ClaimConfig::default().auto_compensate.enable);
    }
}
