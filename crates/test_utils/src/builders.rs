//! Test Data Builders
//!
//! Builders for acceptance and claim requests with defaults that pass the
//! default business configuration, so tests only spell out the fields they
//! are actually about.

use chrono::{DateTime, Duration, TimeZone, Utc};
use core_kernel::TimeUnit;
use domain_policy::{AcceptRequest, ApplicantDraft, InsuredDraft};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

/// A coverage window the default period rules accept: starts the day after
/// tomorrow at midnight, runs 180 days.
pub fn default_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let effective = TimeUnit::Day.correct_to(Utc::now() + Duration::days(2));
    let expiry = effective + Duration::days(180) - Duration::seconds(1);
    (effective, expiry)
}

/// An adult applicant the default field rules accept.
pub fn applicant(name: &str, id_no: &str) -> ApplicantDraft {
    ApplicantDraft {
        name: Some(name.to_string()),
        id_type: Some("passport".to_string()),
        id_no: Some(id_no.to_string()),
        gender: Some("female".to_string()),
        birth: Some(Utc.with_ymd_and_hms(1990, 3, 1, 0, 0, 0).unwrap()),
        contact_no: Some("13800000000".to_string()),
        email: Some("someone@example.com".to_string()),
    }
}

/// An adult insured the default field rules accept.
pub fn insured(relationship: &str, name: &str, id_no: &str) -> InsuredDraft {
    InsuredDraft {
        relationship: Some(relationship.to_string()),
        name: Some(name.to_string()),
        id_type: Some("passport".to_string()),
        id_no: Some(id_no.to_string()),
        gender: Some("female".to_string()),
        birth: Some(Utc.with_ymd_and_hms(1990, 3, 1, 0, 0, 0).unwrap()),
        contact_no: Some("13800000000".to_string()),
        email: Some("someone@example.com".to_string()),
        premium: None,
    }
}

/// Builder for acceptance (and quotation) requests.
pub struct AcceptRequestBuilder {
    request: AcceptRequest,
}

impl Default for AcceptRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AcceptRequestBuilder {
    /// A complete request against the demo catalog: fresh order number,
    /// valid window, one applicant, one insured.
    pub fn new() -> Self {
        let (effective, expiry) = default_window();
        Self {
            request: AcceptRequest {
                order_no: Some(format!("ORD{}", Uuid::new_v4().simple())),
                contract_code: Some("C-DEMO".to_string()),
                contract_version: None,
                plan_code: Some("PL-DEMO".to_string()),
                effective_time: Some(effective),
                expiry_time: Some(expiry),
                premium: None,
                extensions: None,
                applicants: vec![applicant("Alexis Reed", "PA100001")],
                insureds: vec![insured("self", "Alexis Reed", "PA100001")],
            },
        }
    }

    pub fn with_order_no(mut self, order_no: impl Into<String>) -> Self {
        self.request.order_no = Some(order_no.into());
        self
    }

    pub fn without_order_no(mut self) -> Self {
        self.request.order_no = None;
        self
    }

    pub fn with_contract_code(mut self, code: impl Into<String>) -> Self {
        self.request.contract_code = Some(code.into());
        self
    }

    pub fn with_plan_code(mut self, code: impl Into<String>) -> Self {
        self.request.plan_code = Some(code.into());
        self
    }

    pub fn with_window(mut self, effective: DateTime<Utc>, expiry: DateTime<Utc>) -> Self {
        self.request.effective_time = Some(effective);
        self.request.expiry_time = Some(expiry);
        self
    }

    pub fn with_premium(mut self, premium: Decimal) -> Self {
        self.request.premium = Some(premium);
        self
    }

    pub fn with_extensions(mut self, extensions: Value) -> Self {
        self.request.extensions = Some(extensions);
        self
    }

    pub fn with_applicants(mut self, applicants: Vec<ApplicantDraft>) -> Self {
        self.request.applicants = applicants;
        self
    }

    pub fn with_insureds(mut self, insureds: Vec<InsuredDraft>) -> Self {
        self.request.insureds = insureds;
        self
    }

    pub fn add_insured(mut self, insured: InsuredDraft) -> Self {
        self.request.insureds.push(insured);
        self
    }

    pub fn build(self) -> AcceptRequest {
        self.request
    }

    /// The same request as a JSON body, for driving the HTTP surface.
    pub fn build_json(self) -> Value {
        let request = self.request;
        let mut body = json!({
            "applicants": request.applicants,
            "insureds": request.insureds,
        });
        let fields = [
            ("orderNo", request.order_no.map(Value::from)),
            ("contractCode", request.contract_code.map(Value::from)),
            ("contractVersion", request.contract_version.map(Value::from)),
            ("planCode", request.plan_code.map(Value::from)),
            (
                "effectiveTime",
                request.effective_time.map(|t| json!(t)),
            ),
            ("expiryTime", request.expiry_time.map(|t| json!(t))),
            ("premium", request.premium.map(|p| json!(p))),
            ("extensions", request.extensions),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                body[key] = value;
            }
        }
        body
    }
}
