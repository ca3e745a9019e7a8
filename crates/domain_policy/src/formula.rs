//! Premium formula engine
//!
//! Formulas are named calculators referenced by the business configuration.
//! Each lifecycle operation hands the formula its parameter document (opaque
//! JSON from the configuration) plus the figures to price. The built-in
//! `default` formula works off a cardinal amount and per-factor range tables.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use core_kernel::{temporal, ServiceError, ServiceResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coverage window a calculation prices against.
#[derive(Debug, Clone, Copy)]
pub struct CoverageWindow {
    pub effective_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
}

/// One insured being charged. `premium` is written by the formula.
#[derive(Debug, Clone)]
pub struct ChargeLine {
    pub birth: Option<DateTime<Utc>>,
    pub premium: Decimal,
}

/// One insured being refunded. `new_premium` is the earned portion the
/// formula decides to keep.
#[derive(Debug, Clone)]
pub struct RefundLine {
    pub no: String,
    pub premium: Decimal,
    pub new_premium: Decimal,
}

/// One insured being paid out. `sum_insured` is written by the formula.
#[derive(Debug, Clone)]
pub struct PayoutLine {
    pub no: String,
    pub birth: Option<DateTime<Utc>>,
    pub sum_insured: Decimal,
}

/// A named premium calculator.
pub trait Formula: Send + Sync + 'static {
    /// Prices each line for the window and returns the aggregate premium.
    fn charge(
        &self,
        params: &Value,
        window: CoverageWindow,
        lines: &mut [ChargeLine],
    ) -> ServiceResult<Decimal>;

    /// Computes earned premiums at `now` and returns the aggregate.
    fn refund(
        &self,
        params: &Value,
        window: CoverageWindow,
        now: DateTime<Utc>,
        lines: &mut [RefundLine],
    ) -> ServiceResult<Decimal>;

    /// Computes sums insured at the policy effective time and returns the
    /// aggregate.
    fn payout(
        &self,
        params: &Value,
        effective_time: DateTime<Utc>,
        lines: &mut [PayoutLine],
    ) -> ServiceResult<Decimal>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
}

/// An inclusive `[start, end]` band with the adjustment it applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorRange {
    pub start: i64,
    pub end: i64,
    pub operator: Operator,
    pub value: Decimal,
}

impl FactorRange {
    fn covers(&self, measure: i64) -> bool {
        measure >= self.start && measure <= self.end
    }

    fn apply(&self, amount: Decimal) -> Decimal {
        match self.operator {
            Operator::Add => amount + self.value,
            Operator::Subtract => amount - self.value,
            Operator::Multiply => amount * self.value,
        }
    }
}

/// An ordered set of factor ranges for one measure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorTable {
    pub ranges: Vec<FactorRange>,
}

impl FactorTable {
    /// Applies the first range covering `measure`; amounts outside every
    /// range pass through unchanged.
    pub fn apply(&self, measure: i64, amount: Decimal) -> Decimal {
        match self.ranges.iter().find(|range| range.covers(measure)) {
            Some(range) => range.apply(amount),
            None => amount,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DefaultParams {
    cardinal: Option<Decimal>,
    days: Option<FactorTable>,
    insured_age: Option<FactorTable>,
}

impl DefaultParams {
    fn parse(params: &Value) -> ServiceResult<Self> {
        serde_json::from_value(params.clone()).map_err(|err| {
            ServiceError::internal("malformed formula parameters")
                .with_inner(err.to_string())
                .untrusted()
        })
    }
}

/// The built-in formula: cardinal amount adjusted by coverage-length and
/// insured-age range tables.
#[derive(Debug, Default)]
pub struct DefaultFormula;

impl DefaultFormula {
    fn age_at(
        reference: DateTime<Utc>,
        birth: Option<DateTime<Utc>>,
    ) -> ServiceResult<i64> {
        let birth = birth.ok_or_else(|| {
            ServiceError::internal("insured birth is required by the pricing formula")
                .untrusted()
        })?;
        Ok(i64::from(temporal::whole_years_between(reference, birth)))
    }
}

impl Formula for DefaultFormula {
    fn charge(
        &self,
        params: &Value,
        window: CoverageWindow,
        lines: &mut [ChargeLine],
    ) -> ServiceResult<Decimal> {
        let params = DefaultParams::parse(params)?;
        let cardinal = params.cardinal.unwrap_or_default();
        let days = temporal::whole_days_between(window.effective_time, window.expiry_time);

        let mut total = Decimal::ZERO;
        for line in lines.iter_mut() {
            let mut premium = cardinal;
            if let Some(table) = &params.days {
                premium = table.apply(days, premium);
            }
            if let Some(table) = &params.insured_age {
                let age = Self::age_at(window.effective_time, line.birth)?;
                premium = table.apply(age, premium);
            }
            line.premium = premium;
            total += premium;
        }
        Ok(total)
    }

    fn refund(
        &self,
        _params: &Value,
        window: CoverageWindow,
        now: DateTime<Utc>,
        lines: &mut [RefundLine],
    ) -> ServiceResult<Decimal> {
        let in_force = now > window.effective_time && now < window.expiry_time;
        let mut total = Decimal::ZERO;
        for line in lines.iter_mut() {
            line.new_premium = if in_force {
                let elapsed = (now - window.effective_time).num_seconds();
                let duration = (window.expiry_time - window.effective_time).num_seconds();
                Decimal::from(elapsed) * line.premium / Decimal::from(duration)
            } else {
                Decimal::ZERO
            };
            total += line.new_premium;
        }
        Ok(total)
    }

    fn payout(
        &self,
        params: &Value,
        effective_time: DateTime<Utc>,
        lines: &mut [PayoutLine],
    ) -> ServiceResult<Decimal> {
        let params = DefaultParams::parse(params)?;
        let cardinal = params.cardinal.unwrap_or_default();

        let mut total = Decimal::ZERO;
        for line in lines.iter_mut() {
            let mut sum = cardinal;
            if let Some(table) = &params.insured_age {
                let age = Self::age_at(effective_time, line.birth)?;
                sum = table.apply(age, sum);
            }
            line.sum_insured = sum;
            total += sum;
        }
        Ok(total)
    }
}

/// Named formula lookup. Configuration references a formula that is not
/// registered here is a deployment fault, reported as untrusted.
pub struct FormulaRegistry {
    formulas: HashMap<String, Arc<dyn Formula>>,
}

impl FormulaRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            formulas: HashMap::new(),
        };
        registry.register("default", Arc::new(DefaultFormula));
        registry
    }

    pub fn register(&mut self, name: &str, formula: Arc<dyn Formula>) {
        self.formulas.insert(name.to_string(), formula);
    }

    pub fn get(&self, name: &str) -> ServiceResult<Arc<dyn Formula>> {
        self.formulas.get(name).cloned().ok_or_else(|| {
            ServiceError::internal("pricing formula is not registered")
                .with_target(name)
                .untrusted()
        })
    }
}

impl Default for FormulaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn window(days: i64) -> CoverageWindow {
        let effective = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        CoverageWindow {
            effective_time: effective,
            expiry_time: effective + chrono::Duration::days(days),
        }
    }

    fn default_params() -> Value {
        json!({
            "cardinal": 0,
            "days": { "ranges": [
                {"start": 0, "end": 10, "operator": "add", "value": 10},
                {"start": 11, "end": 365, "operator": "add", "value": 20}
            ]},
            "insuredAge": { "ranges": [
                {"start": 0, "end": 18, "operator": "add", "value": 5},
                {"start": 19, "end": 200, "operator": "add", "value": 15}
            ]}
        })
    }

    fn birth(year: i32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(year, 1, 15, 0, 0, 0).unwrap())
    }

    #[test]
    fn charge_applies_first_matching_range_per_factor() {
        let mut lines = vec![
            ChargeLine { birth: birth(2020), premium: Decimal::ZERO },
            ChargeLine { birth: birth(1990), premium: Decimal::ZERO },
        ];
        let total = DefaultFormula
            .charge(&default_params(), window(30), &mut lines)
            .unwrap();
        // 30 days of coverage adds 20; ages 4 and 34 add 5 and 15.
        assert_eq!(lines[0].premium, dec!(25));
        assert_eq!(lines[1].premium, dec!(35));
        assert_eq!(total, dec!(60));
    }

    #[test]
    fn charge_leaves_premium_at_cardinal_outside_every_range() {
        let params = json!({
            "cardinal": 100,
            "days": { "ranges": [{"start": 0, "end": 5, "operator": "add", "value": 1}] }
        });
        let mut lines = vec![ChargeLine { birth: birth(1990), premium: Decimal::ZERO }];
        let total = DefaultFormula.charge(&params, window(30), &mut lines).unwrap();
        assert_eq!(total, dec!(100));
    }

    #[test]
    fn overlapping_ranges_use_the_first_match() {
        let params = json!({
            "cardinal": 10,
            "days": { "ranges": [
                {"start": 0, "end": 365, "operator": "multiply", "value": 2},
                {"start": 0, "end": 365, "operator": "add", "value": 999}
            ]}
        });
        let mut lines = vec![ChargeLine { birth: None, premium: Decimal::ZERO }];
        let total = DefaultFormula.charge(&params, window(30), &mut lines).unwrap();
        assert_eq!(total, dec!(20));
    }

    #[test]
    fn charge_requires_birth_when_age_table_present() {
        let mut lines = vec![ChargeLine { birth: None, premium: Decimal::ZERO }];
        let err = DefaultFormula
            .charge(&default_params(), window(30), &mut lines)
            .unwrap_err();
        assert!(!err.is_client_error());
    }

    #[test]
    fn refund_is_proportional_to_elapsed_time() {
        let w = window(100);
        let now = w.effective_time + chrono::Duration::days(25);
        let mut lines = vec![RefundLine {
            no: "a".into(),
            premium: dec!(100),
            new_premium: Decimal::ZERO,
        }];
        let total = DefaultFormula.refund(&json!({}), w, now, &mut lines).unwrap();
        assert_eq!(lines[0].new_premium, dec!(25));
        assert_eq!(total, dec!(25));
    }

    #[test]
    fn refund_outside_the_window_earns_nothing() {
        let w = window(100);
        let before = w.effective_time - chrono::Duration::days(1);
        let after = w.expiry_time + chrono::Duration::days(1);
        for now in [before, after] {
            let mut lines = vec![RefundLine {
                no: "a".into(),
                premium: dec!(100),
                new_premium: dec!(7),
            }];
            let total = DefaultFormula.refund(&json!({}), w, now, &mut lines).unwrap();
            assert_eq!(lines[0].new_premium, Decimal::ZERO);
            assert_eq!(total, Decimal::ZERO);
        }
    }

    #[test]
    fn payout_prices_age_at_effective_time() {
        let params = json!({
            "cardinal": 0,
            "insuredAge": { "ranges": [
                {"start": 0, "end": 18, "operator": "add", "value": 10},
                {"start": 19, "end": 200, "operator": "add", "value": 50}
            ]}
        });
        let mut lines = vec![
            PayoutLine { no: "a".into(), birth: birth(2010), sum_insured: Decimal::ZERO },
            PayoutLine { no: "b".into(), birth: birth(1980), sum_insured: Decimal::ZERO },
        ];
        let effective = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let total = DefaultFormula.payout(&params, effective, &mut lines).unwrap();
        assert_eq!(lines[0].sum_insured, dec!(10));
        assert_eq!(lines[1].sum_insured, dec!(50));
        assert_eq!(total, dec!(60));
    }

    #[test]
    fn registry_resolves_default_and_rejects_unknown_names() {
        let registry = FormulaRegistry::new();
        assert!(registry.get("default").is_ok());
        let err = registry.get("bespoke").map(|_| ()).unwrap_err();
        assert!(!err.is_client_error());
        assert!(!err.trusted);
    }

    #[test]
    fn malformed_params_are_an_internal_fault() {
        let mut lines = vec![ChargeLine { birth: None, premium: Decimal::ZERO }];
        let err = DefaultFormula
            .charge(&json!({"days": "nope"}), window(1), &mut lines)
            .unwrap_err();
        assert!(!err.trusted);
    }
}
