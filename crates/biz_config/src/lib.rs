//! Business-rule configuration
//!
//! Every lifecycle operation is governed by a [`BizConfig`] tree resolved
//! from five layers: the built-in defaults plus the product, plan, producer,
//! and contract overrides, merged in that order with later layers winning.
//! Binding persists the resolved tree alongside the policy; endorse, cancel,
//! renew, and claim read that snapshot rather than resolving again.

pub mod merge;
pub mod model;
pub mod resolver;

pub use merge::deep_merge;
pub use model::{
    AcceptConfig, AgeLimit, AllowRule, ApplicantsRule, AutoCompensateRule, BizConfig,
    CalculateMode, CancelConfig, CancelPeriodRule, ClaimConfig, ClaimInsuredsRule, EndorseConfig,
    EndorsePartiesRule, EndorsePolicyRule, EndorseTimeRule, FieldRule, FormulaSpec, InsuredsRule,
    PartyFieldsRule, PeriodRule, PremiumRule, RenewConfig, RenewPeriodMode, RenewPeriodRule,
    TimePointRule,
};
pub use resolver::{resolve, ConfigLayer, ConfigLayers};
