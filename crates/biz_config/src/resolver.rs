//! Layer resolution
//!
//! Catalog rows store their rule overrides as JSON text. Resolution parses
//! each layer, folds them onto the built-in defaults in precedence order
//! (product < plan < producer < contract), and deserializes the result into
//! the typed tree. A layer that fails to parse means the catalog data itself
//! is broken, which is a non-recoverable server fault.

use serde_json::Value;

use core_kernel::{ServiceError, ServiceResult};

use crate::merge::deep_merge;
use crate::model::BizConfig;

/// One override layer as stored on a catalog row
#[derive(Debug, Clone, Default)]
pub enum ConfigLayer {
    /// No overrides at this level
    #[default]
    Empty,
    /// Already-parsed overrides
    Json(Value),
    /// Raw JSON text as persisted
    Text(String),
}

impl ConfigLayer {
    fn into_value(self, level: &str) -> ServiceResult<Value> {
        match self {
            ConfigLayer::Empty => Ok(Value::Object(Default::default())),
            ConfigLayer::Json(value) => Ok(value),
            ConfigLayer::Text(text) => serde_json::from_str(&text).map_err(|err| {
                ServiceError::internal(format!("malformed bizConfig on {level}"))
                    .with_inner(err.to_string())
                    .untrusted()
            }),
        }
    }
}

/// The four override layers for one binding
#[derive(Debug, Clone, Default)]
pub struct ConfigLayers {
    pub product: ConfigLayer,
    pub plan: ConfigLayer,
    pub producer: ConfigLayer,
    pub contract: ConfigLayer,
}

/// Resolves the effective rule tree for the given layers.
pub fn resolve(layers: ConfigLayers) -> ServiceResult<BizConfig> {
    let mut merged = serde_json::to_value(BizConfig::default())
        .map_err(|err| ServiceError::internal("default bizConfig is not serializable")
            .with_inner(err.to_string())
            .untrusted())?;

    for (level, layer) in [
        ("product", layers.product),
        ("plan", layers.plan),
        ("producer", layers.producer),
        ("contract", layers.contract),
    ] {
        merged = deep_merge(merged, layer.into_value(level)?);
    }

    serde_json::from_value(merged).map_err(|err| {
        ServiceError::internal("merged bizConfig does not satisfy the rule schema")
            .with_inner(err.to_string())
            .untrusted()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CalculateMode;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn no_overrides_yields_defaults() {
        let config = resolve(ConfigLayers::default()).unwrap();
        assert_eq!(config, BizConfig::default());
    }

    #[test]
    fn later_layers_win() {
        let layers = ConfigLayers {
            product: ConfigLayer::Json(json!({
                "accept": { "premium": { "calculateMode": "fixed", "fixed": 30 } }
            })),
            contract: ConfigLayer::Json(json!({
                "accept": { "premium": { "fixed": 50 } }
            })),
            ..Default::default()
        };
        let config = resolve(layers).unwrap();
        assert_eq!(config.accept.premium.calculate_mode, CalculateMode::Fixed);
        assert_eq!(config.accept.premium.fixed, dec!(50));
        // untouched siblings keep their defaults
        assert_eq!(config.accept.premium.minimum, Some(dec!(0.1)));
    }

    #[test]
    fn text_layers_are_parsed() {
        let layers = ConfigLayers {
            producer: ConfigLayer::Text(r#"{"renew":{"allowRenew":true}}"#.into()),
            ..Default::default()
        };
        let config = resolve(layers).unwrap();
        assert!(config.renew.allow_renew);
    }

    #[test]
    fn malformed_text_is_an_untrusted_fault() {
        let layers = ConfigLayers {
            plan: ConfigLayer::Text("{not json".into()),
            ..Default::default()
        };
        let err = resolve(layers).unwrap_err();
        assert_eq!(err.http_status(), 500);
        assert!(!err.trusted);
    }

    #[test]
    fn resolution_is_deterministic() {
        let layers = ConfigLayers {
            product: ConfigLayer::Json(json!({"cancel": {"allowCancel": false}})),
            ..Default::default()
        };
        let a = resolve(layers.clone()).unwrap();
        let b = resolve(layers).unwrap();
        assert_eq!(a, b);
    }
}
