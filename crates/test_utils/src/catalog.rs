//! Catalog Fixtures
//!
//! Installs a producer/product/plan/contract quartet into a `MemoryStore`,
//! optionally with configuration layers, and hands back the codes tests
//! address it by.

use biz_config::ConfigLayer;
use domain_policy::{Contract, Plan, Producer, Product};
use infra_store::MemoryStore;
use uuid::Uuid;

/// The rows a catalog fixture installed.
#[derive(Debug, Clone)]
pub struct CatalogFixture {
    pub producer: Producer,
    pub product: Product,
    pub plan: Plan,
    pub contract: Contract,
}

/// Builds a catalog around one product configuration layer.
pub struct CatalogBuilder {
    producer_code: String,
    product_layer: ConfigLayer,
    plan_layer: ConfigLayer,
    producer_layer: ConfigLayer,
    contract_layer: ConfigLayer,
    notify_url: Option<String>,
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            producer_code: "PC-DEMO".to_string(),
            product_layer: ConfigLayer::Empty,
            plan_layer: ConfigLayer::Empty,
            producer_layer: ConfigLayer::Empty,
            contract_layer: ConfigLayer::Empty,
            notify_url: None,
        }
    }

    pub fn with_producer_code(mut self, code: impl Into<String>) -> Self {
        self.producer_code = code.into();
        self
    }

    pub fn with_product_layer(mut self, layer: ConfigLayer) -> Self {
        self.product_layer = layer;
        self
    }

    pub fn with_plan_layer(mut self, layer: ConfigLayer) -> Self {
        self.plan_layer = layer;
        self
    }

    pub fn with_producer_layer(mut self, layer: ConfigLayer) -> Self {
        self.producer_layer = layer;
        self
    }

    pub fn with_contract_layer(mut self, layer: ConfigLayer) -> Self {
        self.contract_layer = layer;
        self
    }

    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    /// Inserts the catalog into the store and returns it.
    pub async fn install(self, store: &MemoryStore) -> CatalogFixture {
        let producer = Producer {
            id: Uuid::new_v4(),
            code: self.producer_code,
            name: "Test producer".to_string(),
            notify_url: self.notify_url,
            secret_id: Some("test-secret-id".to_string()),
            secret_key: Some("test-secret-key".to_string()),
            biz_config: self.producer_layer,
        };
        let product = Product {
            id: Uuid::new_v4(),
            code: "PD-DEMO".to_string(),
            version: "1".to_string(),
            name: "Test product".to_string(),
            biz_config: self.product_layer,
        };
        let plan = Plan {
            id: Uuid::new_v4(),
            code: "PL-DEMO".to_string(),
            product_id: product.id,
            product_version: product.version.clone(),
            biz_config: self.plan_layer,
        };
        let contract = Contract {
            id: Uuid::new_v4(),
            code: "C-DEMO".to_string(),
            version: "1".to_string(),
            producer_id: producer.id,
            product_id: product.id,
            biz_config: self.contract_layer,
        };

        store.insert_producer(producer.clone()).await;
        store.insert_product(product.clone()).await;
        store.insert_plan(plan.clone()).await;
        store.insert_contract(contract.clone()).await;

        CatalogFixture { producer, product, plan, contract }
    }
}
