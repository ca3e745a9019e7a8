//! Producer and product catalog
//!
//! Catalog rows are provisioned out of band; the lifecycle services only read
//! them. Each row may carry its own business-configuration layer, merged in
//! resolution order product -> plan -> producer -> contract.

use async_trait::async_trait;
use biz_config::ConfigLayer;
use core_kernel::ServiceResult;
use uuid::Uuid;

/// A distribution channel authorised to transact against contracts.
#[derive(Debug, Clone)]
pub struct Producer {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Webhook endpoint for lifecycle notifications, if subscribed.
    pub notify_url: Option<String>,
    pub secret_id: Option<String>,
    pub secret_key: Option<String>,
    pub biz_config: ConfigLayer,
}

/// An insurance product at a specific version.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub version: String,
    pub name: String,
    pub biz_config: ConfigLayer,
}

/// A sellable plan under a product version.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: Uuid,
    pub code: String,
    pub product_id: Uuid,
    pub product_version: String,
    pub biz_config: ConfigLayer,
}

/// A signed agreement binding a producer to a product.
#[derive(Debug, Clone)]
pub struct Contract {
    pub id: Uuid,
    pub code: String,
    pub version: String,
    pub producer_id: Uuid,
    pub product_id: Uuid,
    pub biz_config: ConfigLayer,
}

/// Read access to the catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    async fn producer_by_code(&self, code: &str) -> ServiceResult<Option<Producer>>;

    async fn producer_by_id(&self, id: Uuid) -> ServiceResult<Option<Producer>>;

    /// Looks a contract up by code, and by version too when one is given.
    /// With no version the latest contract version wins.
    async fn contract_by_code(
        &self,
        code: &str,
        version: Option<&str>,
    ) -> ServiceResult<Option<Contract>>;

    async fn product_by_id(&self, id: Uuid) -> ServiceResult<Option<Product>>;

    async fn plan_by_code(&self, code: &str, product_version: &str)
        -> ServiceResult<Option<Plan>>;
}
