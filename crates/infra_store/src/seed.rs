//! Demo catalog data
//!
//! Seeds one producer, product, plan and contract so a freshly started
//! server accepts requests out of the box.

use biz_config::ConfigLayer;
use domain_policy::{Contract, Plan, Producer, Product};
use serde_json::json;
use uuid::Uuid;

use crate::memory::MemoryStore;

/// The rows the demo seed creates.
#[derive(Debug, Clone)]
pub struct DemoCatalog {
    pub producer: Producer,
    pub product: Product,
    pub plan: Plan,
    pub contract: Contract,
}

pub const DEMO_PRODUCER_CODE: &str = "PC-DEMO";
pub const DEMO_PRODUCT_CODE: &str = "PD-DEMO";
pub const DEMO_PLAN_CODE: &str = "PL-DEMO";
pub const DEMO_CONTRACT_CODE: &str = "C-DEMO";

/// Inserts the demo catalog and returns it.
pub async fn demo_catalog(store: &MemoryStore) -> DemoCatalog {
    let producer = Producer {
        id: Uuid::new_v4(),
        code: DEMO_PRODUCER_CODE.into(),
        name: "Demo producer".into(),
        notify_url: None,
        secret_id: Some("d73d0a29-0bea-42e5-a8a6-211bb998f8b6".into()),
        secret_key: Some("n8Ih%mA9PL^X)%MN2e%cO(9=Uhczf7n+".into()),
        biz_config: ConfigLayer::Empty,
    };
    let product = Product {
        id: Uuid::new_v4(),
        code: DEMO_PRODUCT_CODE.into(),
        version: "1".into(),
        name: "Demo product".into(),
        biz_config: ConfigLayer::Json(json!({
            "accept": {
                "premium": {
                    "calculateMode": "formula",
                    "formula": {
                        "name": "default",
                        "params": {
                            "cardinal": 10,
                            "days": { "ranges": [
                                { "start": 0, "end": 30, "operator": "multiply", "value": 1 },
                                { "start": 31, "end": 90, "operator": "multiply", "value": 2 },
                                { "start": 91, "end": 366, "operator": "multiply", "value": 4 },
                            ]},
                        },
                    },
                },
            },
            "claim": {
                "autoCompensate": { "enable": true, "maximum": 1000 },
            },
        })),
    };
    let plan = Plan {
        id: Uuid::new_v4(),
        code: DEMO_PLAN_CODE.into(),
        product_id: product.id,
        product_version: product.version.clone(),
        biz_config: ConfigLayer::Empty,
    };
    let contract = Contract {
        id: Uuid::new_v4(),
        code: DEMO_CONTRACT_CODE.into(),
        version: "1".into(),
        producer_id: producer.id,
        product_id: product.id,
        biz_config: ConfigLayer::Empty,
    };

    store.insert_producer(producer.clone()).await;
    store.insert_product(product.clone()).await;
    store.insert_plan(plan.clone()).await;
    store.insert_contract(contract.clone()).await;

    DemoCatalog { producer, product, plan, contract }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_policy::CatalogStore;

    #[tokio::test]
    async fn the_seed_is_reachable_through_the_catalog_port() {
        let store = MemoryStore::new();
        let seeded = demo_catalog(&store).await;

        let producer = store
            .producer_by_code(DEMO_PRODUCER_CODE)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(producer.id, seeded.producer.id);

        let contract = store
            .contract_by_code(DEMO_CONTRACT_CODE, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contract.producer_id, producer.id);

        let plan = store
            .plan_by_code(DEMO_PLAN_CODE, "1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plan.product_id, contract.product_id);
    }
}
