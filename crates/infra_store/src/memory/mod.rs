//! Single-process store
//!
//! One mutex guards the whole state, so every multi-row write the ports
//! declare atomic really is: either all rows of a save are visible to the
//! next reader or none are. The same store backs the catalog, policies,
//! claims, notifications, locks and counters.

mod claims;
mod policies;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use core_kernel::{LockStore, SequenceStore, ServiceResult};
use domain_claims::{ClaimRecord, CompensationTask, NotifyTask};
use domain_policy::{
    CatalogStore, Contract, EndorsementRecord, Plan, PolicyBundle, PolicySnapshot, Producer,
    Product,
};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct State {
    pub(crate) producers: Vec<Producer>,
    pub(crate) products: Vec<Product>,
    pub(crate) plans: Vec<Plan>,
    pub(crate) contracts: Vec<Contract>,
    pub(crate) policies: Vec<PolicyBundle>,
    pub(crate) endorsements: Vec<EndorsementRecord>,
    pub(crate) snapshots: Vec<PolicySnapshot>,
    pub(crate) claims: Vec<ClaimRecord>,
    pub(crate) compensation_tasks: Vec<CompensationTask>,
    pub(crate) notify_tasks: Vec<NotifyTask>,
    pub(crate) locks: HashSet<String>,
    pub(crate) sequences: HashMap<String, u64>,
}

/// An in-memory implementation of every storage and coordination port.
#[derive(Default)]
pub struct MemoryStore {
    pub(crate) state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_producer(&self, producer: Producer) {
        self.state.lock().await.producers.push(producer);
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.push(product);
    }

    pub async fn insert_plan(&self, plan: Plan) {
        self.state.lock().await.plans.push(plan);
    }

    pub async fn insert_contract(&self, contract: Contract) {
        self.state.lock().await.contracts.push(contract);
    }

    /// Endorsements recorded for a policy, in application order.
    pub async fn endorsements_of(&self, policy_id: Uuid) -> Vec<EndorsementRecord> {
        self.state
            .lock()
            .await
            .endorsements
            .iter()
            .filter(|e| e.policy_id == policy_id)
            .cloned()
            .collect()
    }

    /// Pre-change snapshots recorded for a policy, in application order.
    pub async fn snapshots_of(&self, policy_id: Uuid) -> Vec<PolicySnapshot> {
        self.state
            .lock()
            .await
            .snapshots
            .iter()
            .filter(|s| s.policy_id == policy_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn producer_by_code(&self, code: &str) -> ServiceResult<Option<Producer>> {
        let state = self.state.lock().await;
        Ok(state.producers.iter().find(|p| p.code == code).cloned())
    }

    async fn producer_by_id(&self, id: Uuid) -> ServiceResult<Option<Producer>> {
        let state = self.state.lock().await;
        Ok(state.producers.iter().find(|p| p.id == id).cloned())
    }

    async fn contract_by_code(
        &self,
        code: &str,
        version: Option<&str>,
    ) -> ServiceResult<Option<Contract>> {
        let state = self.state.lock().await;
        let found = match version {
            Some(version) => state
                .contracts
                .iter()
                .find(|c| c.code == code && c.version == version),
            // Without a pinned version the highest one wins.
            None => state
                .contracts
                .iter()
                .filter(|c| c.code == code)
                .max_by_key(|c| (c.version.parse::<u64>().ok(), c.version.clone())),
        };
        Ok(found.cloned())
    }

    async fn product_by_id(&self, id: Uuid) -> ServiceResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn plan_by_code(&self, code: &str, product_version: &str) -> ServiceResult<Option<Plan>> {
        let state = self.state.lock().await;
        Ok(state
            .plans
            .iter()
            .find(|p| p.code == code && p.product_version == product_version)
            .cloned())
    }
}

#[async_trait]
impl LockStore for MemoryStore {
    async fn try_acquire(&self, key: &str) -> ServiceResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.locks.insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        state.locks.remove(key);
        Ok(())
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn next(&self, key: &str) -> ServiceResult<u64> {
        let mut state = self.state.lock().await;
        let counter = state.sequences.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biz_config::ConfigLayer;

    fn contract(code: &str, version: &str) -> Contract {
        Contract {
            id: Uuid::new_v4(),
            code: code.into(),
            version: version.into(),
            producer_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            biz_config: ConfigLayer::Empty,
        }
    }

    mod locks {
        use super::*;

        #[tokio::test]
        async fn a_key_is_granted_exactly_once() {
            let store = MemoryStore::new();
            assert!(store.try_acquire("k").await.unwrap());
            assert!(!store.try_acquire("k").await.unwrap());
            store.release("k").await.unwrap();
            assert!(store.try_acquire("k").await.unwrap());
        }

        #[tokio::test]
        async fn releasing_an_unheld_key_is_a_no_op() {
            let store = MemoryStore::new();
            store.release("nobody").await.unwrap();
            assert!(store.try_acquire("nobody").await.unwrap());
        }
    }

    mod sequences {
        use super::*;

        #[tokio::test]
        async fn counters_start_at_one_and_are_independent() {
            let store = MemoryStore::new();
            assert_eq!(store.next("a").await.unwrap(), 1);
            assert_eq!(store.next("a").await.unwrap(), 2);
            assert_eq!(store.next("b").await.unwrap(), 1);
        }
    }

    mod catalog {
        use super::*;

        #[tokio::test]
        async fn unpinned_contract_lookup_takes_the_highest_version() {
            let store = MemoryStore::new();
            store.insert_contract(contract("C1", "1")).await;
            store.insert_contract(contract("C1", "2")).await;
            store.insert_contract(contract("C2", "9")).await;

            let latest = store.contract_by_code("C1", None).await.unwrap().unwrap();
            assert_eq!(latest.version, "2");
            let pinned = store.contract_by_code("C1", Some("1")).await.unwrap().unwrap();
            assert_eq!(pinned.version, "1");
            assert!(store.contract_by_code("C3", None).await.unwrap().is_none());
        }
    }
}
