//! Producer webhooks
//!
//! Notification tasks are delivered to the producer's configured endpoint,
//! signed with the producer's secret pair. Transport trouble schedules
//! another attempt on a widening timetable; after the timetable runs out,
//! or on any non-retryable refusal, the task fails for good.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use core_kernel::{ServiceError, ServiceResult};
use domain_policy::{CatalogStore, Producer};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::task::JoinSet;

use crate::model::{NotifyStatus, NotifyTask};
use crate::ports::{NotifyStore, WebhookRequest, WebhookTransport};

/// Tasks claimed per run.
const BATCH_SIZE: usize = 10;

/// Wait before attempt `n + 1`, indexed by the number of attempts already
/// made. Past the table the task fails permanently.
fn retry_delay(attempts: u32) -> Option<Duration> {
    let delay = match attempts {
        0 => Duration::seconds(15),
        1 => Duration::seconds(30),
        2 => Duration::minutes(3),
        3 => Duration::minutes(10),
        4 => Duration::minutes(20),
        5 => Duration::minutes(30),
        6 => Duration::hours(1),
        7 => Duration::hours(3),
        8 => Duration::hours(6),
        9 => Duration::hours(24),
        _ => return None,
    };
    Some(delay)
}

/// The `Authorization` header for one webhook call.
///
/// The signature covers the secret id, the unix timestamp, the request path,
/// the query string with its parameters sorted, and the raw body, keyed by
/// the producer's secret key.
pub fn sign_request(
    secret_id: &str,
    secret_key: &str,
    timestamp: i64,
    url: &str,
    body: &str,
) -> String {
    let (path, query) = canonical_parts(url);
    let material = format!("{secret_id}{timestamp}{path}{query}{body}");
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret_key.as_bytes()).expect("hmac accepts any key size");
    mac.update(material.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("SecretId={secret_id}, Timestamp={timestamp}, Signature={signature}")
}

/// Splits a URL into its path and its query with parameters sorted, so both
/// ends canonicalise the same request the same way.
fn canonical_parts(url: &str) -> (String, String) {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let (path, query) = match after_scheme.split_once('?') {
        Some((left, query)) => (left, query),
        None => (after_scheme, ""),
    };
    let path = match path.find('/') {
        Some(at) => &path[at..],
        None => "/",
    };
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    (path.to_string(), pairs.join("&"))
}

/// Delivers due notification tasks.
pub struct NotifierJob {
    notifies: Arc<dyn NotifyStore>,
    catalog: Arc<dyn CatalogStore>,
    transport: Arc<dyn WebhookTransport>,
}

impl NotifierJob {
    pub fn new(
        notifies: Arc<dyn NotifyStore>,
        catalog: Arc<dyn CatalogStore>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self { notifies, catalog, transport }
    }

    /// Claims one batch of due tasks and attempts each concurrently, settling
    /// the whole batch before returning. Returns the number delivered.
    pub async fn run_once(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let tasks = self.notifies.due_tasks(now, BATCH_SIZE).await?;
        if tasks.is_empty() {
            return Ok(0);
        }

        let task_ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
        self.notifies.mark_handing(&task_ids, now).await?;

        let mut handles = JoinSet::new();
        for task in tasks {
            let notifies = Arc::clone(&self.notifies);
            let catalog = Arc::clone(&self.catalog);
            let transport = Arc::clone(&self.transport);
            handles.spawn(async move { attempt(notifies, catalog, transport, task, now).await });
        }

        let mut delivered = 0;
        while let Some(joined) = handles.join_next().await {
            let outcome = joined.map_err(|e| {
                ServiceError::internal("notification task panicked")
                    .with_inner(e.to_string())
                    .untrusted()
            })?;
            if outcome? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

/// One delivery attempt. Outcomes are written to the store; only store
/// trouble bubbles up.
async fn attempt(
    notifies: Arc<dyn NotifyStore>,
    catalog: Arc<dyn CatalogStore>,
    transport: Arc<dyn WebhookTransport>,
    task: NotifyTask,
    now: DateTime<Utc>,
) -> ServiceResult<bool> {
    let producer = match catalog.producer_by_id(task.producer_id).await? {
        Some(producer) => producer,
        None => {
            return fail(&*notifies, &task, "the producer no longer exists", now)
                .await
                .map(|_| false)
        }
    };
    let Some(endpoint) = endpoint_of(&producer) else {
        return fail(&*notifies, &task, "the producer has no webhook endpoint configured", now)
            .await
            .map(|_| false);
    };

    let attempts = match task.status {
        NotifyStatus::Pending => 0,
        _ => task.retries + 1,
    };
    let body = task.body.to_string();
    let authorization =
        sign_request(endpoint.secret_id, endpoint.secret_key, now.timestamp(), endpoint.url, &body);
    let request = WebhookRequest {
        url: endpoint.url.to_string(),
        authorization,
        body: task.body.clone(),
    };

    match transport.deliver(&request).await {
        Ok(()) => {
            tracing::info!(task_id = %task.id, kind = %task.kind, "notification delivered");
            notifies.record_success(task.id, now).await?;
            Ok(true)
        }
        Err(err) if err.retryable => match retry_delay(attempts) {
            Some(delay) => {
                tracing::warn!(
                    task_id = %task.id,
                    attempts,
                    error = %err.message,
                    "notification delivery failed, will retry"
                );
                notifies.record_retry(task.id, attempts, now + delay, &err.message).await?;
                Ok(false)
            }
            None => fail(&*notifies, &task, &err.message, now).await.map(|_| false),
        },
        Err(err) => fail(&*notifies, &task, &err.message, now).await.map(|_| false),
    }
}

async fn fail(
    notifies: &dyn NotifyStore,
    task: &NotifyTask,
    reason: &str,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    tracing::error!(task_id = %task.id, reason, "notification failed permanently");
    notifies.record_failure(task.id, reason, now).await
}

struct Endpoint<'a> {
    url: &'a str,
    secret_id: &'a str,
    secret_key: &'a str,
}

fn endpoint_of(producer: &Producer) -> Option<Endpoint<'_>> {
    Some(Endpoint {
        url: producer.notify_url.as_deref()?,
        secret_id: producer.secret_id.as_deref()?,
        secret_key: producer.secret_key.as_deref()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NOTIFY_CLAIM_STATUS_CHANGE;
    use crate::ports::DeliveryError;
    use async_trait::async_trait;
    use biz_config::ConfigLayer;
    use std::sync::Mutex;
    use uuid::Uuid;

    mod signing {
        use super::*;

        #[test]
        fn signature_is_deterministic() {
            let a = sign_request("id1", "key1", 1700000000, "https://p.example/hook", "{}");
            let b = sign_request("id1", "key1", 1700000000, "https://p.example/hook", "{}");
            assert_eq!(a, b);
            assert!(a.starts_with("SecretId=id1, Timestamp=1700000000, Signature="));
        }

        #[test]
        fn query_order_does_not_change_the_signature() {
            let a = sign_request("id", "k", 1, "https://p.example/hook?b=2&a=1", "{}");
            let b = sign_request("id", "k", 1, "https://p.example/hook?a=1&b=2", "{}");
            assert_eq!(a, b);
        }

        #[test]
        fn path_and_body_change_the_signature() {
            let a = sign_request("id", "k", 1, "https://p.example/hook", "{}");
            let b = sign_request("id", "k", 1, "https://p.example/other", "{}");
            let c = sign_request("id", "k", 1, "https://p.example/hook", "{\"x\":1}");
            assert_ne!(a, b);
            assert_ne!(a, c);
        }

        #[test]
        fn canonical_parts_handles_bare_hosts() {
            assert_eq!(canonical_parts("https://p.example"), ("/".into(), String::new()));
            assert_eq!(
                canonical_parts("https://p.example/hook?z=1&a=2"),
                ("/hook".into(), "a=2&z=1".into())
            );
        }
    }

    mod schedule {
        use super::*;

        #[test]
        fn widens_then_runs_out() {
            assert_eq!(retry_delay(0), Some(Duration::seconds(15)));
            assert_eq!(retry_delay(5), Some(Duration::minutes(30)));
            assert_eq!(retry_delay(9), Some(Duration::hours(24)));
            assert_eq!(retry_delay(10), None);
        }
    }

    mod delivery {
        use super::*;
        use chrono::Utc;
        use domain_policy::{Contract, Plan, Producer, Product};

        struct OneProducer(Producer);

        #[async_trait]
        impl CatalogStore for OneProducer {
            async fn producer_by_code(&self, code: &str) -> ServiceResult<Option<Producer>> {
                Ok((self.0.code == code).then(|| self.0.clone()))
            }

            async fn producer_by_id(&self, id: Uuid) -> ServiceResult<Option<Producer>> {
                Ok((self.0.id == id).then(|| self.0.clone()))
            }

            async fn contract_by_code(
                &self,
                _: &str,
                _: Option<&str>,
            ) -> ServiceResult<Option<Contract>> {
                Ok(None)
            }

            async fn product_by_id(&self, _: Uuid) -> ServiceResult<Option<Product>> {
                Ok(None)
            }

            async fn plan_by_code(&self, _: &str, _: &str) -> ServiceResult<Option<Plan>> {
                Ok(None)
            }
        }

        #[derive(Default)]
        struct RecordingNotifies {
            due: Mutex<Vec<NotifyTask>>,
            successes: Mutex<Vec<Uuid>>,
            retries: Mutex<Vec<(Uuid, u32, DateTime<Utc>)>>,
            failures: Mutex<Vec<(Uuid, String)>>,
        }

        #[async_trait]
        impl NotifyStore for RecordingNotifies {
            async fn due_tasks(
                &self,
                _: DateTime<Utc>,
                _: usize,
            ) -> ServiceResult<Vec<NotifyTask>> {
                Ok(self.due.lock().unwrap().drain(..).collect())
            }

            async fn mark_handing(&self, _: &[Uuid], _: DateTime<Utc>) -> ServiceResult<()> {
                Ok(())
            }

            async fn record_success(&self, task_id: Uuid, _: DateTime<Utc>) -> ServiceResult<()> {
                self.successes.lock().unwrap().push(task_id);
                Ok(())
            }

            async fn record_retry(
                &self,
                task_id: Uuid,
                retries: u32,
                retry_at: DateTime<Utc>,
                _: &str,
            ) -> ServiceResult<()> {
                self.retries.lock().unwrap().push((task_id, retries, retry_at));
                Ok(())
            }

            async fn record_failure(
                &self,
                task_id: Uuid,
                reason: &str,
                _: DateTime<Utc>,
            ) -> ServiceResult<()> {
                self.failures.lock().unwrap().push((task_id, reason.to_string()));
                Ok(())
            }
        }

        struct StubTransport {
            outcome: Result<(), DeliveryError>,
            seen: Mutex<Vec<WebhookRequest>>,
        }

        #[async_trait]
        impl WebhookTransport for StubTransport {
            async fn deliver(&self, request: &WebhookRequest) -> Result<(), DeliveryError> {
                self.seen.lock().unwrap().push(request.clone());
                self.outcome.clone()
            }
        }

        fn producer() -> Producer {
            Producer {
                id: Uuid::new_v4(),
                code: "acme".into(),
                name: "Acme".into(),
                notify_url: Some("https://acme.example/webhooks/claims".into()),
                secret_id: Some("sid".into()),
                secret_key: Some("skey".into()),
                biz_config: ConfigLayer::Empty,
            }
        }

        fn task_for(producer: &Producer) -> NotifyTask {
            NotifyTask::claim_status_change(
                producer.id,
                "CLM1",
                "OPC1",
                crate::model::ClaimStatus::Paying,
                Utc::now(),
            )
        }

        fn job(
            producer: Producer,
            notifies: Arc<RecordingNotifies>,
            transport: Arc<StubTransport>,
        ) -> NotifierJob {
            NotifierJob::new(notifies, Arc::new(OneProducer(producer)), transport)
        }

        /// A transport that tracks how many deliveries are in flight at once.
        /// Each delivery parks briefly so overlapping attempts are observable.
        #[derive(Default)]
        struct GaugedTransport {
            in_flight: std::sync::atomic::AtomicUsize,
            peak: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl WebhookTransport for GaugedTransport {
            async fn deliver(&self, _: &WebhookRequest) -> Result<(), DeliveryError> {
                use std::sync::atomic::Ordering;
                let live = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(live, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        #[tokio::test]
        async fn a_batch_is_attempted_concurrently() {
            let producer = producer();
            let notifies = Arc::new(RecordingNotifies::default());
            let transport = Arc::new(GaugedTransport::default());
            notifies.due.lock().unwrap().push(task_for(&producer));
            notifies.due.lock().unwrap().push(task_for(&producer));

            let job = NotifierJob::new(
                notifies.clone(),
                Arc::new(OneProducer(producer)),
                transport.clone(),
            );
            assert_eq!(job.run_once(Utc::now()).await.unwrap(), 2);

            // A slow delivery must not hold up the rest of the batch.
            assert_eq!(transport.peak.load(std::sync::atomic::Ordering::SeqCst), 2);
            assert_eq!(notifies.successes.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn a_delivered_task_succeeds_with_a_signed_request() {
            let producer = producer();
            let notifies = Arc::new(RecordingNotifies::default());
            let transport =
                Arc::new(StubTransport { outcome: Ok(()), seen: Mutex::new(Vec::new()) });
            notifies.due.lock().unwrap().push(task_for(&producer));

            let job = job(producer, notifies.clone(), transport.clone());
            assert_eq!(job.run_once(Utc::now()).await.unwrap(), 1);

            assert_eq!(notifies.successes.lock().unwrap().len(), 1);
            let seen = transport.seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert!(seen[0].authorization.starts_with("SecretId=sid, Timestamp="));
            assert_eq!(seen[0].body["type"], NOTIFY_CLAIM_STATUS_CHANGE);
        }

        #[tokio::test]
        async fn transport_trouble_schedules_a_retry() {
            let producer = producer();
            let notifies = Arc::new(RecordingNotifies::default());
            let transport = Arc::new(StubTransport {
                outcome: Err(DeliveryError { retryable: true, message: "503".into() }),
                seen: Mutex::new(Vec::new()),
            });
            notifies.due.lock().unwrap().push(task_for(&producer));

            let now = Utc::now();
            let job = job(producer, notifies.clone(), transport);
            assert_eq!(job.run_once(now).await.unwrap(), 0);

            let retries = notifies.retries.lock().unwrap();
            assert_eq!(retries.len(), 1);
            assert_eq!(retries[0].1, 0);
            assert_eq!(retries[0].2, now + Duration::seconds(15));
        }

        #[tokio::test]
        async fn exhausted_retries_fail_for_good() {
            let producer = producer();
            let notifies = Arc::new(RecordingNotifies::default());
            let transport = Arc::new(StubTransport {
                outcome: Err(DeliveryError { retryable: true, message: "timeout".into() }),
                seen: Mutex::new(Vec::new()),
            });
            let mut task = task_for(&producer);
            task.status = NotifyStatus::Retry;
            task.retries = 9;
            notifies.due.lock().unwrap().push(task);

            let job = job(producer, notifies.clone(), transport);
            assert_eq!(job.run_once(Utc::now()).await.unwrap(), 0);

            assert!(notifies.retries.lock().unwrap().is_empty());
            assert_eq!(notifies.failures.lock().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn a_refusal_fails_without_retry() {
            let producer = producer();
            let notifies = Arc::new(RecordingNotifies::default());
            let transport = Arc::new(StubTransport {
                outcome: Err(DeliveryError { retryable: false, message: "401".into() }),
                seen: Mutex::new(Vec::new()),
            });
            notifies.due.lock().unwrap().push(task_for(&producer));

            let job = job(producer, notifies.clone(), transport);
            assert_eq!(job.run_once(Utc::now()).await.unwrap(), 0);

            assert!(notifies.retries.lock().unwrap().is_empty());
            assert_eq!(notifies.failures.lock().unwrap()[0].1, "401");
        }

        #[tokio::test]
        async fn a_producer_without_an_endpoint_fails_for_good() {
            let mut producer = producer();
            producer.notify_url = None;
            let notifies = Arc::new(RecordingNotifies::default());
            let transport =
                Arc::new(StubTransport { outcome: Ok(()), seen: Mutex::new(Vec::new()) });
            notifies.due.lock().unwrap().push(task_for(&producer));

            let job = job(producer, notifies.clone(), transport.clone());
            assert_eq!(job.run_once(Utc::now()).await.unwrap(), 0);

            assert!(transport.seen.lock().unwrap().is_empty());
            let failures = notifies.failures.lock().unwrap();
            assert!(failures[0].1.contains("no webhook endpoint"));
        }
    }
}
