//! Goods service: the store, the cache and the audit trail in one place.
//!
//! Every successful mutation follows the same sequence:
//!
//! 1. commit in the store (retrying serialization conflicts)
//! 2. delete the cache entry of every changed good
//! 3. publish one audit event
//!
//! Steps 2 and 3 are best-effort. Their failures are logged and surface only
//! through [`Mutation::audit`], never as an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::audit::{AuditLogger, Delivery};
use crate::cache::GoodsCache;
use crate::config::StoreConfig;
use crate::error::{GoodsError, Result};
use crate::events::Action;
use crate::goods::{
    Good, GoodCreate, GoodUpdate, GoodsPage, ListParams, ReprioritizeAudit, ReprioritizeRequest,
};
use crate::repository::GoodsRepository;
use crate::telemetry::PipelineMetrics;

/// Result of a committed mutation plus the fate of its audit event.
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub audit: Delivery,
}

/// How serialization conflicts are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,
    /// Sleep before the first retry, doubled after each one
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(10),
        }
    }
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            retries: config.conflict_retries,
            backoff: config.retry_backoff,
        }
    }
}

#[derive(Clone)]
pub struct GoodsService {
    repo: Arc<dyn GoodsRepository>,
    cache: GoodsCache,
    audit: AuditLogger,
    retry: RetryPolicy,
}

impl GoodsService {
    pub fn new(repo: Arc<dyn GoodsRepository>, cache: GoodsCache, audit: AuditLogger) -> Self {
        Self {
            repo,
            cache,
            audit,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[instrument(skip(self, input), fields(project_id = input.project_id))]
    pub async fn create(&self, input: &GoodCreate) -> Result<Mutation<Good>> {
        input.validate()?;

        let good = self.repo.create(input).await?;
        debug!(good_id = good.id, priority = good.priority, "Good created");

        let audit = self.audit.publish(Action::Create, good.id, &good).await;
        Ok(Mutation { value: good, audit })
    }

    /// Read-through get.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Good> {
        if let Some(good) = self.cache.get(id).await {
            return Ok(good);
        }

        let good = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| GoodsError::not_found("Good", id.to_string()))?;

        self.cache.set(&good).await;
        Ok(good)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: &GoodUpdate) -> Result<Mutation<Good>> {
        patch.validate()?;

        let good = self
            .retry_on_conflict(Action::Update, || self.repo.update(id, patch))
            .await?
            .ok_or_else(|| GoodsError::not_found("Good", id.to_string()))?;

        self.cache.invalidate(&[id]).await;
        let audit = self.audit.publish(Action::Update, id, &good).await;
        Ok(Mutation { value: good, audit })
    }

    /// Soft delete. Missing or already removed goods are not found and leave
    /// the cache and the audit trail untouched.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: i64) -> Result<Mutation<()>> {
        let removed = self
            .retry_on_conflict(Action::Delete, || self.repo.remove(id))
            .await?;
        if !removed {
            return Err(GoodsError::not_found("Good", id.to_string()));
        }

        self.cache.invalidate(&[id]).await;
        let audit = self
            .audit
            .publish(Action::Delete, id, &serde_json::Value::Null)
            .await;
        Ok(Mutation { value: (), audit })
    }

    #[instrument(skip(self))]
    pub async fn list(&self, params: ListParams) -> Result<GoodsPage> {
        self.repo.list(params).await
    }

    /// Move a good and return every good whose priority changed.
    #[instrument(skip(self))]
    pub async fn reprioritize(
        &self,
        id: i64,
        project_id: i64,
        new_priority: i32,
    ) -> Result<Mutation<Vec<Good>>> {
        ReprioritizeRequest { new_priority }.validate()?;

        let changed = self
            .retry_on_conflict(Action::Reprioritize, || {
                self.repo.reprioritize(id, project_id, new_priority)
            })
            .await?
            .ok_or_else(|| GoodsError::not_found("Good", id.to_string()))?;

        let ids: Vec<i64> = changed.iter().map(|g| g.id).collect();
        self.cache.invalidate(&ids).await;

        let payload = ReprioritizeAudit {
            project_id,
            new_priority,
            updated_ids: changed.clone(),
        };
        let audit = self.audit.publish(Action::Reprioritize, id, &payload).await;

        debug!(good_id = id, changed = ids.len(), "Good reprioritized");
        Ok(Mutation {
            value: changed,
            audit,
        })
    }

    /// Check the store answers.
    pub async fn ready(&self) -> Result<()> {
        self.repo.ping().await
    }

    pub fn store_name(&self) -> &'static str {
        self.repo.name()
    }

    async fn retry_on_conflict<T, F, Fut>(&self, action: Action, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.retry.backoff;
        let mut attempt = 0;

        loop {
            match op().await {
                Err(e) if e.is_conflict() => {
                    if action == Action::Reprioritize {
                        PipelineMetrics::reprioritize_conflict();
                    }
                    if attempt >= self.retry.retries {
                        return Err(e);
                    }
                    attempt += 1;
                    warn!(
                        action = %action,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Serialization conflict, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                other => return other,
            }
        }
    }
}
