//! Authoritative storage of goods.
//!
//! [`GoodsRepository`] is the seam between the service and the store. Two
//! implementations exist:
//!
//! - [`PgGoodsRepository`]: PostgreSQL via `sqlx`, serializable transactions
//!   for updates and reprioritization
//! - [`InMemoryGoodsRepository`]: a single-lock store for local runs and tests

mod memory;
mod postgres;

pub use memory::InMemoryGoodsRepository;
pub use postgres::PgGoodsRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::goods::{Good, GoodCreate, GoodUpdate, GoodsPage, ListParams};

/// Store operations the service depends on.
///
/// "Absent" outcomes are `Ok(None)` / `Ok(false)`, never errors, so callers
/// can tell a missing good from a failed store.
#[async_trait]
pub trait GoodsRepository: Send + Sync {
    /// Insert a good at the end of its project's ordering.
    async fn create(&self, input: &GoodCreate) -> Result<Good>;

    /// Fetch a non-removed good.
    async fn get(&self, id: i64) -> Result<Option<Good>>;

    /// Patch name/description of a non-removed good.
    async fn update(&self, id: i64, patch: &GoodUpdate) -> Result<Option<Good>>;

    /// Soft-delete. `false` when the good is missing or already removed.
    async fn remove(&self, id: i64) -> Result<bool>;

    /// Non-removed goods ordered by priority, with table-wide counters.
    async fn list(&self, params: ListParams) -> Result<GoodsPage>;

    /// Move a good to `new_priority` and renumber the siblings it displaces.
    ///
    /// Returns every good whose priority row was rewritten (the target
    /// included), ordered by resulting priority, or `None` when the good is
    /// absent, removed, or belongs to another project. Either the whole move
    /// commits or nothing does.
    async fn reprioritize(
        &self,
        id: i64,
        project_id: i64,
        new_priority: i32,
    ) -> Result<Option<Vec<Good>>>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<()>;

    /// Get the store name.
    fn name(&self) -> &'static str;
}
