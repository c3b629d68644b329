//! In-memory goods store.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::GoodsRepository;
use crate::error::Result;
use crate::goods::{Good, GoodCreate, GoodUpdate, GoodsPage, ListParams};
use crate::reorder::{self, Slot};

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<i64, Good>,
    last_id: i64,
}

/// Goods held in a `BTreeMap` behind one lock.
///
/// Every operation takes the lock for its whole duration, so moves are
/// serialized and never conflict.
#[derive(Debug, Default)]
pub struct InMemoryGoodsRepository {
    state: RwLock<State>,
}

impl InMemoryGoodsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, removed ones included.
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl GoodsRepository for InMemoryGoodsRepository {
    async fn create(&self, input: &GoodCreate) -> Result<Good> {
        let mut state = self.state.write();

        let priority = state
            .rows
            .values()
            .filter(|g| g.project_id == input.project_id)
            .map(|g| g.priority)
            .max()
            .unwrap_or(0)
            + 1;

        state.last_id += 1;
        let good = Good {
            id: state.last_id,
            project_id: input.project_id,
            name: input.name.clone(),
            description: input.description.clone().unwrap_or_default(),
            priority,
            removed: false,
            created_at: Utc::now(),
        };
        state.rows.insert(good.id, good.clone());
        Ok(good)
    }

    async fn get(&self, id: i64) -> Result<Option<Good>> {
        Ok(self
            .state
            .read()
            .rows
            .get(&id)
            .filter(|g| !g.removed)
            .cloned())
    }

    async fn update(&self, id: i64, patch: &GoodUpdate) -> Result<Option<Good>> {
        let mut state = self.state.write();
        match state.rows.get_mut(&id) {
            Some(good) if !good.removed => {
                patch.apply(good);
                Ok(Some(good.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        let mut state = self.state.write();
        match state.rows.get_mut(&id) {
            Some(good) if !good.removed => {
                good.removed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, params: ListParams) -> Result<GoodsPage> {
        let state = self.state.read();

        let total = state.rows.len() as i64;
        let removed = state.rows.values().filter(|g| g.removed).count() as i64;

        let mut live: Vec<&Good> = state.rows.values().filter(|g| !g.removed).collect();
        live.sort_by_key(|g| (g.priority, g.id));

        let goods = live
            .into_iter()
            .skip(params.offset as usize)
            .take(params.limit as usize)
            .cloned()
            .collect();

        Ok(GoodsPage {
            goods,
            total,
            removed,
        })
    }

    async fn reprioritize(
        &self,
        id: i64,
        project_id: i64,
        new_priority: i32,
    ) -> Result<Option<Vec<Good>>> {
        let mut state = self.state.write();

        match state.rows.get(&id) {
            Some(g) if g.project_id == project_id && !g.removed => {}
            _ => return Ok(None),
        }

        let siblings: Vec<Slot> = state
            .rows
            .values()
            .filter(|g| g.project_id == project_id && !g.removed && g.id != id)
            .map(|g| Slot::new(g.id, g.priority))
            .collect();

        // Planning can fail; nothing is written before it succeeds.
        let plan = reorder::plan(id, new_priority, &siblings)?;

        let mut changed = Vec::with_capacity(plan.shifted.len() + 1);
        for slot in plan.assignments() {
            if let Some(good) = state.rows.get_mut(&slot.id) {
                good.priority = slot.priority;
                changed.push(good.clone());
            }
        }
        changed.sort_by_key(|g| (g.priority, g.id));

        Ok(Some(changed))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(project_id: i64, name: &str) -> GoodCreate {
        GoodCreate {
            project_id,
            name: name.to_string(),
            description: None,
        }
    }

    async fn seeded(count: usize) -> InMemoryGoodsRepository {
        let repo = InMemoryGoodsRepository::new();
        for i in 0..count {
            repo.create(&input(1, &format!("good-{}", i))).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn test_create_appends_per_project() {
        let repo = InMemoryGoodsRepository::new();
        let a = repo.create(&input(1, "a")).await.unwrap();
        let b = repo.create(&input(1, "b")).await.unwrap();
        let c = repo.create(&input(2, "c")).await.unwrap();

        assert_eq!((a.id, a.priority), (1, 1));
        assert_eq!((b.id, b.priority), (2, 2));
        assert_eq!((c.id, c.priority), (3, 1));
    }

    #[tokio::test]
    async fn test_removed_goods_are_hidden() {
        let repo = seeded(2).await;
        assert!(repo.remove(1).await.unwrap());
        assert!(!repo.remove(1).await.unwrap());
        assert!(!repo.remove(99).await.unwrap());

        assert!(repo.get(1).await.unwrap().is_none());
        assert!(repo.update(1, &GoodUpdate::default()).await.unwrap().is_none());

        let page = repo.list(ListParams::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.removed, 1);
        assert_eq!(page.goods.len(), 1);
    }

    #[tokio::test]
    async fn test_list_pages_by_priority() {
        let repo = seeded(5).await;
        repo.reprioritize(5, 1, 1).await.unwrap();

        let page = repo.list(ListParams::new(2, 1).unwrap()).await.unwrap();
        let ids: Vec<i64> = page.goods.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_reprioritize_fixture() {
        let repo = seeded(4).await;
        let changed = repo.reprioritize(4, 1, 2).await.unwrap().unwrap();

        let pairs: Vec<(i64, i32)> = changed.iter().map(|g| (g.id, g.priority)).collect();
        assert_eq!(pairs, vec![(4, 2), (2, 3), (3, 4)]);
        assert_eq!(repo.get(1).await.unwrap().unwrap().priority, 1);
    }

    #[tokio::test]
    async fn test_reprioritize_wrong_project_is_absent() {
        let repo = seeded(2).await;
        assert!(repo.reprioritize(1, 2, 1).await.unwrap().is_none());
        assert_eq!(repo.get(1).await.unwrap().unwrap().priority, 1);
    }

    #[tokio::test]
    async fn test_self_move_after_soft_delete_changes_only_target() {
        let repo = seeded(4).await;
        assert!(repo.remove(3).await.unwrap());

        let changed = repo.reprioritize(2, 1, 2).await.unwrap().unwrap();
        let pairs: Vec<(i64, i32)> = changed.iter().map(|g| (g.id, g.priority)).collect();
        assert_eq!(pairs, vec![(2, 2)]);
        assert_eq!(repo.get(4).await.unwrap().unwrap().priority, 4);
    }
}
