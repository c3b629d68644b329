//! Priority reordering.
//!
//! Moving a good to a new priority is split in two phases. The store reads
//! the affected siblings inside its transaction, [`plan`] computes their new
//! values, and the store applies the plan in one bulk write. Keeping the
//! planning step pure lets every store share it and lets it be tested
//! without a database.
//!
//! Given the target's new priority `p`, the other non-removed goods of the
//! project with priority `>= p` are walked in `(priority, id)` order. Each one
//! moves up only as far as needed to sit above the previous slot, so a gap in
//! the sequence absorbs the shift and nothing above it changes. Goods below
//! `p` are never touched, so non-removed priorities stay distinct after every
//! move.

use crate::error::{GoodsError, Result};

/// A good's id with its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub id: i64,
    pub priority: i32,
}

impl Slot {
    pub const fn new(id: i64, priority: i32) -> Self {
        Self { id, priority }
    }
}

/// Result of planning one move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    /// The moved good at its new priority.
    pub target: Slot,
    /// Siblings whose priority changes, with their new values, ascending.
    pub shifted: Vec<Slot>,
}

impl ReorderPlan {
    /// Every slot the plan writes, target first.
    pub fn assignments(&self) -> impl Iterator<Item = Slot> + '_ {
        std::iter::once(self.target).chain(self.shifted.iter().copied())
    }

    /// Ids of every good whose priority row is rewritten.
    pub fn changed_ids(&self) -> Vec<i64> {
        self.assignments().map(|slot| slot.id).collect()
    }

    /// Parallel id / priority arrays for a bulk `UNNEST` update of the siblings.
    pub fn shifted_columns(&self) -> (Vec<i64>, Vec<i32>) {
        self.shifted.iter().map(|s| (s.id, s.priority)).unzip()
    }

    /// True when no sibling moves.
    pub fn is_isolated(&self) -> bool {
        self.shifted.is_empty()
    }
}

/// Plan moving `target_id` to `new_priority`.
///
/// `siblings` are the project's other non-removed goods with their current
/// priorities. Entries for the target itself and entries below
/// `new_priority` are ignored, so callers may pass a wider set.
///
/// Only siblings whose value actually changes appear in
/// [`ReorderPlan::shifted`].
pub fn plan(target_id: i64, new_priority: i32, siblings: &[Slot]) -> Result<ReorderPlan> {
    if new_priority < 1 {
        return Err(GoodsError::validation("priority must be a positive integer"));
    }

    let mut affected: Vec<Slot> = siblings
        .iter()
        .copied()
        .filter(|s| s.id != target_id && s.priority >= new_priority)
        .collect();
    affected.sort_by_key(|s| (s.priority, s.id));

    let mut shifted = Vec::new();
    let mut floor = i64::from(new_priority);
    for slot in affected {
        let next = (floor + 1).max(i64::from(slot.priority));
        let next = i32::try_from(next)
            .map_err(|_| GoodsError::validation("priority out of range"))?;
        if next != slot.priority {
            shifted.push(Slot::new(slot.id, next));
        }
        floor = i64::from(next);
    }

    Ok(ReorderPlan {
        target: Slot::new(target_id, new_priority),
        shifted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn project(priorities: &[(i64, i32)]) -> Vec<Slot> {
        priorities.iter().map(|&(id, p)| Slot::new(id, p)).collect()
    }

    /// Apply a plan to a whole project and return id -> priority.
    fn apply(slots: &[Slot], plan: &ReorderPlan) -> HashMap<i64, i32> {
        let mut state: HashMap<i64, i32> = slots.iter().map(|s| (s.id, s.priority)).collect();
        for slot in plan.assignments() {
            state.insert(slot.id, slot.priority);
        }
        state
    }

    #[test]
    fn test_move_last_to_second() {
        // ids 1..=4 at priorities 1..=4; move id 4 to priority 2
        let slots = project(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        let plan = plan(4, 2, &slots).unwrap();

        assert_eq!(plan.target, Slot::new(4, 2));
        assert_eq!(plan.shifted, vec![Slot::new(2, 3), Slot::new(3, 4)]);

        let state = apply(&slots, &plan);
        assert_eq!(state[&1], 1);
        assert_eq!(state[&4], 2);
        assert_eq!(state[&2], 3);
        assert_eq!(state[&3], 4);
    }

    #[test]
    fn test_move_to_own_priority_is_idempotent() {
        let slots = project(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        let plan = plan(2, 2, &slots).unwrap();

        assert!(plan.is_isolated());
        assert_eq!(plan.changed_ids(), vec![2]);
    }

    #[test]
    fn test_move_beyond_end_appends() {
        let slots = project(&[(1, 1), (2, 2), (3, 3)]);
        let plan = plan(1, 10, &slots).unwrap();

        assert_eq!(plan.target, Slot::new(1, 10));
        assert!(plan.shifted.is_empty());
    }

    #[test]
    fn test_move_down_leaves_lower_slots() {
        let slots = project(&[(1, 1), (2, 2), (3, 3), (4, 4)]);
        let plan = plan(1, 3, &slots).unwrap();

        assert_eq!(plan.shifted, vec![Slot::new(3, 4), Slot::new(4, 5)]);
        let state = apply(&slots, &plan);
        assert_eq!(state[&2], 2);
        assert_eq!(state[&1], 3);
    }

    #[test]
    fn test_ties_keep_id_order() {
        // two goods already share priority 2
        let slots = project(&[(5, 2), (3, 2), (9, 1)]);
        let plan = plan(9, 2, &slots).unwrap();

        assert_eq!(plan.shifted, vec![Slot::new(3, 3), Slot::new(5, 4)]);
    }

    #[test]
    fn test_gap_absorbs_shift() {
        // the good at 10 already sits above the shifted one
        let slots = project(&[(1, 1), (2, 2), (3, 10)]);
        let plan = plan(1, 2, &slots).unwrap();

        assert_eq!(plan.shifted, vec![Slot::new(2, 3)]);
        let state = apply(&slots, &plan);
        assert_eq!(state[&3], 10);
    }

    #[test]
    fn test_shift_stops_at_first_gap() {
        let slots = project(&[(1, 1), (2, 2), (3, 3), (4, 5), (5, 6)]);
        let plan = plan(5, 2, &slots).unwrap();

        // 2 -> 3, 3 -> 4, then 5 is already free of the collision
        assert_eq!(plan.shifted, vec![Slot::new(2, 3), Slot::new(3, 4)]);
    }

    #[test]
    fn test_self_move_over_gap_is_idempotent() {
        // priority 3 was freed by a soft delete
        let slots = project(&[(1, 1), (2, 2), (4, 4)]);
        let plan = plan(2, 2, &slots).unwrap();

        assert!(plan.is_isolated());
        assert_eq!(plan.changed_ids(), vec![2]);
    }

    #[test]
    fn test_already_consecutive_siblings_are_not_reported() {
        // target leaves 2 for 3; goods at 4 and 5 already sit above it
        let slots = project(&[(1, 1), (2, 2), (3, 4), (4, 5)]);
        let plan = plan(2, 3, &slots).unwrap();

        assert!(plan.shifted.is_empty());
        assert_eq!(plan.changed_ids(), vec![2]);
    }

    #[test]
    fn test_rejects_non_positive_priority() {
        assert!(plan(1, 0, &[]).is_err());
        assert!(plan(1, -5, &[]).is_err());
    }

    #[test]
    fn test_rejects_overflow() {
        let slots = project(&[(1, i32::MAX), (2, i32::MAX)]);
        assert!(plan(3, i32::MAX, &slots).is_err());
    }

    #[test]
    fn test_sequences_keep_priorities_distinct() {
        let mut state: HashMap<i64, i32> = (1..=8).map(|id| (id, id as i32)).collect();
        // deterministic pseudo-random walk
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let id = (seed % 8) as i64 + 1;
            let priority = (seed >> 8) % 12 + 1;

            let slots: Vec<Slot> = state.iter().map(|(&id, &p)| Slot::new(id, p)).collect();
            let plan = plan(id, priority as i32, &slots).unwrap();
            for slot in plan.assignments() {
                state.insert(slot.id, slot.priority);
            }

            let distinct: HashSet<i32> = state.values().copied().collect();
            assert_eq!(distinct.len(), state.len());
            assert!(state.values().all(|&p| p >= 1));
        }
    }
}
