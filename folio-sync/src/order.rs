//! Ordering policy shared by every collection store.
//!
//! Order values are written by clients, never renumbered by the server, and
//! may collide or leave gaps. The policy below turns whatever is on the wire
//! into one deterministic total order and computes the writes a reorder
//! needs. It must match what already-synced data expects:
//!
//! - items with an `order` come first, ascending;
//! - equal orders break by `createdAt` descending (missing = epoch);
//! - items without an `order` come after every ordered item, in arrival
//!   sequence regardless of `createdAt`;
//! - removal never renumbers survivors.

use folio_types::{Item, SortPolicy};
use std::cmp::Ordering;

/// The order value reported for items that carry none ("sort last").
pub const UNORDERED: i64 = 9999;

/// Direction of a single-step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards index 0.
    Up,
    /// Towards the end.
    Down,
}

impl Direction {
    /// `-1` for up, `+1` for down.
    #[must_use]
    pub const fn offset(self) -> isize {
        match self {
            Self::Up => -1,
            Self::Down => 1,
        }
    }
}

impl TryFrom<i32> for Direction {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Up),
            1 => Ok(Self::Down),
            other => Err(other),
        }
    }
}

/// A single order-field write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAssignment {
    /// Item to update.
    pub id: String,
    /// New `order` value.
    pub order: i64,
}

/// A mutation against an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOp {
    /// Append a new item.
    Insert,
    /// Swap the item at `index` with its neighbour.
    Move { index: usize, direction: Direction },
    /// Remove an item.
    Remove { id: String },
}

/// The order writes an operation requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPlan {
    /// The new item gets this order value.
    Assign(i64),
    /// Swap the two items' order values.
    Swap([OrderAssignment; 2]),
    /// No order field changes.
    Unchanged,
}

/// Order value of an item for display and reorder purposes.
#[must_use]
pub fn effective_order(item: &Item) -> i64 {
    item.order.unwrap_or(UNORDERED)
}

/// Order value for an appended item: the current item count. Not reserved
/// globally; concurrent inserts from two clients may receive the same value.
#[must_use]
pub fn next_order(items: &[Item]) -> i64 {
    items.len() as i64
}

/// Compares two items under the manual policy, ignoring arrival position.
#[must_use]
pub fn compare_manual(a: &Item, b: &Item) -> Ordering {
    match (a.order, b.order) {
        (Some(x), Some(y)) => x
            .cmp(&y)
            .then_with(|| b.created_millis().cmp(&a.created_millis())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts items in place. The sort is stable, so equal keys keep arrival
/// order.
pub fn sort_items(items: &mut [Item], policy: SortPolicy) {
    match policy {
        SortPolicy::Manual => items.sort_by(compare_manual),
        SortPolicy::NewestFirst => {
            items.sort_by(|a, b| b.created_millis().cmp(&a.created_millis()));
        }
    }
}

/// Computes the order writes for `op` against the current snapshot.
#[must_use]
pub fn reconcile(items: &[Item], op: &OrderOp) -> OrderPlan {
    match op {
        OrderOp::Insert => OrderPlan::Assign(next_order(items)),
        OrderOp::Move { index, direction } => plan_move(items, *index, *direction),
        OrderOp::Remove { .. } => OrderPlan::Unchanged,
    }
}

fn plan_move(items: &[Item], index: usize, direction: Direction) -> OrderPlan {
    let Some(target) = index.checked_add_signed(direction.offset()) else {
        return OrderPlan::Unchanged;
    };
    let (Some(a), Some(b)) = (items.get(index), items.get(target)) else {
        return OrderPlan::Unchanged;
    };

    // Items that never had an order take their position.
    let order_a = a.order.unwrap_or(index as i64);
    let order_b = b.order.unwrap_or(target as i64);

    OrderPlan::Swap([
        OrderAssignment {
            id: a.id.clone(),
            order: order_b,
        },
        OrderAssignment {
            id: b.id.clone(),
            order: order_a,
        },
    ])
}
