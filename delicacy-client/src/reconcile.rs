//! Snapshot reconciler
//!
//! Merges the periodic full snapshot with incremental channel events into a
//! single id-keyed map, and renders it as an ordered, filtered view.
//!
//! There is no version check between the two sources: whichever message is
//! processed last wins.

use shared::message::ChannelEvent;
use shared::order::{OrderPatch, is_urgent};
use shared::util::elapsed_minutes;
use shared::{Order, OrderStatus, Role};
use std::collections::HashMap;

/// Which statuses a view shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    /// pending, accepted, preparing
    Active,
    Only(Vec<OrderStatus>),
}

impl StatusFilter {
    pub fn matches(&self, status: OrderStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => OrderStatus::ACTIVE.contains(&status),
            StatusFilter::Only(statuses) => statuses.contains(&status),
        }
    }

    /// Default filter for a role's view
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Kitchen => StatusFilter::Active,
            Role::Admin | Role::Customer => StatusFilter::All,
        }
    }
}

/// One display row: the order plus fields derived at read time
#[derive(Debug, Clone, PartialEq)]
pub struct OrderView {
    pub order: Order,
    pub elapsed_minutes: i64,
    pub is_urgent: bool,
}

/// Local counts per open status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub accepted: usize,
    pub preparing: usize,
    pub ready: usize,
}

/// Outcome of merging one order or patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Inserted,
    Updated,
    Unchanged,
}

/// id → last known order, for one viewer
#[derive(Debug, Clone)]
pub struct SnapshotReconciler {
    orders: HashMap<i64, Order>,
    urgent_after_minutes: i64,
}

impl SnapshotReconciler {
    pub fn new(urgent_after_minutes: i64) -> Self {
        Self {
            orders: HashMap::new(),
            urgent_after_minutes,
        }
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Replace everything with a full snapshot.
    ///
    /// Duplicate ids collapse to the last occurrence. Returns the number of
    /// distinct orders kept.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Order>) -> usize {
        let received = snapshot.len();
        let mut orders = HashMap::with_capacity(received);
        for order in snapshot {
            if let Err(e) = order.check_totals() {
                tracing::warn!(
                    order_id = order.id,
                    subtotal = ?order.subtotal,
                    tax = ?order.tax_amount,
                    discount = order.discount_amount,
                    total = order.total_amount,
                    "Order totals do not add up: {e}"
                );
            }
            orders.insert(order.id, order);
        }
        if orders.len() != received {
            tracing::debug!(
                received,
                distinct = orders.len(),
                "Collapsed duplicate snapshot rows"
            );
        }
        self.orders = orders;
        self.orders.len()
    }

    /// Insert or overwrite a full order (new_order event, action echo)
    pub fn upsert(&mut self, order: Order) -> Merge {
        let id = order.id;
        match self.orders.insert(id, order) {
            None => Merge::Inserted,
            Some(previous) if self.orders.get(&id) == Some(&previous) => Merge::Unchanged,
            Some(_) => Merge::Updated,
        }
    }

    /// Merge an incremental patch; an unknown id becomes a placeholder row
    pub fn apply_patch(&mut self, patch: &OrderPatch, now: i64) -> Merge {
        match self.orders.get_mut(&patch.id) {
            Some(order) => {
                if order.apply_patch(patch) {
                    Merge::Updated
                } else {
                    Merge::Unchanged
                }
            }
            None => {
                tracing::debug!(order_id = patch.id, "Update for unseen order, inserting");
                self.orders.insert(patch.id, Order::from_patch(patch, now));
                Merge::Inserted
            }
        }
    }

    /// Merge a channel event. `None` when the event carries no order data.
    pub fn apply_event(&mut self, event: &ChannelEvent, now: i64) -> Option<Merge> {
        match event {
            ChannelEvent::NewOrder { order } => Some(self.upsert(order.as_ref().clone())),
            other => other.patch().map(|patch| self.apply_patch(&patch, now)),
        }
    }

    /// Ordered view: created_at ascending, then id ascending
    pub fn view(&self, filter: &StatusFilter, now: i64) -> Vec<OrderView> {
        let mut rows: Vec<&Order> = self
            .orders
            .values()
            .filter(|order| filter.matches(order.status))
            .collect();
        rows.sort_by_key(|order| (order.created_at, order.id));

        rows.into_iter()
            .map(|order| {
                let elapsed = order
                    .server_elapsed_minutes
                    .unwrap_or_else(|| elapsed_minutes(order.created_at, now));
                OrderView {
                    is_urgent: is_urgent(order, elapsed, self.urgent_after_minutes),
                    elapsed_minutes: elapsed,
                    order: order.clone(),
                }
            })
            .collect()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for order in self.orders.values() {
            match order.status {
                OrderStatus::Pending => counts.pending += 1,
                OrderStatus::Accepted => counts.accepted += 1,
                OrderStatus::Preparing => counts.preparing += 1,
                OrderStatus::Ready => counts.ready += 1,
                _ => {}
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MIN: i64 = 60_000;

    fn order(id: i64, status: &str, created_at: i64) -> Order {
        serde_json::from_value(json!({
            "id": id,
            "table_number": id,
            "status": status,
            "created_at": created_at,
        }))
        .unwrap()
    }

    fn status_change(id: i64, status: &str) -> ChannelEvent {
        ChannelEvent::parse(&format!(
            r#"{{"type":"status_change","data":{{"id":{id},"order_status":"{status}"}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_duplicate_snapshot_rows_collapse() {
        let mut rec = SnapshotReconciler::new(15);
        let mut dup = order(1, "pending", 0);
        dup.table_number = 9;
        let kept = rec.apply_snapshot(vec![order(1, "pending", 0), order(2, "ready", 0), dup]);
        assert_eq!(kept, 2);
        assert_eq!(rec.view(&StatusFilter::All, 0).len(), 2);
        assert_eq!(rec.get(1).unwrap().table_number, 9, "last row wins");
    }

    #[test]
    fn test_snapshot_rebuilds_from_scratch() {
        let mut rec = SnapshotReconciler::new(15);
        rec.apply_snapshot(vec![order(1, "pending", 0), order(2, "ready", 0)]);
        rec.apply_snapshot(vec![order(2, "completed", 0)]);
        assert!(rec.get(1).is_none());
        assert_eq!(rec.get(2).unwrap().status, OrderStatus::Completed);
    }

    #[test]
    fn test_update_for_missing_id_is_inserted() {
        let mut rec = SnapshotReconciler::new(15);
        rec.apply_snapshot(vec![order(1, "pending", 0)]);
        let merge = rec.apply_event(&status_change(7, "preparing"), 5 * MIN);
        assert_eq!(merge, Some(Merge::Inserted));
        let placeholder = rec.get(7).unwrap();
        assert_eq!(placeholder.status, OrderStatus::Preparing);
        assert_eq!(placeholder.created_at, 5 * MIN);
    }

    #[test]
    fn test_push_then_stale_poll_last_write_wins() {
        let mut rec = SnapshotReconciler::new(15);
        rec.apply_snapshot(vec![order(1, "pending", 0), order(2, "ready", MIN)]);

        rec.apply_event(&status_change(1, "accepted"), 2 * MIN);
        let view = rec.view(&StatusFilter::All, 2 * MIN);
        assert_eq!(view[0].order.status, OrderStatus::Accepted);
        assert_eq!(view[1].order.status, OrderStatus::Ready);

        // Stale server read still reports pending: it wins until the next poll
        rec.apply_snapshot(vec![order(1, "pending", 0), order(2, "ready", MIN)]);
        assert_eq!(rec.get(1).unwrap().status, OrderStatus::Pending);
    }

    #[test]
    fn test_new_order_event_upserts() {
        let mut rec = SnapshotReconciler::new(15);
        let event = ChannelEvent::NewOrder {
            order: Box::new(order(3, "pending", 0)),
        };
        assert_eq!(rec.apply_event(&event, 0), Some(Merge::Inserted));
        assert_eq!(rec.apply_event(&event, 0), Some(Merge::Unchanged));
        assert_eq!(rec.apply_event(&ChannelEvent::Pong, 0), None);
    }

    #[test]
    fn test_view_order_is_stable() {
        let mut rec = SnapshotReconciler::new(15);
        rec.apply_snapshot(vec![
            order(5, "pending", 2 * MIN),
            order(3, "pending", MIN),
            order(1, "pending", 2 * MIN),
        ]);
        let ids: Vec<i64> = rec
            .view(&StatusFilter::All, 3 * MIN)
            .iter()
            .map(|v| v.order.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 5]);
    }

    #[test]
    fn test_filter_does_not_mutate() {
        let mut rec = SnapshotReconciler::new(15);
        rec.apply_snapshot(vec![
            order(1, "pending", 0),
            order(2, "ready", 0),
            order(3, "preparing", 0),
        ]);
        let active = rec.view(&StatusFilter::Active, 0);
        assert_eq!(active.len(), 2);
        let ready = rec.view(&StatusFilter::Only(vec![OrderStatus::Ready]), 0);
        assert_eq!(ready.len(), 1);
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn test_derived_fields() {
        let mut rec = SnapshotReconciler::new(15);
        let mut from_server = order(2, "preparing", 0);
        from_server.server_elapsed_minutes = Some(3);
        rec.apply_snapshot(vec![
            order(1, "preparing", 0),
            from_server,
            order(3, "completed", 0),
        ]);

        let view = rec.view(&StatusFilter::All, 16 * MIN + 59_000);
        assert_eq!(view[0].elapsed_minutes, 16);
        assert!(view[0].is_urgent);
        assert_eq!(view[1].elapsed_minutes, 3, "server value preferred");
        assert!(!view[1].is_urgent);
        assert!(!view[2].is_urgent, "terminal orders are never urgent");
    }

    #[test]
    fn test_status_counts() {
        let mut rec = SnapshotReconciler::new(15);
        rec.apply_snapshot(vec![
            order(1, "pending", 0),
            order(2, "pending", 0),
            order(3, "ready", 0),
            order(4, "cancelled", 0),
        ]);
        let counts = rec.status_counts();
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.ready, 1);
        assert_eq!(counts.preparing, 0);
    }
}
