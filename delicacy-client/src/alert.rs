//! New-order alert trigger
//!
//! Fires once per order id over a session, never on the first pass (orders
//! already waiting when the display starts are not "new").

use async_trait::async_trait;
use shared::{Order, OrderStatus};
use std::collections::HashSet;

/// One alert covering every newly seen pending order of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderAlert {
    /// Order ids, ascending
    pub order_ids: Vec<i64>,
    /// `(order number, table)` per order, same order as `order_ids`
    pub labels: Vec<(String, i32)>,
}

impl NewOrderAlert {
    pub fn len(&self) -> usize {
        self.order_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_ids.is_empty()
    }
}

/// Where alerts go (sound, vibration, banner...)
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &NewOrderAlert) -> anyhow::Result<()>;
}

/// Deliver an alert, logging and swallowing any sink failure
pub async fn deliver(sink: &dyn AlertSink, alert: &NewOrderAlert) {
    if let Err(e) = sink.notify(alert).await {
        tracing::warn!(orders = ?alert.order_ids, "Alert delivery failed: {e}");
    }
}

/// Tracks which pending orders have already been announced
#[derive(Debug, Default)]
pub struct AlertTrigger {
    alerted: HashSet<i64>,
    primed: bool,
}

impl AlertTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the first pass has happened
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub fn alerted_count(&self) -> usize {
        self.alerted.len()
    }

    /// Inspect one reconciliation pass over the current orders.
    ///
    /// Ids absent from `orders` are forgotten.
    pub fn observe<'a, I>(&mut self, orders: I) -> Option<NewOrderAlert>
    where
        I: IntoIterator<Item = &'a Order>,
    {
        let mut present = HashSet::new();
        let mut fresh: Vec<&Order> = Vec::new();
        for order in orders {
            present.insert(order.id);
            if order.status == OrderStatus::Pending && !self.alerted.contains(&order.id) {
                fresh.push(order);
            }
        }

        self.alerted.retain(|id| present.contains(id));
        self.alerted.extend(fresh.iter().map(|order| order.id));

        if !self.primed {
            self.primed = true;
            if !fresh.is_empty() {
                tracing::debug!(count = fresh.len(), "Initial pending orders, not alerting");
            }
            return None;
        }

        if fresh.is_empty() {
            return None;
        }

        fresh.sort_by_key(|order| order.id);
        Some(NewOrderAlert {
            order_ids: fresh.iter().map(|order| order.id).collect(),
            labels: fresh
                .iter()
                .map(|order| (order.order_number.clone(), order.table_number))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn order(id: i64, status: &str) -> Order {
        serde_json::from_value(json!({
            "id": id,
            "order_number": format!("ORD-{id}"),
            "table_number": 1,
            "status": status,
            "created_at": 0,
        }))
        .unwrap()
    }

    #[test]
    fn test_first_pass_is_silent() {
        let mut trigger = AlertTrigger::new();
        let orders = vec![order(1, "pending"), order(2, "pending"), order(3, "pending")];
        assert!(trigger.observe(&orders).is_none());
        assert!(trigger.is_primed());

        let mut next = orders.clone();
        next.push(order(4, "pending"));
        let alert = trigger.observe(&next).unwrap();
        assert_eq!(alert.order_ids, vec![4]);
        assert_eq!(alert.labels, vec![("ORD-4".to_string(), 1)]);
    }

    #[test]
    fn test_at_most_once_per_order() {
        let mut trigger = AlertTrigger::new();
        trigger.observe(&Vec::<Order>::new());

        let orders = vec![order(1, "pending"), order(2, "pending")];
        assert_eq!(trigger.observe(&orders).unwrap().len(), 2);
        assert!(trigger.observe(&orders).is_none());
        assert!(trigger.observe(&orders).is_none());
    }

    #[test]
    fn test_only_pending_orders_alert() {
        let mut trigger = AlertTrigger::new();
        trigger.observe(&Vec::<Order>::new());
        assert!(trigger.observe(&[order(1, "accepted"), order(2, "ready")]).is_none());
    }

    #[test]
    fn test_prunes_absent_ids() {
        let mut trigger = AlertTrigger::new();
        trigger.observe(&[order(1, "pending"), order(2, "pending")]);
        assert_eq!(trigger.alerted_count(), 2);

        trigger.observe(&[order(2, "accepted")]);
        assert_eq!(trigger.alerted_count(), 1);
    }

    struct FailingSink(Mutex<u32>);

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn notify(&self, _alert: &NewOrderAlert) -> anyhow::Result<()> {
            *self.0.lock().unwrap() += 1;
            anyhow::bail!("no audio device")
        }
    }

    #[tokio::test]
    async fn test_sink_errors_are_swallowed() {
        let sink = FailingSink(Mutex::new(0));
        let alert = NewOrderAlert {
            order_ids: vec![1],
            labels: vec![("ORD-1".into(), 1)],
        };
        deliver(&sink, &alert).await;
        assert_eq!(*sink.0.lock().unwrap(), 1);
    }
}
