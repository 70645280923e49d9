//! Terminal rendering and the new-order bell

use async_trait::async_trait;
use delicacy_client::{AlertSink, Board, NewOrderAlert, Notice, OrderView};
use std::io::Write;

/// Rings the terminal bell on new orders
pub struct BellSink {
    sound_enabled: bool,
}

impl BellSink {
    pub fn new(sound_enabled: bool) -> Self {
        Self { sound_enabled }
    }
}

#[async_trait]
impl AlertSink for BellSink {
    async fn notify(&self, alert: &NewOrderAlert) -> anyhow::Result<()> {
        let tables: Vec<String> = alert
            .labels
            .iter()
            .map(|(number, table)| format!("{number} (table {table})"))
            .collect();
        tracing::info!(count = alert.len(), "🔔 New orders: {}", tables.join(", "));

        if self.sound_enabled {
            let mut out = std::io::stdout().lock();
            out.write_all(b"\x07")?;
            out.flush()?;
        }
        Ok(())
    }
}

/// One line per order: `#ORD-0042  T4  Preparing  12m  [Mark Ready]  !`
pub fn order_line(row: &OrderView) -> String {
    let order = &row.order;
    let action = order
        .status
        .advance_action()
        .map(|action| format!("  [{}]", action.label))
        .unwrap_or_default();
    let urgent = if row.is_urgent { "  !" } else { "" };
    let number = if order.order_number.is_empty() {
        order.id.to_string()
    } else {
        order.order_number.clone()
    };
    format!(
        "#{number:<10} T{:<3} {:<10} {:>3}m{action}{urgent}",
        order.table_number,
        order.status.label(),
        row.elapsed_minutes,
    )
}

/// Summary header for a board
pub fn summary_line(board: &Board) -> String {
    let counts = &board.counts;
    let mut line = format!(
        "new {} | confirmed {} | preparing {} | ready {}",
        counts.pending, counts.accepted, counts.preparing, counts.ready
    );
    if let Some(stats) = &board.stats {
        line.push_str(&format!(
            " | done today {} | revenue {:.2}",
            stats.completed_today, stats.total_revenue_today
        ));
    }
    if !board.online {
        line.push_str(" | OFFLINE");
    }
    line
}

pub fn render(board: &Board) {
    tracing::info!(channel = board.channel.as_str(), "{}", summary_line(board));
    for row in &board.orders {
        if row.is_urgent {
            tracing::warn!("{}", order_line(row));
        } else {
            tracing::info!("{}", order_line(row));
        }
    }
}

pub fn log_notice(notice: &Notice) {
    match notice {
        // Already logged by the bell
        Notice::NewOrders(_) => {}
        Notice::PollFailed { message } => tracing::warn!("Refresh failed: {message}"),
        Notice::ActionFailed { order_id, message } => {
            tracing::warn!(order_id, "Action failed: {message}")
        }
        Notice::StatusChanged { order_id, status } => {
            tracing::info!(order_id, "Order is now {}", status.label())
        }
        Notice::Connectivity { online: true } => tracing::info!("Back online"),
        Notice::Connectivity { online: false } => tracing::warn!("Backend unreachable"),
        Notice::ChannelLost => tracing::warn!("Live updates unavailable, polling only"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delicacy_client::StatusCounts;
    use shared::Order;
    use shared::order::KitchenStats;

    fn row(status: &str, urgent: bool) -> OrderView {
        let order: Order = serde_json::from_value(serde_json::json!({
            "id": 42,
            "order_number": "ORD-0042",
            "table_number": 4,
            "status": status,
            "created_at": 0,
        }))
        .unwrap();
        OrderView {
            order,
            elapsed_minutes: 12,
            is_urgent: urgent,
        }
    }

    #[test]
    fn test_order_line() {
        let line = order_line(&row("preparing", false));
        assert!(line.starts_with("#ORD-0042"));
        assert!(line.contains("Preparing"));
        assert!(line.contains("12m"));
        assert!(line.contains("[Mark Ready]"));
        assert!(!line.ends_with('!'));

        let done = order_line(&row("completed", false));
        assert!(done.contains("Done"));
        assert!(!done.contains('['));

        assert!(order_line(&row("pending", true)).ends_with('!'));
    }

    #[test]
    fn test_summary_line() {
        let mut board = Board {
            counts: StatusCounts {
                pending: 2,
                accepted: 1,
                preparing: 3,
                ready: 0,
            },
            online: true,
            ..Default::default()
        };
        assert_eq!(
            summary_line(&board),
            "new 2 | confirmed 1 | preparing 3 | ready 0"
        );

        board.stats = Some(KitchenStats {
            completed_today: 9,
            total_revenue_today: 1234.5,
            ..Default::default()
        });
        board.online = false;
        let line = summary_line(&board);
        assert!(line.contains("done today 9 | revenue 1234.50"));
        assert!(line.ends_with("OFFLINE"));
    }

    #[tokio::test]
    async fn test_silent_bell_still_succeeds() {
        let sink = BellSink::new(false);
        let alert = NewOrderAlert {
            order_ids: vec![1],
            labels: vec![("ORD-1".into(), 3)],
        };
        assert!(sink.notify(&alert).await.is_ok());
    }
}
