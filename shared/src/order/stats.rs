//! Kitchen statistics (`GET /api/kitchen/stats`)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KitchenStats {
    #[serde(default)]
    pub pending_orders: u32,
    #[serde(default)]
    pub preparing_orders: u32,
    #[serde(default)]
    pub ready_orders: u32,
    #[serde(default)]
    pub completed_today: u32,
    #[serde(default)]
    pub total_revenue_today: f64,
}

impl KitchenStats {
    /// Orders still on the pass (pending + preparing + ready)
    pub fn open_orders(&self) -> u32 {
        self.pending_orders + self.preparing_orders + self.ready_orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let stats: KitchenStats =
            serde_json::from_str(r#"{"pending_orders":3,"ready_orders":1}"#).unwrap();
        assert_eq!(stats.open_orders(), 4);
        assert_eq!(stats.total_revenue_today, 0.0);
    }
}
