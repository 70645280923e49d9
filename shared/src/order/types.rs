//! Order record and its incremental patch
//!
//! Field aliases accept both the list/detail shape (`status`, `items`,
//! `total_amount`) and the legacy dict shape (`order_status`, `items_json`,
//! `total`) served by older backend builds.

use super::status::{OrderStatus, PaymentStatus, TransitionError};
use crate::error::{AppError, AppResult, ErrorCode};
use crate::util::timestamp;
use serde::{Deserialize, Serialize};

/// Tolerance for totals arithmetic (one cent)
pub const TOTALS_TOLERANCE: f64 = 0.01;

/// Portion size of an item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SizeVariant {
    Half,
    Full,
}

/// Line item of an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Menu item ID
    #[serde(default, alias = "id")]
    pub menu_item_id: i64,
    /// Item name
    #[serde(default)]
    pub name: String,
    /// Chosen size (half/full plate)
    #[serde(default, alias = "size", skip_serializing_if = "Option::is_none")]
    pub half_full: Option<SizeVariant>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    /// Unit price
    #[serde(default, alias = "unit_price")]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

impl OrderItem {
    /// price × quantity
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// A customer order as served by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    /// Human-facing order number (e.g. `ORD-20240501-0042`)
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub table_number: i32,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default, alias = "items_json")]
    pub items: Vec<OrderItem>,
    /// Special instructions
    #[serde(default, alias = "special_notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Absent on kitchen and list rows, which only carry the total
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(default, alias = "tax", skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub discount_amount: f64,
    #[serde(default, alias = "total")]
    pub total_amount: f64,
    #[serde(alias = "order_status")]
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Creation timestamp (epoch millis)
    #[serde(with = "timestamp")]
    pub created_at: i64,
    /// Last update timestamp (epoch millis)
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Set only once the order reaches `completed`
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Elapsed minutes as computed by the server, preferred over local clock math
    #[serde(default, alias = "time_elapsed", skip_serializing_if = "Option::is_none")]
    pub server_elapsed_minutes: Option<i64>,
}

impl Order {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Σ line totals
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// `total >= 0`, and when the breakdown is present
    /// `total = subtotal + tax - discount` and `subtotal = Σ lines`, within
    /// one cent.
    ///
    /// Rows that only carry `total_amount` (kitchen and list rows) are
    /// checked for the sign alone.
    pub fn check_totals(&self) -> AppResult<()> {
        let mismatch = |message: &str| {
            AppError::with_message(ErrorCode::OrderTotalsMismatch, message)
                .with_detail("order_id", self.id)
                .with_detail("total", self.total_amount)
        };

        if self.total_amount < 0.0 {
            return Err(mismatch("total is negative"));
        }
        let (Some(subtotal), Some(tax)) = (self.subtotal, self.tax_amount) else {
            return Ok(());
        };

        let expected = subtotal + tax - self.discount_amount;
        if (expected - self.total_amount).abs() > TOTALS_TOLERANCE {
            return Err(mismatch("total != subtotal + tax - discount")
                .with_detail("expected", expected));
        }
        if !self.items.is_empty() && (self.items_total() - subtotal).abs() > TOTALS_TOLERANCE {
            return Err(mismatch("line items do not sum to subtotal")
                .with_detail("items_total", self.items_total()));
        }
        Ok(())
    }

    pub fn totals_consistent(&self) -> bool {
        self.check_totals().is_ok()
    }

    /// Move to `to` if the lifecycle allows it.
    ///
    /// On error the order is left untouched.
    pub fn transition_to(&mut self, to: OrderStatus, at: i64) -> Result<(), TransitionError> {
        self.status = self.status.transition(to)?;
        self.updated_at = Some(at);
        if to == OrderStatus::Completed {
            self.completed_at = Some(at);
        }
        Ok(())
    }

    /// Merge the whitelisted fields of a patch (status, payment status,
    /// update time). Returns whether anything changed.
    ///
    /// No lifecycle validation: the server already accepted the change and
    /// the last message processed wins.
    pub fn apply_patch(&mut self, patch: &OrderPatch) -> bool {
        let mut changed = false;
        if let Some(status) = patch.status
            && status != self.status
        {
            self.status = status;
            changed = true;
        }
        if let Some(payment_status) = patch.payment_status
            && payment_status != self.payment_status
        {
            self.payment_status = payment_status;
            changed = true;
        }
        if let Some(updated_at) = patch.updated_at
            && Some(updated_at) != self.updated_at
        {
            self.updated_at = Some(updated_at);
            changed = true;
        }
        changed
    }

    /// Placeholder row for a patch whose order has not been seen yet.
    ///
    /// Descriptive fields come from the patch where present; the next
    /// snapshot replaces the row wholesale.
    pub fn from_patch(patch: &OrderPatch, now: i64) -> Self {
        Self {
            id: patch.id,
            order_number: patch.order_number.clone().unwrap_or_default(),
            table_number: patch.table_number.unwrap_or_default(),
            customer_name: String::new(),
            customer_phone: String::new(),
            items: Vec::new(),
            notes: None,
            subtotal: None,
            tax_amount: None,
            discount_code: None,
            discount_amount: 0.0,
            total_amount: patch.total_amount.unwrap_or_default(),
            status: patch.status.unwrap_or_default(),
            payment_status: patch.payment_status.unwrap_or_default(),
            created_at: patch.created_at.unwrap_or(now),
            updated_at: patch.updated_at,
            completed_at: None,
            server_elapsed_minutes: None,
        }
    }
}

/// Partial order carried by incremental channel events
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderPatch {
    #[serde(alias = "order_id")]
    pub id: i64,
    #[serde(default, alias = "order_status", skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,

    // Descriptive fields, only used to seed a placeholder row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i32>,
    #[serde(default, alias = "total", skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl OrderPatch {
    pub fn status_only(id: i64, status: OrderStatus) -> Self {
        Self {
            id,
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Body of `PUT /api/orders/{id}/status`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}
