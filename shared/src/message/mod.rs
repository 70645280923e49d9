//! 实时通道消息类型定义
//!
//! 服务器推送 [`ChannelEvent`]，客户端发送 [`ClientMessage`]。
//! 两者都是 JSON 文本帧，以 `type` 字段区分。

use crate::error::{AppError, AppResult};
use crate::order::{Order, OrderPatch, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 连接角色 (决定通道路径 `/ws/<role>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Kitchen,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Kitchen => "kitchen",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "kitchen" => Ok(Role::Kitchen),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::validation(format!("unknown role: {other}"))),
        }
    }
}

/// 服务器推送事件
///
/// 未知 `type` 解析为 [`ChannelEvent::Unknown`]，由调用方忽略。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// 新订单 (完整订单，位于 `order` 或 `data`)
    NewOrder {
        #[serde(alias = "data")]
        order: Box<Order>,
    },
    /// 订单更新；无负载时仅作为刷新提示 (旧版服务器发送 `order_update` + `data`)
    #[serde(alias = "order_update")]
    OrderUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<OrderStatus>,
        #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
        order: Option<OrderPatch>,
    },
    /// 支付完成
    PaymentCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payment_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<OrderPatch>,
    },
    /// 状态变更 `{id, order_status}`
    StatusChange { data: OrderPatch },
    /// 心跳应答
    Pong,
    #[serde(other)]
    Unknown,
}

impl ChannelEvent {
    /// 解析文本帧
    pub fn parse(text: &str) -> AppResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| AppError::malformed_event(format!("invalid channel event: {e}")))
    }

    /// 事件类型名 (日志用)
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelEvent::NewOrder { .. } => "new_order",
            ChannelEvent::OrderUpdated { .. } => "order_updated",
            ChannelEvent::PaymentCompleted { .. } => "payment_completed",
            ChannelEvent::StatusChange { .. } => "status_change",
            ChannelEvent::Pong => "pong",
            ChannelEvent::Unknown => "unknown",
        }
    }

    /// 可合并到本地订单表的增量
    ///
    /// `new_order` 不在此列 (整单插入)。
    pub fn patch(&self) -> Option<OrderPatch> {
        match self {
            ChannelEvent::OrderUpdated {
                order: Some(patch), ..
            }
            | ChannelEvent::PaymentCompleted {
                order: Some(patch), ..
            } => Some(patch.clone()),
            ChannelEvent::OrderUpdated {
                order_id: Some(id),
                status: Some(status),
                order: None,
            } => Some(OrderPatch::status_only(*id, *status)),
            ChannelEvent::StatusChange { data } => Some(data.clone()),
            _ => None,
        }
    }

    /// 是否应立即触发一次快照拉取
    pub fn wants_refresh(&self) -> bool {
        matches!(
            self,
            ChannelEvent::NewOrder { .. }
                | ChannelEvent::OrderUpdated { .. }
                | ChannelEvent::PaymentCompleted { .. }
        )
    }

    /// 事件涉及的订单 ID
    pub fn order_id(&self) -> Option<i64> {
        match self {
            ChannelEvent::NewOrder { order } => Some(order.id),
            ChannelEvent::OrderUpdated { order_id, order, .. }
            | ChannelEvent::PaymentCompleted { order_id, order, .. } => {
                order_id.or_else(|| order.as_ref().map(|p| p.id))
            }
            ChannelEvent::StatusChange { data } => Some(data.id),
            ChannelEvent::Pong | ChannelEvent::Unknown => None,
        }
    }
}

/// 客户端发送的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// 订阅单个订单的更新 (顾客视图)
    SubscribeOrder { order_id: i64 },
    /// 心跳
    Ping,
}

impl ClientMessage {
    pub fn to_json(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::internal(format!("failed to encode client message: {e}")))
    }
}
