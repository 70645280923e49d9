use anyhow::Context;
use delicacy_client::{ChannelConfig, ClientConfig, ViewScope};
use shared::Role;
use std::time::Duration;

/// 显示端配置
///
/// # 环境变量
///
/// 启动时先加载 `.env`，再读取以下变量：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | BACKEND_HOST | 127.0.0.1 | 后端主机 (与页面同主机) |
/// | BACKEND_PORT | 8000 | 后端端口 (REST 与推送通道共用) |
/// | BACKEND_SECURE | false | 使用 https/wss |
/// | VIEW_ROLE | kitchen | 视图角色: kitchen / admin / customer |
/// | VIEW_IDENTIFIER | - | customer 视图跟踪的订单 id |
/// | POLL_INTERVAL_MS | 3000 | 快照轮询间隔(毫秒) |
/// | URGENT_AFTER_MINUTES | 15 | 超过该分钟数的未完成订单标记为紧急 |
/// | CHANNEL_CONNECT_TIMEOUT_MS | 10000 | 推送通道单次握手超时(毫秒) |
/// | SOUND_ENABLED | true | 新订单时响铃 |
/// | LOG_LEVEL | info | 日志级别 (RUST_LOG 优先) |
/// | LOG_JSON | false | JSON 日志输出 |
/// | LOG_DIR | - | 日志目录，设置后按天滚动写文件 |
///
/// # 示例
///
/// ```ignore
/// BACKEND_HOST=192.168.1.20 VIEW_ROLE=kitchen cargo run -p kitchen-display
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_host: String,
    pub backend_port: u16,
    pub backend_secure: bool,
    /// 视图角色
    pub role: Role,
    /// customer 视图的订单 id
    pub identifier: Option<String>,
    pub poll_interval_ms: u64,
    pub urgent_after_minutes: i64,
    pub channel_connect_timeout_ms: u64,
    /// 新订单响铃开关
    pub sound_enabled: bool,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的变量使用默认值
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// 从任意变量来源加载 (测试用)
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            backend_host: var("BACKEND_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            backend_port: var("BACKEND_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(delicacy_client::config::DEFAULT_BACKEND_PORT),
            backend_secure: var("BACKEND_SECURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            role: var("VIEW_ROLE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(Role::Kitchen),
            identifier: var("VIEW_IDENTIFIER").filter(|v| !v.trim().is_empty()),
            poll_interval_ms: var("POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(3000),
            urgent_after_minutes: var("URGENT_AFTER_MINUTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            channel_connect_timeout_ms: var("CHANNEL_CONNECT_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(10_000),
            sound_enabled: var("SOUND_ENABLED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: var("LOG_JSON").and_then(|v| v.parse().ok()).unwrap_or(false),
            log_dir: var("LOG_DIR").filter(|v| !v.trim().is_empty()),
        }
    }

    /// 构建客户端配置
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.backend_host.clone())
            .with_secure(self.backend_secure)
            .with_port(self.backend_port)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_urgent_after(self.urgent_after_minutes)
            .with_channel(
                ChannelConfig::default()
                    .with_connect_timeout(Duration::from_millis(self.channel_connect_timeout_ms)),
            )
    }

    /// 视图范围; customer 角色必须提供订单 id
    pub fn scope(&self) -> anyhow::Result<ViewScope> {
        match self.role {
            Role::Kitchen => Ok(ViewScope::Kitchen),
            Role::Admin => Ok(ViewScope::Admin),
            Role::Customer => {
                let raw = self
                    .identifier
                    .as_deref()
                    .context("VIEW_IDENTIFIER is required for the customer view")?;
                let order_id = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("VIEW_IDENTIFIER is not an order id: {raw}"))?;
                Ok(ViewScope::Customer { order_id })
            }
        }
    }
}
