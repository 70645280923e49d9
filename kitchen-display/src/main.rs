//! kitchen-display: headless live order board
//!
//! Opens one live session for the configured role and renders the
//! reconciled board to the log on every change. Ctrl-C stops it.

mod config;
mod display;
mod logger;

use anyhow::Context;
use config::Config;
use delicacy_client::{AlertSink, LiveSession, ViewScope};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (.env) 与日志
    dotenv::dotenv().ok();
    let config = Config::from_env();
    logger::init_logger(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    // wss:// 需要进程级 CryptoProvider
    let _ = rustls::crypto::ring::default_provider().install_default();

    // 2. 视图会话
    let scope = config.scope()?;
    let client_config = config.client_config();
    tracing::info!(
        role = %config.role,
        backend = %client_config.base_url(),
        poll_ms = config.poll_interval_ms,
        "Kitchen display starting"
    );

    let sink: Option<Arc<dyn AlertSink>> = match scope {
        ViewScope::Kitchen => Some(Arc::new(display::BellSink::new(config.sound_enabled))),
        _ => None,
    };
    let (session, handle) =
        LiveSession::new(client_config, scope, sink).context("failed to create live session")?;

    let mut board = handle.watch_board();
    let mut notices = handle.notices();
    let mut task = session.spawn();

    // 3. 渲染循环
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                handle.close();
            }

            result = &mut task => {
                if let Err(e) = result {
                    tracing::error!("Live session task failed: {e}");
                }
                break;
            }

            Ok(()) = board.changed() => {
                let current = board.borrow_and_update().clone();
                display::render(&current);
            }

            notice = notices.recv() => match notice {
                Ok(notice) => display::log_notice(&notice),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Notices skipped");
                }
                Err(RecvError::Closed) => {}
            },
        }
    }

    tracing::info!("Kitchen display stopped");
    Ok(())
}
