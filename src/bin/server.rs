//! SeniorAssist HTTP 服务
//!
//! 环境变量:
//! - OPENAI_API_KEY 或 DEEPSEEK_API_KEY: LLM API Key
//! - WEATHER_API_KEY / GNEWS_API_KEY: 天气与新闻查询（可选）
//! - TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN / TWILIO_PHONE_NUMBER: 紧急短信（可选）
//! - ASSIST__SERVER__BIND: 监听地址（默认 0.0.0.0:8000）
//!
//! 启动: cargo run --bin senior-assist-server --features server

use std::sync::Arc;

use anyhow::Context;
use senior_assist::{api, config, observability, AssistantBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = config::load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        config::AppConfig::default()
    });
    let bind = cfg.server.bind.clone();

    let orchestrator = AssistantBuilder::new(cfg)
        .build()
        .context("Failed to build assistant")?;
    let app = api::router(Arc::new(orchestrator));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!("SeniorAssist server listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}
