//! 对话编排器：一条消息的完整处理流程
//!
//! 提取时间 → 分类 → 分发动作 → 写入历史 → 组装响应。
//! 上游服务失败在各自阶段内降级；存储写入失败使整轮失败，且本轮历史不会写入。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::classifier::{Emotion, IntentClassifier, UserContext};
use crate::core::{TurnError, TurnProgress};
use crate::dispatch::{ActionDispatcher, DispatchRequest};
use crate::memory::{Message, Role};
use crate::store::Stores;
use crate::temporal::{TemporalExpression, TemporalExtractor};

/// 一次对话请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub message: String,
    /// 客户端自带的最近历史；为空时从存储读取
    #[serde(default)]
    pub recent_history: Vec<Message>,
}

impl TurnRequest {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
            recent_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.recent_history = history;
        self
    }
}

/// 一次对话的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResponse {
    pub reply: String,
    /// Duckling 原始实体，不做过滤
    pub detected_dates: Vec<TemporalExpression>,
    pub emotion: Emotion,
}

pub struct TurnOrchestrator {
    extractor: Arc<dyn TemporalExtractor>,
    classifier: IntentClassifier,
    dispatcher: ActionDispatcher,
    stores: Stores,
}

impl TurnOrchestrator {
    pub fn new(
        extractor: Arc<dyn TemporalExtractor>,
        classifier: IntentClassifier,
        dispatcher: ActionDispatcher,
        stores: Stores,
    ) -> Self {
        Self {
            extractor,
            classifier,
            dispatcher,
            stores,
        }
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// 处理一条消息
    pub async fn handle_turn(&self, req: TurnRequest) -> Result<TurnResponse, TurnError> {
        if req.user_id.trim().is_empty() {
            return Err(TurnError::MissingUser);
        }
        if req.message.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let span = tracing::info_span!(
            "turn",
            turn_id = %uuid::Uuid::new_v4(),
            user = %req.user_id
        );
        let mut progress = TurnProgress::default();
        let result = self.run(&req, &mut progress).instrument(span.clone()).await;
        if let Err(e) = &result {
            progress.fail();
            span.in_scope(|| {
                tracing::error!(
                    phase = ?progress.failed_at(),
                    "turn failed: {}",
                    e
                );
            });
        }
        result
    }

    async fn run(
        &self,
        req: &TurnRequest,
        progress: &mut TurnProgress,
    ) -> Result<TurnResponse, TurnError> {
        let user_id = req.user_id.as_str();
        let message = req.message.as_str();

        let detected_dates = self.extractor.extract(message).await;
        progress.advance();

        let history = self.context_history(req).await;
        let city = self.profile_city(user_id).await;
        let user = UserContext::new(user_id).with_city(city.clone());
        let classification = self
            .classifier
            .classify(message, &detected_dates, &history, &user)
            .await;
        tracing::info!(
            intent = %classification.intent,
            emotion = %classification.emotion,
            dates = detected_dates.len(),
            "message classified"
        );
        progress.advance();

        let reply = self
            .dispatcher
            .dispatch(
                &classification.intent,
                DispatchRequest {
                    user_id,
                    message,
                    reply: &classification.reply,
                    temporal: &detected_dates,
                    profile_city: city.as_deref(),
                },
            )
            .await?;
        progress.advance();

        self.stores
            .history
            .append_turn(user_id, message, &reply)
            .await?;
        progress.advance();

        Ok(TurnResponse {
            reply,
            detected_dates,
            emotion: classification.emotion,
        })
    }

    /// 分类上下文：优先用客户端带来的历史，否则读存储；读失败按无历史处理
    /// 客户端历史只接受 user / assistant 角色；system 指令只能来自服务端
    async fn context_history(&self, req: &TurnRequest) -> Vec<Message> {
        if !req.recent_history.is_empty() {
            let kept: Vec<Message> = req
                .recent_history
                .iter()
                .filter(|m| matches!(m.role, Role::User | Role::Assistant))
                .cloned()
                .collect();
            let dropped = req.recent_history.len() - kept.len();
            if dropped > 0 {
                tracing::warn!(dropped, "ignoring client history entries with system role");
            }
            return kept;
        }
        let window = self.classifier.history_window();
        match self.stores.history.recent(&req.user_id, window).await {
            Ok(records) => records.iter().map(|r| r.to_message()).collect(),
            Err(e) => {
                tracing::warn!("failed to load history: {}", e);
                Vec::new()
            }
        }
    }

    async fn profile_city(&self, user_id: &str) -> Option<String> {
        match self.stores.profiles.profile(user_id).await {
            Ok(profile) => profile.and_then(|p| p.city).filter(|c| !c.trim().is_empty()),
            Err(e) => {
                tracing::warn!("failed to load profile: {}", e);
                None
            }
        }
    }
}
