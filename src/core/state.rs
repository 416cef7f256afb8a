//! 单轮对话的阶段
//!
//! 阶段严格按顺序推进，任一阶段出错即进入 Failed，不重试。

use std::fmt;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    Extracting,
    Classifying,
    Dispatching,
    PersistingHistory,
    Done,
    Failed,
}

impl TurnPhase {
    /// 下一阶段；终态返回 None
    pub fn next(self) -> Option<TurnPhase> {
        match self {
            TurnPhase::Extracting => Some(TurnPhase::Classifying),
            TurnPhase::Classifying => Some(TurnPhase::Dispatching),
            TurnPhase::Dispatching => Some(TurnPhase::PersistingHistory),
            TurnPhase::PersistingHistory => Some(TurnPhase::Done),
            TurnPhase::Done | TurnPhase::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Done | TurnPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnPhase::Extracting => "extracting",
            TurnPhase::Classifying => "classifying",
            TurnPhase::Dispatching => "dispatching",
            TurnPhase::PersistingHistory => "persisting_history",
            TurnPhase::Done => "done",
            TurnPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 记录当前阶段；失败时能报告停在哪一步
#[derive(Debug)]
pub struct TurnProgress {
    phase: TurnPhase,
    failed_at: Option<TurnPhase>,
}

impl Default for TurnProgress {
    fn default() -> Self {
        Self {
            phase: TurnPhase::Extracting,
            failed_at: None,
        }
    }
}

impl TurnProgress {
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// 出错的阶段（未失败时为 None）
    pub fn failed_at(&self) -> Option<TurnPhase> {
        self.failed_at
    }

    pub fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            tracing::debug!(from = %self.phase, to = %next, "turn phase");
            self.phase = next;
        }
    }

    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.failed_at = Some(self.phase);
            self.phase = TurnPhase::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_reaches_done() {
        let mut progress = TurnProgress::default();
        let mut seen = vec![progress.phase()];
        while !progress.phase().is_terminal() {
            progress.advance();
            seen.push(progress.phase());
        }
        assert_eq!(
            seen,
            vec![
                TurnPhase::Extracting,
                TurnPhase::Classifying,
                TurnPhase::Dispatching,
                TurnPhase::PersistingHistory,
                TurnPhase::Done,
            ]
        );
    }

    #[test]
    fn test_fail_is_terminal_and_remembers_phase() {
        let mut progress = TurnProgress::default();
        progress.advance();
        progress.advance();
        progress.fail();
        assert_eq!(progress.phase(), TurnPhase::Failed);
        assert_eq!(progress.failed_at(), Some(TurnPhase::Dispatching));

        progress.advance();
        assert_eq!(progress.phase(), TurnPhase::Failed);
    }
}
