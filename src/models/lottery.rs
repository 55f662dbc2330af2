use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次分配: 某张池中票 -> 某位报名用户
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawAssignment {
    pub ticket_id: i64,
    pub user_id: i64,
}

/// 抽签结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawOutcome {
    pub event_id: i64,
    pub drawn_at: DateTime<Utc>,
    pub assignments: Vec<DrawAssignment>,
    /// 未分配、仍留在池中的票数
    pub tickets_remaining_in_pool: usize,
    /// 本次未中签的报名数
    pub entrants_not_drawn: usize,
}

impl DrawOutcome {
    pub fn winners(&self) -> usize {
        self.assignments.len()
    }
}

/// 手动指定中签 (推广赠票等)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAllocationRequest {
    pub event_id: i64,
    pub ticket_id: i64,
    pub email: String,
}
