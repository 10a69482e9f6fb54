use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleId {
    Guide,
    Judge,
    Champion,
    Doctor,
    Auditor,
    Architect,
    Hermit,
}

impl RoleId {
    pub const ALL: [RoleId; 7] = [
        RoleId::Guide,
        RoleId::Judge,
        RoleId::Champion,
        RoleId::Doctor,
        RoleId::Auditor,
        RoleId::Architect,
        RoleId::Hermit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RoleId::Guide => "guide",
            RoleId::Judge => "judge",
            RoleId::Champion => "champion",
            RoleId::Doctor => "doctor",
            RoleId::Auditor => "auditor",
            RoleId::Architect => "architect",
            RoleId::Hermit => "hermit",
        }
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleStatus {
    Idle,
    Running,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportRole {
    pub role_id: RoleId,
    pub status: RoleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<String>,
}

impl SupportRole {
    pub fn idle(role_id: RoleId) -> Self {
        Self {
            role_id,
            status: RoleStatus::Idle,
            task_id: None,
            last_completed: None,
            last_result: None,
        }
    }
}
