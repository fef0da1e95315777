//! Wire-neutral request and result types.
//!
//! Field names follow the PascalCase convention of the controller API so that
//! any codec can serialize them directly.

use crate::error::ApiError;
use crate::types::{Life, MachineJob, StatusKind};
use crate::watcher::{MachineInfo, UnitInfo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorInfo {
    pub message: String,
    pub code: String,
}

impl From<&ApiError> for ErrorInfo {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

fn error_info(err: &ApiError) -> Option<ErrorInfo> {
    Some(ErrorInfo::from(err))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResult {
    pub error: Option<ErrorInfo>,
}

impl From<Result<(), ApiError>> for ErrorResult {
    fn from(res: Result<(), ApiError>) -> Self {
        Self {
            error: res.err().as_ref().and_then(error_info),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifeResult {
    pub life: Option<Life>,
    pub error: Option<ErrorInfo>,
}

impl From<Result<Life, ApiError>> for LifeResult {
    fn from(res: Result<Life, ApiError>) -> Self {
        match res {
            Ok(life) => Self {
                life: Some(life),
                error: None,
            },
            Err(e) => Self {
                life: None,
                error: error_info(&e),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotifyWatchResult {
    pub notify_watcher_id: String,
    pub error: Option<ErrorInfo>,
}

impl From<Result<String, ApiError>> for NotifyWatchResult {
    fn from(res: Result<String, ApiError>) -> Self {
        match res {
            Ok(id) => Self {
                notify_watcher_id: id,
                error: None,
            },
            Err(e) => Self {
                notify_watcher_id: String::new(),
                error: error_info(&e),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StringsWatchResult {
    pub strings_watcher_id: String,
    pub changes: Vec<String>,
    pub error: Option<ErrorInfo>,
}

impl From<Result<(String, Vec<String>), ApiError>> for StringsWatchResult {
    fn from(res: Result<(String, Vec<String>), ApiError>) -> Self {
        match res {
            Ok((id, changes)) => Self {
                strings_watcher_id: id,
                changes,
                error: None,
            },
            Err(e) => Self {
                strings_watcher_id: String::new(),
                changes: Vec::new(),
                error: error_info(&e),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllWatcherId {
    pub all_watcher_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentMachineResult {
    pub life: Option<Life>,
    pub jobs: Vec<MachineJob>,
    pub error: Option<ErrorInfo>,
}

impl From<Result<(Life, Vec<MachineJob>), ApiError>> for AgentMachineResult {
    fn from(res: Result<(Life, Vec<MachineJob>), ApiError>) -> Self {
        match res {
            Ok((life, jobs)) => Self {
                life: Some(life),
                jobs,
                error: None,
            },
            Err(e) => Self {
                life: None,
                jobs: Vec::new(),
                error: error_info(&e),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetStatus {
    pub tag: String,
    pub status: StatusKind,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetTools {
    pub tag: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ToolsResult {
    pub version: Option<String>,
    pub error: Option<ErrorInfo>,
}

impl From<Result<String, ApiError>> for ToolsResult {
    fn from(res: Result<String, ApiError>) -> Self {
        match res {
            Ok(version) => Self {
                version: Some(version),
                error: None,
            },
            Err(e) => Self {
                version: None,
                error: error_info(&e),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientStatus {
    pub agent_version: String,
    pub machines: Vec<MachineInfo>,
    pub units: Vec<UnitInfo>,
}
