//! 会话标识与元数据
//!
//! ## 功能
//! - 区分交互会话与临时（plain）会话
//! - 构造会话创建请求（含恢复选项）
//! - 会话元数据

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::display::{DEFAULT_COLS, DEFAULT_ROWS};

/// 临时会话 ID 前缀
///
/// 带此前缀的会话是一次性 shell，不关联可恢复的宿主会话。
pub const PLAIN_SESSION_PREFIX: &str = "__plain__";

/// 跳过权限确认的参数
pub const DANGEROUS_SKIP_PERMISSIONS_ARG: &str = "--dangerously-skip-permissions";

/// 生成新的临时会话 ID
pub fn new_plain_session_id() -> String {
    format!("{}{}", PLAIN_SESSION_PREFIX, Uuid::new_v4())
}

/// 判断是否为临时会话
pub fn is_plain_session(session_id: &str) -> bool {
    session_id.starts_with(PLAIN_SESSION_PREFIX)
}

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// 正在连接
    Connecting,
    /// 运行中
    Running,
    /// 已结束
    Done,
    /// 错误
    Error,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Connecting
    }
}

/// 会话创建请求
///
/// 交互会话按自身 ID 恢复宿主侧的既有会话；临时会话不携带恢复选项。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// 会话 ID
    pub session_id: String,
    /// 工作目录
    pub working_dir: String,
    /// 是否恢复既有会话
    pub enable_resume: bool,
    /// 要恢复的会话 ID
    pub resume_session_id: Option<String>,
    /// 恢复时附加的参数列表
    pub resume_args: Option<Vec<String>>,
    /// 是否允许跳过权限确认
    pub allow_dangerously_skip_permissions: bool,
}

impl CreateSessionRequest {
    /// 构造创建请求
    ///
    /// 参数列表会被逐项 trim 并去掉空项。
    pub fn build(session_id: String, working_dir: String, resume_args: &[String]) -> Self {
        let enable_resume = !is_plain_session(&session_id);
        let normalized: Vec<String> = resume_args
            .iter()
            .map(|arg| arg.trim().to_string())
            .filter(|arg| !arg.is_empty())
            .collect();
        let allow_skip = normalized
            .iter()
            .any(|arg| arg == DANGEROUS_SKIP_PERMISSIONS_ARG);

        Self {
            resume_session_id: enable_resume.then(|| session_id.clone()),
            resume_args: enable_resume.then(|| normalized),
            allow_dangerously_skip_permissions: enable_resume && allow_skip,
            session_id,
            working_dir,
            enable_resume,
        }
    }
}

/// 会话元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// 会话 ID
    pub id: String,
    /// 会话状态
    pub status: SessionStatus,
    /// 创建时间（Unix 时间戳，毫秒）
    pub created_at: i64,
    /// 终端行数
    pub rows: u16,
    /// 终端列数
    pub cols: u16,
}

impl SessionMetadata {
    /// 创建元数据（默认网格大小）
    pub fn new(id: String) -> Self {
        Self {
            id,
            status: SessionStatus::Connecting,
            created_at: Utc::now().timestamp_millis(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_session_id() {
        let id = new_plain_session_id();
        assert!(is_plain_session(&id));
        assert!(!is_plain_session("workspace-session-1"));
    }

    #[test]
    fn test_build_interactive_request_resumes_by_own_id() {
        let request = CreateSessionRequest::build(
            "session-42".to_string(),
            "/tmp/project".to_string(),
            &[],
        );
        assert!(request.enable_resume);
        assert_eq!(request.resume_session_id.as_deref(), Some("session-42"));
        assert_eq!(request.resume_args.as_deref(), Some(&[][..]));
        assert!(!request.allow_dangerously_skip_permissions);
    }

    #[test]
    fn test_build_plain_request_has_no_resume_options() {
        let request = CreateSessionRequest::build(
            new_plain_session_id(),
            "/tmp/project".to_string(),
            &["--verbose".to_string()],
        );
        assert!(!request.enable_resume);
        assert!(request.resume_session_id.is_none());
        assert!(request.resume_args.is_none());
        assert!(!request.allow_dangerously_skip_permissions);
    }

    #[test]
    fn test_build_normalizes_args_and_detects_skip_permissions() {
        let request = CreateSessionRequest::build(
            "session-7".to_string(),
            "/tmp/project".to_string(),
            &[
                "  --dangerously-skip-permissions  ".to_string(),
                "   ".to_string(),
                "--model=x".to_string(),
            ],
        );
        assert_eq!(
            request.resume_args.as_deref(),
            Some(&["--dangerously-skip-permissions".to_string(), "--model=x".to_string()][..])
        );
        assert!(request.allow_dangerously_skip_permissions);
    }

    #[test]
    fn test_session_status_serialize() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Connecting).unwrap(),
            "\"connecting\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn test_metadata_defaults() {
        let metadata = SessionMetadata::new("abc".to_string());
        assert_eq!(metadata.status, SessionStatus::Connecting);
        assert_eq!(metadata.rows, DEFAULT_ROWS);
        assert_eq!(metadata.cols, DEFAULT_COLS);
    }
}
