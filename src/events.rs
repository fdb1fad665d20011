//! 终端事件定义
//!
//! 定义宿主输出事件的 wire 格式。
//!
//! ## 事件列表
//! - `terminal:output` - 终端输出数据（按会话路由，数据为 Base64 编码）

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::TerminalError;

/// 终端输出事件
///
/// Event name: `terminal:output`
///
/// 同一会话的事件按到达顺序投递；不同会话之间没有顺序保证。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalOutputEvent {
    /// 会话 ID
    pub session_id: String,
    /// 输出数据（Base64 编码）
    pub data: String,
}

impl TerminalOutputEvent {
    /// 由原始输出字节构造事件
    pub fn encode(session_id: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            session_id: session_id.into(),
            data: BASE64.encode(bytes),
        }
    }

    /// 解码输出数据
    pub fn decode_data(&self) -> Result<Bytes, TerminalError> {
        BASE64
            .decode(&self.data)
            .map(Bytes::from)
            .map_err(|e| TerminalError::Base64DecodeFailed(e.to_string()))
    }
}

/// 事件名称常量
pub mod event_names {
    /// 终端输出事件名
    pub const TERMINAL_OUTPUT: &str = "terminal:output";
}
