//! PTY 宿主抽象
//!
//! 对拥有真实 PTY 的原生进程宿主的抽象。宿主侧的 shell 启动、
//! 文件描述符管理等对本层不可见，这里只消费四个异步操作。

use async_trait::async_trait;

use crate::error::TerminalError;
use crate::session::CreateSessionRequest;

/// PTY 宿主接口
///
/// 所有调用都是异步的，只挂起逻辑调用方，不阻塞事件循环。
#[async_trait]
pub trait PtyHost: Send + Sync {
    /// 创建会话
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<(), TerminalError>;

    /// 向会话写入输入字节
    async fn write(&self, session_id: &str, data: &[u8]) -> Result<(), TerminalError>;

    /// 调整会话的终端大小
    async fn resize(&self, session_id: &str, cols: u16, rows: u16) -> Result<(), TerminalError>;

    /// 关闭会话
    async fn close(&self, session_id: &str) -> Result<(), TerminalError>;
}
