//! 终端流控错误类型
//!
//! 定义终端 I/O 流控层相关的错误类型。
//!
//! ## 功能
//! - 订阅/会话创建错误
//! - 宿主调用错误
//! - 序列化支持

use thiserror::Error;

/// 终端错误类型
#[derive(Debug, Error)]
pub enum TerminalError {
    /// 会话 ID 为空
    #[error("会话 ID 不能为空")]
    SessionIdRequired,

    /// 工作目录为空
    #[error("工作目录不能为空")]
    WorkingDirRequired,

    /// 上游输出订阅建立失败
    #[error("输出订阅失败: {0}")]
    SubscribeFailed(String),

    /// 会话创建失败
    #[error("会话创建失败: {0}")]
    CreationFailed(String),

    /// 写入失败
    #[error("写入失败: {0}")]
    WriteFailed(String),

    /// 调整大小失败
    #[error("调整大小失败: {0}")]
    ResizeFailed(String),

    /// 关闭失败
    #[error("关闭失败: {0}")]
    CloseFailed(String),

    /// Base64 解码失败
    #[error("Base64 解码失败: {0}")]
    Base64DecodeFailed(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<TerminalError> for String {
    fn from(err: TerminalError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for TerminalError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
