//! 终端显示抽象
//!
//! 对终端模拟器控件的最小抽象：写入字节、适配容器、聚焦、读取网格大小。
//! 控件自身的转义序列解析与渲染不属于本层。

use serde::{Deserialize, Serialize};

/// 默认终端行数
pub const DEFAULT_ROWS: u16 = 24;
/// 默认终端列数
pub const DEFAULT_COLS: u16 = 80;

/// 终端网格大小
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    /// 列数
    pub cols: u16,
    /// 行数
    pub rows: u16,
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// 终端显示接口
///
/// 显示侧写入被视为本地、始终可用的操作，不返回错误。
/// 显示侧产生的用户输入与网格变化事件由上层转发给
/// [`TerminalController`](crate::controller::TerminalController)。
pub trait TerminalDisplay: Send + Sync {
    /// 向显示写入输出字节
    fn write(&self, data: &[u8]);

    /// 将终端适配到当前容器大小
    fn fit(&self);

    /// 聚焦终端
    fn focus(&self);

    /// 读取当前网格大小
    fn grid(&self) -> GridSize;
}
