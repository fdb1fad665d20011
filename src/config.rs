//! 流控参数配置
//!
//! 集中定义渲染、写入与尺寸调整的节流参数。
//! 默认值来自交互式终端的实际调优结果。

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 流控参数
///
/// 渲染侧区分可见/隐藏两套节奏：可见会话按帧节奏小块刷新，
/// 隐藏会话用较长延迟和较大的块，减少刷新次数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControlConfig {
    /// 写入合并延迟（毫秒）
    pub write_flush_delay_ms: u64,
    /// 尺寸调整合并延迟（毫秒），比写入略长
    pub resize_flush_delay_ms: u64,
    /// 可见会话的帧间隔（毫秒），近似显示的绘制周期
    pub visible_frame_interval_ms: u64,
    /// 隐藏会话的刷新延迟（毫秒）
    pub hidden_flush_delay_ms: u64,
    /// 可见会话单次刷新的最大字节数
    pub visible_chunk_size: usize,
    /// 隐藏会话单次刷新的最大字节数
    pub hidden_chunk_size: usize,
    /// 输出缓冲上限（字节），超出时丢弃最旧数据
    ///
    /// 默认不设上限：交互式 shell 的输出总是有限的，
    /// 设置上限会引入数据丢失，仅作为可选的加固手段。
    pub max_buffer_bytes: Option<usize>,
}

impl Default for FlowControlConfig {
    fn default() -> Self {
        Self {
            write_flush_delay_ms: 12,
            resize_flush_delay_ms: 48,
            visible_frame_interval_ms: 16,
            hidden_flush_delay_ms: 42,
            visible_chunk_size: 64 * 1024,
            hidden_chunk_size: 160 * 1024,
            max_buffer_bytes: None,
        }
    }
}

impl FlowControlConfig {
    /// 写入合并延迟
    pub fn write_flush_delay(&self) -> Duration {
        Duration::from_millis(self.write_flush_delay_ms)
    }

    /// 尺寸调整合并延迟
    pub fn resize_flush_delay(&self) -> Duration {
        Duration::from_millis(self.resize_flush_delay_ms)
    }

    /// 可见会话的帧间隔
    pub fn visible_frame_interval(&self) -> Duration {
        Duration::from_millis(self.visible_frame_interval_ms)
    }

    /// 隐藏会话的刷新延迟
    pub fn hidden_flush_delay(&self) -> Duration {
        Duration::from_millis(self.hidden_flush_delay_ms)
    }
}
