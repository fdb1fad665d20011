//! 渲染流控
//!
//! 把不限速率的输出块流转换为一串有界的显示写入，不阻塞调用方，
//! 并根据会话是否可见调整节奏。
//!
//! ## 刷新策略
//! - 可见会话：按帧间隔刷新，小块、高频，保证感知上的即时性
//! - 隐藏会话：固定短延迟刷新，大块、低频，没人盯着画面时
//!   用更大的写入换取更少的刷新次数
//! - 单次刷新只取缓冲的一个前缀，剩余部分立刻重新调度，
//!   保证持续高速输入下也能最终排空
//! - 可见性切换不回溯已调度的刷新，新策略从下一次调度生效

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::FlowControlConfig;
use crate::display::TerminalDisplay;

struct RenderState {
    buffer: BytesMut,
    scheduled: bool,
    dropped_bytes: u64,
}

struct RenderInner {
    session_id: String,
    display: Arc<dyn TerminalDisplay>,
    config: FlowControlConfig,
    visible: AtomicBool,
    state: Mutex<RenderState>,
    /// 串行化"取块 + 写显示"：多线程运行时上两次冲刷可能并发，
    /// 写入必须按取出顺序到达显示
    flush_lock: Mutex<()>,
    cancel: CancellationToken,
}

/// 渲染流控器
///
/// 每个会话一个实例。默认不设缓冲上限（交互式 shell 的输出总是有限的），
/// 配置 `max_buffer_bytes` 后超限会丢弃最旧数据并记录告警。
#[derive(Clone)]
pub struct RenderFlowController {
    inner: Arc<RenderInner>,
}

impl RenderFlowController {
    /// 创建流控器
    pub fn new(
        session_id: String,
        display: Arc<dyn TerminalDisplay>,
        config: FlowControlConfig,
        visible: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(RenderInner {
                session_id,
                display,
                config,
                visible: AtomicBool::new(visible),
                state: Mutex::new(RenderState {
                    buffer: BytesMut::new(),
                    scheduled: false,
                    dropped_bytes: 0,
                }),
                flush_lock: Mutex::new(()),
                cancel,
            }),
        }
    }

    /// 入队一块输出
    ///
    /// 追加到待渲染缓冲；没有已调度的刷新时调度一次。
    pub fn queue(&self, data: Bytes) {
        if data.is_empty() {
            return;
        }

        {
            let mut state = self.inner.state.lock();
            state.buffer.extend_from_slice(&data);

            if let Some(cap) = self.inner.config.max_buffer_bytes {
                if state.buffer.len() > cap {
                    let excess = state.buffer.len() - cap;
                    state.buffer.advance(excess);
                    state.dropped_bytes += excess as u64;
                    tracing::warn!(
                        "[渲染流控] 会话 {} 输出缓冲超限，丢弃最旧的 {} 字节",
                        self.inner.session_id,
                        excess
                    );
                }
            }

            if state.scheduled {
                return;
            }
            state.scheduled = true;
        }

        self.inner.clone().schedule();
    }

    /// 更新可见状态
    ///
    /// 已调度的刷新不受影响，新策略从下一次调度开始生效。
    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.store(visible, Ordering::Relaxed);
    }

    /// 当前是否可见
    pub fn is_visible(&self) -> bool {
        self.inner.visible.load(Ordering::Relaxed)
    }

    /// 未渲染的缓冲字节数
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    /// 因缓冲上限被丢弃的总字节数
    pub fn dropped_bytes(&self) -> u64 {
        self.inner.state.lock().dropped_bytes
    }

    /// 丢弃缓冲内容（关停路径，调度任务由取消令牌终止）
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.buffer.clear();
        state.scheduled = false;
    }
}

impl RenderInner {
    /// 按当前可见性选择延迟，调度一次刷新
    fn schedule(self: Arc<Self>) {
        tokio::spawn(async move {
            let delay = if self.visible.load(Ordering::Relaxed) {
                self.config.visible_frame_interval()
            } else {
                self.config.hidden_flush_delay()
            };
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => self.flush(),
            }
        });
    }

    /// 取缓冲前缀写入显示，有剩余则立刻重新调度
    fn flush(self: &Arc<Self>) {
        // 缓冲排空后 scheduled 即复位，新的 queue() 会调度下一次冲刷；
        // 该冲刷必须等上一次的显示写入落地才能取块
        let _flush = self.flush_lock.lock();
        let (chunk, has_remainder) = {
            let mut state = self.state.lock();
            state.scheduled = false;
            if state.buffer.is_empty() {
                return;
            }

            let chunk_size = if self.visible.load(Ordering::Relaxed) {
                self.config.visible_chunk_size
            } else {
                self.config.hidden_chunk_size
            };
            let take = chunk_size.min(state.buffer.len());
            let chunk = state.buffer.split_to(take).freeze();
            let has_remainder = !state.buffer.is_empty();
            if has_remainder {
                state.scheduled = true;
            }
            (chunk, has_remainder)
        };

        self.display.write(&chunk);

        if has_remainder {
            self.clone().schedule();
        }
    }
}
