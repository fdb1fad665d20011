//! 出站请求合并
//!
//! 把短时间内的多次出站请求合并为一次宿主调用，限制请求速率。
//!
//! ## 功能
//! - 写入合并：按字节拼接，保序，短延迟后整体冲刷
//! - 尺寸合并：只保留最新值，延迟略长于写入
//! - 冲刷失败记录日志后丢弃，不重试（重试可能导致按键重复）
//! - 关停时取消定时器并做最后一次尽力冲刷

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::display::GridSize;
use crate::host::PtyHost;

struct WriteState {
    buffer: BytesMut,
    scheduled: bool,
}

struct WriteInner {
    session_id: String,
    host: Arc<dyn PtyHost>,
    delay: Duration,
    state: Mutex<WriteState>,
    cancel: CancellationToken,
}

/// 写入合并器
///
/// 冲刷时一次性取走整个缓冲；冲刷期间新入队的字节不会并入
/// 这一次请求，而是由下一个定时器冲刷，保证发送顺序等于入队顺序。
pub struct WriteCoalescer {
    inner: Arc<WriteInner>,
}

impl WriteCoalescer {
    /// 创建写入合并器
    pub fn new(
        session_id: String,
        host: Arc<dyn PtyHost>,
        delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(WriteInner {
                session_id,
                host,
                delay,
                state: Mutex::new(WriteState {
                    buffer: BytesMut::new(),
                    scheduled: false,
                }),
                cancel,
            }),
        }
    }

    /// 入队写入字节
    ///
    /// 没有定时器在运行时启动一个；必须在 tokio 运行时上下文中调用。
    pub fn queue_write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        {
            let mut state = self.inner.state.lock();
            state.buffer.extend_from_slice(data);
            if state.scheduled {
                return;
            }
            state.scheduled = true;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(inner.delay) => inner.flush().await,
            }
        });
    }

    /// 立即冲刷剩余缓冲（关停路径）
    pub async fn flush_now(&self) {
        self.inner.flush().await;
    }

    /// 未冲刷的缓冲字节数
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }
}

impl WriteInner {
    async fn flush(&self) {
        let payload = {
            let mut state = self.state.lock();
            state.scheduled = false;
            if state.buffer.is_empty() {
                return;
            }
            state.buffer.split().freeze()
        };

        // 尽力而为：失败不重试也不上抛
        if let Err(err) = self.host.write(&self.session_id, &payload).await {
            tracing::warn!(
                "[写入合并] 会话 {} 写入失败，已丢弃 {} 字节: {}",
                self.session_id,
                payload.len(),
                err
            );
        }
    }
}

struct ResizeState {
    pending: Option<GridSize>,
    scheduled: bool,
}

struct ResizeInner {
    session_id: String,
    host: Arc<dyn PtyHost>,
    delay: Duration,
    state: Mutex<ResizeState>,
    cancel: CancellationToken,
}

/// 尺寸调整合并器
///
/// 与写入合并的目标相同，但语义是覆盖最新值：只有最终大小有意义。
pub struct ResizeCoalescer {
    inner: Arc<ResizeInner>,
}

impl ResizeCoalescer {
    /// 创建尺寸合并器
    pub fn new(
        session_id: String,
        host: Arc<dyn PtyHost>,
        delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ResizeInner {
                session_id,
                host,
                delay,
                state: Mutex::new(ResizeState {
                    pending: None,
                    scheduled: false,
                }),
                cancel,
            }),
        }
    }

    /// 入队尺寸变化，覆盖之前未发送的值
    pub fn queue_resize(&self, size: GridSize) {
        {
            let mut state = self.inner.state.lock();
            state.pending = Some(size);
            if state.scheduled {
                return;
            }
            state.scheduled = true;
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(inner.delay) => inner.flush().await,
            }
        });
    }

    /// 立即冲刷未发送的尺寸（关停路径）
    pub async fn flush_now(&self) {
        self.inner.flush().await;
    }
}

impl ResizeInner {
    async fn flush(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.scheduled = false;
            state.pending.take()
        };

        let Some(size) = pending else {
            return;
        };

        if let Err(err) = self
            .host
            .resize(&self.session_id, size.cols, size.rows)
            .await
        {
            tracing::warn!(
                "[尺寸合并] 会话 {} 调整大小失败，已忽略 ({}x{}): {}",
                self.session_id,
                size.cols,
                size.rows,
                err
            );
        }
    }
}
