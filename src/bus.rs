//! 输出事件总线
//!
//! 将宿主进程的单一输出事件流按会话 ID 分发给多个消费者。
//!
//! ## 功能
//! - 按会话注册/注销输出处理器，同一会话允许多个处理器
//! - 懒加载共享上游订阅：首个订阅者建立，最后一个注销后释放
//! - 并发的首次订阅共享同一次建立尝试，失败传播给所有等待者
//! - 无处理器的会话事件直接丢弃（本层不缓冲）

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;

use crate::error::TerminalError;
use crate::events::TerminalOutputEvent;

/// 会话输出处理器
pub type OutputHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

/// 上游事件转发回调
pub type OutputForwarder = Arc<dyn Fn(TerminalOutputEvent) + Send + Sync>;

/// 上游订阅句柄，drop 即退订
pub trait UpstreamSubscription: Send + Sync {}

/// 上游输出事件源
///
/// 抽象宿主进程的全局输出事件流（例如桌面框架的事件监听）。
/// 整个进程最多保持一个活跃订阅，由总线按需建立和释放。
#[async_trait]
pub trait OutputSource: Send + Sync {
    /// 建立上游订阅，把每个输出事件交给 `forward` 回调
    async fn attach(
        &self,
        forward: OutputForwarder,
    ) -> Result<Box<dyn UpstreamSubscription>, TerminalError>;
}

/// 处理器注册条目
struct HandlerEntry {
    id: u64,
    handler: OutputHandler,
}

/// 上游订阅状态
enum UpstreamState {
    /// 未建立
    Detached,
    /// 建立中，并发订阅者共享同一次尝试
    Attaching(Shared<BoxFuture<'static, Result<(), String>>>),
    /// 已建立，持有句柄只为其 Drop 退订
    Attached { _subscription: Box<dyn UpstreamSubscription> },
}

struct BusInner {
    source: Arc<dyn OutputSource>,
    /// 订阅注册表：会话 ID -> 处理器列表（按注册顺序）
    listeners: Mutex<HashMap<String, Vec<HandlerEntry>>>,
    upstream: Mutex<UpstreamState>,
    next_handler_id: AtomicU64,
}

/// 输出事件总线
///
/// 进程级对象，生命周期长于任何单个会话控制器；通过共享句柄注入，
/// 而不是作为环境单例访问。
#[derive(Clone)]
pub struct OutputEventBus {
    inner: Arc<BusInner>,
}

impl OutputEventBus {
    /// 创建总线
    pub fn new(source: Arc<dyn OutputSource>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                source,
                listeners: Mutex::new(HashMap::new()),
                upstream: Mutex::new(UpstreamState::Detached),
                next_handler_id: AtomicU64::new(1),
            }),
        }
    }

    /// 注册会话输出处理器
    ///
    /// 首次调用时建立共享的上游订阅；建立失败时不留下任何注册状态，
    /// 下一次调用会重试。返回的句柄 drop 时注销这一个处理器。
    pub async fn subscribe(
        &self,
        session_id: &str,
        handler: OutputHandler,
    ) -> Result<SubscriptionGuard, TerminalError> {
        if session_id.trim().is_empty() {
            return Err(TerminalError::SessionIdRequired);
        }

        let handler_id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        loop {
            self.inner.ensure_upstream().await?;

            // 在 upstream 锁内登记处理器：并发的最后一次注销走的是
            // 同一把锁（maybe_detach），登记与存活检查因此是原子的。
            // 若上游在 ensure_upstream 返回后已被并发拆除，重新建立。
            let upstream = self.inner.upstream.lock();
            if !matches!(&*upstream, UpstreamState::Attached { .. }) {
                continue;
            }
            let mut listeners = self.inner.listeners.lock();
            let entries = listeners.entry(session_id.to_string()).or_default();
            entries.push(HandlerEntry {
                id: handler_id,
                handler: handler.clone(),
            });
            tracing::debug!(
                "[输出总线] 会话 {} 已订阅，处理器数: {}",
                session_id,
                entries.len()
            );
            break;
        }

        Ok(SubscriptionGuard {
            inner: Arc::downgrade(&self.inner),
            session_id: session_id.to_string(),
            handler_id,
        })
    }

    /// 当前注册的会话数
    pub fn session_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// 上游订阅是否处于已建立状态
    pub fn upstream_attached(&self) -> bool {
        matches!(&*self.inner.upstream.lock(), UpstreamState::Attached { .. })
    }
}

impl BusInner {
    async fn ensure_upstream(self: &Arc<Self>) -> Result<(), TerminalError> {
        let attach = {
            let mut upstream = self.upstream.lock();
            match &*upstream {
                UpstreamState::Attached { .. } => return Ok(()),
                UpstreamState::Attaching(shared) => shared.clone(),
                UpstreamState::Detached => {
                    let inner = self.clone();
                    let fut = async move {
                        let weak = Arc::downgrade(&inner);
                        let forward: OutputForwarder = Arc::new(move |event| {
                            if let Some(bus) = weak.upgrade() {
                                bus.dispatch(event);
                            }
                        });

                        match inner.source.attach(forward).await {
                            Ok(subscription) => {
                                *inner.upstream.lock() = UpstreamState::Attached {
                                    _subscription: subscription,
                                };
                                tracing::debug!("[输出总线] 上游订阅已建立");
                                Ok(())
                            }
                            Err(err) => {
                                *inner.upstream.lock() = UpstreamState::Detached;
                                Err(err.to_string())
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *upstream = UpstreamState::Attaching(fut.clone());
                    fut
                }
            }
        };

        attach.await.map_err(TerminalError::SubscribeFailed)
    }

    /// 分发一个上游事件到对应会话的处理器
    fn dispatch(&self, event: TerminalOutputEvent) {
        let data = match event.decode_data() {
            Ok(data) => data,
            Err(err) => {
                tracing::error!(
                    "[输出总线] 会话 {} 输出解码失败，丢弃该事件: {}",
                    event.session_id,
                    err
                );
                return;
            }
        };

        // 复制处理器列表后再调用，避免在持锁状态下执行回调
        let handlers: Vec<OutputHandler> = {
            let listeners = self.listeners.lock();
            match listeners.get(&event.session_id) {
                Some(entries) if !entries.is_empty() => {
                    entries.iter().map(|entry| entry.handler.clone()).collect()
                }
                _ => {
                    tracing::trace!("[输出总线] 会话 {} 无处理器，丢弃事件", event.session_id);
                    return;
                }
            }
        };

        for handler in handlers {
            handler(data.clone());
        }
    }

    /// 注册表为空时释放上游订阅
    fn maybe_detach(&self) {
        let mut upstream = self.upstream.lock();
        if !self.listeners.lock().is_empty() {
            return;
        }
        if matches!(&*upstream, UpstreamState::Attached { .. }) {
            *upstream = UpstreamState::Detached;
            tracing::debug!("[输出总线] 上游订阅已释放");
        }
    }
}

/// 订阅句柄
///
/// drop 时注销对应的处理器；当某会话的处理器清空时移除其注册表条目，
/// 当整个注册表清空时释放共享的上游订阅。
pub struct SubscriptionGuard {
    inner: Weak<BusInner>,
    session_id: String,
    handler_id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let registry_empty = {
            let mut listeners = inner.listeners.lock();
            if let Some(entries) = listeners.get_mut(&self.session_id) {
                entries.retain(|entry| entry.id != self.handler_id);
                if entries.is_empty() {
                    listeners.remove(&self.session_id);
                    tracing::debug!("[输出总线] 会话 {} 已注销", self.session_id);
                }
            }
            listeners.is_empty()
        };

        if registry_empty {
            inner.maybe_detach();
        }
    }
}
