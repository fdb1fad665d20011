//! 会话创建去重
//!
//! 多个调用路径（挂载、重新可见、手动重试）可能并发地确保同一会话存在。
//! 本模块保证同一会话 ID 最多只有一个在途的创建请求，并发调用方
//! 等待同一个结果。
//!
//! ## 功能
//! - 每会话最多一个在途创建请求
//! - 并发调用方共享同一结果（成功或失败）
//! - 失败不自动重试，令牌清除后再次调用会发起新请求
//! - 工作目录为空时本地拒绝，不触达宿主

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;

use crate::error::TerminalError;
use crate::host::PtyHost;
use crate::session::CreateSessionRequest;

type CreateFuture = Shared<BoxFuture<'static, Result<(), String>>>;

/// 会话创建守卫
pub struct SessionCreateGuard {
    host: Arc<dyn PtyHost>,
    /// 在途创建令牌：会话 ID -> 共享的创建结果
    in_flight: DashMap<String, CreateFuture>,
}

impl SessionCreateGuard {
    /// 创建守卫
    pub fn new(host: Arc<dyn PtyHost>) -> Self {
        Self {
            host,
            in_flight: DashMap::new(),
        }
    }

    /// 确保会话存在
    ///
    /// 同一会话已有在途请求时等待其结果；否则发起新的创建请求。
    /// 无论成功失败，完成后清除在途令牌。
    pub async fn ensure_created(
        self: &Arc<Self>,
        request: CreateSessionRequest,
    ) -> Result<(), TerminalError> {
        if request.working_dir.trim().is_empty() {
            tracing::debug!(
                "[创建守卫] 工作目录为空，跳过会话 {} 的创建",
                request.session_id
            );
            return Err(TerminalError::WorkingDirRequired);
        }

        let session_id = request.session_id.clone();
        let create = match self.in_flight.entry(session_id.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!("[创建守卫] 会话 {} 已有在途创建请求，等待其结果", session_id);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let host = self.host.clone();
                let weak = Arc::downgrade(self);
                let id = session_id.clone();
                let fut = async move {
                    tracing::debug!("[创建守卫] 发起会话 {} 的创建请求", id);
                    let result = host
                        .create_session(&request)
                        .await
                        .map_err(|err| err.to_string());
                    if let Some(guard) = weak.upgrade() {
                        guard.in_flight.remove(&id);
                    }
                    result
                }
                .boxed()
                .shared();
                entry.insert(fut.clone());
                fut
            }
        };

        create.await.map_err(TerminalError::CreationFailed)
    }

    /// 当前在途创建请求数
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// 计数宿主：记录创建次数，可注入失败与延迟
    struct CountingHost {
        create_calls: AtomicUsize,
        fail_create: AtomicBool,
    }

    impl CountingHost {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                create_calls: AtomicUsize::new(0),
                fail_create: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl PtyHost for CountingHost {
        async fn create_session(
            &self,
            _request: &CreateSessionRequest,
        ) -> Result<(), TerminalError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(TerminalError::CreationFailed("spawn failed".to_string()));
            }
            Ok(())
        }

        async fn write(&self, _session_id: &str, _data: &[u8]) -> Result<(), TerminalError> {
            Ok(())
        }

        async fn resize(
            &self,
            _session_id: &str,
            _cols: u16,
            _rows: u16,
        ) -> Result<(), TerminalError> {
            Ok(())
        }

        async fn close(&self, _session_id: &str) -> Result<(), TerminalError> {
            Ok(())
        }
    }

    fn request(session_id: &str, working_dir: &str) -> CreateSessionRequest {
        CreateSessionRequest::build(session_id.to_string(), working_dir.to_string(), &[])
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_share_one_request() {
        let host = CountingHost::new();
        let guard = Arc::new(SessionCreateGuard::new(host.clone()));

        let (a, b, c) = tokio::join!(
            guard.ensure_created(request("s1", "/tmp")),
            guard.ensure_created(request("s1", "/tmp")),
            guard.ensure_created(request("s1", "/tmp")),
        );

        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(host.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_shared_then_retry_issues_new_request() {
        let host = CountingHost::new();
        host.fail_create.store(true, Ordering::SeqCst);
        let guard = Arc::new(SessionCreateGuard::new(host.clone()));

        let (a, b) = tokio::join!(
            guard.ensure_created(request("s1", "/tmp")),
            guard.ensure_created(request("s1", "/tmp")),
        );
        assert!(matches!(a, Err(TerminalError::CreationFailed(_))));
        assert!(matches!(b, Err(TerminalError::CreationFailed(_))));
        assert_eq!(host.create_calls.load(Ordering::SeqCst), 1);

        // 令牌已清除，显式重试会发起新请求
        host.fail_create.store(false, Ordering::SeqCst);
        guard.ensure_created(request("s1", "/tmp")).await.unwrap();
        assert_eq!(host.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_working_dir_rejected_without_host_call() {
        let host = CountingHost::new();
        let guard = Arc::new(SessionCreateGuard::new(host.clone()));

        let result = guard.ensure_created(request("s1", "   ")).await;
        assert!(matches!(result, Err(TerminalError::WorkingDirRequired)));
        assert_eq!(host.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(guard.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_sessions_do_not_share_tokens() {
        let host = CountingHost::new();
        let guard = Arc::new(SessionCreateGuard::new(host.clone()));

        let (a, b) = tokio::join!(
            guard.ensure_created(request("s1", "/tmp")),
            guard.ensure_created(request("s2", "/tmp")),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(host.create_calls.load(Ordering::SeqCst), 2);
    }
}
