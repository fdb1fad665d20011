//! 终端会话控制器
//!
//! 把输出总线、渲染流控、写入/尺寸合并与创建守卫组合成
//! 单个内嵌终端的完整生命周期。
//!
//! ## 生命周期
//! - 激活：订阅输出并接入渲染流控，确保宿主侧会话存在
//! - 运行：显示侧输入/网格变化分别进入写入/尺寸合并器
//! - 重新可见：重新适配显示并再次确保会话存在（幂等），
//!   可以从先前启动失败的宿主会话中恢复
//! - 关停：退订输出、取消已调度的刷新、最后冲刷一次写入与尺寸、
//!   释放所有缓冲；不等待宿主对最后冲刷的确认

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::bus::{OutputEventBus, SubscriptionGuard};
use crate::coalescer::{ResizeCoalescer, WriteCoalescer};
use crate::config::FlowControlConfig;
use crate::display::{GridSize, TerminalDisplay};
use crate::error::TerminalError;
use crate::guard::SessionCreateGuard;
use crate::host::PtyHost;
use crate::render::RenderFlowController;
use crate::session::{CreateSessionRequest, SessionMetadata, SessionStatus};

/// 控制器构造选项
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// 会话 ID
    pub session_id: String,
    /// 工作目录
    pub working_dir: String,
    /// 恢复时附加的参数列表
    pub resume_args: Vec<String>,
    /// 初始可见状态
    pub visible: bool,
}

/// 终端会话控制器
pub struct TerminalController {
    session_id: String,
    working_dir: String,
    resume_args: Vec<String>,
    host: Arc<dyn PtyHost>,
    display: Arc<dyn TerminalDisplay>,
    guard: Arc<SessionCreateGuard>,
    render: RenderFlowController,
    write_coalescer: WriteCoalescer,
    resize_coalescer: ResizeCoalescer,
    subscription: Mutex<Option<SubscriptionGuard>>,
    metadata: Mutex<SessionMetadata>,
    cancel: CancellationToken,
}

impl TerminalController {
    /// 激活一个终端会话
    ///
    /// 订阅输出事件并接入渲染流控，然后确保宿主侧会话存在。
    /// 输出订阅失败对该会话的输出路径是致命的：错误内联显示，
    /// 不再尝试创建会话，但写入路径仍然可用。
    pub async fn activate(
        bus: &OutputEventBus,
        host: Arc<dyn PtyHost>,
        display: Arc<dyn TerminalDisplay>,
        config: FlowControlConfig,
        options: ControllerOptions,
    ) -> Result<Arc<Self>, TerminalError> {
        if options.session_id.trim().is_empty() {
            return Err(TerminalError::SessionIdRequired);
        }

        let cancel = CancellationToken::new();
        let render = RenderFlowController::new(
            options.session_id.clone(),
            display.clone(),
            config.clone(),
            options.visible,
            cancel.clone(),
        );
        let write_coalescer = WriteCoalescer::new(
            options.session_id.clone(),
            host.clone(),
            config.write_flush_delay(),
            cancel.clone(),
        );
        let resize_coalescer = ResizeCoalescer::new(
            options.session_id.clone(),
            host.clone(),
            config.resize_flush_delay(),
            cancel.clone(),
        );

        let controller = Arc::new(Self {
            guard: Arc::new(SessionCreateGuard::new(host.clone())),
            metadata: Mutex::new(SessionMetadata::new(options.session_id.clone())),
            session_id: options.session_id,
            working_dir: options.working_dir,
            resume_args: options.resume_args,
            host,
            display,
            render,
            write_coalescer,
            resize_coalescer,
            subscription: Mutex::new(None),
            cancel,
        });

        let render_handle = controller.render.clone();
        match bus
            .subscribe(
                &controller.session_id,
                Arc::new(move |data| render_handle.queue(data)),
            )
            .await
        {
            Ok(subscription) => {
                *controller.subscription.lock() = Some(subscription);
            }
            Err(err) => {
                tracing::error!(
                    "[终端控制] 会话 {} 输出订阅失败: {}",
                    controller.session_id,
                    err
                );
                controller.write_inline_error(&format!("Failed to subscribe PTY output: {err}"));
                return Ok(controller);
            }
        }

        controller.ensure_session("mount").await;

        Ok(controller)
    }

    /// 会话 ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 当前会话元数据
    pub fn metadata(&self) -> SessionMetadata {
        self.metadata.lock().clone()
    }

    /// 确保宿主侧会话存在（幂等）
    ///
    /// 创建失败内联显示一次，不会使控制器崩溃；之后的调用
    /// （例如重新可见触发）会发起新的请求。
    pub async fn ensure_session(&self, reason: &str) {
        let request = CreateSessionRequest::build(
            self.session_id.clone(),
            self.working_dir.clone(),
            &self.resume_args,
        );

        match self.guard.ensure_created(request).await {
            Ok(()) => {
                self.metadata.lock().status = SessionStatus::Running;
                tracing::debug!("[终端控制] 会话 {} 创建完成 ({})", self.session_id, reason);
            }
            Err(TerminalError::WorkingDirRequired) => {
                tracing::debug!(
                    "[终端控制] 会话 {} 工作目录为空，跳过创建 ({})",
                    self.session_id,
                    reason
                );
            }
            Err(err) => {
                tracing::error!(
                    "[终端控制] 会话 {} 创建失败 ({}): {}",
                    self.session_id,
                    reason,
                    err
                );
                self.metadata.lock().status = SessionStatus::Error;
                self.write_inline_error(&format!("Failed to create PTY: {err}"));
            }
        }
    }

    /// 处理显示侧的用户输入
    pub fn handle_input(&self, data: &[u8]) {
        self.write_coalescer.queue_write(data);
    }

    /// 处理显示侧的网格大小变化
    pub fn handle_grid_resize(&self, size: GridSize) {
        {
            let mut metadata = self.metadata.lock();
            metadata.cols = size.cols;
            metadata.rows = size.rows;
        }
        self.resize_coalescer.queue_resize(size);
    }

    /// 更新可见状态
    ///
    /// 变为可见时重新适配显示并聚焦，把适配后的网格大小同步给宿主，
    /// 同时再次确保宿主侧会话存在，以便从先前失败的创建中恢复。
    pub fn set_visible(self: &Arc<Self>, visible: bool) {
        self.render.set_visible(visible);
        if !visible {
            return;
        }

        self.display.fit();
        self.display.focus();
        self.handle_grid_resize(self.display.grid());

        let this = self.clone();
        tokio::spawn(async move {
            this.ensure_session("visible").await;
        });
    }

    /// 当前是否可见
    pub fn is_visible(&self) -> bool {
        self.render.is_visible()
    }

    /// 关停控制器
    ///
    /// 退订输出、取消已调度的刷新任务，并对写入与尺寸各做一次
    /// 尽力而为的最后冲刷，保证关闭瞬间已入队的输入不被静默丢弃。
    pub async fn shutdown(&self) {
        self.subscription.lock().take();
        self.cancel.cancel();

        self.write_coalescer.flush_now().await;
        self.resize_coalescer.flush_now().await;
        self.render.clear();

        self.metadata.lock().status = SessionStatus::Done;
        tracing::debug!("[终端控制] 会话 {} 已关停", self.session_id);
    }

    /// 关停并关闭宿主侧会话
    pub async fn close(&self) -> Result<(), TerminalError> {
        self.shutdown().await;
        self.host.close(&self.session_id).await
    }

    /// 向显示内联写入一条错误信息（红色）
    fn write_inline_error(&self, message: &str) {
        let text = format!("\r\n\x1b[31m{message}\x1b[0m\r\n");
        self.display.write(text.as_bytes());
    }
}
