//! TermCast - 终端会话 I/O 流控核心
//!
//! 内嵌终端多路复用器的客户端流控层：在原生 PTY 宿主与终端显示
//! 之间双向搬运字节，保证低延迟、有界的单次工作量和有序投递。
//!
//! ## 核心能力
//! - 输出事件总线：一个共享上游订阅，按会话分发给多个消费者
//! - 渲染流控：区分可见/隐藏的自适应分块冲刷
//! - 写入/尺寸合并：限制发往宿主的请求速率，写入保序
//! - 创建去重：同一会话并发的创建请求只触达宿主一次
//!
//! ## 使用示例
//! ```ignore
//! use termcast::{ControllerOptions, FlowControlConfig, OutputEventBus, TerminalController};
//!
//! let bus = OutputEventBus::new(source);
//! let controller = TerminalController::activate(
//!     &bus,
//!     host,
//!     display,
//!     FlowControlConfig::default(),
//!     ControllerOptions {
//!         session_id: "session-1".to_string(),
//!         working_dir: "/home/user/project".to_string(),
//!         resume_args: vec![],
//!         visible: true,
//!     },
//! )
//! .await?;
//! controller.handle_input(b"ls -la\n");
//! ```

// 核心模块
pub mod bus;
pub mod coalescer;
pub mod controller;
pub mod guard;
pub mod render;

// 基础模块
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod host;
pub mod logger;
pub mod session;


// 重新导出常用类型
pub use bus::{OutputEventBus, OutputForwarder, OutputHandler, OutputSource, SubscriptionGuard, UpstreamSubscription};
pub use coalescer::{ResizeCoalescer, WriteCoalescer};
pub use config::FlowControlConfig;
pub use controller::{ControllerOptions, TerminalController};
pub use display::{GridSize, TerminalDisplay, DEFAULT_COLS, DEFAULT_ROWS};
pub use error::TerminalError;
pub use events::TerminalOutputEvent;
pub use guard::SessionCreateGuard;
pub use host::PtyHost;
pub use render::RenderFlowController;
pub use session::{
    is_plain_session, new_plain_session_id, CreateSessionRequest, SessionMetadata, SessionStatus,
    PLAIN_SESSION_PREFIX,
};
