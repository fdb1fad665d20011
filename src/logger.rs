//! 日志初始化
//!
//! 基于 tracing-subscriber，支持 `RUST_LOG` 环境变量过滤与可选的文件输出。

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

/// 日志文件名
const LOG_FILE_NAME: &str = "termcast.log";

fn build_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// 初始化控制台日志
///
/// 重复初始化是无害的，后续调用会被忽略。
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_filter))
        .with_target(false)
        .try_init();
}

/// 初始化文件日志
///
/// 在 `dir` 下追加写入 `termcast.log`，目录不存在时自动创建。
pub fn init_with_file(default_filter: &str, dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_filter))
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .try_init();

    Ok(())
}
