//! 工具模块集合
//!
//! 包含CLI、日志、处理流程和播放提示，支持main.rs的流程控制。

pub mod cli;
pub mod logging;
pub mod playback_hint;
pub mod processor;

// 重新导出主要的公共接口
pub use cli::{AppConfig, parse_args, parse_args_from, show_startup_info};
pub use logging::init_logging;
pub use playback_hint::{ffplay_command, format_tag};
pub use processor::{process_file, show_report, write_report};
