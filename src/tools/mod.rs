//! 工具模块集合
//!
//! 包含CLI、文件扫描、格式化等工具模块，支持main.rs的流程控制。

pub mod cli;
pub mod constants;
pub mod formatter;
pub mod scanner;
pub mod utils;

// 重新导出主要的公共接口
pub use cli::{AppConfig, parse_args, parse_args_from, show_startup_info};
pub use formatter::{
    format_event, format_stream_info, format_submission, format_summary, format_tags, report_to_json,
    summary_table,
};
pub use scanner::{collect_inputs, scan_audio_files};
pub use utils::{effective_parallel_degree, path};
