//! MacAudioConverter - 主程序入口
//!
//! 纯流程控制器，负责协调各个工具模块完成批量转换任务。

use anyhow::Context;
use mac_audio_converter::{
    BatchOptions, BatchOrchestrator, ConvertError, ErrorKind,
    tools::{self, AppConfig},
};
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 错误退出码定义
mod exit_codes {
    /// 通用错误
    pub const GENERAL_ERROR: i32 = 1;
    /// 没有可转换的文件 / 输入无效
    pub const INPUT_ERROR: i32 = 2;
    /// 部分任务失败
    pub const JOBS_FAILED: i32 = 3;
}

/// 初始化日志（RUST_LOG 优先，否则 warn，--verbose 时 info）
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 获取错误建议文本
fn get_error_suggestion(error: &ConvertError) -> &'static str {
    match error.kind() {
        ErrorKind::InvalidInput => {
            "检查命令行参数是否正确，使用 --help 查看完整用法 / Check if command-line arguments are correct, use --help to see full usage"
        }
        ErrorKind::Unreadable => {
            "检查文件路径是否正确，文件是否存在且可读 / Check if file path is correct, file exists and is readable"
        }
        ErrorKind::UnsupportedFormat | ErrorKind::NoAudioTrack => {
            "确保输入文件为支持的格式 / Ensure input file is in a supported format"
        }
        ErrorKind::ReaderInitError | ErrorKind::DecodeError => {
            "文件可能损坏或使用不支持的音频编码 / File may be corrupted or use unsupported audio encoding"
        }
        ErrorKind::WriteError => {
            "检查输出目录是否存在且可写 / Check that the output directory exists and is writable"
        }
        ErrorKind::Cancelled | ErrorKind::TimedOut => {
            "请重试或调整 --timeout / Retry or adjust --timeout"
        }
    }
}

/// 错误处理和建议
fn handle_error(error: anyhow::Error) -> ! {
    eprintln!("[ERROR] 错误 / Error: {error:#}");

    let Some(convert_error) = error.downcast_ref::<ConvertError>() else {
        process::exit(exit_codes::GENERAL_ERROR);
    };

    eprintln!(
        "[INFO] 建议 / Suggestion: {}",
        get_error_suggestion(convert_error)
    );

    // 对于格式错误，额外显示支持的格式列表
    if convert_error.kind() == ErrorKind::UnsupportedFormat {
        let decoder = mac_audio_converter::UniversalDecoder::new();
        let uppercase_formats: Vec<String> = decoder
            .supported_extensions()
            .iter()
            .map(|s| s.to_uppercase())
            .collect();
        eprintln!(
            "   Supported formats / 支持的格式: {}",
            uppercase_formats.join(", ")
        );
    }

    let exit_code = match convert_error.kind() {
        ErrorKind::InvalidInput | ErrorKind::UnsupportedFormat | ErrorKind::Unreadable => {
            exit_codes::INPUT_ERROR
        }
        _ => exit_codes::GENERAL_ERROR,
    };
    process::exit(exit_code);
}

/// 应用程序主逻辑，返回退出码
fn run(config: &AppConfig) -> anyhow::Result<i32> {
    // 1. 显示启动信息
    tools::show_startup_info(config);

    // 2. 展开输入并提交
    let mut orchestrator = BatchOrchestrator::new();
    let files = tools::collect_inputs(&config.inputs, orchestrator.decoder(), config.recursive)?;
    let submission = orchestrator.add_files(&files);

    if !config.json {
        print!(
            "{}",
            tools::format_submission(&submission, orchestrator.jobs(), config.verbose)
        );
    }

    if orchestrator.is_empty() {
        eprintln!("[WARNING] 没有可转换的文件 / Nothing to convert");
        return Ok(exit_codes::INPUT_ERROR);
    }

    // 3. 运行批次
    let mut options = BatchOptions::default().with_parallel_jobs(config.jobs);
    if let Some(dir) = &config.output_dir {
        options = options.with_output_dir(dir);
    }
    if let Some(timeout) = config.timeout {
        options = options.with_stage_timeout(timeout);
    }

    // 事件回调期间调度器被独占借用，显示用的任务快照提前克隆
    let snapshot = orchestrator.jobs().to_vec();
    let (json, verbose) = (config.json, config.verbose);
    let report = orchestrator.run(config.format, &options, |event| {
        if json {
            return;
        }
        if let Some(line) = tools::format_event(&event, &snapshot, verbose) {
            println!("{line}");
        }
    });

    // 4. 输出报告
    if config.json {
        let json = tools::report_to_json(&report).context("序列化报告失败 / failed to serialize report")?;
        println!("{json}");
    } else {
        println!();
        print!("{}", tools::format_summary(&report));
    }

    if report.all_succeeded() && !submission.has_rejections() {
        Ok(0)
    } else {
        Ok(exit_codes::JOBS_FAILED)
    }
}

fn main() {
    let config = match tools::parse_args() {
        Ok(config) => config,
        Err(error) => handle_error(error.into()),
    };
    init_logging(config.verbose);

    match run(&config) {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(error) => handle_error(error),
    }
}
