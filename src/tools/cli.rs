//! 命令行接口模块
//!
//! 负责命令行参数解析、配置管理和程序信息展示。

use super::constants::defaults;
use crate::container::TargetFormat;
use crate::error::{ConvertError, ConvertResult};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// 应用程序版本信息
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// 应用程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 输入文件或目录
    pub inputs: Vec<PathBuf>,

    /// 目标格式
    pub format: TargetFormat,

    /// 输出目录（缺省时写到各输入文件旁边）
    pub output_dir: Option<PathBuf>,

    /// 并行任务数
    pub jobs: usize,

    /// 单阶段超时
    pub timeout: Option<Duration>,

    /// 以JSON输出批处理报告
    pub json: bool,

    /// 是否显示详细信息
    pub verbose: bool,

    /// 递归扫描目录
    pub recursive: bool,
}

/// 构建命令行定义
pub fn build_command() -> Command {
    Command::new("MacAudioConverter")
        .version(VERSION)
        .about(DESCRIPTION)
        .arg(
            Arg::new("INPUT")
                .help("音频文件或目录 / Audio files or directories (WAV, FLAC, AIFF, ALAC, MP3, AAC, M4A, OGG, MKA)")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("目标格式 / Target format")
                .value_name("FORMAT")
                .default_value(defaults::TARGET_FORMAT),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .help("输出目录 / Output directory (默认写到输入文件旁边 / default: next to each input)")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .help("并行任务数 / Parallel jobs (1 = 串行 / serial)")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .default_value("1"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("单阶段超时秒数 / Per-stage timeout in seconds")
                .value_name("SECS")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("以JSON输出批处理报告 / Print the batch report as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("显示详细处理信息 / Verbose output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("recursive")
                .long("recursive")
                .short('r')
                .help("递归扫描子目录 / Scan directories recursively")
                .action(ArgAction::SetTrue),
        )
}

fn config_from_matches(matches: &ArgMatches) -> ConvertResult<AppConfig> {
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("INPUT")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let format = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or(defaults::TARGET_FORMAT)
        .parse::<TargetFormat>()?;

    Ok(AppConfig {
        inputs,
        format,
        output_dir: matches.get_one::<PathBuf>("output-dir").cloned(),
        jobs: matches
            .get_one::<usize>("jobs")
            .copied()
            .unwrap_or(defaults::PARALLEL_JOBS),
        timeout: matches
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs)),
        json: matches.get_flag("json"),
        verbose: matches.get_flag("verbose"),
        recursive: matches.get_flag("recursive"),
    })
}

/// 解析命令行参数并创建配置（参数语法错误时由clap打印用法并退出）
pub fn parse_args() -> ConvertResult<AppConfig> {
    config_from_matches(&build_command().get_matches())
}

/// 从给定参数解析配置（不退出进程）
pub fn parse_args_from<I, T>(args: I) -> ConvertResult<AppConfig>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = build_command()
        .try_get_matches_from(args)
        .map_err(|e| ConvertError::InvalidInput(e.to_string()))?;
    config_from_matches(&matches)
}

/// 显示程序启动信息
pub fn show_startup_info(config: &AppConfig) {
    if config.json {
        return;
    }
    println!("🚀 MacAudioConverter v{VERSION} 启动 / starting");
    if config.verbose {
        println!("📝 {DESCRIPTION}");
        println!(
            "🎯 目标格式 / Target: {}  并行任务 / Jobs: {}",
            config.format, config.jobs
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = parse_args_from(["MacAudioConverter", "a.flac"]).unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("a.flac")]);
        assert_eq!(config.format, TargetFormat::Wav);
        assert_eq!(config.jobs, 1);
        assert!(config.output_dir.is_none());
        assert!(config.timeout.is_none());
        assert!(!config.json && !config.verbose && !config.recursive);
    }

    #[test]
    fn test_all_options() {
        let config = parse_args_from([
            "MacAudioConverter",
            "-f",
            "WAV",
            "-o",
            "out",
            "-j",
            "4",
            "--timeout",
            "30",
            "--json",
            "-v",
            "-r",
            "a.mp3",
            "music",
        ])
        .unwrap();
        assert_eq!(config.inputs.len(), 2);
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.jobs, 4);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(config.json && config.verbose && config.recursive);
    }

    #[test]
    fn test_invalid_arguments() {
        let unknown = parse_args_from(["MacAudioConverter", "-f", "mp3", "a.flac"]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::InvalidInput);

        let missing = parse_args_from(["MacAudioConverter"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::InvalidInput);

        let zero_timeout =
            parse_args_from(["MacAudioConverter", "--timeout", "0", "a.flac"]).unwrap_err();
        assert_eq!(zero_timeout.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_command_definition_is_consistent() {
        build_command().debug_assert();
    }
}
