//! 统一错误处理框架
//!
//! 转换流水线各阶段（探测、解码、写入、调度）的错误类型定义。
//! 每个错误都能归类为 [`ErrorKind`]，用于任务结果、批处理统计和退出码。

use crate::processing::Stage;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// 转换相关的统一错误类型
#[derive(Debug, Error)]
pub enum ConvertError {
    /// 扩展名未注册、内容无法识别或编解码器不可用（探测阶段）
    #[error("不支持的格式 / Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 文件无法打开/读取，或为空文件（探测阶段）
    #[error("文件不可读 / Unreadable file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 容器中没有可解码的音频轨道（探测阶段）
    #[error("未找到音频轨道 / No audio track: {0}")]
    NoAudioTrack(String),

    /// 解码器无法为该编解码器/容器初始化
    #[error("解码器初始化失败 / Reader init failed: {0}")]
    ReaderInit(String),

    /// 码流损坏或被截断，`frame` 为解码停止处的帧位置
    #[error("解码失败 / Decode failed at frame {frame}: {message}")]
    Decode { frame: u64, message: String },

    /// 目标文件无法创建或写入
    #[error("写入失败 / Write failed {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 调用方取消
    #[error("已取消 / Cancelled")]
    Cancelled,

    /// 阶段超时（与截断区分开报告）
    #[error("{stage}阶段超时 / {stage} stage timed out after {limit:?}")]
    TimedOut { stage: Stage, limit: Duration },

    /// 调用参数无效（如未知的目标格式）
    #[error("无效输入 / Invalid input: {0}")]
    InvalidInput(String),
}

/// 转换操作的标准Result类型
pub type ConvertResult<T> = Result<T, ConvertError>;

// ==================== 错误转换Helper函数 ====================

/// 创建格式不支持错误
#[inline]
pub fn unsupported_format<E: fmt::Display>(context: &str, err: E) -> ConvertError {
    ConvertError::UnsupportedFormat(format!("{context}: {err}"))
}

/// 创建解码器初始化错误
#[inline]
pub fn reader_init_error<E: fmt::Display>(context: &str, err: E) -> ConvertError {
    ConvertError::ReaderInit(format!("{context}: {err}"))
}

/// 创建带帧位置的解码错误
#[inline]
pub fn decode_error<E: fmt::Display>(frame: u64, err: E) -> ConvertError {
    ConvertError::Decode {
        frame,
        message: err.to_string(),
    }
}

/// 创建写入错误
#[inline]
pub fn write_error(path: impl Into<PathBuf>, source: io::Error) -> ConvertError {
    ConvertError::Write {
        path: path.into(),
        source,
    }
}

/// 创建不可读错误
#[inline]
pub fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> ConvertError {
    ConvertError::Unreadable {
        path: path.into(),
        source,
    }
}

// ==================== 错误分类系统 ====================

/// 错误类别（任务结果、批处理统计与报告使用）
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
pub enum ErrorKind {
    UnsupportedFormat,
    Unreadable,
    NoAudioTrack,
    ReaderInitError,
    DecodeError,
    WriteError,
    Cancelled,
    TimedOut,
    InvalidInput,
}

impl ConvertError {
    /// 提取错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Unreadable { .. } => ErrorKind::Unreadable,
            Self::NoAudioTrack(_) => ErrorKind::NoAudioTrack,
            Self::ReaderInit(_) => ErrorKind::ReaderInitError,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Write { .. } => ErrorKind::WriteError,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

impl ErrorKind {
    /// 获取错误类别的显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "不支持的格式 / Unsupported format",
            Self::Unreadable => "文件不可读 / Unreadable",
            Self::NoAudioTrack => "无音频轨道 / No audio track",
            Self::ReaderInitError => "解码器初始化失败 / Reader init error",
            Self::DecodeError => "解码错误 / Decode error",
            Self::WriteError => "写入错误 / Write error",
            Self::Cancelled => "已取消 / Cancelled",
            Self::TimedOut => "超时 / Timed out",
            Self::InvalidInput => "无效输入 / Invalid input",
        }
    }

    /// 是否属于提交阶段（探测）即可发现的错误
    pub fn is_probe_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat | Self::Unreadable | Self::NoAudioTrack
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
