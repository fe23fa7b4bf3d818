//! 错误处理模块
//!
//! 把 symphonia / hound 的错误映射到各阶段的 [`ConvertError`]。
//! 注意：此模块仅供解码引擎内部使用

use crate::error::{self, ConvertError};
use std::io;
use std::path::Path;
use symphonia::core::errors::Error as SymphoniaError;

/// 探测阶段的 symphonia 错误映射
pub(super) fn symphonia_probe_error(path: &Path, err: SymphoniaError) -> ConvertError {
    match err {
        SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            // 头部都读不完整：没有可用的音频流
            ConvertError::NoAudioTrack(format!("{}: {e}", path.display()))
        }
        SymphoniaError::IoError(e) => error::unreadable(path, e),
        SymphoniaError::Unsupported(what) => error::unsupported_format("格式探测失败", what),
        SymphoniaError::DecodeError(what) => error::unsupported_format("容器头部损坏", what),
        SymphoniaError::LimitError(what) => error::unsupported_format("超出解析限制", what),
        SymphoniaError::SeekError(_) | SymphoniaError::ResetRequired => {
            error::unsupported_format("格式探测失败", err)
        }
    }
}

/// 解码器初始化阶段的 symphonia 错误映射
pub(super) fn symphonia_init_error(context: &str, err: SymphoniaError) -> ConvertError {
    error::reader_init_error(context, err)
}

/// 逐包读取/解码时的 symphonia 错误映射（`frame` 为当前位置）
pub(super) fn symphonia_decode_error(frame: u64, err: SymphoniaError) -> ConvertError {
    match err {
        SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            error::decode_error(frame, format!("码流被截断 / truncated packet: {e}"))
        }
        other => error::decode_error(frame, other),
    }
}

/// 是否为正常的流结束
pub(super) fn is_end_of_stream(err: &SymphoniaError) -> bool {
    matches!(err, SymphoniaError::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}

/// hound 打开/探测阶段的错误映射
///
/// `Unsupported` 单独返回 `None`，由调用方回退到 symphonia。
pub(super) fn hound_probe_error(path: &Path, err: hound::Error) -> Option<ConvertError> {
    match err {
        hound::Error::Unsupported => None,
        hound::Error::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => Some(
            error::unreadable(path, io::Error::new(e.kind(), format!("WAV头部不完整: {e}"))),
        ),
        hound::Error::IoError(e) => Some(error::unreadable(path, e)),
        hound::Error::FormatError(what) => Some(error::unsupported_format("WAV格式错误", what)),
        other => Some(error::unsupported_format("WAV格式错误", other)),
    }
}

/// hound 读取样本时的错误映射
pub(super) fn hound_decode_error(frame: u64, err: hound::Error) -> ConvertError {
    match err {
        hound::Error::IoError(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            error::decode_error(frame, format!("数据块被截断 / truncated data chunk: {e}"))
        }
        other => error::decode_error(frame, other),
    }
}
