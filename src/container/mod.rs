//! 输出容器模块
//!
//! 目标格式定义和容器写入器。写入器拿到完整PCM流后一次性输出，
//! 先写同目录临时文件再重命名，目标路径上不会出现残缺文件。

mod wav_writer;

pub use wav_writer::{PcmLayout, WavContainerWriter, encode_header};

use crate::audio::PcmBuffer;
use crate::error::{ConvertError, ConvertResult};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 转换目标格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// 规范RIFF/WAVE，16位整数PCM
    #[default]
    Wav,
}

impl TargetFormat {
    /// 全部可用的目标格式
    pub fn available() -> &'static [TargetFormat] {
        &[TargetFormat::Wav]
    }

    /// 输出文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Wav => "WAV",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TargetFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            other => {
                let names: Vec<&str> = Self::available().iter().map(|f| f.extension()).collect();
                Err(ConvertError::InvalidInput(format!(
                    "未知的目标格式 / unknown target format '{other}' (可用 / available: {})",
                    names.join(", ")
                )))
            }
        }
    }
}

/// 容器写入器trait
pub trait ContainerWriter: Send + Sync {
    /// 写入器输出的格式
    fn format(&self) -> TargetFormat;

    /// 把完整PCM流写到目标路径，返回写入的总字节数
    ///
    /// 失败时目标路径保持原样（不存在的仍不存在，已存在的不被截断）。
    fn write(&self, buffer: &PcmBuffer, destination: &Path) -> ConvertResult<u64>;
}

/// 获取目标格式对应的写入器
pub fn writer_for(target: TargetFormat) -> Box<dyn ContainerWriter> {
    match target {
        TargetFormat::Wav => Box::new(WavContainerWriter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_target_format_parsing() {
        assert_eq!("wav".parse::<TargetFormat>().unwrap(), TargetFormat::Wav);
        assert_eq!(" WAVE ".parse::<TargetFormat>().unwrap(), TargetFormat::Wav);

        let err = "mp3".parse::<TargetFormat>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("mp3"));
    }

    #[test]
    fn test_available_formats() {
        assert_eq!(TargetFormat::available(), &[TargetFormat::Wav]);
        assert_eq!(TargetFormat::default().extension(), "wav");
        assert_eq!(writer_for(TargetFormat::Wav).format(), TargetFormat::Wav);
        assert_eq!(TargetFormat::Wav.to_string(), "WAV");
    }
}
