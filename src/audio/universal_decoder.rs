//! 统一音频解码器
//!
//! 提供统一的音频解码接口，按扩展名在优先级注册表中选择解码引擎，
//! 采用插件化架构，便于扩展新格式

use super::format::{FormatSupport, StreamInfo};
use super::streaming::StreamingDecoder;
use super::{symphonia_engine, wav_engine};
use crate::error::{self, ConvertError, ConvertResult};
use std::io;
use std::path::Path;

/// 音频解码器trait
pub trait AudioDecoder: Send + Sync {
    /// 获取解码器名称
    fn name(&self) -> &'static str;

    /// 获取支持的格式信息
    fn supported_formats(&self) -> &FormatSupport;

    /// 检测是否能解码指定文件（按扩展名，大小写不敏感）
    fn can_decode(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
            self.supported_formats()
                .extensions
                .contains(&ext.to_lowercase().as_str())
        } else {
            false
        }
    }

    /// 探测文件格式（只读容器头部和轨道描述，不解码音频数据）
    fn probe(&self, path: &Path, file_size: u64) -> ConvertResult<StreamInfo>;

    /// 创建流式解码器
    fn open_stream(&self, path: &Path, info: StreamInfo)
    -> ConvertResult<Box<dyn StreamingDecoder>>;
}

/// WAV解码引擎 - hound直读，不支持的编码回退到symphonia
pub struct WavEngine;

impl AudioDecoder for WavEngine {
    fn name(&self) -> &'static str {
        "WAV Engine"
    }

    fn supported_formats(&self) -> &FormatSupport {
        static SUPPORT: FormatSupport = FormatSupport {
            extensions: &["wav", "wave"],
            priority: 90,
        };
        &SUPPORT
    }

    fn probe(&self, path: &Path, file_size: u64) -> ConvertResult<StreamInfo> {
        wav_engine::probe(path, file_size)
    }

    fn open_stream(
        &self,
        path: &Path,
        info: StreamInfo,
    ) -> ConvertResult<Box<dyn StreamingDecoder>> {
        wav_engine::open_stream(path, info)
    }
}

/// 无损解码引擎 - FLAC、AIFF、ALAC
pub struct LosslessEngine;

impl AudioDecoder for LosslessEngine {
    fn name(&self) -> &'static str {
        "Lossless Engine"
    }

    fn supported_formats(&self) -> &FormatSupport {
        static SUPPORT: FormatSupport = FormatSupport {
            extensions: &["flac", "aiff", "aif", "alac"],
            priority: 80,
        };
        &SUPPORT
    }

    fn probe(&self, path: &Path, file_size: u64) -> ConvertResult<StreamInfo> {
        symphonia_engine::probe(path, file_size)
    }

    fn open_stream(
        &self,
        path: &Path,
        info: StreamInfo,
    ) -> ConvertResult<Box<dyn StreamingDecoder>> {
        symphonia_engine::open_stream(path, info)
    }
}

/// 有损解码引擎 - MP3、AAC、M4A/MP4、Ogg Vorbis、Matroska音频
pub struct LossyEngine;

impl AudioDecoder for LossyEngine {
    fn name(&self) -> &'static str {
        "Lossy Engine"
    }

    fn supported_formats(&self) -> &FormatSupport {
        static SUPPORT: FormatSupport = FormatSupport {
            extensions: &["mp3", "m4a", "mp4", "aac", "ogg", "oga", "mka"],
            priority: 70,
        };
        &SUPPORT
    }

    fn probe(&self, path: &Path, file_size: u64) -> ConvertResult<StreamInfo> {
        symphonia_engine::probe(path, file_size)
    }

    fn open_stream(
        &self,
        path: &Path,
        info: StreamInfo,
    ) -> ConvertResult<Box<dyn StreamingDecoder>> {
        symphonia_engine::open_stream(path, info)
    }
}

/// 统一解码器 - 解码引擎注册表
pub struct UniversalDecoder {
    decoders: Vec<Box<dyn AudioDecoder>>,
}

impl Default for UniversalDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl UniversalDecoder {
    /// 创建新的统一解码器（注册全部内置引擎）
    pub fn new() -> Self {
        let mut decoder = Self {
            decoders: Vec::new(),
        };
        decoder.add_decoder(Box::new(WavEngine));
        decoder.add_decoder(Box::new(LosslessEngine));
        decoder.add_decoder(Box::new(LossyEngine));
        decoder
    }

    /// 添加自定义解码器
    pub fn add_decoder(&mut self, decoder: Box<dyn AudioDecoder>) {
        self.decoders.push(decoder);
        // 按优先级排序（优先级高的在前，同优先级保持注册顺序）
        self.decoders.sort_by(|a, b| {
            b.supported_formats()
                .priority
                .cmp(&a.supported_formats().priority)
        });
    }

    /// 获取能处理指定文件的解码器
    pub fn get_decoder(&self, path: &Path) -> ConvertResult<&dyn AudioDecoder> {
        if let Some(decoder) = self.decoders.iter().find(|d| d.can_decode(path)) {
            return Ok(decoder.as_ref());
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        Err(ConvertError::UnsupportedFormat(format!(
            "不支持的文件格式 / unregistered extension: .{ext}"
        )))
    }

    /// 探测文件格式
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> ConvertResult<StreamInfo> {
        let path = path.as_ref();
        let decoder = self.get_decoder(path)?;

        let metadata = std::fs::metadata(path).map_err(|e| error::unreadable(path, e))?;
        if !metadata.is_file() {
            return Err(error::unreadable(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "不是普通文件 / not a regular file"),
            ));
        }
        if metadata.len() == 0 {
            return Err(error::unreadable(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "空文件 / file is empty"),
            ));
        }

        decoder.probe(path, metadata.len())
    }

    /// 创建流式解码器
    ///
    /// 传入提交时的探测结果可避免重复探测；不传时重新探测，
    /// 此时探测失败一律视为解码器初始化失败。
    pub fn open_stream<P: AsRef<Path>>(
        &self,
        path: P,
        info: Option<&StreamInfo>,
    ) -> ConvertResult<Box<dyn StreamingDecoder>> {
        let path = path.as_ref();
        let decoder = self
            .get_decoder(path)
            .map_err(|e| error::reader_init_error("无可用解码引擎", e))?;

        let info = match info {
            Some(info) => info.clone(),
            None => self
                .probe(path)
                .map_err(|e| error::reader_init_error("重新探测失败", e))?,
        };

        decoder.open_stream(path, info)
    }

    /// 获取支持的格式列表
    pub fn supported_formats(&self) -> Vec<(&'static str, &FormatSupport)> {
        self.decoders
            .iter()
            .map(|d| (d.name(), d.supported_formats()))
            .collect()
    }

    /// 全部已注册的扩展名（按引擎优先级）
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        self.decoders
            .iter()
            .flat_map(|d| d.supported_formats().extensions.iter().copied())
            .collect()
    }

    /// 扩展名是否已注册
    pub fn is_supported(&self, path: &Path) -> bool {
        self.decoders.iter().any(|d| d.can_decode(path))
    }
}
