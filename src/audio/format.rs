//! 音频流信息模块
//!
//! 定义探测结果 [`StreamInfo`]、元数据标签和格式支持信息

use crate::error::{ConvertError, ConvertResult};
use serde::Serialize;

/// 编解码器族（决定解码器的截断校验策略）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CodecFamily {
    /// 未压缩PCM (WAV, AIFF)
    Pcm,
    /// 无损压缩 (FLAC, ALAC)
    Lossless,
    /// 有损压缩 (MP3, AAC, Vorbis)
    Lossy,
}

impl CodecFamily {
    /// 容器声明的帧数是否精确（可用于截断检测）
    pub fn has_exact_frame_count(&self) -> bool {
        matches!(self, Self::Pcm | Self::Lossless)
    }
}

/// 描述性元数据标签
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub track_number: Option<u32>,
}

impl TrackTags {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// 从日期字符串中提取年份（"2019"、"2019-05-03" 等）
    pub fn parse_year(value: &str) -> Option<i32> {
        let digits: String = value
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.len() == 4 {
            digits.parse().ok()
        } else {
            None
        }
    }

    /// 解析音轨号（"3"、"03/12" 等）
    pub fn parse_track_number(value: &str) -> Option<u32> {
        value
            .split('/')
            .next()
            .and_then(|n| n.trim().parse().ok())
    }
}

/// 音频流属性快照
///
/// 由探测阶段一次性构建（消费式builder方法），之后只读。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    sample_rate: u32,
    channels: u16,
    /// 源格式位深（有损编解码器报告解码器名义精度16位）
    bits_per_sample: u16,
    /// 容器声明的帧数，未声明时为0
    frame_count: u64,
    codec: String,
    family: CodecFamily,
    file_size: u64,
    tags: TrackTags,
}

impl StreamInfo {
    /// 创建新的流信息
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16, frame_count: u64) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
            frame_count,
            codec: String::from("pcm"),
            family: CodecFamily::Pcm,
            file_size: 0,
            tags: TrackTags::default(),
        }
    }

    /// 设置编解码器名称和族
    pub fn with_codec(mut self, codec: impl Into<String>, family: CodecFamily) -> Self {
        self.codec = codec.into();
        self.family = family;
        self
    }

    /// 设置源文件大小（用于码率估算）
    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    /// 附加元数据标签
    pub fn with_tags(mut self, tags: TrackTags) -> Self {
        self.tags = tags;
        self
    }

    /// 验证格式参数的有效性
    ///
    /// 声道数不做上限约束，任意正整数均合法。
    pub fn validate(&self) -> ConvertResult<()> {
        if self.sample_rate == 0 {
            return Err(ConvertError::NoAudioTrack("采样率为0 / sample rate is 0".into()));
        }
        if self.channels == 0 {
            return Err(ConvertError::NoAudioTrack("声道数为0 / channel count is 0".into()));
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn family(&self) -> CodecFamily {
        self.family
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn tags(&self) -> &TrackTags {
        &self.tags
    }

    /// 获取持续时长（秒）
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// 估算码率（bit/s），时长未知时为0
    pub fn estimated_bitrate(&self) -> u64 {
        let duration = self.duration_seconds();
        if duration > 0.0 {
            (self.file_size as f64 * 8.0 / duration).round() as u64
        } else {
            0
        }
    }

    /// 以 `mm:ss` 格式显示时长
    pub fn formatted_duration(&self) -> String {
        let total = self.duration_seconds() as u64;
        format!("{:02}:{:02}", total / 60, total % 60)
    }

    /// 声道数（usize类型，用于索引计算）
    pub fn channels_usize(&self) -> usize {
        self.channels as usize
    }
}

/// 格式支持信息
#[derive(Debug, Clone)]
pub struct FormatSupport {
    /// 支持的文件扩展名
    pub extensions: &'static [&'static str],
    /// 优先级 (0-100, 数字越大优先级越高)
    pub priority: u8,
}
