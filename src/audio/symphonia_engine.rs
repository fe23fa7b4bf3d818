//! symphonia处理引擎模块
//!
//! 提供基于symphonia的探测（容器头部 + 元数据）和逐包流式解码，
//! 供无损（FLAC/ALAC/AIFF）和有损（MP3/AAC/Vorbis）引擎共用。
//! 注意：此模块仅供universal_decoder协调器内部使用

use super::error_handling::{
    is_end_of_stream, symphonia_decode_error, symphonia_init_error, symphonia_probe_error,
};
use super::format::{CodecFamily, StreamInfo, TrackTags};
use super::streaming::{PcmChunk, StreamingDecoder, fuse_on_error};
use crate::error::{self, ConvertError, ConvertResult};
use crate::tools::constants::defaults::CHUNK_FRAMES;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{self, CodecParameters, CodecType, Decoder, DecoderOptions};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};

/// 未压缩PCM编解码器
const PCM_CODECS: &[CodecType] = &[
    codecs::CODEC_TYPE_PCM_S8,
    codecs::CODEC_TYPE_PCM_S16LE,
    codecs::CODEC_TYPE_PCM_S16BE,
    codecs::CODEC_TYPE_PCM_S24LE,
    codecs::CODEC_TYPE_PCM_S24BE,
    codecs::CODEC_TYPE_PCM_S32LE,
    codecs::CODEC_TYPE_PCM_S32BE,
    codecs::CODEC_TYPE_PCM_U8,
    codecs::CODEC_TYPE_PCM_U16LE,
    codecs::CODEC_TYPE_PCM_U16BE,
    codecs::CODEC_TYPE_PCM_U24LE,
    codecs::CODEC_TYPE_PCM_U24BE,
    codecs::CODEC_TYPE_PCM_U32LE,
    codecs::CODEC_TYPE_PCM_U32BE,
    codecs::CODEC_TYPE_PCM_F32LE,
    codecs::CODEC_TYPE_PCM_F32BE,
    codecs::CODEC_TYPE_PCM_F64LE,
    codecs::CODEC_TYPE_PCM_F64BE,
    codecs::CODEC_TYPE_PCM_ALAW,
    codecs::CODEC_TYPE_PCM_MULAW,
];

/// 无损压缩编解码器
const LOSSLESS_CODECS: &[CodecType] = &[
    codecs::CODEC_TYPE_FLAC,
    codecs::CODEC_TYPE_ALAC,
    codecs::CODEC_TYPE_WAVPACK,
    codecs::CODEC_TYPE_MONKEYS_AUDIO,
    codecs::CODEC_TYPE_TTA,
];

/// 根据编解码器类型判断编解码器族
pub(super) fn codec_family(codec: CodecType) -> CodecFamily {
    if PCM_CODECS.contains(&codec) {
        CodecFamily::Pcm
    } else if LOSSLESS_CODECS.contains(&codec) {
        CodecFamily::Lossless
    } else {
        CodecFamily::Lossy
    }
}

/// 打开文件并用symphonia探测容器
fn open_probed(path: &Path) -> Result<ProbeResult, SymphoniaError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension() {
        hint.with_extension(&extension.to_string_lossy());
    }

    symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )
}

/// 选择音频轨道：优先默认轨道，否则第一条有编解码器的轨道
fn select_track(format_reader: &dyn FormatReader) -> Option<&Track> {
    format_reader
        .default_track()
        .filter(|t| t.codec_params.codec != codecs::CODEC_TYPE_NULL)
        .or_else(|| {
            format_reader
                .tracks()
                .iter()
                .find(|t| t.codec_params.codec != codecs::CODEC_TYPE_NULL)
        })
}

/// 检测位深度
fn detect_bit_depth(codec_params: &CodecParameters) -> u16 {
    if let Some(bits) = codec_params.bits_per_sample {
        return bits as u16;
    }
    // 根据编解码器类型推断
    match codec_params.codec {
        codecs::CODEC_TYPE_PCM_S8 | codecs::CODEC_TYPE_PCM_U8 => 8,
        codecs::CODEC_TYPE_PCM_S24LE
        | codecs::CODEC_TYPE_PCM_S24BE
        | codecs::CODEC_TYPE_PCM_U24LE
        | codecs::CODEC_TYPE_PCM_U24BE => 24,
        codecs::CODEC_TYPE_PCM_S32LE
        | codecs::CODEC_TYPE_PCM_S32BE
        | codecs::CODEC_TYPE_PCM_F32LE
        | codecs::CODEC_TYPE_PCM_F32BE => 32,
        codecs::CODEC_TYPE_PCM_F64LE | codecs::CODEC_TYPE_PCM_F64BE => 64,
        // 有损编解码器没有源位深，报告解码器名义精度
        _ => 16,
    }
}

/// 从轨道参数构建流信息（不解码任何音频包）
fn build_stream_info(params: &CodecParameters, file_size: u64) -> ConvertResult<StreamInfo> {
    let descriptor = symphonia::default::get_codecs()
        .get_codec(params.codec)
        .ok_or_else(|| {
            ConvertError::UnsupportedFormat("编解码器未注册 / codec not available".into())
        })?;

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| ConvertError::NoAudioTrack("缺少采样率 / missing sample rate".into()))?;
    let channels = params
        .channels
        .map(|ch| ch.count())
        .filter(|&count| count > 0)
        .ok_or_else(|| ConvertError::NoAudioTrack("无法获取声道数信息 / missing channels".into()))?;
    let channels = u16::try_from(channels)
        .map_err(|_| error::unsupported_format("声道数过多", channels))?;

    let family = codec_family(params.codec);
    let bits_per_sample = detect_bit_depth(params);
    // 帧数可能未声明（部分MP3/流式容器）
    let frame_count = params.n_frames.unwrap_or(0);

    let info = StreamInfo::new(sample_rate, channels, bits_per_sample, frame_count)
        .with_codec(descriptor.short_name, family)
        .with_file_size(file_size);
    info.validate()?;
    Ok(info)
}

fn apply_tags(revision: &MetadataRevision, tags: &mut TrackTags) {
    for tag in revision.tags() {
        let value = tag.value.to_string();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => tags.title = Some(value.to_string()),
            Some(StandardTagKey::Artist) => tags.artist = Some(value.to_string()),
            Some(StandardTagKey::Album) => tags.album = Some(value.to_string()),
            Some(StandardTagKey::Genre) => tags.genre = Some(value.to_string()),
            Some(StandardTagKey::Date) | Some(StandardTagKey::OriginalDate) => {
                if tags.year.is_none() {
                    tags.year = TrackTags::parse_year(value);
                }
            }
            Some(StandardTagKey::TrackNumber) => {
                tags.track_number = TrackTags::parse_track_number(value);
            }
            _ => {}
        }
    }
}

/// 读取探测阶段得到的元数据（ID3等前置标签 + 容器内标签）
fn read_tags(probed: &mut ProbeResult) -> TrackTags {
    let mut tags = TrackTags::default();

    if let Some(metadata) = probed.metadata.get()
        && let Some(revision) = metadata.current()
    {
        apply_tags(revision, &mut tags);
    }

    let metadata = probed.format.metadata();
    if let Some(revision) = metadata.current() {
        apply_tags(revision, &mut tags);
    }

    tags
}

/// 使用symphonia探测格式
pub(super) fn probe(path: &Path, file_size: u64) -> ConvertResult<StreamInfo> {
    let mut probed = open_probed(path).map_err(|e| symphonia_probe_error(path, e))?;

    let params = select_track(probed.format.as_ref())
        .map(|track| track.codec_params.clone())
        .ok_or_else(|| ConvertError::NoAudioTrack(path.display().to_string()))?;

    let info = build_stream_info(&params, file_size)?.with_tags(read_tags(&mut probed));

    tracing::debug!(
        path = %path.display(),
        codec = info.codec(),
        sample_rate = info.sample_rate(),
        channels = info.channels(),
        frames = info.frame_count(),
        "symphonia探测完成"
    );
    Ok(info)
}

/// 创建symphonia流式解码器
pub(super) fn open_stream(
    path: &Path,
    info: StreamInfo,
) -> ConvertResult<Box<dyn StreamingDecoder>> {
    Ok(Box::new(SymphoniaStreamProcessor::new(path, info)?))
}

/// 转换symphonia缓冲区为交错16位格式
fn convert_buffer_to_interleaved(
    audio_buf: &AudioBufferRef,
    expected_channels: usize,
    samples: &mut Vec<i16>,
) -> Result<(), String> {
    // 使用宏消除重复的缓冲区信息提取
    macro_rules! extract_buffer_info {
        ($buf:expr) => {{ ($buf.spec().channels.count(), $buf.frames()) }};
    }

    let (channel_count, frame_count) = match audio_buf {
        AudioBufferRef::F32(buf) => extract_buffer_info!(buf),
        AudioBufferRef::S16(buf) => extract_buffer_info!(buf),
        AudioBufferRef::S24(buf) => extract_buffer_info!(buf),
        AudioBufferRef::S32(buf) => extract_buffer_info!(buf),
        AudioBufferRef::F64(buf) => extract_buffer_info!(buf),
        AudioBufferRef::U8(buf) => extract_buffer_info!(buf),
        AudioBufferRef::U16(buf) => extract_buffer_info!(buf),
        AudioBufferRef::U24(buf) => extract_buffer_info!(buf),
        AudioBufferRef::U32(buf) => extract_buffer_info!(buf),
        AudioBufferRef::S8(buf) => extract_buffer_info!(buf),
    };

    if channel_count != expected_channels {
        return Err(format!(
            "声道数变化 / channel count changed: {expected_channels} -> {channel_count}"
        ));
    }

    samples.reserve(channel_count * frame_count);

    // 逐帧交错，样本转换交给symphonia的IntoSample（浮点饱和、整数移位）
    macro_rules! convert_samples {
        ($buf:expr) => {{
            for frame in 0..frame_count {
                for ch in 0..channel_count {
                    samples.push($buf.chan(ch)[frame].into_sample());
                }
            }
        }};
    }

    match audio_buf {
        AudioBufferRef::F32(buf) => convert_samples!(buf),
        AudioBufferRef::S16(buf) => convert_samples!(buf),
        AudioBufferRef::S24(buf) => convert_samples!(buf),
        AudioBufferRef::S32(buf) => convert_samples!(buf),
        AudioBufferRef::F64(buf) => convert_samples!(buf),
        AudioBufferRef::U8(buf) => convert_samples!(buf),
        AudioBufferRef::U16(buf) => convert_samples!(buf),
        AudioBufferRef::U24(buf) => convert_samples!(buf),
        AudioBufferRef::U32(buf) => convert_samples!(buf),
        AudioBufferRef::S8(buf) => convert_samples!(buf),
    }

    Ok(())
}

/// symphonia流式处理器
///
/// 每次累积至少 CHUNK_FRAMES 帧再返回；损坏的包不会被跳过。
pub(super) struct SymphoniaStreamProcessor {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: StreamInfo,
    position: u64,
    /// 无损/PCM容器声明的精确帧数，用于截断检测
    expected_frames: Option<u64>,
    /// 包时间戳以帧为单位，可用于检测被读取器跳过的帧
    frame_timestamps: bool,
    finished: bool,
}

/// 时间基是否为 1/采样率（即包时间戳等于帧序号）
fn timestamps_are_frames(params: &CodecParameters, sample_rate: u32) -> bool {
    params
        .time_base
        .is_none_or(|tb| tb.numer == 1 && tb.denom == sample_rate)
}

impl SymphoniaStreamProcessor {
    fn new(path: &Path, info: StreamInfo) -> ConvertResult<Self> {
        let probed = open_probed(path).map_err(|e| symphonia_init_error("格式探测失败", e))?;
        let format_reader = probed.format;

        let track = select_track(format_reader.as_ref()).ok_or_else(|| {
            error::reader_init_error("未找到音频轨道", path.display())
        })?;
        let track_id = track.id;
        // FLAC读取器遇到CRC错误的帧会直接重新同步到下一帧，只能靠时间戳发现缺口
        let frame_timestamps = info.family().has_exact_frame_count()
            && timestamps_are_frames(&track.codec_params, info.sample_rate());

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| symphonia_init_error("创建解码器失败", e))?;

        let expected_frames = if info.family().has_exact_frame_count() && info.frame_count() > 0
        {
            Some(info.frame_count())
        } else {
            None
        };

        tracing::debug!(
            path = %path.display(),
            codec = info.codec(),
            expected_frames = ?expected_frames,
            "开始解码音频文件"
        );

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            info,
            position: 0,
            expected_frames,
            frame_timestamps,
            finished: false,
        })
    }

    /// 逐包解码直到累积到块大小阈值或文件结束
    fn read_chunk(&mut self) -> ConvertResult<Option<PcmChunk>> {
        let channels = self.info.channels_usize();
        let target = CHUNK_FRAMES * channels;
        let mut samples: Vec<i16> = Vec::with_capacity(target);
        let mut reached_eof = false;

        while samples.len() < target {
            let frame_here = self.position + (samples.len() / channels) as u64;

            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) if is_end_of_stream(&e) => {
                    reached_eof = true;
                    break;
                }
                Err(e) => return Err(symphonia_decode_error(frame_here, e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            if self.frame_timestamps && packet.ts() != frame_here {
                return Err(error::decode_error(
                    frame_here,
                    format!(
                        "码流不连续 / discontinuity: expected frame {frame_here}, packet starts at {}",
                        packet.ts()
                    ),
                ));
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| symphonia_decode_error(frame_here, e))?;
            convert_buffer_to_interleaved(&decoded, channels, &mut samples)
                .map_err(|msg| error::decode_error(frame_here, msg))?;
        }

        let end = self.position + (samples.len() / channels) as u64;
        if reached_eof
            && let Some(expected) = self.expected_frames
            && end < expected
        {
            return Err(error::decode_error(
                end,
                format!("码流被截断 / stream truncated: {end} of {expected} frames"),
            ));
        }

        if samples.is_empty() {
            return Ok(None);
        }

        let chunk = PcmChunk::new(self.position, self.info.channels(), samples);
        self.position = chunk.end_frame();
        Ok(Some(chunk))
    }
}

impl StreamingDecoder for SymphoniaStreamProcessor {
    fn next_chunk(&mut self) -> ConvertResult<Option<PcmChunk>> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_chunk();
        fuse_on_error(&mut self.finished, result)
    }

    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn frames_decoded(&self) -> u64 {
        self.position
    }
}
