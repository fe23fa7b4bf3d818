//! WAV处理引擎模块
//!
//! 使用 hound 直接读取 RIFF/WAVE，hound 不支持的编码（ADPCM等）回退到 symphonia。
//! 注意：此模块仅供universal_decoder协调器内部使用

use super::error_handling::{hound_decode_error, hound_probe_error};
use super::format::{CodecFamily, StreamInfo};
use super::streaming::{PcmChunk, StreamingDecoder, fuse_on_error};
use super::symphonia_engine;
use crate::error::{self, ConvertResult};
use crate::tools::constants::defaults::CHUNK_FRAMES;
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 使用hound探测WAV文件
pub(super) fn probe(path: &Path, file_size: u64) -> ConvertResult<StreamInfo> {
    let reader = match WavReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            return match hound_probe_error(path, e) {
                Some(err) => Err(err),
                None => {
                    tracing::debug!(path = %path.display(), "hound不支持该WAV编码，回退到symphonia");
                    symphonia_engine::probe(path, file_size)
                }
            };
        }
    };

    let spec = reader.spec();
    let codec = match spec.sample_format {
        SampleFormat::Int => "pcm_s",
        SampleFormat::Float => "pcm_f",
    };

    let info = StreamInfo::new(
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        reader.duration() as u64,
    )
    .with_codec(format!("{codec}{}le", spec.bits_per_sample), CodecFamily::Pcm)
    .with_file_size(file_size);
    info.validate()?;

    Ok(info)
}

/// 创建WAV流式解码器
pub(super) fn open_stream(
    path: &Path,
    info: StreamInfo,
) -> ConvertResult<Box<dyn StreamingDecoder>> {
    match WavReader::open(path) {
        Ok(reader) => Ok(Box::new(WavStreamProcessor::new(reader, info)?)),
        Err(hound::Error::Unsupported) => symphonia_engine::open_stream(path, info),
        Err(e) => Err(error::reader_init_error("WAV打开失败", e)),
    }
}

/// 把任意位深的整数样本缩放到16位
#[inline]
fn int_to_i16(sample: i32, bits: u16) -> i16 {
    if bits <= 16 {
        (sample << (16 - bits)) as i16
    } else {
        (sample >> (bits - 16)) as i16
    }
}

/// 浮点样本缩放到16位（饱和）
#[inline]
fn float_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}

/// WAV流式处理器
pub(super) struct WavStreamProcessor {
    reader: WavReader<BufReader<File>>,
    info: StreamInfo,
    sample_format: SampleFormat,
    bits_per_sample: u16,
    position: u64,
    finished: bool,
}

impl WavStreamProcessor {
    fn new(reader: WavReader<BufReader<File>>, info: StreamInfo) -> ConvertResult<Self> {
        let spec = reader.spec();
        if spec.channels != info.channels() || spec.sample_rate != info.sample_rate() {
            return Err(error::reader_init_error(
                "WAV参数与探测结果不一致",
                format!(
                    "{}Hz/{}ch vs {}Hz/{}ch",
                    spec.sample_rate,
                    spec.channels,
                    info.sample_rate(),
                    info.channels()
                ),
            ));
        }

        Ok(Self {
            reader,
            sample_format: spec.sample_format,
            bits_per_sample: spec.bits_per_sample,
            info,
            position: 0,
            finished: false,
        })
    }

    /// 读取最多 CHUNK_FRAMES 帧，失败时丢弃已读的部分
    fn read_chunk(&mut self) -> ConvertResult<Option<PcmChunk>> {
        let channels = self.info.channels_usize();
        let wanted = CHUNK_FRAMES * channels;
        let mut samples = Vec::with_capacity(wanted);
        let position = self.position;
        let bits = self.bits_per_sample;

        match self.sample_format {
            SampleFormat::Int => {
                for sample in self.reader.samples::<i32>().take(wanted) {
                    let sample = sample.map_err(|e| hound_decode_error(position, e))?;
                    samples.push(int_to_i16(sample, bits));
                }
            }
            SampleFormat::Float => {
                for sample in self.reader.samples::<f32>().take(wanted) {
                    let sample = sample.map_err(|e| hound_decode_error(position, e))?;
                    samples.push(float_to_i16(sample));
                }
            }
        }

        if samples.is_empty() {
            return Ok(None);
        }
        if samples.len() % channels != 0 {
            return Err(error::decode_error(
                position + (samples.len() / channels) as u64,
                "数据块以不完整的帧结束 / data chunk ends mid-frame",
            ));
        }

        let chunk = PcmChunk::new(position, self.info.channels(), samples);
        self.position = chunk.end_frame();
        Ok(Some(chunk))
    }
}

impl StreamingDecoder for WavStreamProcessor {
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
