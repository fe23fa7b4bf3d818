//! RIFF/WAVE写入器
//!
//! 44字节规范头部 + 交错16位小端样本，所有多字节字段均为小端。

use super::{ContainerWriter, TargetFormat};
use crate::audio::PcmBuffer;
use crate::error::{self, ConvertResult};
use crate::tools::constants::container::{
    OUTPUT_BITS_PER_SAMPLE, PARTIAL_SUFFIX, WAV_HEADER_LEN,
};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// 头部中除数据块之外的字节数（RIFF块大小 = 数据长度 + 36）
const RIFF_OVERHEAD: u32 = (WAV_HEADER_LEN - 8) as u32;

/// 输出PCM布局（采样率、声道数、16位）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmLayout {
    sample_rate: u32,
    channels: u16,
    byte_rate: u32,
    block_align: u16,
}

impl PcmLayout {
    /// 创建16位输出布局，字节率或块对齐超出头部字段范围时失败
    pub fn new(sample_rate: u32, channels: u16) -> io::Result<Self> {
        let bytes_per_sample = OUTPUT_BITS_PER_SAMPLE / 8;
        if sample_rate == 0 || channels == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("无效的PCM布局 / invalid layout: {sample_rate}Hz, {channels}ch"),
            ));
        }

        let block_align = channels.checked_mul(bytes_per_sample).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("声道数超出WAV块对齐范围 / too many channels: {channels}"),
            )
        })?;
        let byte_rate = sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "字节率超出32位范围 / byte rate overflows u32",
                )
            })?;

        Ok(Self {
            sample_rate,
            channels,
            byte_rate,
            block_align,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        OUTPUT_BITS_PER_SAMPLE
    }

    /// 每秒字节数：采样率 × 声道数 × 2
    pub fn byte_rate(&self) -> u32 {
        self.byte_rate
    }

    /// 每帧字节数：声道数 × 2
    pub fn block_align(&self) -> u16 {
        self.block_align
    }
}

/// 编码44字节WAV头部
pub fn encode_header(layout: &PcmLayout, payload_len: u32) -> [u8; WAV_HEADER_LEN] {
    let mut header = [0u8; WAV_HEADER_LEN];
    let mut pos = 0;
    let mut put = |bytes: &[u8]| {
        header[pos..pos + bytes.len()].copy_from_slice(bytes);
        pos += bytes.len();
    };

    // RIFF头
    put(b"RIFF");
    put(&payload_len.saturating_add(RIFF_OVERHEAD).to_le_bytes());
    put(b"WAVE");

    // fmt 块
    put(b"fmt ");
    put(&16u32.to_le_bytes());
    put(&1u16.to_le_bytes()); // PCM
    put(&layout.channels().to_le_bytes());
    put(&layout.sample_rate().to_le_bytes());
    put(&layout.byte_rate().to_le_bytes());
    put(&layout.block_align().to_le_bytes());
    put(&layout.bits_per_sample().to_le_bytes());

    // data 块
    put(b"data");
    put(&payload_len.to_le_bytes());

    header
}

/// 同目录临时文件路径（`name.wav` → `name.wav.part`）
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

fn write_file(path: &Path, header: &[u8], payload: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(header)?;
    writer.write_all(payload)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// WAV容器写入器
#[derive(Debug, Clone, Copy, Default)]
pub struct WavContainerWriter;

impl WavContainerWriter {
    /// 校验载荷：整帧对齐且不超过32位RIFF尺寸上限
    fn checked_payload_len(layout: &PcmLayout, payload: &[u8]) -> io::Result<u32> {
        let block_align = usize::from(layout.block_align());
        if payload.len() % block_align != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "载荷不是整数帧 / payload of {} bytes is not a whole number of {block_align}-byte frames",
                    payload.len()
                ),
            ));
        }

        u32::try_from(payload.len())
            .ok()
            .filter(|len| len.checked_add(RIFF_OVERHEAD).is_some())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "载荷超出RIFF 32位尺寸上限 / payload of {} bytes exceeds the RIFF size limit",
                        payload.len()
                    ),
                )
            })
    }
}

impl ContainerWriter for WavContainerWriter {
    fn format(&self) -> TargetFormat {
        TargetFormat::Wav
    }

    fn write(&self, buffer: &PcmBuffer, destination: &Path) -> ConvertResult<u64> {
        let info = buffer.info();
        let layout = PcmLayout::new(info.sample_rate(), info.channels())
            .map_err(|e| error::write_error(destination, e))?;
        let payload = buffer.payload();
        let payload_len = Self::checked_payload_len(&layout, payload)
            .map_err(|e| error::write_error(destination, e))?;

        let header = encode_header(&layout, payload_len);
        let temp = partial_path(destination);

        if let Err(e) = write_file(&temp, &header, payload) {
            let _ = fs::remove_file(&temp);
            return Err(error::write_error(destination, e));
        }
        if let Err(e) = fs::rename(&temp, destination) {
            let _ = fs::remove_file(&temp);
            return Err(error::write_error(destination, e));
        }

        let bytes_written = WAV_HEADER_LEN as u64 + u64::from(payload_len);
        tracing::debug!(
            path = %destination.display(),
            bytes = bytes_written,
            "WAV写入完成"
        );
        Ok(bytes_written)
    }
}
