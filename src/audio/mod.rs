//! 音频解码模块
//!
//! 提供多格式音频文件的探测和流式解码支持。
//!
//! **使用 `UniversalDecoder`** - 按扩展名选择解码引擎，输出交错16位PCM块

// 内部子模块（仅供universal_decoder协调器使用）
mod error_handling;
mod format;
mod streaming;
mod symphonia_engine;
mod wav_engine;

// 统一解码器架构
pub mod universal_decoder;

pub use format::{CodecFamily, FormatSupport, StreamInfo, TrackTags};
pub use streaming::{PcmBuffer, PcmChunk, StreamingDecoder};
pub use universal_decoder::{AudioDecoder, LosslessEngine, LossyEngine, UniversalDecoder, WavEngine};
