//! MacAudioConverter - 批量音频无损PCM转换工具
//!
//! 把 WAV、FLAC、AIFF、ALAC、MP3、AAC/M4A、Ogg Vorbis 等格式的音频文件
//! 批量转换为 16 位小端 PCM 的 RIFF/WAVE 文件。
//!
//! ## 核心特性
//! - 按扩展名注册的解码引擎（hound 直读 WAV，其余格式走 symphonia）
//! - 探测 → 解码 → 写入 三阶段任务流水线，失败隔离到单个任务
//! - 串行或 rayon 线程池并行调度，终止事件按任务序号有序发布
//! - 取消令牌与单阶段超时
//! - 临时文件 + 重命名，失败任务不留下残缺输出

pub mod audio;
pub mod container;
pub mod error;
pub mod processing;
pub mod tools;

// 重新导出核心类型
pub use audio::{PcmBuffer, StreamInfo, UniversalDecoder};
pub use container::TargetFormat;
pub use error::{ConvertError, ConvertResult, ErrorKind};
pub use processing::{
    BatchEvent, BatchHandle, BatchOptions, BatchOrchestrator, BatchProgress, BatchReport,
    CancelToken, ConversionJob, JobState, Stage,
};
