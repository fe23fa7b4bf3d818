//! 流式解码接口模块
//!
//! 定义PCM块、流式解码器trait和完整PCM缓冲区

use super::format::StreamInfo;
use crate::error::ConvertResult;

/// 一段连续的已解码PCM数据
///
/// 样本为交错格式 `[L0, R0, L1, R1, ...]` 的有符号16位整数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmChunk {
    first_frame: u64,
    channels: u16,
    samples: Vec<i16>,
}

impl PcmChunk {
    /// 创建PCM块，样本数必须是声道数的整数倍
    pub fn new(first_frame: u64, channels: u16, samples: Vec<i16>) -> Self {
        debug_assert!(channels > 0);
        debug_assert_eq!(samples.len() % channels as usize, 0);
        Self {
            first_frame,
            channels,
            samples,
        }
    }

    /// 本块第一帧在整条时间线中的位置
    pub fn first_frame(&self) -> u64 {
        self.first_frame
    }

    /// 本块之后下一帧的位置
    pub fn end_frame(&self) -> u64 {
        self.first_frame + self.frames() as u64
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// 帧数（每声道样本数）
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// 流式解码器trait
///
/// # 约定
///
/// - **惰性、有限、不可重启**：不提供 reset，读完即结束
/// - **无缝拼接**：相邻块满足 `next.first_frame() == prev.end_frame()`
/// - **失败即终止**：返回 `Err` 后，失败区间的部分数据被丢弃，之后的调用一律返回 `Ok(None)`
/// - **EOF 语义**：返回 `None` 后再次调用应继续返回 `None`
pub trait StreamingDecoder: Send {
    /// 获取下一个音频块
    ///
    /// - `Ok(Some(chunk))` - 成功解码一块
    /// - `Ok(None)` - 流已结束（或先前已失败）
    /// - `Err(_)` - 码流损坏/截断，序列就此终止
    fn next_chunk(&mut self) -> ConvertResult<Option<PcmChunk>>;

    /// 流信息（探测结果）
    fn info(&self) -> &StreamInfo;

    /// 已产出的帧数
    fn frames_decoded(&self) -> u64;

    /// 获取解码进度 (0.0-1.0)，总帧数未知时返回 0.0
    fn progress(&self) -> f32 {
        let total = self.info().frame_count();
        if total == 0 {
            0.0
        } else {
            (self.frames_decoded() as f32 / total as f32).min(1.0)
        }
    }
}

/// 完整的PCM流（16位小端字节）
///
/// 解码阶段按顺序把每个块移交进来，写入阶段一次性消费。
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    info: StreamInfo,
    payload: Vec<u8>,
    frames: u64,
}

impl PcmBuffer {
    pub fn new(info: StreamInfo) -> Self {
        let capacity = info
            .frame_count()
            .saturating_mul(info.channels() as u64)
            .saturating_mul(2)
            .min(64 * 1024 * 1024) as usize;
        Self {
            info,
            payload: Vec::with_capacity(capacity),
            frames: 0,
        }
    }

    /// 追加一个块（块的所有权转移到缓冲区）
    pub fn push_chunk(&mut self, chunk: PcmChunk) -> ConvertResult<()> {
        if chunk.channels() != self.info.channels() {
            return Err(crate::error::decode_error(
                chunk.first_frame(),
                format!(
                    "声道数变化 / channel count changed: {} -> {}",
                    self.info.channels(),
                    chunk.channels()
                ),
            ));
        }
        if chunk.first_frame() != self.frames {
            return Err(crate::error::decode_error(
                chunk.first_frame(),
                format!(
                    "块不连续 / non-contiguous chunk, expected frame {}",
                    self.frames
                ),
            ));
        }

        self.frames += chunk.frames() as u64;
        let samples = chunk.into_samples();
        self.payload.reserve(samples.len() * 2);
        for sample in samples {
            self.payload.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(())
    }

    /// 从解码器中读出全部块
    pub fn collect_from(decoder: &mut dyn StreamingDecoder) -> ConvertResult<Self> {
        let mut buffer = Self::new(decoder.info().clone());
        while let Some(chunk) = decoder.next_chunk()? {
            buffer.push_chunk(chunk)?;
        }
        Ok(buffer)
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// 把失败后的解码器固定在 EOF 状态
///
/// 引擎在 `next_chunk` 中使用：出错时置位，之后一律返回 `None`。
pub(crate) fn fuse_on_error<T>(
    finished: &mut bool,
    result: ConvertResult<Option<T>>,
) -> ConvertResult<Option<T>> {
    match result {
        Ok(None) => {
            *finished = true;
            Ok(None)
        }
        Err(e) => {
            *finished = true;
            Err(e)
        }
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;

    /// Mock 流式解码器用于契约级单测
    struct MockStreamingDecoder {
        /// 待返回的块序列
        chunks: Vec<Vec<i16>>,
        position: usize,
        info: StreamInfo,
        frames_decoded: u64,
        /// 在第 N 次 next_chunk 调用时注入错误
        error_at_call: Option<usize>,
        call_count: usize,
        finished: bool,
    }

    impl MockStreamingDecoder {
        fn new(chunks: Vec<Vec<i16>>, info: StreamInfo) -> Self {
            Self {
                chunks,
                position: 0,
                info,
                frames_decoded: 0,
                error_at_call: None,
                call_count: 0,
                finished: false,
            }
        }

        fn with_error_at(mut self, call_number: usize) -> Self {
            self.error_at_call = Some(call_number);
            self
        }

        fn read_next(&mut self) -> ConvertResult<Option<PcmChunk>> {
            self.call_count += 1;

            if self.error_at_call == Some(self.call_count) {
                return Err(crate::error::decode_error(
                    self.frames_decoded,
                    "Injected error for testing",
                ));
            }

            let Some(samples) = self.chunks.get(self.position).cloned() else {
                return Ok(None);
            };
            self.position += 1;

            let chunk = PcmChunk::new(self.frames_decoded, self.info.channels(), samples);
            self.frames_decoded = chunk.end_frame();
            Ok(Some(chunk))
        }
    }

    impl StreamingDecoder for MockStreamingDecoder {
        fn next_chunk(&mut self) -> ConvertResult<Option<PcmChunk>> {
            if self.finished {
                return Ok(None);
            }
            let result = self.read_next();
            fuse_on_error(&mut self.finished, result)
        }

        fn info(&self) -> &StreamInfo {
            &self.info
        }

        fn frames_decoded(&self) -> u64 {
            self.frames_decoded
        }
    }

    fn stereo(frames: u64) -> StreamInfo {
        StreamInfo::new(44100, 2, 16, frames)
    }

    #[test]
    fn test_eof_semantics_after_none() {
        let mut decoder = MockStreamingDecoder::new(vec![vec![1, 2, 3, 4], vec![5, 6]], stereo(3));

        assert!(decoder.next_chunk().unwrap().is_some());
        assert!(decoder.next_chunk().unwrap().is_some());
        assert!(decoder.next_chunk().unwrap().is_none());
        // EOF 后继续调用仍返回 None
        assert!(decoder.next_chunk().unwrap().is_none());
        assert!(decoder.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_chunks_are_contiguous() {
        let mut decoder = MockStreamingDecoder::new(
            vec![vec![0; 2], vec![0; 6], vec![0; 2]],
            stereo(5),
        );

        let mut expected_start = 0;
        while let Some(chunk) = decoder.next_chunk().unwrap() {
            assert_eq!(chunk.first_frame(), expected_start);
            expected_start = chunk.end_frame();
        }
        assert_eq!(expected_start, 5);
        assert_eq!(decoder.progress(), 1.0);
    }

    #[test]
    fn test_error_terminates_sequence() {
        let mut decoder = MockStreamingDecoder::new(
            vec![vec![1, 2], vec![3, 4], vec![5, 6]],
            stereo(3),
        )
        .with_error_at(2);

        let first = decoder.next_chunk().unwrap().unwrap();
        assert_eq!(first.samples(), &[1, 2]);

        let err = decoder.next_chunk().unwrap_err();
        assert!(err.to_string().contains("Injected error"));

        // 失败后不再产出任何块
        assert!(decoder.next_chunk().unwrap().is_none());
        assert_eq!(decoder.frames_decoded(), 1);
    }

    #[test]
    fn test_progress_unknown_total() {
        let mut decoder = MockStreamingDecoder::new(vec![vec![1, 2]], stereo(0));
        assert_eq!(decoder.progress(), 0.0);
        decoder.next_chunk().unwrap();
        assert_eq!(decoder.progress(), 0.0);
    }

    #[test]
    fn test_buffer_collects_little_endian_payload() {
        let mut decoder =
            MockStreamingDecoder::new(vec![vec![1, -1], vec![0x1234, -32768]], stereo(2));

        let buffer = PcmBuffer::collect_from(&mut decoder).unwrap();
        assert_eq!(buffer.frames(), 2);
        assert_eq!(
            buffer.payload(),
            &[0x01, 0x00, 0xFF, 0xFF, 0x34, 0x12, 0x00, 0x80]
        );
    }

    #[test]
    fn test_buffer_collect_propagates_error() {
        let mut decoder =
            MockStreamingDecoder::new(vec![vec![1, 2], vec![3, 4]], stereo(2)).with_error_at(2);
        let err = PcmBuffer::collect_from(&mut decoder).unwrap_err();
        assert!(matches!(err, ConvertError::Decode { frame: 1, .. }));
    }

    #[test]
    fn test_buffer_rejects_gap_and_channel_change() {
        let mut buffer = PcmBuffer::new(stereo(4));
        buffer.push_chunk(PcmChunk::new(0, 2, vec![0; 4])).unwrap();

        let gap = buffer.push_chunk(PcmChunk::new(3, 2, vec![0; 2]));
        assert!(matches!(gap, Err(ConvertError::Decode { .. })));

        let mono = buffer.push_chunk(PcmChunk::new(2, 1, vec![0; 2]));
        assert!(matches!(mono, Err(ConvertError::Decode { .. })));
    }
}
