//! 常量和默认配置集中管理
//!
//! 将所有重要常量集中定义，避免"默认值漂移"和重复定义

/// 默认配置值
pub mod defaults {
    /// 解码块大小（帧）
    ///
    /// 解码器每次至少累积这么多帧再交给下游（最后一块除外），
    /// 同时也是取消/超时检查的粒度
    pub const CHUNK_FRAMES: usize = 4096;

    /// 默认并行任务数
    ///
    /// 默认串行：一个任务的完整流水线结束后才开始下一个
    pub const PARALLEL_JOBS: usize = 1;

    /// 默认目标格式名称
    pub const TARGET_FORMAT: &str = "wav";
}

/// 输出容器常量
pub mod container {
    /// 规范RIFF/WAVE头部长度（字节）
    pub const WAV_HEADER_LEN: usize = 44;

    /// 输出位深（16位有符号整数PCM）
    pub const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

    /// 写入阶段使用的临时文件后缀
    pub const PARTIAL_SUFFIX: &str = "part";
}

/// 并发度限制常量
pub mod parallel_limits {
    /// 最小并发度
    ///
    /// 任何并行处理至少需要1个线程/工作单元
    pub const MIN_PARALLEL_DEGREE: usize = 1;

    /// 最大并发度
    ///
    /// 限制最大并发度为16，避免过度并发导致的：
    /// - 上下文切换开销
    /// - 内存占用过高（每个任务持有完整PCM缓冲区）
    pub const MAX_PARALLEL_DEGREE: usize = 16;
}
