//! 协作式取消标志
//!
//! 调用方与工作线程共享同一个标志；流水线在每个阶段开始前和解码块之间检查。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 可克隆的取消令牌（克隆体共享同一标志）
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发出取消信号
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 清除取消信号，以便重新运行同一批次
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}
