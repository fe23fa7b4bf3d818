//! 批处理统计模块
//!
//! 由调度线程独占更新（单写者），用于报告和退出码。

use crate::error::ErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// 批处理统计快照
///
/// 包含成功/失败计数和错误分类统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStatsSnapshot {
    /// 成功转换的文件数
    pub completed: usize,
    /// 失败的文件数
    pub failed: usize,
    /// 错误分类统计（错误类别 -> 失败文件列表）
    pub error_stats: BTreeMap<ErrorKind, Vec<String>>,
}

/// 批处理统计
#[derive(Debug, Default)]
pub struct BatchStats {
    completed: usize,
    failed: usize,
    error_stats: BTreeMap<ErrorKind, Vec<String>>,
}

impl BatchStats {
    /// 创建新的统计实例
    pub fn new() -> Self {
        Self::default()
    }

    /// 增加成功计数
    #[inline]
    pub fn inc_completed(&mut self) -> usize {
        self.completed += 1;
        self.completed
    }

    /// 增加失败计数并记录错误分类
    #[inline]
    pub fn inc_failed(&mut self, kind: ErrorKind, filename: String) -> usize {
        self.failed += 1;
        self.error_stats.entry(kind).or_default().push(filename);
        self.failed
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> BatchStatsSnapshot {
        BatchStatsSnapshot {
            completed: self.completed,
            failed: self.failed,
            error_stats: self.error_stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let mut stats = BatchStats::new();

        // 测试初始状态
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed, 0);
        assert_eq!(snapshot.failed, 0);
        assert!(snapshot.error_stats.is_empty());

        assert_eq!(stats.inc_completed(), 1);
        assert_eq!(stats.inc_completed(), 2);
        assert_eq!(stats.inc_failed(ErrorKind::DecodeError, "a".to_string()), 1);
        assert_eq!(stats.inc_failed(ErrorKind::DecodeError, "b".to_string()), 2);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.error_stats.len(), 1);
        assert_eq!(snapshot.error_stats[&ErrorKind::DecodeError], vec!["a", "b"]);
    }

    #[test]
    fn test_stats_multiple_kinds_are_ordered() {
        let mut stats = BatchStats::new();
        stats.inc_failed(ErrorKind::WriteError, "w".to_string());
        stats.inc_failed(ErrorKind::Unreadable, "u".to_string());
        stats.inc_failed(ErrorKind::WriteError, "w2".to_string());

        let snapshot = stats.snapshot();
        let kinds: Vec<_> = snapshot.error_stats.keys().copied().collect();
        assert_eq!(kinds, vec![ErrorKind::Unreadable, ErrorKind::WriteError]);
        assert_eq!(snapshot.error_stats[&ErrorKind::WriteError].len(), 2);
    }

    #[test]
    fn test_snapshot_serializes_kind_keys() {
        let mut stats = BatchStats::new();
        stats.inc_failed(ErrorKind::TimedOut, "slow".to_string());
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["error_stats"]["TimedOut"][0], "slow");
    }
}
