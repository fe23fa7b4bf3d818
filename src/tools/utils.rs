//! 工具函数模块
//!
//! 提供文件路径处理、并发度计算等通用工具函数。

use super::constants::parallel_limits::{MAX_PARALLEL_DEGREE, MIN_PARALLEL_DEGREE};

/// 文件路径处理工具函数
pub mod path {
    use std::path::{Path, PathBuf};

    /// 提取文件名（统一处理路径提取逻辑）
    #[inline]
    pub fn extract_filename(path: &Path) -> &str {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Unknown")
    }

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 获取父目录，如果不存在则返回当前目录
    #[inline]
    pub fn get_parent_dir(path: &Path) -> &Path {
        path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// 提取文件扩展名（小写，用于格式识别）
    #[inline]
    pub fn extract_extension_lowercase(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|s| s.to_lowercase())
    }

    /// 安全提取文件stem（返回String，非UTF-8部分有损转换）
    #[inline]
    pub fn extract_file_stem_string(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "audio".to_string())
    }

    /// 可比较的路径形式（绝对路径，父目录存在时规范化）
    ///
    /// 用于判断两个路径是否指向同一文件，目标文件本身不必存在。
    pub fn comparable_path(path: &Path) -> PathBuf {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        match (absolute.parent(), absolute.file_name()) {
            (Some(parent), Some(name)) => std::fs::canonicalize(parent)
                .map(|parent| parent.join(name))
                .unwrap_or(absolute),
            _ => absolute,
        }
    }
}

pub use path::{
    comparable_path, extract_extension_lowercase, extract_file_stem_string, extract_filename,
    extract_filename_lossy, get_parent_dir,
};

/// 计算实际并发度
///
/// 请求值被限制在 `[MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE]`，
/// 并且不超过任务数（任务数为0时按1计）。
pub fn effective_parallel_degree(requested: usize, job_count: Option<usize>) -> usize {
    let degree = requested.clamp(MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE);
    match job_count {
        Some(count) => degree.min(count.max(MIN_PARALLEL_DEGREE)),
        None => degree,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_parallel_degree_clamping() {
        assert_eq!(effective_parallel_degree(0, None), 1);
        assert_eq!(effective_parallel_degree(4, None), 4);
        assert_eq!(effective_parallel_degree(64, None), 16);
        assert_eq!(effective_parallel_degree(8, Some(3)), 3);
        assert_eq!(effective_parallel_degree(8, Some(0)), 1);
        assert_eq!(effective_parallel_degree(2, Some(100)), 2);
    }

    #[test]
    fn test_path_helpers() {
        let path = Path::new("/music/Album/02 - Song.FLAC");
        assert_eq!(extract_filename(path), "02 - Song.FLAC");
        assert_eq!(extract_file_stem_string(path), "02 - Song");
        assert_eq!(extract_extension_lowercase(path).as_deref(), Some("flac"));
        assert_eq!(get_parent_dir(path), Path::new("/music/Album"));
        assert_eq!(extract_file_stem_string(Path::new("/")), "audio");
    }

    #[test]
    fn test_comparable_path_resolves_relative_segments() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let direct = comparable_path(&dir.path().join("out.wav"));
        let roundabout = comparable_path(&sub.join("..").join("out.wav"));
        assert_eq!(direct, roundabout);
        assert_ne!(direct, PathBuf::from("out.wav"));
    }
}
