//! 文件扫描模块
//!
//! 把命令行输入（文件或目录）展开为待提交的文件列表。
//! 目录中只收集已注册扩展名的文件；显式给出的文件原样保留，交给提交阶段判定。

use super::utils;
use crate::audio::UniversalDecoder;
use crate::error::{self, ConvertError, ConvertResult};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 扫描目录中的音频文件（按路径排序）
pub fn scan_audio_files(
    dir_path: &Path,
    decoder: &UniversalDecoder,
    recursive: bool,
) -> ConvertResult<Vec<PathBuf>> {
    if !dir_path.exists() {
        return Err(error::unreadable(
            dir_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "目录不存在 / directory not found"),
        ));
    }

    if !dir_path.is_dir() {
        return Err(ConvertError::InvalidInput(format!(
            "路径不是目录 / not a directory: {}",
            dir_path.display()
        )));
    }

    let extensions = decoder.supported_extensions();
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut audio_files: Vec<PathBuf> = WalkDir::new(dir_path)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("跳过无法访问的目录项: {err}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            utils::extract_extension_lowercase(e.path())
                .is_some_and(|ext| extensions.contains(&ext.as_str()))
        })
        .map(|e| e.into_path())
        .collect();

    // 按文件名排序
    audio_files.sort();

    Ok(audio_files)
}

/// 展开命令行输入：目录被扫描，文件原样保留，保持输入顺序
pub fn collect_inputs(
    inputs: &[PathBuf],
    decoder: &UniversalDecoder,
    recursive: bool,
) -> ConvertResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let found = scan_audio_files(input, decoder, recursive)?;
            tracing::debug!(dir = %input.display(), count = found.len(), "目录扫描完成");
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}
