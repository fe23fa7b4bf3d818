//! 输出格式化模块
//!
//! 负责提交结果、运行进度和批处理报告的终端/JSON输出。

use super::utils;
use crate::audio::StreamInfo;
use crate::processing::{BatchEvent, BatchReport, ConversionJob, JobState, SubmissionReport};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};

/// 格式化流信息（单行）
pub fn format_stream_info(info: &StreamInfo) -> String {
    let mut line = format!(
        "{} Hz, {} ch, {} bit, {}, {}",
        info.sample_rate(),
        info.channels(),
        info.bits_per_sample(),
        info.formatted_duration(),
        info.codec()
    );
    let bitrate = info.estimated_bitrate();
    if bitrate > 0 {
        line.push_str(&format!(", ~{} kbps", (bitrate as f64 / 1000.0).round() as u64));
    }
    line
}

/// 格式化元数据标签，没有标签时返回 None
pub fn format_tags(info: &StreamInfo) -> Option<String> {
    let tags = info.tags();
    if tags.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(track) = tags.track_number {
        parts.push(format!("#{track}"));
    }
    match (&tags.artist, &tags.title) {
        (Some(artist), Some(title)) => parts.push(format!("{artist} - {title}")),
        (Some(only), None) | (None, Some(only)) => parts.push(only.clone()),
        (None, None) => {}
    }
    if let Some(album) = &tags.album {
        parts.push(format!("[{album}]"));
    }
    if let Some(year) = tags.year {
        parts.push(year.to_string());
    }
    if let Some(genre) = &tags.genre {
        parts.push(genre.clone());
    }
    Some(parts.join(" "))
}

/// 格式化提交结果
pub fn format_submission(report: &SubmissionReport, jobs: &[ConversionJob], verbose: bool) -> String {
    let mut output = format!(
        "🎵 已加入 / Accepted: {} 个文件 / files\n",
        report.accepted_count()
    );

    if verbose {
        for &index in &report.accepted {
            if let Some(job) = jobs.get(index) {
                output.push_str(&format!(
                    "   {}. {} ({})\n",
                    index + 1,
                    job.display_name(),
                    format_stream_info(job.info())
                ));
                if let Some(tags) = format_tags(job.info()) {
                    output.push_str(&format!("      {tags}\n"));
                }
            }
        }
    }

    if report.has_rejections() {
        output.push_str(&format!(
            "⚠️  已拒绝 / Rejected: {} 个文件 / files\n",
            report.rejected.len()
        ));
        for rejected in &report.rejected {
            output.push_str(&format!(
                "   [SKIP] {} - [{}] {}\n",
                utils::extract_filename_lossy(&rejected.path),
                rejected.kind.display_name(),
                rejected.message
            ));
        }
    }

    output
}

/// 格式化运行事件为进度行，无需显示时返回 None
pub fn format_event(event: &BatchEvent, jobs: &[ConversionJob], verbose: bool) -> Option<String> {
    let total = jobs.len();
    let name = |index: usize| {
        jobs.get(index)
            .map(|job| job.display_name().to_string())
            .unwrap_or_else(|| format!("#{}", index + 1))
    };

    match event {
        BatchEvent::JobStage { index, stage } if verbose => Some(format!(
            "[{}/{}] {} → {}",
            index + 1,
            total,
            name(*index),
            stage
        )),
        BatchEvent::JobStage { .. } => None,
        BatchEvent::JobFinished { index, state } => match state {
            JobState::Completed { bytes_written } => Some(format!(
                "[OK] [{}/{}] {} ({} bytes)",
                index + 1,
                total,
                name(*index),
                bytes_written
            )),
            JobState::Failed(failure) => Some(format!(
                "[FAIL] [{}/{}] {} - [{}] {}",
                index + 1,
                total,
                name(*index),
                failure.kind.display_name(),
                failure.message
            )),
            _ => None,
        },
        BatchEvent::Progress(progress) if verbose => Some(format!(
            "   进度 / Progress: {:.1}%",
            progress.fraction() * 100.0
        )),
        BatchEvent::Progress(_) => None,
        BatchEvent::Finished { .. } => None,
    }
}

/// 生成汇总表格
pub fn summary_table(report: &BatchReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "#",
        "文件 / File",
        "时长 / Duration",
        "状态 / State",
        "输出或错误 / Output or error",
    ]);

    for job in &report.jobs {
        let detail = match &job.state {
            JobState::Completed { .. } => job
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            JobState::Failed(failure) => format!("[{}] {}", failure.stage, failure.kind.display_name()),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(job.index + 1).set_alignment(CellAlignment::Right),
            Cell::new(&job.display_name),
            Cell::new(&job.duration).set_alignment(CellAlignment::Right),
            Cell::new(job.state.label()),
            Cell::new(detail),
        ]);
    }

    table
}

/// 格式化批处理统计信息
pub fn format_summary(report: &BatchReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", summary_table(report)));
    output.push_str("批量处理统计 / Batch summary:\n");
    output.push_str(&format!("   目标格式 / Target: {}\n", report.target));
    output.push_str(&format!("   总文件数 / Total: {}\n", report.total));
    output.push_str(&format!("   成功 / Completed: {}\n", report.completed));
    output.push_str(&format!("   失败 / Failed: {}\n", report.failed));
    output.push_str(&format!(
        "   耗时 / Elapsed: {:.2}s\n",
        report.elapsed().num_milliseconds() as f64 / 1000.0
    ));

    if !report.error_stats.is_empty() {
        output.push_str("错误分类 / Errors by kind:\n");
        for (kind, files) in &report.error_stats {
            output.push_str(&format!("   {}: {}\n", kind.display_name(), files.join(", ")));
        }
    }
    output
}

/// 以JSON格式输出报告
pub fn report_to_json(report: &BatchReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::processing::{JobFailure, RejectedFile, Stage};
    use std::path::PathBuf;

    fn jobs() -> Vec<ConversionJob> {
        vec![
            ConversionJob::new(
                PathBuf::from("/in/first.flac"),
                StreamInfo::new(44100, 2, 16, 44100 * 65).with_file_size(8_000_000),
            ),
            ConversionJob::new(PathBuf::from("/in/second.mp3"), StreamInfo::new(48000, 1, 16, 0)),
        ]
    }

    #[test]
    fn test_stream_info_line() {
        let line = format_stream_info(&jobs()[0].info().clone().with_codec("flac", crate::audio::CodecFamily::Lossless));
        assert!(line.starts_with("44100 Hz, 2 ch, 16 bit, 01:05, flac"));
        assert!(line.contains("kbps"));
        assert!(!format_stream_info(jobs()[1].info()).contains("kbps"));
    }

    #[test]
    fn test_tag_line() {
        assert!(format_tags(jobs()[1].info()).is_none());

        let tags = crate::audio::TrackTags {
            title: Some("Intro".into()),
            artist: Some("Band".into()),
            album: Some("Debut".into()),
            year: Some(1999),
            genre: None,
            track_number: Some(1),
        };
        let info = StreamInfo::new(44100, 2, 16, 0).with_tags(tags);
        assert_eq!(format_tags(&info).as_deref(), Some("#1 Band - Intro [Debut] 1999"));
    }

    #[test]
    fn test_event_lines() {
        let jobs = jobs();
        let ok = BatchEvent::JobFinished {
            index: 0,
            state: JobState::Completed { bytes_written: 1044 },
        };
        assert_eq!(
            format_event(&ok, &jobs, false).as_deref(),
            Some("[OK] [1/2] first (1044 bytes)")
        );

        let failed = BatchEvent::JobFinished {
            index: 1,
            state: JobState::Failed(JobFailure {
                stage: Stage::Decoding,
                kind: ErrorKind::DecodeError,
                message: "boom".into(),
            }),
        };
        let line = format_event(&failed, &jobs, false).unwrap();
        assert!(line.starts_with("[FAIL] [2/2] second"));
        assert!(line.ends_with("boom"));

        let stage = BatchEvent::JobStage { index: 0, stage: Stage::Probing };
        assert!(format_event(&stage, &jobs, false).is_none());
        assert!(format_event(&stage, &jobs, true).is_some());
    }

    #[test]
    fn test_submission_lists_rejections() {
        let report = SubmissionReport {
            accepted: vec![0],
            rejected: vec![RejectedFile {
                path: PathBuf::from("/in/cover.jpg"),
                kind: ErrorKind::UnsupportedFormat,
                message: "nope".into(),
            }],
        };
        let text = format_submission(&report, &jobs(), true);
        assert!(text.contains("Accepted: 1"));
        assert!(text.contains("first"));
        assert!(text.contains("[SKIP] cover.jpg"));
    }
}
