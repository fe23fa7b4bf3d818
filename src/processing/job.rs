//! 转换任务模块
//!
//! 任务状态机 `Pending → Probing → Decoding → Writing → Completed`，
//! 以及在单个线程上按顺序执行三个阶段的流水线。

use super::cancel::CancelToken;
use crate::audio::{PcmBuffer, StreamInfo, UniversalDecoder};
use crate::container::{self, TargetFormat};
use crate::error::{self, ConvertError, ConvertResult, ErrorKind};
use crate::tools::utils;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// 流水线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Stage {
    Probing,
    Decoding,
    Writing,
}

impl Stage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Probing => "Probing",
            Self::Decoding => "Decoding",
            Self::Writing => "Writing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// 任务失败原因（发生阶段 + 错误类别 + 描述）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(stage: Stage, err: &ConvertError) -> Self {
        Self {
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.kind, self.message)
    }
}

/// 任务状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Probing,
    Decoding,
    Writing,
    Completed { bytes_written: u64 },
    Failed(JobFailure),
}

impl From<Stage> for JobState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Probing => Self::Probing,
            Stage::Decoding => Self::Decoding,
            Stage::Writing => Self::Writing,
        }
    }
}

impl JobState {
    /// 是否为终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed(_))
    }

    /// 当前所处的流水线阶段（Pending 和终止状态没有阶段）
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Probing => Some(Stage::Probing),
            Self::Decoding => Some(Stage::Decoding),
            Self::Writing => Some(Stage::Writing),
            _ => None,
        }
    }

    /// 状态转移是否合法
    ///
    /// 不允许跳过阶段；失败只能发生在某个阶段内，且记录的阶段必须是当前阶段。
    pub fn can_advance_to(&self, next: &JobState) -> bool {
        match (self, next) {
            (Self::Pending, Self::Probing) => true,
            (Self::Probing, Self::Decoding) => true,
            (Self::Decoding, Self::Writing) => true,
            (Self::Writing, Self::Completed { .. }) => true,
            (current, Self::Failed(failure)) => current.stage() == Some(failure.stage),
            _ => false,
        }
    }

    /// 状态显示标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "等待 / Pending",
            Self::Probing => "探测 / Probing",
            Self::Decoding => "解码 / Decoding",
            Self::Writing => "写入 / Writing",
            Self::Completed { .. } => "完成 / Completed",
            Self::Failed(_) => "失败 / Failed",
        }
    }
}

/// 单个转换任务
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    input: PathBuf,
    display_name: String,
    info: StreamInfo,
    output: Option<PathBuf>,
    target: Option<TargetFormat>,
    state: JobState,
}

impl ConversionJob {
    /// 由提交阶段的探测结果创建任务
    pub fn new(input: PathBuf, info: StreamInfo) -> Self {
        let display_name = utils::extract_file_stem_string(&input);
        Self {
            input,
            display_name,
            info,
            output: None,
            target: None,
            state: JobState::Pending,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// 显示名称（文件名去掉扩展名）
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// 提交时的探测结果
    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// 输出路径（运行开始后才分配）
    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn target(&self) -> Option<TargetFormat> {
        self.target
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// 计算输出路径：`输出目录（缺省为输入所在目录）/文件名.扩展名`
    pub fn planned_output(&self, output_dir: Option<&Path>, target: TargetFormat) -> PathBuf {
        let dir = output_dir.unwrap_or_else(|| utils::get_parent_dir(&self.input));
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        dir.join(format!("{}.{}", self.display_name, target.extension()))
    }

    /// 回到 Pending 并清除上一次运行的输出分配
    pub(crate) fn reset(&mut self) {
        self.state = JobState::Pending;
        self.output = None;
        self.target = None;
    }

    pub(crate) fn assign_output(&mut self, output: PathBuf, target: TargetFormat) {
        self.output = Some(output);
        self.target = Some(target);
    }

    /// 推进状态，非法转移被拒绝并返回 false
    pub(crate) fn advance(&mut self, next: JobState) -> bool {
        if self.state.can_advance_to(&next) {
            self.state = next;
            true
        } else {
            tracing::warn!(
                job = %self.display_name,
                from = self.state.label(),
                to = next.label(),
                "忽略非法状态转移"
            );
            false
        }
    }
}

/// 一个任务的执行计划（运行开始时确定，可移动到工作线程）
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub target: TargetFormat,
    /// 输出路径冲突说明，存在时任务在写入阶段失败
    pub conflict: Option<String>,
}

/// 流水线运行环境
pub struct PipelineContext<'a> {
    pub decoder: &'a UniversalDecoder,
    pub cancel: &'a CancelToken,
    pub stage_timeout: Option<Duration>,
}

#[inline]
fn check_cancel(cancel: &CancelToken) -> ConvertResult<()> {
    if cancel.is_cancelled() {
        Err(ConvertError::Cancelled)
    } else {
        Ok(())
    }
}

#[inline]
fn check_timeout(stage: Stage, started: Instant, limit: Option<Duration>) -> ConvertResult<()> {
    match limit {
        Some(limit) if started.elapsed() >= limit => Err(ConvertError::TimedOut { stage, limit }),
        _ => Ok(()),
    }
}

fn probe_stage(plan: &JobPlan, ctx: &PipelineContext<'_>) -> ConvertResult<StreamInfo> {
    check_cancel(ctx.cancel)?;
    let started = Instant::now();
    // 重新探测：提交之后文件可能已被修改
    let info = ctx.decoder.probe(&plan.input)?;
    check_timeout(Stage::Probing, started, ctx.stage_timeout)?;
    Ok(info)
}

fn decode_stage(
    plan: &JobPlan,
    ctx: &PipelineContext<'_>,
    info: &StreamInfo,
) -> ConvertResult<PcmBuffer> {
    check_cancel(ctx.cancel)?;
    let started = Instant::now();
    let mut decoder = ctx.decoder.open_stream(&plan.input, Some(info))?;
    let mut buffer = PcmBuffer::new(info.clone());

    while let Some(chunk) = decoder.next_chunk()? {
        buffer.push_chunk(chunk)?;
        check_cancel(ctx.cancel)?;
        check_timeout(Stage::Decoding, started, ctx.stage_timeout)?;
    }

    Ok(buffer)
}

fn write_stage(plan: &JobPlan, ctx: &PipelineContext<'_>, buffer: &PcmBuffer) -> ConvertResult<u64> {
    check_cancel(ctx.cancel)?;
    if let Some(conflict) = &plan.conflict {
        return Err(error::write_error(
            &plan.output,
            io::Error::new(io::ErrorKind::AlreadyExists, conflict.clone()),
        ));
    }
    // 写入开始后不再检查取消
    container::writer_for(plan.target).write(buffer, &plan.output)
}

/// 执行单个任务的完整流水线
///
/// 每进入一个阶段先回调 `on_stage`，失败时返回失败所在阶段。
/// 输出文件只在解码完全成功之后才会被写入。
pub fn run_pipeline(
    plan: &JobPlan,
    ctx: &PipelineContext<'_>,
    on_stage: &mut dyn FnMut(Stage),
) -> Result<u64, JobFailure> {
    on_stage(Stage::Probing);
    let info = probe_stage(plan, ctx).map_err(|e| JobFailure::new(Stage::Probing, &e))?;

    on_stage(Stage::Decoding);
    let buffer =
        decode_stage(plan, ctx, &info).map_err(|e| JobFailure::new(Stage::Decoding, &e))?;

    on_stage(Stage::Writing);
    write_stage(plan, ctx, &buffer).map_err(|e| JobFailure::new(Stage::Writing, &e))
}
