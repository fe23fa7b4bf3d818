//! 批处理调度模块
//!
//! 调度器独占任务列表（单写者）：提交时并行探测，运行时串行或在
//! rayon线程池上并行执行流水线，终止事件按任务序号有序发布。

use super::batch_state::{BatchStats, BatchStatsSnapshot};
use super::cancel::CancelToken;
use super::job::{ConversionJob, JobFailure, JobPlan, JobState, PipelineContext, Stage, run_pipeline};
use crate::audio::UniversalDecoder;
use crate::container::TargetFormat;
use crate::error::ErrorKind;
use crate::tools::constants::defaults;
use crate::tools::utils;
use chrono::{DateTime, Local};
use crossbeam_channel::Receiver;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 运行选项
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 输出目录，缺省时写到各输入文件所在目录
    pub output_dir: Option<PathBuf>,
    /// 并行任务数，1为串行
    pub parallel_jobs: usize,
    /// 单阶段超时（探测后和解码块之间检查）
    pub stage_timeout: Option<Duration>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            parallel_jobs: defaults::PARALLEL_JOBS,
            stage_timeout: None,
        }
    }
}

impl BatchOptions {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_parallel_jobs(mut self, jobs: usize) -> Self {
        self.parallel_jobs = jobs;
        self
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }
}

/// 提交时被拒绝的文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

/// 提交结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionReport {
    /// 新加入任务的序号
    pub accepted: Vec<usize>,
    /// 被拒绝的文件（不会进入批次）
    pub rejected: Vec<RejectedFile>,
}

impl SubmissionReport {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn has_rejections(&self) -> bool {
        !self.rejected.is_empty()
    }
}

/// 批次进度（按需计算的只读视图）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchProgress {
    pub terminal: usize,
    pub total: usize,
}

impl BatchProgress {
    /// 终止任务占比，空批次为1.0
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.terminal as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.terminal == self.total
    }

    fn of(jobs: &[ConversionJob]) -> Self {
        Self {
            terminal: jobs.iter().filter(|j| j.is_terminal()).count(),
            total: jobs.len(),
        }
    }
}

/// 调度事件
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// 任务进入某个阶段
    JobStage { index: usize, stage: Stage },
    /// 任务到达终止状态（按任务序号发布）
    JobFinished { index: usize, state: JobState },
    /// 每次终止转移之后的进度
    Progress(BatchProgress),
    /// 全部任务结束
    Finished { completed: usize, failed: usize },
}

/// 单个任务的最终结果摘要
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub index: usize,
    pub display_name: String,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub duration: String,
    pub state: JobState,
}

/// 批处理报告
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub target: TargetFormat,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub jobs: Vec<JobSummary>,
    pub error_stats: BTreeMap<ErrorKind, Vec<String>>,
}

impl BatchReport {
    fn build(
        target: TargetFormat,
        started_at: DateTime<Local>,
        jobs: &[ConversionJob],
        stats: BatchStatsSnapshot,
    ) -> Self {
        let summaries = jobs
            .iter()
            .enumerate()
            .map(|(index, job)| JobSummary {
                index,
                display_name: job.display_name().to_string(),
                input: job.input().to_path_buf(),
                output: job.output().map(Path::to_path_buf),
                duration: job.info().formatted_duration(),
                state: job.state().clone(),
            })
            .collect();

        Self {
            target,
            started_at,
            finished_at: Local::now(),
            total: jobs.len(),
            completed: stats.completed,
            failed: stats.failed,
            jobs: summaries,
            error_stats: stats.error_stats,
        }
    }

    /// 全部任务成功
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.completed == self.total
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// 后台运行句柄
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    cancel: CancelToken,
    join: JoinHandle<(BatchOrchestrator, BatchReport)>,
}

impl BatchHandle {
    /// 事件接收端（批次结束后通道关闭）
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// 请求取消
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 等待批次结束，取回调度器和报告
    pub fn join(self) -> thread::Result<(BatchOrchestrator, BatchReport)> {
        self.join.join()
    }
}

/// 后台提交句柄
pub struct SubmissionHandle {
    join: JoinHandle<(BatchOrchestrator, SubmissionReport)>,
}

impl SubmissionHandle {
    /// 探测是否已全部结束（不阻塞）
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 等待探测结束，取回调度器和提交结果
    pub fn join(self) -> thread::Result<(BatchOrchestrator, SubmissionReport)> {
        self.join.join()
    }
}

/// 运行期间的可变状态（只在调度线程上修改）
struct RunState<'a, F: FnMut(BatchEvent)> {
    jobs: &'a mut [ConversionJob],
    stats: BatchStats,
    on_event: F,
}

impl<F: FnMut(BatchEvent)> RunState<'_, F> {
    fn stage(&mut self, index: usize, stage: Stage) {
        if let Some(job) = self.jobs.get_mut(index) {
            job.advance(JobState::from(stage));
            (self.on_event)(BatchEvent::JobStage { index, stage });
        }
    }

    fn finish(&mut self, index: usize, result: Result<u64, JobFailure>) {
        let Some(job) = self.jobs.get_mut(index) else {
            return;
        };

        match result {
            Ok(bytes_written) => {
                tracing::info!(
                    job = job.display_name(),
                    bytes = bytes_written,
                    "转换完成"
                );
                self.stats.inc_completed();
                job.advance(JobState::Completed { bytes_written });
            }
            Err(failure) => {
                tracing::warn!(
                    job = job.display_name(),
                    stage = %failure.stage,
                    kind = ?failure.kind,
                    "转换失败: {}",
                    failure.message
                );
                self.stats
                    .inc_failed(failure.kind, utils::extract_filename_lossy(job.input()));
                job.advance(JobState::Failed(failure));
            }
        }

        let state = job.state().clone();
        (self.on_event)(BatchEvent::JobFinished { index, state });
        (self.on_event)(BatchEvent::Progress(BatchProgress::of(&*self.jobs)));
    }
}

/// 工作线程发往调度线程的消息
enum WorkerMessage {
    Stage { index: usize, stage: Stage },
    Finished { index: usize, result: Result<u64, JobFailure> },
}

/// 批处理调度器
pub struct BatchOrchestrator {
    jobs: Vec<ConversionJob>,
    decoder: Arc<UniversalDecoder>,
    cancel: CancelToken,
}

impl Default for BatchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchOrchestrator {
    pub fn new() -> Self {
        Self::with_decoder(UniversalDecoder::new())
    }

    /// 使用自定义解码器注册表
    pub fn with_decoder(decoder: UniversalDecoder) -> Self {
        Self {
            jobs: Vec::new(),
            decoder: Arc::new(decoder),
            cancel: CancelToken::new(),
        }
    }

    pub fn decoder(&self) -> &UniversalDecoder {
        &self.decoder
    }

    /// 提交文件：并行探测，结果保持提交顺序
    ///
    /// 调用方会阻塞到全部探测结束；交互线程上请使用 [`Self::spawn_add_files`]。
    pub fn add_files<I, P>(&mut self, paths: I) -> SubmissionReport
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();

        let decoder = &self.decoder;
        let probed: Vec<_> = paths
            .into_par_iter()
            .map(|path| {
                let result = decoder.probe(&path);
                (path, result)
            })
            .collect();

        let mut report = SubmissionReport::default();
        for (path, result) in probed {
            match result {
                Ok(info) => {
                    tracing::debug!(
                        path = %path.display(),
                        codec = info.codec(),
                        duration = %info.formatted_duration(),
                        "文件已加入批次"
                    );
                    report.accepted.push(self.jobs.len());
                    self.jobs.push(ConversionJob::new(path, info));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "文件被拒绝: {e}");
                    report.rejected.push(RejectedFile {
                        path,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// 移除任务
    pub fn remove(&mut self, index: usize) -> Option<ConversionJob> {
        (index < self.jobs.len()).then(|| self.jobs.remove(index))
    }

    /// 清空批次
    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    pub fn jobs(&self) -> &[ConversionJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress::of(&self.jobs)
    }

    /// 按显示名称排序（稳定排序）
    pub fn sort_by_name(&mut self) {
        self.jobs
            .sort_by(|a, b| a.display_name().cmp(b.display_name()));
    }

    /// 共享的取消令牌
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 为每个任务分配输出路径并检测冲突
    ///
    /// 冲突规则：输出路径与任一输入相同，或与更早任务的输出相同。
    fn plan_jobs(&mut self, target: TargetFormat, options: &BatchOptions) -> Vec<JobPlan> {
        let inputs: HashMap<PathBuf, usize> = self
            .jobs
            .iter()
            .enumerate()
            .map(|(index, job)| (utils::comparable_path(job.input()), index))
            .collect();
        let mut outputs: HashMap<PathBuf, usize> = HashMap::new();

        let mut plans = Vec::with_capacity(self.jobs.len());
        for (index, job) in self.jobs.iter_mut().enumerate() {
            job.reset();
            let output = job.planned_output(options.output_dir.as_deref(), target);
            let key = utils::comparable_path(&output);

            let conflict = if let Some(&owner) = inputs.get(&key) {
                Some(format!(
                    "输出路径与任务 #{} 的输入文件相同 / output path equals the input of job #{}",
                    owner + 1,
                    owner + 1
                ))
            } else if let Some(&earlier) = outputs.get(&key) {
                Some(format!(
                    "输出路径与任务 #{} 冲突 / output path collides with job #{}",
                    earlier + 1,
                    earlier + 1
                ))
            } else {
                outputs.insert(key, index);
                None
            };

            job.assign_output(output.clone(), target);
            plans.push(JobPlan {
                index,
                input: job.input().to_path_buf(),
                output,
                target,
                conflict,
            });
        }
        plans
    }

    /// 运行批次
    ///
    /// 每个任务都会被重置为 Pending 后重新执行；单个任务失败不影响其他任务。
    pub fn run<F>(&mut self, target: TargetFormat, options: &BatchOptions, on_event: F) -> BatchReport
    where
        F: FnMut(BatchEvent),
    {
        let started_at = Local::now();
        let plans = self.plan_jobs(target, options);
        let degree = utils::effective_parallel_degree(options.parallel_jobs, Some(plans.len()));
        let decoder = Arc::clone(&self.decoder);
        let cancel = self.cancel.clone();

        tracing::info!(jobs = plans.len(), degree, %target, "开始批处理");

        let mut state = RunState {
            jobs: &mut self.jobs,
            stats: BatchStats::new(),
            on_event,
        };

        if degree > 1 {
            match build_pool(degree) {
                Ok(pool) => {
                    run_parallel(&mut state, &pool, plans, decoder, cancel, options.stage_timeout)
                }
                Err(e) => {
                    tracing::warn!("线程池创建失败，回退到串行模式: {e}");
                    run_sequential(&mut state, plans, &decoder, &cancel, options.stage_timeout);
                }
            }
        } else {
            run_sequential(&mut state, plans, &decoder, &cancel, options.stage_timeout);
        }

        let snapshot = state.stats.snapshot();
        if state.jobs.is_empty() {
            (state.on_event)(BatchEvent::Progress(BatchProgress::of(&*state.jobs)));
        }
        (state.on_event)(BatchEvent::Finished {
            completed: snapshot.completed,
            failed: snapshot.failed,
        });
        drop(state);

        BatchReport::build(target, started_at, &self.jobs, snapshot)
    }

    /// 在后台线程提交文件，调用方线程不被阻塞
    pub fn spawn_add_files(self, paths: Vec<PathBuf>) -> io::Result<SubmissionHandle> {
        let join = thread::Builder::new()
            .name("batch-submission".to_string())
            .spawn(move || {
                let mut orchestrator = self;
                let report = orchestrator.add_files(&paths);
                (orchestrator, report)
            })?;
        Ok(SubmissionHandle { join })
    }

    /// 在后台线程运行批次，调用方线程不被阻塞
    pub fn spawn(self, target: TargetFormat, options: BatchOptions) -> io::Result<BatchHandle> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = self.cancel.clone();

        let join = thread::Builder::new()
            .name("batch-orchestrator".to_string())
            .spawn(move || {
                let mut orchestrator = self;
                let report = orchestrator.run(target, &options, |event| {
                    // 接收端已丢弃时静默忽略
                    let _ = tx.send(event);
                });
                (orchestrator, report)
            })?;

        Ok(BatchHandle {
            events: rx,
            cancel,
            join,
        })
    }
}

fn build_pool(degree: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(degree)
        .thread_name(|i| format!("convert-worker-{i}"))
        .build()
}

/// 串行执行：一个任务完整结束后才开始下一个
fn run_sequential<F: FnMut(BatchEvent)>(
    state: &mut RunState<'_, F>,
    plans: Vec<JobPlan>,
    decoder: &UniversalDecoder,
    cancel: &CancelToken,
    stage_timeout: Option<Duration>,
) {
    let ctx = PipelineContext {
        decoder,
        cancel,
        stage_timeout,
    };

    for plan in plans {
        let index = plan.index;
        let result = run_pipeline(&plan, &ctx, &mut |stage| state.stage(index, stage));
        state.finish(index, result);
    }
}

/// 并行执行：三个阶段在同一个工作线程上顺序执行，
/// 终止结果经接收端重排缓冲按任务序号释放
fn run_parallel<F: FnMut(BatchEvent)>(
    state: &mut RunState<'_, F>,
    pool: &rayon::ThreadPool,
    plans: Vec<JobPlan>,
    decoder: Arc<UniversalDecoder>,
    cancel: CancelToken,
    stage_timeout: Option<Duration>,
) {
    let (tx, rx) = crossbeam_channel::unbounded::<WorkerMessage>();
    let first_index = plans.first().map_or(0, |p| p.index);

    for plan in plans {
        let tx = tx.clone();
        let decoder = Arc::clone(&decoder);
        let cancel = cancel.clone();

        pool.spawn(move || {
            let ctx = PipelineContext {
                decoder: &decoder,
                cancel: &cancel,
                stage_timeout,
            };
            let index = plan.index;
            let result = run_pipeline(&plan, &ctx, &mut |stage| {
                let _ = tx.send(WorkerMessage::Stage { index, stage });
            });
            let _ = tx.send(WorkerMessage::Finished { index, result });
        });
    }
    drop(tx);

    let mut reorder: BTreeMap<usize, Result<u64, JobFailure>> = BTreeMap::new();
    let mut next_index = first_index;

    for message in rx {
        match message {
            WorkerMessage::Stage { index, stage } => state.stage(index, stage),
            WorkerMessage::Finished { index, result } => {
                reorder.insert(index, result);
                while let Some(result) = reorder.remove(&next_index) {
                    state.finish(next_index, result);
                    next_index += 1;
                }
            }
        }
    }
}
