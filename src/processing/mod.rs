//! 转换处理模块
//!
//! 单任务流水线（探测 → 解码 → 写入）和批处理调度。

pub mod batch_state;
pub mod cancel;
pub mod job;
pub mod orchestrator;

pub use batch_state::{BatchStats, BatchStatsSnapshot};
pub use cancel::CancelToken;
pub use job::{
    ConversionJob, JobFailure, JobPlan, JobState, PipelineContext, Stage, run_pipeline,
};
pub use orchestrator::{
    BatchEvent, BatchHandle, BatchOptions, BatchOrchestrator, BatchProgress, BatchReport,
    JobSummary, RejectedFile, SubmissionHandle, SubmissionReport,
};
