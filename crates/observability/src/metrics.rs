//! 提交指标收集模块
//!
//! 记录提交、sink 写入、重复拒绝与上传的运行指标。

use std::collections::BTreeMap;

use contracts::{SinkKind, SubmissionError, SubmissionResult};
use metrics::{counter, histogram};

/// 记录一次提交的整体结果
///
/// `status`: `ok` (全部成功) / `partial` / `failed` / `rejected` (前置条件失败)
pub fn record_submission(result: &Result<SubmissionResult, SubmissionError>) {
    let status = submission_status(result);
    counter!("survey_submissions_total", "status" => status).increment(1);

    if let Err(SubmissionError::DuplicateSubmission { .. }) = result {
        counter!("survey_duplicates_rejected_total").increment(1);
    }
}

/// 记录单个 sink 写入
pub fn record_sink_write(sink: SinkKind, success: bool, latency_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "survey_sink_writes_total",
        "sink" => sink.as_str(),
        "status" => status
    )
    .increment(1);
    histogram!("survey_sink_write_latency_ms", "sink" => sink.as_str()).record(latency_ms);
}

/// 记录文件上传
pub fn record_upload(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("survey_uploads_total", "status" => status).increment(1);
}

/// 记录对象存储写入
pub fn record_object_stored(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("survey_objects_stored_total", "status" => status).increment(1);
}

fn submission_status(result: &Result<SubmissionResult, SubmissionError>) -> &'static str {
    match result {
        Err(e) if e.is_precondition() => "rejected",
        Err(_) => "failed",
        Ok(r) if r.succeeded() == r.len() => "ok",
        Ok(r) if r.succeeded() == 0 => "failed",
        Ok(_) => "partial",
    }
}

/// 提交指标聚合器
///
/// 在内存中聚合指标，便于 CLI 输出摘要。
#[derive(Debug, Clone, Default)]
pub struct SubmissionMetricsAggregator {
    /// 提交总数
    pub total_submissions: u64,

    /// 按状态计数
    pub by_status: BTreeMap<&'static str, u64>,

    /// 各 sink 成功/失败次数
    pub sink_counts: BTreeMap<SinkKind, (u64, u64)>,

    /// 提交耗时统计 (毫秒)
    pub latency_stats: RunningStats,
}

impl SubmissionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, result: &Result<SubmissionResult, SubmissionError>, latency_ms: f64) {
        self.total_submissions += 1;
        *self.by_status.entry(submission_status(result)).or_insert(0) += 1;
        self.latency_stats.push(latency_ms);

        if let Ok(result) = result {
            for (kind, outcome) in result.iter() {
                let entry = self.sink_counts.entry(*kind).or_insert((0, 0));
                if outcome.is_ok() {
                    entry.0 += 1;
                } else {
                    entry.1 += 1;
                }
            }
        }
    }
}

impl std::fmt::Display for SubmissionMetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Submission Summary ===")?;
        writeln!(f, "Total submissions: {}", self.total_submissions)?;
        for (status, count) in &self.by_status {
            writeln!(f, "  {status}: {count}")?;
        }
        for (sink, (ok, failed)) in &self.sink_counts {
            writeln!(f, "Sink {sink}: {ok} ok, {failed} failed")?;
        }
        if self.latency_stats.count() > 0 {
            writeln!(
                f,
                "Latency (ms): min={:.3}, max={:.3}, mean={:.3} (n={})",
                self.latency_stats.min(),
                self.latency_stats.max(),
                self.latency_stats.mean(),
                self.latency_stats.count()
            )?;
        }
        Ok(())
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AppendResult, SinkReceipt};

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }
        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_submission_status() {
        let rejected: Result<SubmissionResult, SubmissionError> =
            Err(SubmissionError::duplicate("a@x.com"));
        assert_eq!(submission_status(&rejected), "rejected");

        let mut partial = SubmissionResult::new();
        partial.record(
            SinkKind::Spreadsheet,
            Ok(SinkReceipt::Spreadsheet(AppendResult::default())),
        );
        partial.record(
            SinkKind::DocumentStore,
            Err(SubmissionError::sink_write("documentStore", "down")),
        );
        assert_eq!(submission_status(&Ok(partial)), "partial");
        assert_eq!(submission_status(&Ok(SubmissionResult::new())), "ok");
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SubmissionMetricsAggregator::new();
        let mut result = SubmissionResult::new();
        result.record(
            SinkKind::Spreadsheet,
            Ok(SinkReceipt::Spreadsheet(AppendResult::default())),
        );
        aggregator.update(&Ok(result), 12.0);
        aggregator.update(&Err(SubmissionError::missing_key("email")), 1.0);

        assert_eq!(aggregator.total_submissions, 2);
        assert_eq!(aggregator.by_status.get("ok"), Some(&1));
        assert_eq!(aggregator.by_status.get("rejected"), Some(&1));
        assert_eq!(aggregator.sink_counts.get(&SinkKind::Spreadsheet), Some(&(1, 0)));

        let output = aggregator.to_string();
        assert!(output.contains("Total submissions: 2"));
    }
}
