// ==========================================
// 养殖场区域容量台账 - 容量对账调度
// ==========================================
// 职责: 定期对全部区域执行全量重算，修正增量路径的计数漂移
// 说明: 单区域失败只计数并记录日志，不中断本轮对账
// ==========================================

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{CapacityConfigReader, CapacityPolicy};
use crate::config::config_manager::DEFAULT_RECONCILE_INTERVAL_SECS;
use crate::domain::capacity::RecomputeOutcome;

pub type ReconcileResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// Trait: ReconcileTarget
// ==========================================
// 用途: 对账对象（依赖倒置，引擎不依赖 API 层）
// 实现者: CapacityApi
pub trait ReconcileTarget: Send + Sync {
    /// 全部区域ID
    fn area_ids(&self) -> ReconcileResult<Vec<String>>;

    /// 在区域锁内重算单个区域
    fn reconcile_area(&self, area_id: &str) -> ReconcileResult<RecomputeOutcome>;

    /// 应用最新的容量写入策略
    fn apply_policy(&self, policy: CapacityPolicy);
}

/// 一轮对账的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub corrected: usize,
    pub failed: usize,
    pub integrity_violations: usize,
}

// ==========================================
// Reconciler - 对账调度器
// ==========================================
pub struct Reconciler {
    target: Arc<dyn ReconcileTarget>,
    config: Arc<dyn CapacityConfigReader>,
}

impl Reconciler {
    pub fn new(target: Arc<dyn ReconcileTarget>, config: Arc<dyn CapacityConfigReader>) -> Self {
        Self { target, config }
    }

    /// 执行一轮对账
    ///
    /// 每个区域在阻塞线程池上重算，全部完成后汇总
    pub async fn run_once(&self) -> ReconcileResult<ReconcileReport> {
        let target = self.target.clone();
        let area_ids = tokio::task::spawn_blocking(move || target.area_ids()).await??;

        let tasks = area_ids.into_iter().map(|area_id| {
            let target = self.target.clone();
            tokio::task::spawn_blocking(move || {
                let result = target.reconcile_area(&area_id);
                (area_id, result)
            })
        });

        let mut report = ReconcileReport::default();
        for joined in join_all(tasks).await {
            report.checked += 1;
            match joined {
                Ok((_, Ok(outcome))) => {
                    if outcome.corrected() {
                        report.corrected += 1;
                    }
                    if outcome.integrity_violation {
                        report.integrity_violations += 1;
                    }
                }
                Ok((area_id, Err(e))) => {
                    report.failed += 1;
                    warn!(area_id = %area_id, error = %e, "区域对账失败");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, "对账任务异常退出");
                }
            }
        }

        info!(
            checked = report.checked,
            corrected = report.corrected,
            failed = report.failed,
            integrity_violations = report.integrity_violations,
            "容量对账完成"
        );
        Ok(report)
    }

    /// 从配置刷新容量写入策略
    ///
    /// 读取失败时沿用当前策略
    pub async fn refresh_policy(&self) {
        match self.config.get_capacity_policy().await {
            Ok(policy) => self.target.apply_policy(policy),
            Err(e) => warn!(error = %e, "读取容量策略失败，沿用当前策略"),
        }
    }

    /// 按配置间隔循环对账，直到收到关闭信号
    ///
    /// 每轮重新读取配置（容量策略、开关、间隔），修改后下一轮生效
    /// 对账关闭时仍会刷新容量策略
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            self.refresh_policy().await;

            let enabled = self.config.get_reconcile_enabled().await.unwrap_or_else(|e| {
                warn!(error = %e, "读取对账开关失败，按启用处理");
                true
            });
            let interval_secs = self
                .config
                .get_reconcile_interval_secs()
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "读取对账间隔失败，使用默认值");
                    DEFAULT_RECONCILE_INTERVAL_SECS
                });

            if enabled {
                if let Err(e) = self.run_once().await {
                    warn!(error = %e, "本轮对账失败");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval_secs)) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("对账调度已停止");
    }
}
