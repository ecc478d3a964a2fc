// ==========================================
// 养殖场区域容量台账 - 容量事件发布
// ==========================================
// 职责: 定义容量事件发布 trait，实现依赖倒置
// 说明: 引擎/API 层只依赖 trait，看板刷新或告警通道由上层实现
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

use crate::domain::capacity::CapacityChangeSource;

// ==========================================
// 容量事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityEventType {
    /// 剩余容量变更（增量/扩缩容）
    CapacityChanged,
    /// 全量重算完成（含漂移修正）
    CapacityRecomputed,
    /// 台账存栏数超过最大容量
    IntegrityViolation,
}

impl CapacityEventType {
    pub fn as_str(&self) -> &str {
        match self {
            CapacityEventType::CapacityChanged => "CapacityChanged",
            CapacityEventType::CapacityRecomputed => "CapacityRecomputed",
            CapacityEventType::IntegrityViolation => "IntegrityViolation",
        }
    }
}

/// 容量事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityEvent {
    pub area_id: String,
    pub area_name: String,
    pub event_type: CapacityEventType,
    pub source: CapacityChangeSource,
    pub capacity_before: i64,
    pub capacity_after: i64,
    pub max_capacity: i64,
    /// 重算路径的台账存栏数
    pub occupancy: Option<i64>,
}

impl CapacityEvent {
    /// 重算前后的计数差（漂移量）
    pub fn drift(&self) -> i64 {
        self.capacity_after - self.capacity_before
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 容量事件发布者
pub trait CapacityEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(id)`: 事件/任务 ID（如果支持）或空字符串
    fn publish(&self, event: CapacityEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl CapacityEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: CapacityEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - area={}, event_type={}",
            event.area_name,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 发布失败只记录日志，不影响容量写入结果
#[derive(Clone, Default)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn CapacityEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn CapacityEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn from_option(publisher: Option<Arc<dyn CapacityEventPublisher>>) -> Self {
        Self { inner: publisher }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: CapacityEvent) {
        let Some(publisher) = &self.inner else {
            return;
        };
        let area_name = event.area_name.clone();
        let event_type = event.event_type;
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(
                area = %area_name,
                event_type = event_type.as_str(),
                error = %e,
                "容量事件发布失败"
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<CapacityEvent>>,
    }

    impl CapacityEventPublisher for Recorder {
        fn publish(&self, event: CapacityEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok("evt".to_string())
        }
    }

    struct Failing;

    impl CapacityEventPublisher for Failing {
        fn publish(&self, _event: CapacityEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("channel closed".into())
        }
    }

    fn event() -> CapacityEvent {
        CapacityEvent {
            area_id: "A1".to_string(),
            area_name: "Khu A".to_string(),
            event_type: CapacityEventType::CapacityRecomputed,
            source: CapacityChangeSource::Recompute,
            capacity_before: 700,
            capacity_after: 800,
            max_capacity: 1000,
            occupancy: Some(200),
        }
    }

    #[test]
    fn test_drift() {
        assert_eq!(event().drift(), 100);
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recorder = Arc::new(Recorder::default());
        let publisher = OptionalEventPublisher::with_publisher(recorder.clone());
        assert!(publisher.is_configured());
        publisher.publish(event());
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_optional_publisher_swallows_failures() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(Failing));
        publisher.publish(event());
        assert!(!OptionalEventPublisher::none().is_configured());
    }

    #[test]
    fn test_noop_publisher() {
        assert_eq!(NoOpEventPublisher.publish(event()).unwrap(), "");
    }
}
