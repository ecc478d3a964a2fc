// ==========================================
// 养殖场区域容量台账 - 引擎层
// ==========================================
// 职责: 容量计算规则、区域串行化、事件、对账调度
// 红线: Engine 不拼 SQL
// ==========================================

pub mod area_locks;
pub mod capacity_calculator;
pub mod events;
pub mod reconciler;

// 重导出核心引擎
pub use area_locks::{AreaLockGuard, AreaLockRegistry};
pub use capacity_calculator::{CapacityCalculator, OccupancySource};
pub use events::{
    CapacityEvent, CapacityEventPublisher, CapacityEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use reconciler::{ReconcileReport, ReconcileResult, ReconcileTarget, Reconciler};
