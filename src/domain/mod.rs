// ==========================================
// 养殖场区域容量台账 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、容量约束接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod area;
pub mod capacity;
pub mod import_record;
pub mod types;

// 重导出核心类型
pub use area::{
    normalize_area_name, Area, AreaFilter, AreaPatch, AreaSort, AreaSortField, NewArea, Page,
    Pagination, AREA_NAME_MAX_LEN,
};
pub use capacity::{
    AdmissionDecision, CapacityChangeSource, CapacityCheck, CapacityConstraint, CapacityInfo,
    CapacityLogEntry, RecomputeOutcome,
};
pub use import_record::{
    validate_record_fields, ImportFilter, ImportRecord, ImportRecordPatch, NewImportRecord,
};
pub use types::{AreaStatus, ImportStatus, SortOrder};
