// ==========================================
// 养殖场区域容量台账 - 入栏记录领域模型
// ==========================================
// 说明: barn 为区域名称的弱引用（按名称查找，不持有）
// 红线: 只有 in-progress 状态计入区域占用
// ==========================================

use crate::domain::types::ImportStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 最小数量（只）
pub const MIN_IMPORT_QUANTITY: i64 = 1;
/// 最小平均体重（kg）
pub const MIN_AVG_WEIGHT: f64 = 0.1;

// ==========================================
// ImportRecord - 入栏记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub import_id: String,
    pub import_date: NaiveDate,
    pub supplier: String,
    pub breed: String,
    pub quantity: i64,
    pub avg_weight: f64,
    pub barn: String, // 区域名称
    pub status: ImportStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ImportRecord {
    /// 该记录对其所在区域贡献的占用数
    pub fn occupancy_contribution(&self) -> i64 {
        if self.status.occupies_area() {
            self.quantity
        } else {
            0
        }
    }
}

// ==========================================
// NewImportRecord - 新建入栏请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImportRecord {
    pub import_date: NaiveDate,
    pub supplier: String,
    pub breed: String,
    pub quantity: i64,
    pub avg_weight: f64,
    pub barn: String,
    #[serde(default)]
    pub status: ImportStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

// ==========================================
// ImportRecordPatch - 入栏记录编辑
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRecordPatch {
    pub import_date: Option<NaiveDate>,
    pub supplier: Option<String>,
    pub breed: Option<String>,
    pub quantity: Option<i64>,
    pub avg_weight: Option<f64>,
    pub barn: Option<String>,
    pub status: Option<ImportStatus>,
    pub notes: Option<String>,
}

impl ImportRecordPatch {
    /// 将补丁应用到已有记录，返回新记录（不落库）
    pub fn apply_to(&self, record: &ImportRecord) -> ImportRecord {
        let mut next = record.clone();
        if let Some(d) = self.import_date {
            next.import_date = d;
        }
        if let Some(s) = &self.supplier {
            next.supplier = s.clone();
        }
        if let Some(b) = &self.breed {
            next.breed = b.clone();
        }
        if let Some(q) = self.quantity {
            next.quantity = q;
        }
        if let Some(w) = self.avg_weight {
            next.avg_weight = w;
        }
        if let Some(barn) = &self.barn {
            next.barn = barn.clone();
        }
        if let Some(st) = self.status {
            next.status = st;
        }
        if self.notes.is_some() {
            next.notes = self.notes.clone();
        }
        next
    }
}

/// 入栏记录列表过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportFilter {
    pub barn: Option<String>,
    pub status: Option<ImportStatus>,
    pub supplier: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// 字段校验（数量、体重、必填项）
///
/// # 返回
/// - Ok(()): 校验通过
/// - Err(String): 第一个不合法字段的原因
pub fn validate_record_fields(record: &ImportRecord) -> Result<(), String> {
    if record.quantity < MIN_IMPORT_QUANTITY {
        return Err(format!(
            "quantity 必须 >= {}，实际 {}",
            MIN_IMPORT_QUANTITY, record.quantity
        ));
    }
    if !record.avg_weight.is_finite() || record.avg_weight < MIN_AVG_WEIGHT {
        return Err(format!(
            "avg_weight 必须 >= {}，实际 {}",
            MIN_AVG_WEIGHT, record.avg_weight
        ));
    }
    if record.supplier.trim().is_empty() {
        return Err("supplier 不能为空".to_string());
    }
    if record.breed.trim().is_empty() {
        return Err("breed 不能为空".to_string());
    }
    if record.barn.trim().is_empty() {
        return Err("barn 不能为空".to_string());
    }
    Ok(())
}
