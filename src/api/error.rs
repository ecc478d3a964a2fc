// ==========================================
// 养殖场区域容量台账 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户可理解的错误消息
// 说明: 容量检查的"超容"是结果值（is_valid=false），只有入栏流程拒绝时才转为错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 容量约束错误
    // ==========================================
    /// 入栏数量超过区域剩余容量（记录未落库）
    #[error("{message}")]
    CapacityConstraintViolation {
        area: String,
        requested: i64,
        remaining: i64,
        message: String,
    },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    #[error("数据库繁忙: {0}")]
    StorageBusy(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 区域不存在
    pub fn area_not_found(name: &str) -> Self {
        ApiError::NotFound(format!("区域(name={})不存在", name))
    }

    /// 入栏记录不存在
    pub fn import_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("入栏记录(id={})不存在", id))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                area_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "区域{}的剩余容量已被其他写入修改（期望={}，实际={}）",
                area_id, expected, actual
            )),
            RepositoryError::Busy(msg) => ApiError::StorageBusy(msg),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 数据质量错误
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("字段{}: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

/// API层 Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_repository_not_found() {
        let api_err: ApiError = RepositoryError::NotFound {
            entity: "Area".to_string(),
            id: "A1".to_string(),
        }
        .into();
        assert!(matches!(api_err, ApiError::NotFound(_)));
        assert!(api_err.to_string().contains("A1"));
    }

    #[test]
    fn test_from_repository_cas_failure() {
        let api_err: ApiError = RepositoryError::OptimisticLockFailure {
            area_id: "A1".to_string(),
            expected: 700,
            actual: 500,
        }
        .into();
        match api_err {
            ApiError::OptimisticLockFailure(msg) => {
                assert!(msg.contains("700"));
                assert!(msg.contains("500"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_capacity_violation_displays_message() {
        let err = ApiError::CapacityConstraintViolation {
            area: "Khu A".to_string(),
            requested: 800,
            remaining: 700,
            message: "Khu A 剩余容量不足".to_string(),
        };
        assert_eq!(err.to_string(), "Khu A 剩余容量不足");
    }
}
