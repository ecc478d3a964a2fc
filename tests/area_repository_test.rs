// ==========================================
// 区域仓储集成测试
// ==========================================
// 职责: 验证 name_key 的存储层唯一性与非 ASCII 忽略大小写查找
// ==========================================


#[cfg(test)]
mod area_repository_test {
    use std::sync::{Arc, Mutex};

    use farm_capacity_ledger::domain::{Area, AreaFilter, AreaStatus};
    use farm_capacity_ledger::repository::sql_utils::now_ts;
    use farm_capacity_ledger::repository::{AreaRepository, RepositoryError};
    use rusqlite::Connection;

    use crate::test_helpers::create_test_db;

    fn area(id: &str, name: &str) -> Area {
        let ts = now_ts();
        Area {
            area_id: id.to_string(),
            name: name.to_string(),
            max_capacity: 100,
            current_capacity: 100,
            status: AreaStatus::Empty,
            staff: Vec::new(),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn repo(db_path: &str) -> AreaRepository {
        let conn = Connection::open(db_path).unwrap();
        AreaRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_find_by_name_ci_folds_non_ascii() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let repo = repo(&db_path);
        repo.insert(&area("a1", "Khu Đông")).unwrap();

        let found = repo.find_by_name_ci("  KHU ĐÔNG ").unwrap().unwrap();
        assert_eq!(found.area_id, "a1");
        assert_eq!(found.name, "Khu Đông");
        assert!(repo.find_by_name_ci("Khu Dong").unwrap().is_none());
    }

    #[test]
    fn test_name_key_unique_in_storage() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let repo = repo(&db_path);
        repo.insert(&area("a1", "Chuồng Ấm")).unwrap();

        let err = repo.insert(&area("a2", "CHUỒNG ẤM")).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
        assert_eq!(repo.count(&AreaFilter::default()).unwrap(), 1);
    }

    #[test]
    fn test_rename_updates_name_key() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let repo = repo(&db_path);
        repo.insert(&area("a1", "Khu A")).unwrap();

        repo.rename_with_cascade("a1", "Khu A", "Khu Đông").unwrap();
        assert!(repo.find_by_name_ci("khu a").unwrap().is_none());
        assert_eq!(
            repo.find_by_name_ci("KHU ĐÔNG").unwrap().map(|a| a.area_id),
            Some("a1".to_string())
        );
    }
}
