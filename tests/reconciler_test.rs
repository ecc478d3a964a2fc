// ==========================================
// 容量对账集成测试
// ==========================================
// 职责: 验证对账调度修正计数漂移、识别台账超容
// ==========================================


#[cfg(test)]
mod reconciler_test {
    use std::time::Duration;

    use farm_capacity_ledger::config::config_keys;
    use farm_capacity_ledger::engine::CapacityEventType;
    use farm_capacity_ledger::ReconcileReport;
    use rusqlite::{params, Connection};
    use tokio::sync::watch;

    use crate::test_helpers::{new_import, setup_env};

    #[tokio::test]
    async fn test_run_once_corrects_drift() {
        let env = setup_env();
        env.create_area("Khu A", 1000);
        env.create_area("Khu B", 500);
        env.create_area("Khu C", 300);
        env.state
            .import_api
            .create_import(new_import("Khu A", 200))
            .unwrap();

        // 无台账依据的计数变化
        env.state.capacity_api.apply_capacity_delta("Khu A", 100).unwrap();
        env.state.capacity_api.apply_capacity_delta("Khu B", -50).unwrap();
        env.state.capacity_api.apply_capacity_delta("Khu B", 120).unwrap();

        let report = env.state.reconciler.run_once().await.unwrap();
        assert_eq!(
            report,
            ReconcileReport {
                checked: 3,
                corrected: 2,
                failed: 0,
                integrity_violations: 0,
            }
        );

        let capacity = &env.state.capacity_api;
        assert_eq!(capacity.get_capacity_info("Khu A").unwrap().current_capacity, 800);
        assert_eq!(capacity.get_capacity_info("Khu B").unwrap().current_capacity, 500);
        assert_eq!(capacity.get_capacity_info("Khu C").unwrap().current_capacity, 300);

        // 再跑一轮无需修正
        let again = env.state.reconciler.run_once().await.unwrap();
        assert_eq!(again.checked, 3);
        assert_eq!(again.corrected, 0);
    }

    #[tokio::test]
    async fn test_ledger_overflow_is_reported() {
        let env = setup_env();
        env.create_area("Khu A", 500);
        let record = env
            .state
            .import_api
            .create_import(new_import("Khu A", 400))
            .unwrap();

        // 绕过 API 直接改台账，制造存栏超过最大容量
        let conn = Connection::open(&env.db_path).unwrap();
        conn.busy_timeout(Duration::from_secs(5)).unwrap();
        conn.execute(
            "UPDATE import_record SET quantity = ?2 WHERE import_id = ?1",
            params![record.import_id, 650],
        )
        .unwrap();
        drop(conn);

        let report = env.state.reconciler.run_once().await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.integrity_violations, 1);
        assert_eq!(report.corrected, 1);

        let info = env.state.capacity_api.get_capacity_info("Khu A").unwrap();
        assert_eq!(info.current_capacity, 0);

        let events = env.events.events.lock().unwrap();
        let violation = events
            .iter()
            .find(|e| e.event_type == CapacityEventType::IntegrityViolation)
            .expect("violation event");
        assert_eq!(violation.occupancy, Some(650));
        assert_eq!(violation.max_capacity, 500);
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let env = setup_env();
        env.create_area("Khu A", 100);
        env.state.capacity_api.apply_capacity_delta("Khu A", 40).unwrap();
        env.state
            .config_manager
            .set_global_config_value(config_keys::RECONCILE_INTERVAL_SECS, "3600")
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let reconciler = env.state.reconciler.clone();
        let worker = tokio::spawn(async move { reconciler.run_until(rx).await });

        // 首轮立即执行
        let mut healed = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let capacity = env.state.capacity_api.clone();
            let remaining = tokio::task::spawn_blocking(move || {
                capacity.get_capacity_info("Khu A").unwrap().current_capacity
            })
            .await
            .unwrap();
            if remaining == 100 {
                healed = true;
                break;
            }
        }
        assert!(healed);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_reconcile_skips_rounds() {
        let env = setup_env();
        env.create_area("Khu A", 100);
        env.state.capacity_api.apply_capacity_delta("Khu A", 40).unwrap();
        env.state
            .config_manager
            .set_global_config_value(config_keys::RECONCILE_ENABLED, "false")
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let reconciler = env.state.reconciler.clone();
        let worker = tokio::spawn(async move { reconciler.run_until(rx).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert_eq!(
            env.state
                .capacity_api
                .get_capacity_info("Khu A")
                .unwrap()
                .current_capacity,
            60
        );
    }

    #[tokio::test]
    async fn test_scheduler_picks_up_policy_changes() {
        let env = setup_env();
        env.create_area("Khu A", 500);
        let record = env
            .state
            .import_api
            .create_import(new_import("Khu A", 400))
            .unwrap();
        assert!(env.state.capacity_api.policy().alert_on_integrity_violation);

        // 启动后修改配置，不重建 AppState
        env.state
            .config_manager
            .set_global_config_value(config_keys::ALERT_ON_INTEGRITY_VIOLATION, "false")
            .unwrap();
        env.state
            .config_manager
            .set_global_config_value(config_keys::RECONCILE_INTERVAL_SECS, "3600")
            .unwrap();

        let conn = Connection::open(&env.db_path).unwrap();
        conn.busy_timeout(Duration::from_secs(5)).unwrap();
        conn.execute(
            "UPDATE import_record SET quantity = ?2 WHERE import_id = ?1",
            params![record.import_id, 650],
        )
        .unwrap();
        drop(conn);

        let (tx, rx) = watch::channel(false);
        let reconciler = env.state.reconciler.clone();
        let worker = tokio::spawn(async move { reconciler.run_until(rx).await });

        let mut corrected = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let capacity = env.state.capacity_api.clone();
            let remaining = tokio::task::spawn_blocking(move || {
                capacity.get_capacity_info("Khu A").unwrap().current_capacity
            })
            .await
            .unwrap();
            if remaining == 0 {
                corrected = true;
                break;
            }
        }
        assert!(corrected);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert!(!env.state.capacity_api.policy().alert_on_integrity_violation);
        let events = env.events.events.lock().unwrap();
        assert!(events
            .iter()
            .all(|e| e.event_type != CapacityEventType::IntegrityViolation));
    }
}
