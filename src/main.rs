// ==========================================
// 养殖场区域容量台账 - 主入口
// ==========================================
// 用法:
// - farm-capacity-ledger            常驻运行，按配置间隔对账，Ctrl-C 退出
// - farm-capacity-ledger reconcile  执行一轮对账并输出报告
// - farm-capacity-ledger overview   输出区域概况
// ==========================================

use farm_capacity_ledger::app::{get_default_db_path, AppState};
use farm_capacity_ledger::logging;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", farm_capacity_ledger::APP_NAME, farm_capacity_ledger::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;

    match std::env::args().nth(1).as_deref() {
        Some("reconcile") => {
            let report = state
                .reconciler
                .run_once()
                .await
                .map_err(|e| anyhow::anyhow!("对账失败: {}", e))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some("overview") => {
            let dashboard = state.dashboard_api.clone();
            let overview = tokio::task::spawn_blocking(move || dashboard.get_area_overview())
                .await??;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
        Some(other) => {
            anyhow::bail!("未知命令: {}（可用: reconcile, overview）", other);
        }
        None => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let reconciler = state.reconciler.clone();
            let worker = tokio::spawn(async move { reconciler.run_until(shutdown_rx).await });

            tokio::signal::ctrl_c().await?;
            tracing::info!("收到退出信号，正在停止对账调度");
            // 接收端已退出时发送失败，可忽略
            let _ = shutdown_tx.send(true);
            worker.await?;
        }
    }

    Ok(())
}
