// ==========================================
// 养殖场区域容量台账 - 区域级串行化锁
// ==========================================
// 红线: 同一区域的容量变更必须串行执行
// 说明:
// - 以 area_id 为键（改名不影响锁身份）
// - 多区域作用域一次性获取全部键，避免加锁顺序导致的死锁
// ==========================================

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

/// 区域锁注册表
#[derive(Debug, Default)]
pub struct AreaLockRegistry {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// 区域锁守卫（Drop 时释放全部键）
#[derive(Debug)]
pub struct AreaLockGuard<'a> {
    registry: &'a AreaLockRegistry,
    keys: Vec<String>,
}

impl AreaLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取单个区域的锁（阻塞直到可用）
    pub fn lock(&self, area_id: &str) -> AreaLockGuard<'_> {
        self.lock_many(&[area_id])
    }

    /// 一次性获取多个区域的锁（阻塞直到全部可用）
    pub fn lock_many(&self, area_ids: &[&str]) -> AreaLockGuard<'_> {
        let mut keys: Vec<String> = area_ids.iter().map(|s| s.to_string()).collect();
        keys.sort();
        keys.dedup();

        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        while keys.iter().any(|k| held.contains(k)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|p| p.into_inner());
        }
        for k in &keys {
            held.insert(k.clone());
        }

        AreaLockGuard {
            registry: self,
            keys,
        }
    }
}

impl AreaLockGuard<'_> {
    /// 守卫是否覆盖指定区域
    pub fn covers(&self, area_id: &str) -> bool {
        self.keys.iter().any(|k| k == area_id)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for AreaLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .registry
            .held
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        for k in &self.keys {
            held.remove(k);
        }
        drop(held);
        self.registry.released.notify_all();
    }
}
