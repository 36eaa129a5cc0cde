//! 保证释放的加锁执行

use futures::FutureExt;
use hmdp_ports::{DistributedLock, LockLease};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// 在持有 `lease` 的情况下执行 `body`，无论成功、失败还是 panic 都会尝试释放锁
///
/// 释放失败只记录日志，不影响 `body` 的结果。
pub async fn run_locked<F, T>(lock: &dyn DistributedLock, lease: LockLease, body: F) -> T
where
    F: Future<Output = T>,
{
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    release_quietly(lock, &lease).await;

    match outcome {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// 释放锁，错误只记录不传播
pub async fn release_quietly(lock: &dyn DistributedLock, lease: &LockLease) {
    if let Err(e) = lock.release(lease).await {
        error!(lock = %lease.name, error = %e, "Failed to release lock");
    }
}
