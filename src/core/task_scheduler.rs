//! 任务调度：并行工具批次的并发上限
//!
//! 同一批次的工具调用可以并行执行，Semaphore 限制同时在途的调用数。

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// 工具池调度器
pub struct TaskScheduler {
    /// 工具并发限制（默认 3）
    tool_semaphore: Arc<Semaphore>,
    max_concurrent_tools: usize,
}

impl TaskScheduler {
    pub fn new(max_concurrent_tools: usize) -> Self {
        let max_concurrent_tools = max_concurrent_tools.max(1);
        Self {
            tool_semaphore: Arc::new(Semaphore::new(max_concurrent_tools)),
            max_concurrent_tools,
        }
    }

    pub fn max_concurrent_tools(&self) -> usize {
        self.max_concurrent_tools
    }

    /// 在获得许可后执行工具 future；信号量从不关闭，获取失败时直接执行
    pub async fn run_tool<F: Future>(&self, fut: F) -> F::Output {
        let _permit = self.tool_semaphore.acquire().await.ok();
        fut.await
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_limits_in_flight_tools() {
        let scheduler = TaskScheduler::new(2);
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let jobs = (0..6).map(|_| {
            scheduler.run_tool(async {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
        });
        futures_util::future::join_all(jobs).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_is_raised_to_one() {
        assert_eq!(TaskScheduler::new(0).max_concurrent_tools(), 1);
    }
}
