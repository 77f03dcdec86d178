// ==========================================
// 楼栋层物量引擎 - 写入合并队列
// ==========================================
// 职责: 按记录身份合并写入，防抖后写入持久化端口
// 规则:
//   - 同一记录的新写入覆盖待写的旧写入（旧写入不再发出）
//   - Immediate: 立即发出；Debounced(d): 静默 d 后发出
//   - flush(): 发出全部待写记录并等待所有在途写入完成
//   - 写入失败的记录回到待写集合，由下一次 flush 重试
// 层结构重建前必须 flush 成功，否则旧层身份上的物量会丢失
// ==========================================

use crate::engine::write_port::{RecordKey, RecordSink, WriteRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

/// flush 的最大轮数（失败记录在第二轮重试一次）
const FLUSH_PASSES: usize = 2;

/// 写入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    Immediate,
    Debounced(Duration),
}

struct PendingWrite {
    record: WriteRecord,
    generation: u64,
}

#[derive(Default)]
struct QueueState {
    pending: HashMap<RecordKey, PendingWrite>,
    next_generation: u64,
    last_error: Option<String>,
}

struct Inner {
    sink: Arc<dyn RecordSink>,
    state: Mutex<QueueState>,
    in_flight: watch::Sender<usize>,
}

// ==========================================
// WriteQueue
// ==========================================

/// 写入合并队列（可克隆，克隆体共享同一队列）
#[derive(Clone)]
pub struct WriteQueue {
    inner: Arc<Inner>,
}

impl WriteQueue {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        let (in_flight, _) = watch::channel(0usize);
        Self {
            inner: Arc::new(Inner {
                sink,
                state: Mutex::new(QueueState::default()),
                in_flight,
            }),
        }
    }

    /// 登记一次写入
    ///
    /// 无 tokio 运行时时只登记不发出，由 flush 发出
    pub fn schedule(&self, record: WriteRecord, policy: WritePolicy) {
        let key = record.key();
        let generation = {
            let mut state = self.inner.lock_state();
            let generation = state.next_generation;
            state.next_generation += 1;
            if state
                .pending
                .insert(key.clone(), PendingWrite { record, generation })
                .is_some()
            {
                tracing::debug!(?key, "待写记录被新写入覆盖");
            }
            generation
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(?key, "无运行时，写入留待 flush");
            return;
        };

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            if let WritePolicy::Debounced(delay) = policy {
                tokio::time::sleep(delay).await;
            }
            if let Some(record) = inner.take_if_current(&key, generation) {
                inner.dispatch(record).await;
            }
        });
    }

    /// 登记多条写入（同一策略）
    pub fn schedule_all(&self, records: impl IntoIterator<Item = WriteRecord>, policy: WritePolicy) {
        for record in records {
            self.schedule(record, policy);
        }
    }

    /// 待写记录数（不含在途写入）
    pub fn pending_count(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// 在途写入数
    pub fn in_flight_count(&self) -> usize {
        *self.inner.in_flight.borrow()
    }

    /// 发出全部待写记录并等待在途写入完成
    ///
    /// 仍有记录未写入时返回 `RepositoryError::FlushFailed`
    pub async fn flush(&self) -> RepositoryResult<()> {
        for pass in 0..FLUSH_PASSES {
            let drained = self.inner.take_all();
            if !drained.is_empty() {
                tracing::debug!(pass, count = drained.len(), "flush 发出待写记录");
            }
            join_all(drained.into_iter().map(|record| self.inner.dispatch(record))).await;
            self.wait_idle().await;

            let drained_all = self.inner.lock_state().pending.is_empty();
            if drained_all {
                return Ok(());
            }
        }

        let state = self.inner.lock_state();
        let failed = state.pending.len();
        let first_error = state
            .last_error
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        tracing::warn!(failed, error = %first_error, "flush 未能写入全部记录");
        Err(RepositoryError::FlushFailed {
            failed,
            first_error,
        })
    }

    async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        // 发送端由 Inner 持有，不会关闭
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 仍为最新写入时取出（并计入在途）
    fn take_if_current(&self, key: &RecordKey, generation: u64) -> Option<WriteRecord> {
        let mut state = self.lock_state();
        match state.pending.get(key) {
            Some(pending) if pending.generation == generation => {
                let record = state.pending.remove(key).map(|p| p.record);
                self.in_flight.send_modify(|n| *n += 1);
                record
            }
            _ => None,
        }
    }

    fn take_all(&self) -> Vec<WriteRecord> {
        let mut state = self.lock_state();
        let records: Vec<WriteRecord> = state.pending.drain().map(|(_, p)| p.record).collect();
        let count = records.len();
        self.in_flight.send_modify(|n| *n += count);
        records
    }

    /// 写入一条已取出的记录；失败时回到待写集合（除非已有更新的写入）
    async fn dispatch(&self, record: WriteRecord) {
        let key = record.key();
        let result = self.sink.write(record.clone()).await;

        if let Err(e) = result {
            tracing::warn!(?key, error = %e, "写入失败，等待重试");
            let mut state = self.lock_state();
            state.last_error = Some(e.to_string());
            if !state.pending.contains_key(&key) {
                let generation = state.next_generation;
                state.next_generation += 1;
                state.pending.insert(key, PendingWrite { record, generation });
            }
        }

        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}
