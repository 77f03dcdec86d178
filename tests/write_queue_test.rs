// ==========================================
// 写入合并队列测试
// ==========================================
// 测试目标: 同一记录的写入合并、防抖、flush 等待、失败重试
// ==========================================

mod test_helpers;

use floor_quantity_engine::engine::WriteRecord;
use floor_quantity_engine::repository::RepositoryError;
use floor_quantity_engine::services::{WritePolicy, WriteQueue};
use floor_quantity_engine::{logging, TradeGroup, TradeMetric};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{create_test_trade, RecordingSink};

fn trade_record(floor_id: &str, value: f64) -> WriteRecord {
    let mut trade = create_test_trade(
        "BLD",
        floor_id,
        TradeGroup::Apartment,
        TradeMetric::ConcreteVolume,
        value,
    );
    trade.id = format!("trade-{}", floor_id);
    WriteRecord::FloorTrade(trade)
}

fn written_value(record: &WriteRecord) -> f64 {
    match record {
        WriteRecord::FloorTrade(trade) => trade.value(TradeMetric::ConcreteVolume),
        other => panic!("非物量写入: {:?}", other),
    }
}

#[tokio::test]
async fn test_debounced_writes_on_same_record_coalesce() {
    logging::init_test();

    let sink = Arc::new(RecordingSink::default());
    let queue = WriteQueue::new(sink.clone());
    let debounce = WritePolicy::Debounced(Duration::from_millis(50));

    queue.schedule(trade_record("F1", 1.0), debounce);
    queue.schedule(trade_record("F1", 2.0), debounce);
    queue.schedule(trade_record("F1", 3.0), debounce);
    assert_eq!(queue.pending_count(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    queue.flush().await.expect("flush 应成功");

    let written = sink.written();
    assert_eq!(written.len(), 1, "只应写入最新值");
    assert_eq!(written_value(&written[0]), 3.0);
}

#[tokio::test]
async fn test_flush_dispatches_debounced_writes_immediately() {
    let sink = Arc::new(RecordingSink::default());
    let queue = WriteQueue::new(sink.clone());
    let long_debounce = WritePolicy::Debounced(Duration::from_secs(60));

    queue.schedule(trade_record("F1", 1.0), long_debounce);
    queue.schedule(trade_record("F2", 2.0), long_debounce);

    queue.flush().await.expect("flush 应成功");
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(queue.in_flight_count(), 0);
    assert_eq!(sink.written().len(), 2);
}

#[tokio::test]
async fn test_distinct_records_are_not_merged() {
    let sink = Arc::new(RecordingSink::default());
    let queue = WriteQueue::new(sink.clone());

    queue.schedule_all(
        vec![trade_record("F1", 1.0), trade_record("F2", 2.0)],
        WritePolicy::Immediate,
    );
    queue.flush().await.expect("flush 应成功");

    let mut values: Vec<f64> = sink.written().iter().map(written_value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(values, vec![1.0, 2.0]);
}

#[tokio::test]
async fn test_failed_flush_keeps_records_pending_for_retry() {
    let sink = Arc::new(RecordingSink::failing());
    let queue = WriteQueue::new(sink.clone());

    queue.schedule(
        trade_record("F1", 1.0),
        WritePolicy::Debounced(Duration::from_secs(60)),
    );

    let err = queue.flush().await.expect_err("写入端口离线时 flush 应失败");
    match err {
        RepositoryError::FlushFailed {
            failed,
            first_error,
        } => {
            assert_eq!(failed, 1);
            assert!(first_error.contains("sink offline"));
        }
        other => panic!("错误类型不符: {:?}", other),
    }
    assert_eq!(queue.pending_count(), 1);

    sink.set_failing(false);
    queue.flush().await.expect("恢复后 flush 应成功");
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(sink.written().len(), 1);
}

#[test]
fn test_schedule_without_runtime_waits_for_flush() {
    let sink = Arc::new(RecordingSink::default());
    let queue = WriteQueue::new(sink.clone());

    queue.schedule(trade_record("F1", 1.0), WritePolicy::Immediate);
    assert_eq!(queue.pending_count(), 1);
    assert!(sink.written().is_empty());

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(queue.flush()).expect("flush 应成功");
    assert_eq!(sink.written().len(), 1);
}
