//! 全局唯一订单 ID 生成器
//!
//! 64 位 ID 布局（符号位恒为 0）：
//!
//! ```text
//! | 31 bit 秒级时间戳（自 2022-01-01 起） | 10 bit 节点号 | 22 bit 秒内序列号 |
//! ```
//!
//! 同一进程内严格递增；不同进程只要节点号不同就不会冲突，
//! 且按时间戳部分可以直接比较先后，无需中心协调。

use chrono::Utc;
use parking_lot::Mutex;
use std::time::Duration;

use crate::types::OrderId;

/// 起始时间戳：2022-01-01T00:00:00Z
pub const ID_EPOCH_SECONDS: i64 = 1_640_995_200;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 22;
const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: u32 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug)]
struct WorkerState {
    last_second: i64,
    sequence: u32,
}

/// 订单 ID 生成器
#[derive(Debug)]
pub struct OrderIdGenerator {
    node_id: u16,
    state: Mutex<WorkerState>,
}

impl OrderIdGenerator {
    /// 创建生成器，节点号超过 10 bit 时截断
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: node_id & MAX_NODE_ID,
            state: Mutex::new(WorkerState {
                last_second: 0,
                sequence: 0,
            }),
        }
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// 生成下一个 ID
    pub fn next_id(&self) -> OrderId {
        loop {
            let now = Utc::now().timestamp() - ID_EPOCH_SECONDS;
            {
                let mut state = self.state.lock();
                // 时钟回拨时沿用上一秒，保证单调
                let second = now.max(state.last_second);
                if second > state.last_second {
                    state.last_second = second;
                    state.sequence = 0;
                } else if state.sequence >= MAX_SEQUENCE {
                    // 本秒序列号耗尽，等待下一秒
                    drop(state);
                    std::thread::sleep(Duration::from_millis(1));
                    continue;
                } else {
                    state.sequence += 1;
                }
                return OrderId::new(self.compose(state.last_second, state.sequence));
            }
        }
    }

    fn compose(&self, second: i64, sequence: u32) -> i64 {
        (second << (NODE_BITS + SEQUENCE_BITS))
            | ((self.node_id as i64) << SEQUENCE_BITS)
            | sequence as i64
    }

    /// 从 ID 中取出秒级时间戳（Unix 秒）
    pub fn timestamp_of(id: OrderId) -> i64 {
        (id.value() >> (NODE_BITS + SEQUENCE_BITS)) + ID_EPOCH_SECONDS
    }
}
