//! 有界日志：FIFO 环形缓冲
//!
//! 超出容量时丢弃最旧的条目。memory 与 reasoning_chain / action_history /
//! learning_memory / reflection_log 等所有日志共用这一策略。

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

/// 容量固定的 FIFO 日志：push 后 len() <= capacity 恒成立
#[derive(Clone, Debug)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    /// capacity 至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// 追加一条；溢出时返回被淘汰的最旧条目
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    /// 最近 n 条（保持时间顺序）
    pub fn last_n(&self, n: usize) -> Vec<&T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }
}

impl<T: Clone> BoundedLog<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }

    /// 最近 n 条的拷贝（n 为 None 时全部）
    pub fn tail(&self, n: Option<usize>) -> Vec<T> {
        match n {
            Some(n) => self.last_n(n).into_iter().cloned().collect(),
            None => self.to_vec(),
        }
    }
}

impl<T: Serialize> Serialize for BoundedLog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}
