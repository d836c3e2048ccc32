//! 决策缓存：StateFingerprint -> RoutingDecision
//!
//! 跨任务共享的唯一状态，基于 DashMap。同一指纹只写一次；两个任务同时写入同一指纹属于良性竞争，
//! 因为规则表保证两者算出的值相同。容量上限（淘汰最旧）与 TTL 均为可选配置，都不设置时无上限。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::router::{RoutingDecision, StateFingerprint};

/// 缓存策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// 最多保留的条目数；满时淘汰最早写入的条目
    pub max_entries: Option<usize>,
    /// 条目存活时间
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

#[derive(Clone, Copy, Debug)]
struct CacheEntry {
    decision: RoutingDecision,
    inserted_at: Instant,
}

/// 缓存命中统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: DashMap<StateFingerprint, CacheEntry>,
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl DecisionCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.policy
            .ttl
            .is_some_and(|ttl| entry.inserted_at.elapsed() >= ttl)
    }

    pub fn get(&self, fp: &StateFingerprint) -> Option<RoutingDecision> {
        // 先拷出条目再释放分片锁，之后才能安全 remove
        let found = self.entries.get(fp).map(|e| *e);
        match found {
            Some(entry) if !self.is_expired(&entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.decision)
            }
            Some(_) => {
                self.entries.remove_if(fp, |_, e| self.is_expired(e));
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 写入决策；已存在且未过期的条目保持不变（每个指纹只写一次）
    pub fn insert(&self, fp: StateFingerprint, decision: RoutingDecision) {
        if self.policy.max_entries == Some(0) {
            return;
        }
        if self.entries.contains_key(&fp) {
            return;
        }
        if let Some(max) = self.policy.max_entries {
            while self.entries.len() >= max {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        self.entries.entry(fp).or_insert(CacheEntry {
            decision,
            inserted_at: Instant::now(),
        });
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().inserted_at)
            .map(|e| e.key().clone());
        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
