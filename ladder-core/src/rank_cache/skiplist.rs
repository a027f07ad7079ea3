//! Indexable skip list over `RankKey`s.
//!
//! Arena-allocated nodes; every forward link carries a span (how many level-0
//! hops it skips) so rank and select are O(log n). Keys are unique because
//! the ordering breaks score ties by owner id.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::cmp::Ordering;

use crate::types::{RankKey, SortOrder};

const MAX_LEVEL: usize = 32;
const BRANCH_PROBABILITY: f64 = 0.25;
const NIL: usize = usize::MAX;
const HEAD: usize = 0;

#[derive(Debug, Clone, Copy)]
struct Link {
    next: usize,
    span: usize,
}

const EMPTY_LINK: Link = Link { next: NIL, span: 0 };

#[derive(Debug)]
struct Node {
    /// `None` only for the head sentinel and freed slots.
    key: Option<RankKey>,
    links: Vec<Link>,
}

#[derive(Debug)]
pub(crate) struct SkipList {
    order: SortOrder,
    nodes: Vec<Node>,
    free: Vec<usize>,
    level: usize,
    len: usize,
    rng: Xoshiro256PlusPlus,
}

impl SkipList {
    pub(crate) fn new(order: SortOrder, seed: u64) -> Self {
        let head = Node {
            key: None,
            links: vec![EMPTY_LINK; MAX_LEVEL],
        };
        Self {
            order,
            nodes: vec![head],
            free: Vec::new(),
            level: 1,
            len: 0,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn key(&self, node: usize) -> &RankKey {
        self.nodes[node]
            .key
            .as_ref()
            .expect("linked skip list node always holds a key")
    }

    /// `node` sorts strictly before `key`.
    fn precedes(&self, node: usize, key: &RankKey) -> bool {
        self.order.compare(self.key(node), key) == Ordering::Less
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.gen::<f64>() < BRANCH_PROBABILITY {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, key: RankKey, level: usize) -> usize {
        let node = Node {
            key: Some(key),
            links: vec![EMPTY_LINK; level],
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Insert a key that is not already present.
    pub(crate) fn insert(&mut self, key: RankKey) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut rank = [0usize; MAX_LEVEL];
        let mut x = HEAD;

        for i in (0..self.level).rev() {
            rank[i] = if i == self.level - 1 { 0 } else { rank[i + 1] };
            loop {
                let next = self.nodes[x].links[i].next;
                if next != NIL && self.precedes(next, &key) {
                    rank[i] += self.nodes[x].links[i].span;
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let level = self.random_level();
        if level > self.level {
            for i in self.level..level {
                rank[i] = 0;
                update[i] = HEAD;
                self.nodes[HEAD].links[i].span = self.len;
            }
            self.level = level;
        }

        let node = self.alloc(key, level);
        for i in 0..level {
            let prev = update[i];
            let prev_link = self.nodes[prev].links[i];
            let before = rank[0] - rank[i];
            self.nodes[node].links[i] = Link {
                next: prev_link.next,
                span: prev_link.span - before,
            };
            self.nodes[prev].links[i] = Link {
                next: node,
                span: before + 1,
            };
        }
        for i in level..self.level {
            self.nodes[update[i]].links[i].span += 1;
        }
        self.len += 1;
    }

    /// Remove `key`; returns whether it was present.
    pub(crate) fn remove(&mut self, key: &RankKey) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let mut x = HEAD;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].links[i].next;
                if next != NIL && self.precedes(next, key) {
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let target = self.nodes[x].links[0].next;
        if target == NIL || self.nodes[target].key.as_ref() != Some(key) {
            return false;
        }

        for i in 0..self.level {
            let prev = update[i];
            if self.nodes[prev].links[i].next == target {
                let removed = self.nodes[target].links[i];
                let link = &mut self.nodes[prev].links[i];
                link.span = (link.span + removed.span).saturating_sub(1);
                link.next = removed.next;
            } else {
                let link = &mut self.nodes[prev].links[i];
                link.span = link.span.saturating_sub(1);
            }
        }
        while self.level > 1 && self.nodes[HEAD].links[self.level - 1].next == NIL {
            self.level -= 1;
        }

        self.nodes[target] = Node {
            key: None,
            links: Vec::new(),
        };
        self.free.push(target);
        self.len -= 1;
        true
    }

    /// Number of keys sorting strictly before `key` (present or not).
    pub(crate) fn count_before(&self, key: &RankKey) -> usize {
        let mut x = HEAD;
        let mut rank = 0;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].links[i].next;
                if next != NIL && self.precedes(next, key) {
                    rank += self.nodes[x].links[i].span;
                    x = next;
                } else {
                    break;
                }
            }
        }
        rank
    }

    /// 1-based rank of a present key.
    pub(crate) fn rank_of(&self, key: &RankKey) -> Option<usize> {
        let mut x = HEAD;
        let mut rank = 0;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x].links[i].next;
                if next != NIL && self.order.compare(self.key(next), key) != Ordering::Greater {
                    rank += self.nodes[x].links[i].span;
                    x = next;
                } else {
                    break;
                }
            }
            if x != HEAD && self.nodes[x].key.as_ref() == Some(key) {
                return Some(rank);
            }
        }
        None
    }

    fn node_at(&self, rank: usize) -> Option<usize> {
        if rank == 0 || rank > self.len {
            return None;
        }
        let mut x = HEAD;
        let mut traversed = 0;
        for i in (0..self.level).rev() {
            loop {
                let link = self.nodes[x].links[i];
                if link.next != NIL && traversed + link.span <= rank {
                    traversed += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if traversed == rank {
                return Some(x);
            }
        }
        None
    }

    /// Key at a 1-based rank.
    pub(crate) fn get_by_rank(&self, rank: usize) -> Option<&RankKey> {
        self.node_at(rank).map(|node| self.key(node))
    }

    /// Up to `limit` keys starting at 1-based `first_rank`, paired with their ranks.
    pub(crate) fn range(&self, first_rank: usize, limit: usize) -> Vec<(usize, RankKey)> {
        let mut out = Vec::with_capacity(limit.min(self.len));
        let Some(mut node) = self.node_at(first_rank) else {
            return out;
        };
        let mut rank = first_rank;
        while out.len() < limit {
            out.push((rank, self.key(node).clone()));
            node = self.nodes[node].links[0].next;
            if node == NIL {
                break;
            }
            rank += 1;
        }
        out
    }
}
