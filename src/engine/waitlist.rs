use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use crate::model::MemberId;

/// Arrival-ordered, duplicate-free queue of members waiting for one book.
///
/// Each append stamps the member with a fresh sequence number. Removal only
/// drops the member from the index; the stale `(seq, member)` slot left in
/// `order` is skipped on iteration and compacted away lazily, which keeps
/// append/remove/contains O(1) and peek amortized O(1).
#[derive(Debug, Default, Clone)]
pub struct Waitlist {
    order: VecDeque<(u64, MemberId)>,
    index: HashMap<MemberId, u64>,
    next_seq: u64,
}

impl Waitlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, member_id: MemberId) -> bool {
        self.index.contains_key(&member_id)
    }

    /// Returns false if the member was already queued (position kept).
    pub fn append_if_absent(&mut self, member_id: MemberId) -> bool {
        match self.index.entry(member_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                v.insert(seq);
                self.order.push_back((seq, member_id));
                true
            }
        }
    }

    pub fn remove(&mut self, member_id: MemberId) -> bool {
        if self.index.remove(&member_id).is_none() {
            return false;
        }
        if self.index.is_empty() {
            self.order.clear();
        } else if self.order.len() > 2 * self.index.len() + 16 {
            self.compact();
        }
        true
    }

    pub fn peek_first(&mut self) -> Option<MemberId> {
        while let Some(&(seq, member)) = self.order.front() {
            if self.is_live(seq, member) {
                return Some(member);
            }
            self.order.pop_front();
        }
        None
    }

    /// 1-based position, O(n).
    pub fn position_of(&self, member_id: MemberId) -> Option<usize> {
        if !self.contains(member_id) {
            return None;
        }
        Some(self.iter().take_while(|&m| m != member_id).count() + 1)
    }

    /// Front-to-back over live members.
    pub fn iter(&self) -> impl Iterator<Item = MemberId> + '_ {
        self.order
            .iter()
            .filter(|&&(seq, m)| self.is_live(seq, m))
            .map(|&(_, m)| m)
    }

    pub fn to_vec(&self) -> Vec<MemberId> {
        self.iter().collect()
    }

    fn is_live(&self, seq: u64, member: MemberId) -> bool {
        self.index.get(&member) == Some(&seq)
    }

    fn compact(&mut self) {
        let index = &self.index;
        self.order.retain(|&(seq, m)| index.get(&m) == Some(&seq));
    }
}
