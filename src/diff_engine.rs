//! Identity-first list diffing with LIS-based move minimisation
use crate::errors::DiffAborted;
use crate::identity::Reconcilable;
use crate::types::{EditOp, EditScript};
use std::collections::{HashMap, VecDeque};
use tokio_util::sync::CancellationToken;

/// How many items are processed between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Computes the edit script turning `old` into `new`.
///
/// The script is replayed op by op against `old`:
/// 1. `Remove` for every old item without a partner in `new`, highest position first.
/// 2. `Insert`/`Move` in `new` order. Items on the longest increasing
///    subsequence of surviving old positions never move.
/// 3. `Update` at final positions for partnered items whose content changed.
pub struct DiffEngine<'a, T: Reconcilable> {
    old: &'a [T],
    new: &'a [T],
    cancel: Option<&'a CancellationToken>,
    script: EditScript<T>,
}

/// Where an item sits in the slot order used for position bookkeeping.
/// Slots sort by gap (stable items passed so far), then class, then order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SlotKey {
    gap: usize,
    class: SlotClass,
    order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SlotClass {
    /// A surviving old item that has not reached its new position yet.
    Unplaced,
    /// A moved or inserted item at its new position.
    Placed,
    /// An item on the LIS; present from start to finish.
    Stable,
}

impl<'a, T: Reconcilable> DiffEngine<'a, T> {
    pub fn new(old: &'a [T], new: &'a [T]) -> Self {
        DiffEngine {
            old,
            new,
            cancel: None,
            script: EditScript::new(),
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn compute(mut self) -> Result<EditScript<T>, DiffAborted> {
        if self.old.is_empty() && self.new.is_empty() {
            return Ok(self.script);
        }

        let new_to_old = self.pair_by_identity()?;
        let consumed = consumed_mask(self.old.len(), &new_to_old);

        self.emit_removals(&consumed);
        self.emit_structure(&new_to_old, &consumed)?;
        self.emit_updates(&new_to_old)?;

        log::debug!(
            "DiffEngine: {} -> {} rows: {} inserts, {} removes, {} moves, {} updates",
            self.old.len(),
            self.new.len(),
            self.script.inserts(),
            self.script.removes(),
            self.script.moves(),
            self.script.updates(),
        );
        Ok(self.script)
    }

    fn checkpoint(&self, step: usize) -> Result<(), DiffAborted> {
        if step % CANCEL_CHECK_INTERVAL == 0 {
            if let Some(token) = self.cancel {
                if token.is_cancelled() {
                    return Err(DiffAborted);
                }
            }
        }
        Ok(())
    }

    /// For each new item, the old position it is paired with. Repeated keys
    /// pair in order of occurrence; surplus copies stay unpaired.
    fn pair_by_identity(&self) -> Result<Vec<Option<usize>>, DiffAborted> {
        let mut index: HashMap<T::Key, VecDeque<usize>> = HashMap::with_capacity(self.old.len());
        let mut duplicates = 0usize;
        for (i, item) in self.old.iter().enumerate() {
            self.checkpoint(i)?;
            let slots = index.entry(item.identity_key()).or_default();
            if !slots.is_empty() {
                duplicates += 1;
            }
            slots.push_back(i);
        }
        if duplicates > 0 {
            log::debug!("DiffEngine: {} old rows repeat an identity key", duplicates);
        }

        let mut new_to_old = Vec::with_capacity(self.new.len());
        for (i, item) in self.new.iter().enumerate() {
            self.checkpoint(i)?;
            let partner = index
                .get_mut(&item.identity_key())
                .and_then(|slots| slots.pop_front());
            new_to_old.push(partner);
        }
        Ok(new_to_old)
    }

    fn emit_removals(&mut self, consumed: &[bool]) {
        for (position, _) in consumed.iter().enumerate().rev().filter(|(_, kept)| !**kept) {
            self.script.push(EditOp::Remove { position });
        }
    }

    fn emit_structure(
        &mut self,
        new_to_old: &[Option<usize>],
        consumed: &[bool],
    ) -> Result<(), DiffAborted> {
        // Rank = position among the old items that survive the removals.
        let mut rank_of_old = vec![0usize; self.old.len()];
        let mut survivors = 0usize;
        for (i, kept) in consumed.iter().enumerate() {
            if *kept {
                rank_of_old[i] = survivors;
                survivors += 1;
            }
        }

        let matched: Vec<usize> = (0..self.new.len()).filter(|&k| new_to_old[k].is_some()).collect();
        let ranks: Vec<usize> = matched
            .iter()
            .filter_map(|&k| new_to_old[k].map(|o| rank_of_old[o]))
            .collect();

        let mut stable = vec![false; self.new.len()];
        let mut stable_rank = vec![false; survivors];
        if !ranks.is_empty() {
            for seq_idx in lis::longest_increasing_subsequence(&ranks) {
                stable[matched[seq_idx]] = true;
                stable_rank[ranks[seq_idx]] = true;
            }
        }

        let stable_before_new = prefix_counts(&stable);
        let stable_before_rank = prefix_counts(&stable_rank);

        // Every item gets its final slot; items that will move also get the
        // slot they occupy until then.
        let mut keys: Vec<(SlotKey, usize, bool)> = Vec::with_capacity(self.new.len() + matched.len());
        for k in 0..self.new.len() {
            self.checkpoint(k)?;
            let class = if stable[k] { SlotClass::Stable } else { SlotClass::Placed };
            keys.push((SlotKey { gap: stable_before_new[k], class, order: k }, k, true));
            if let Some(o) = new_to_old[k] {
                if !stable[k] {
                    let rank = rank_of_old[o];
                    keys.push((
                        SlotKey { gap: stable_before_rank[rank], class: SlotClass::Unplaced, order: rank },
                        k,
                        false,
                    ));
                }
            }
        }
        keys.sort_unstable_by_key(|(key, _, _)| *key);

        let mut final_slot = vec![0usize; self.new.len()];
        let mut pending_slot = vec![usize::MAX; self.new.len()];
        let mut present = Fenwick::new(keys.len());
        for (slot, (key, k, is_final)) in keys.iter().enumerate() {
            if *is_final {
                final_slot[*k] = slot;
            } else {
                pending_slot[*k] = slot;
            }
            if key.class != SlotClass::Placed {
                present.increment(slot);
            }
        }

        for k in 0..self.new.len() {
            self.checkpoint(k)?;
            if stable[k] {
                continue;
            }
            if new_to_old[k].is_some() {
                let from = present.count_before(pending_slot[k]);
                present.decrement(pending_slot[k]);
                let to = present.count_before(final_slot[k]);
                present.increment(final_slot[k]);
                if from != to {
                    self.script.push(EditOp::Move { from, to });
                }
            } else {
                let position = present.count_before(final_slot[k]);
                present.increment(final_slot[k]);
                self.script.push(EditOp::Insert { position, record: self.new[k].clone() });
            }
        }
        Ok(())
    }

    fn emit_updates(&mut self, new_to_old: &[Option<usize>]) -> Result<(), DiffAborted> {
        for (position, partner) in new_to_old.iter().enumerate() {
            self.checkpoint(position)?;
            if let Some(o) = partner {
                let record = &self.new[position];
                if !self.old[*o].same_content(record) {
                    self.script.push(EditOp::Update { position, record: record.clone() });
                }
            }
        }
        Ok(())
    }
}

/// Diff without cancellation.
pub fn diff<T: Reconcilable>(old: &[T], new: &[T]) -> EditScript<T> {
    // Without a token the engine has nothing that can abort it.
    DiffEngine::new(old, new).compute().unwrap_or_default()
}

fn consumed_mask(old_len: usize, new_to_old: &[Option<usize>]) -> Vec<bool> {
    let mut consumed = vec![false; old_len];
    for o in new_to_old.iter().flatten() {
        consumed[*o] = true;
    }
    consumed
}

/// `out[i]` = number of `true` entries in `flags[..i]`.
fn prefix_counts(flags: &[bool]) -> Vec<usize> {
    let mut out = Vec::with_capacity(flags.len() + 1);
    let mut running = 0;
    out.push(0);
    for flag in flags {
        if *flag {
            running += 1;
        }
        out.push(running);
    }
    out
}

/// Binary indexed tree over slot occupancy.
struct Fenwick {
    tree: Vec<isize>,
}

impl Fenwick {
    fn new(len: usize) -> Self {
        Fenwick { tree: vec![0; len + 1] }
    }

    fn add(&mut self, slot: usize, delta: isize) {
        let mut i = slot + 1;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    fn increment(&mut self, slot: usize) {
        self.add(slot, 1);
    }

    fn decrement(&mut self, slot: usize) {
        self.add(slot, -1);
    }

    /// Occupied slots strictly before `slot`.
    fn count_before(&self, slot: usize) -> usize {
        let mut i = slot;
        let mut sum = 0isize;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum.max(0) as usize
    }
}
