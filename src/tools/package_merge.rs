//! Length-limited Huffman code lengths by boundary package-merge.
//!
//! Given symbol frequencies and a depth limit L, this produces the unique
//! multiset of code lengths minimizing the total encoded bits subject to
//! every length <= L (Moffat, Katajainen, and Turpin's boundary variant of
//! the package-merge algorithm, 1995).
//!
//! Conceptually L lists are grown in parallel, each list holding chains in
//! non-decreasing weight order.  The next chain of list l is either the next
//! unused leaf or a package of the two lookahead chains of list l-1.  Only
//! the rightmost chain of each list is materialized; the lookahead weights
//! are carried as running sums, and the two expansions a package demands of
//! the list below are simulated with an explicit stack.  Chains live in a
//! fixed arena of `L*(L+1)/2 + 1` slots addressed by index, with an
//! intrusive free list threaded through the `count` field of freed slots.

use thiserror::Error;

/// largest depth limit in the design envelope
pub const MAX_LIMIT: usize = 32;

/// null chain reference
const NONE: u16 = u16::MAX;

#[derive(Error,Debug,PartialEq)]
pub enum Error {
    #[error("depth limit is outside the design envelope")]
    LimitTooLarge,
    #[error("depth limit cannot accommodate the alphabet")]
    LimitTooSmall,
    #[error("frequency set is empty")]
    EmptyFrequencies,
    #[error("frequencies must be strictly positive")]
    ZeroFrequency
}

/// Chain arena.  A live chain carries the number of leaves used so far in
/// its list (equivalently the index of the next unused frequency) and a
/// reference to a chain in the next-lower list.  A freed slot's `count`
/// field holds the next free slot instead.  `refs` counts the holders of a
/// chain: its list's rightmost slot plus every `tail` pointing at it;
/// dropping the last holder frees the chain and cascades down its tail.
struct ChainPool {
    count: Vec<u32>,
    tail: Vec<u16>,
    refs: Vec<u16>,
    free: u16
}

impl ChainPool {
    fn create(limit: usize) -> Self {
        let slots = limit * (limit + 1) / 2 + 1;
        let mut count = vec![0;slots];
        for i in 0..slots {
            count[i] = match i + 1 < slots {
                true => (i + 1) as u32,
                false => NONE as u32
            };
        }
        Self {
            count,
            tail: vec![NONE;slots],
            refs: vec![0;slots],
            free: 0
        }
    }
    fn count(&self,chain: u16) -> u32 {
        self.count[chain as usize]
    }
    fn tail(&self,chain: u16) -> u16 {
        self.tail[chain as usize]
    }
    fn alloc(&mut self,count: u32,tail: u16) -> u16 {
        let chain = self.free;
        assert!(chain != NONE,"chain pool exhausted");
        self.free = self.count[chain as usize] as u16;
        self.count[chain as usize] = count;
        self.tail[chain as usize] = tail;
        self.refs[chain as usize] = 1;
        if tail != NONE {
            self.refs[tail as usize] += 1;
        }
        chain
    }
    /// drop one holder of `chain`, freeing it and cascading down the
    /// tail links once nothing holds it
    fn release(&mut self,chain: u16) {
        let mut cur = chain;
        while cur != NONE {
            self.refs[cur as usize] -= 1;
            if self.refs[cur as usize] > 0 {
                break;
            }
            let next = self.tail[cur as usize];
            self.count[cur as usize] = self.free as u32;
            self.free = cur;
            cur = next;
        }
    }
}

/// Run the boundary algorithm and return the active leaf counts, where
/// `active[l]` is the number of leaves in list `l+1`.  The caller has
/// validated the inputs and `n >= 2`.
fn active_leaves(freqs: &[u32],limit: usize) -> Vec<u32> {
    let n = freqs.len();
    let mut pool = ChainPool::create(limit);
    let mut lists: Vec<u16> = Vec::with_capacity(limit);
    let mut weights: Vec<u64> = Vec::with_capacity(limit);
    let first_package = freqs[0] as u64 + freqs[1] as u64;
    for _l in 0..limit {
        lists.push(pool.alloc(2,NONE));
        weights.push(first_package);
    }
    // the materialized chain is the second of its list; the terminal list
    // is complete when it conceptually holds 2n-2 chains
    let mut chains_in_last: usize = 2;
    let target = 2 * n - 2;
    let mut stack: Vec<usize> = Vec::with_capacity(2 * limit);
    let mut current = limit - 1;
    while chains_in_last < target {
        let cur_chain = lists[current];
        let cur_count = pool.count(cur_chain) as usize;
        let leaf_weight = match cur_count < n {
            true => Some(freqs[cur_count] as u64),
            false => None
        };
        let s = match current > 0 {
            true => weights[current-1],
            false => 0
        };
        let appended = match leaf_weight {
            // step 3a: take the next leaf
            Some(w) if current == 0 || s > w => {
                weights[current] += w;
                pool.alloc(cur_count as u32 + 1,pool.tail(cur_chain))
            },
            // step 3b: package the two lookahead chains of the list below
            _ => {
                debug_assert!(current > 0,"list 0 ran out of leaves");
                weights[current] += s;
                weights[current-1] = 0;
                stack.push(current-1);
                stack.push(current-1);
                pool.alloc(cur_count as u32,lists[current-1])
            }
        };
        let old = lists[current];
        lists[current] = appended;
        pool.release(old);
        if current == limit - 1 {
            chains_in_last += 1;
        }
        current = match stack.pop() {
            Some(l) => l,
            None => limit - 1
        };
    }
    // the k-th chain from the top of the terminal list carries a[limit-k];
    // lists below the end of the walk hold no leaves
    let mut active = vec![0;limit];
    let mut l = limit;
    let mut cur = lists[limit-1];
    while cur != NONE {
        l -= 1;
        active[l] = pool.count(cur);
        cur = pool.tail(cur);
    }
    active
}

fn validate(freqs: &[u32],limit: usize) -> Result<(),Error> {
    if freqs.is_empty() {
        return Err(Error::EmptyFrequencies);
    }
    if limit > MAX_LIMIT {
        return Err(Error::LimitTooLarge);
    }
    if limit == 0 || (1u64 << limit) < freqs.len() as u64 {
        return Err(Error::LimitTooSmall);
    }
    if freqs.iter().any(|f| *f == 0) {
        return Err(Error::ZeroFrequency);
    }
    debug_assert!(freqs.windows(2).all(|w| w[0] <= w[1]),"frequencies must be sorted ascending");
    Ok(())
}

/// Compute optimal code lengths for `freqs`, none exceeding `limit`.
/// `freqs` must be strictly positive and sorted ascending; the answer is
/// aligned with it, so `lengths[i]` belongs to `freqs[i]`.
pub fn package_merge(freqs: &[u32],limit: usize) -> Result<Vec<u32>,Error> {
    validate(freqs,limit)?;
    let n = freqs.len();
    if n == 1 {
        // a lone symbol still needs one bit on the wire
        return Ok(vec![1]);
    }
    let active = active_leaves(freqs,limit);
    let mut lengths = vec![0;n];
    let mut sym: usize = 0;
    for l in 0..limit {
        while (sym as u32) < active[l] {
            lengths[sym] = (limit - l) as u32;
            sym += 1;
        }
    }
    debug_assert_eq!(sym,n,"every symbol must receive a length");
    Ok(lengths)
}

/// Compute optimal code lengths for frequencies in any order, zeros
/// allowed.  Zero-frequency symbols receive length 0; the rest are sorted
/// internally (ties broken by original position) and the answer is
/// restored to the input order.
pub fn package_merge_any(freqs: &[u32],limit: usize) -> Result<Vec<u32>,Error> {
    let mut order: Vec<usize> = (0..freqs.len()).filter(|i| freqs[*i] > 0).collect();
    order.sort_by(|a,b| freqs[*a].cmp(&freqs[*b]).then(a.cmp(b)));
    let sorted: Vec<u32> = order.iter().map(|i| freqs[*i]).collect();
    let sub = package_merge(&sorted,limit)?;
    let mut lengths = vec![0;freqs.len()];
    for (k,i) in order.iter().enumerate() {
        lengths[*i] = sub[k];
    }
    Ok(lengths)
}

// *************** TESTS *****************

#[cfg(test)]
mod tests {
    use super::*;

    /// the frequency set used throughout the Moffat-Katajainen-Turpin paper
    const PAPER: [u32;6] = [1,1,5,7,10,14];

    fn kraft_sum(lengths: &[u32],limit: u32) -> u64 {
        lengths.iter().filter(|l| **l > 0).map(|l| 1u64 << (limit - l)).sum()
    }

    fn weighted_cost(freqs: &[u32],lengths: &[u32]) -> u64 {
        freqs.iter().zip(lengths).map(|(f,l)| *f as u64 * *l as u64).sum()
    }

    /// total cost of an optimal unbounded-depth code, by the two-queue
    /// method: the cost equals the sum of all internal node weights
    fn huffman_cost(sorted_freqs: &[u32]) -> u64 {
        use std::collections::VecDeque;
        fn take(leaves: &mut VecDeque<u64>,merged: &mut VecDeque<u64>) -> u64 {
            let from_merged = match (leaves.front(),merged.front()) {
                (Some(a),Some(b)) => b < a,
                (Some(_),None) => false,
                _ => true
            };
            match from_merged {
                true => merged.pop_front().unwrap(),
                false => leaves.pop_front().unwrap()
            }
        }
        let mut leaves: VecDeque<u64> = sorted_freqs.iter().map(|f| *f as u64).collect();
        let mut merged: VecDeque<u64> = VecDeque::new();
        let mut cost: u64 = 0;
        while leaves.len() + merged.len() > 1 {
            let package = take(&mut leaves,&mut merged) + take(&mut leaves,&mut merged);
            cost += package;
            merged.push_back(package);
        }
        cost
    }

    #[test]
    fn paper_limit_3() {
        assert_eq!(active_leaves(&PAPER,3),vec![4,6,6]);
        assert_eq!(package_merge(&PAPER,3).unwrap(),vec![3,3,3,3,2,2]);
    }

    #[test]
    fn paper_limit_4() {
        assert_eq!(active_leaves(&PAPER,4),vec![2,3,6,6]);
        assert_eq!(package_merge(&PAPER,4).unwrap(),vec![4,4,3,2,2,2]);
    }

    #[test]
    fn paper_limit_7() {
        assert_eq!(package_merge(&PAPER,7).unwrap(),vec![5,5,4,3,2,1]);
    }

    #[test]
    fn kraft_equality_holds() {
        for limit in 3..=8 {
            let lengths = package_merge(&PAPER,limit).unwrap();
            assert_eq!(kraft_sum(&lengths,limit as u32),1u64 << limit);
        }
    }

    #[test]
    fn fibonacci_stress() {
        // 42 Fibonacci frequencies force maximal depth skew
        let mut freqs: Vec<u32> = vec![1,1];
        for i in 2..42 {
            let next = freqs[i-1] + freqs[i-2];
            freqs.push(next);
        }
        let lengths = package_merge(&freqs,32).unwrap();
        assert!(lengths.iter().all(|l| *l >= 1 && *l <= 32));
        assert_eq!(kraft_sum(&lengths,32),1u64 << 32);
    }

    #[test]
    fn zero_frequencies_preserved() {
        let freqs = [0,0,0,0,0,1,1,5,7,10,14];
        let lengths = package_merge_any(&freqs,4).unwrap();
        assert_eq!(lengths,vec![0,0,0,0,0,4,4,3,2,2,2]);
    }

    #[test]
    fn unsorted_input_restored() {
        let freqs = [10,1,0,14,5,7,0,1];
        let lengths = package_merge_any(&freqs,4).unwrap();
        assert_eq!(lengths,vec![2,4,0,2,3,2,0,4]);
    }

    #[test]
    fn tiny_alphabets() {
        assert_eq!(package_merge(&[42],8).unwrap(),vec![1]);
        assert_eq!(package_merge(&[3,9],8).unwrap(),vec![1,1]);
        assert_eq!(package_merge(&[1,1,1],2).unwrap(),vec![2,2,1]);
    }

    #[test]
    fn saturated_tree() {
        // 2^L symbols at limit L can only form the complete balanced code
        let freqs = vec![1;256];
        let lengths = package_merge(&freqs,8).unwrap();
        assert!(lengths.iter().all(|l| *l == 8));
    }

    #[test]
    fn matches_unbounded_optimum() {
        // a generous limit cannot beat or lose to plain Huffman
        for freqs in [PAPER.to_vec(),vec![1,2,4,8,16,32,64],vec![5,9,12,13,16,45],vec![1;31]] {
            let lengths = package_merge(&freqs,32).unwrap();
            assert_eq!(weighted_cost(&freqs,&lengths),huffman_cost(&freqs));
        }
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(package_merge(&[],8),Err(Error::EmptyFrequencies));
        assert_eq!(package_merge(&[1,1,1,1,1],2),Err(Error::LimitTooSmall));
        assert_eq!(package_merge(&[1,2],0),Err(Error::LimitTooSmall));
        assert_eq!(package_merge(&[1,2],33),Err(Error::LimitTooLarge));
        assert_eq!(package_merge(&[0,3,5],8),Err(Error::ZeroFrequency));
        assert_eq!(package_merge_any(&[0,0],8),Err(Error::EmptyFrequencies));
    }
}
