// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::address_::Address;

/// Wraps at 2^53 - 1 (the largest integer a double-precision float can
/// represent exactly) rather than at `u64::MAX`, matching the reference
/// client's round-robin counter so behavior is identical across ports.
const ROUND_ROBIN_WRAP: u64 = (1u64 << 53) - 1;

/// Per-role round-robin cursor feeding the least-connected tiebreak.
#[derive(Debug, Default)]
pub(crate) struct RoundRobinIndex(AtomicU64);

impl RoundRobinIndex {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    fn next(&self) -> u64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = if current >= ROUND_ROBIN_WRAP {
                0
            } else {
                current + 1
            };
            match self.0.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(observed) => current = observed,
            }
        }
    }
}

/// Orders `addresses` by ascending in-use connection count, walking the list
/// once starting at a rotated index so repeated calls fan load out across
/// equally-loaded servers instead of always favoring the first entry.
///
/// Ties are broken by earliest-visited-in-rotated-order: the walk keeps the
/// first address it sees at the current minimum, so a strict `<` comparison
/// during a single left-to-right pass realizes the tiebreak without a
/// separate pass. Returns an empty vector iff `addresses` is empty.
pub(crate) fn least_connected(
    addresses: &[Arc<Address>],
    usage: impl Fn(&Address) -> usize,
    index: &RoundRobinIndex,
) -> Vec<Arc<Address>> {
    let n = addresses.len();
    if n == 0 {
        return Vec::new();
    }
    let start = (index.next() % n as u64) as usize;
    let rotated = (0..n).map(|i| &addresses[(start + i) % n]);

    let mut ordered: Vec<(usize, &Arc<Address>)> = rotated.map(|a| (usage(a), a)).collect();
    // `sort_by_key` is stable: entries with equal usage retain the order
    // they were pushed in, i.e. the rotated visiting order.
    ordered.sort_by_key(|(count, _)| *count);
    ordered.into_iter().map(|(_, a)| Arc::clone(a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn addrs(names: &[&str]) -> Vec<Arc<Address>> {
        names.iter().map(|n| Arc::new(Address::from(*n))).collect()
    }

    #[test]
    fn empty_list_yields_empty_result() {
        let index = RoundRobinIndex::new();
        let result = least_connected(&[], |_| 0, &index);
        assert!(result.is_empty());
    }

    #[test]
    fn picks_least_loaded_first() {
        let list = addrs(&["a:1", "b:1", "c:1"]);
        let usage: HashMap<&str, usize> =
            HashMap::from([("a:1", 3), ("b:1", 0), ("c:1", 1)]);
        let index = RoundRobinIndex::new();
        let ordered = least_connected(&list, |a| usage[a.host()], &index);
        assert_eq!(ordered[0].host(), "b:1");
    }

    #[test]
    fn rotates_start_on_successive_calls_with_equal_usage() {
        let list = addrs(&["a:1", "b:1", "c:1"]);
        let index = RoundRobinIndex::new();
        let first = least_connected(&list, |_| 0, &index);
        let second = least_connected(&list, |_| 0, &index);
        let third = least_connected(&list, |_| 0, &index);
        // with all usages tied, the winner is whichever address the rotated
        // walk visits first, which advances by one each call.
        assert_eq!(first[0].host(), "a:1");
        assert_eq!(second[0].host(), "b:1");
        assert_eq!(third[0].host(), "c:1");
    }

    #[test]
    fn round_robin_index_wraps() {
        let index = RoundRobinIndex(AtomicU64::new(ROUND_ROBIN_WRAP));
        assert_eq!(index.next(), ROUND_ROBIN_WRAP);
        assert_eq!(index.next(), 0);
    }
}
