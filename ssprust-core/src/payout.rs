//! Denomination planning for payouts
//!
//! Finds a combination of stored notes that adds up exactly to a target
//! amount. Denominations are taken from the largest down, each as many
//! times as still allows an exact total, so the result is deterministic for
//! a given set of levels but not necessarily the fewest notes.

use std::collections::HashSet;
use std::fmt;

use ssprust_types::{ChannelInfo, PayoutRequest};

/// Denominations always present in a plan, in minor units
pub const REFERENCE_DENOMINATIONS: [u32; 6] = [20000, 10000, 5000, 2000, 1000, 500];

/// Count of notes to dispense per denomination value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenominationPlan {
    entries: Vec<(u32, u32)>,
    requests: Vec<PayoutRequest>,
}

impl DenominationPlan {
    fn new() -> Self {
        Self {
            entries: REFERENCE_DENOMINATIONS.iter().map(|&v| (v, 0)).collect(),
            requests: Vec::new(),
        }
    }

    fn add(&mut self, channel: &ChannelInfo, count: u32) {
        match self.entries.iter_mut().find(|(v, _)| *v == channel.value) {
            Some((_, c)) => *c += count,
            None => self.entries.push((channel.value, count)),
        }

        let count = count.min(u16::MAX as u32) as u16;
        match self
            .requests
            .iter_mut()
            .find(|r| r.value == channel.value && r.currency == channel.currency)
        {
            Some(request) => request.count = request.count.saturating_add(count),
            None => self.requests.push(PayoutRequest {
                count,
                value: channel.value,
                currency: channel.currency,
            }),
        }
    }

    /// Notes planned for `value`, over all currencies
    pub fn count(&self, value: u32) -> u32 {
        self.entries
            .iter()
            .find(|(v, _)| *v == value)
            .map_or(0, |(_, c)| *c)
    }

    /// All `(value, count)` pairs, including zero counts
    pub fn entries(&self) -> &[(u32, u32)] {
        &self.entries
    }

    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .map(|&(v, c)| v as u64 * c as u64)
            .sum()
    }

    pub fn note_count(&self) -> u32 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.note_count() == 0
    }

    /// Payout-by-denomination lines, one per value and currency drawn from
    pub fn requests(&self) -> &[PayoutRequest] {
        &self.requests
    }
}

impl fmt::Display for DenominationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .requests
            .iter()
            .map(|r| format!("{}x{} {}", r.count, r.value, r.currency))
            .collect();
        write!(f, "Plan[{}]", parts.join(", "))
    }
}

/// Bounded search over channels sorted by descending value
struct Search<'a> {
    values: &'a [u32],
    levels: &'a [u32],

    /// Value in stock from each index on
    stock: Vec<u64>,

    /// Greatest common divisor of the values from each index on
    step: Vec<u32>,

    failed: HashSet<(usize, u32)>,
}

impl<'a> Search<'a> {
    fn new(values: &'a [u32], levels: &'a [u32]) -> Self {
        let n = values.len();
        let mut stock = vec![0u64; n + 1];
        let mut step = vec![0u32; n + 1];
        for i in (0..n).rev() {
            stock[i] = stock[i + 1] + values[i] as u64 * levels[i] as u64;
            step[i] = gcd(step[i + 1], values[i]);
        }

        Self {
            values,
            levels,
            stock,
            step,
            failed: HashSet::new(),
        }
    }

    /// Notes used per index, or `None` if `remaining` cannot be paid from
    /// the channels at `index` and after
    fn run(&mut self, index: usize, remaining: u32) -> Option<Vec<u32>> {
        if remaining == 0 {
            return Some(vec![0; self.values.len()]);
        }
        if index == self.values.len()
            || remaining as u64 > self.stock[index]
            || remaining % self.step[index] != 0
            || self.failed.contains(&(index, remaining))
        {
            return None;
        }

        let value = self.values[index];
        let most = self.levels[index].min(remaining / value);
        for count in (0..=most).rev() {
            if let Some(mut used) = self.run(index + 1, remaining - count * value) {
                used[index] = count;
                return Some(used);
            }
        }

        self.failed.insert((index, remaining));
        None
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Plan an exact payout of `target` from the channel levels
///
/// Returns `None` when no combination of the stored notes adds up to
/// `target`. A zero target yields an empty plan.
///
/// # Examples
///
/// ```
/// use ssprust_core::payout::resolve;
/// use ssprust_types::{ChannelInfo, Currency};
///
/// let mut note = ChannelInfo::new(1, 500, Currency(*b"EUR"));
/// note.level = 3;
///
/// let plan = resolve(1000, &[note]).unwrap();
/// assert_eq!(plan.count(500), 2);
/// assert!(resolve(700, &[ChannelInfo::new(1, 500, Currency(*b"EUR"))]).is_none());
/// ```
pub fn resolve(target: u32, channels: &[ChannelInfo]) -> Option<DenominationPlan> {
    let mut usable: Vec<&ChannelInfo> = channels
        .iter()
        .filter(|c| c.value > 0 && c.level > 0)
        .collect();
    usable.sort_by(|a, b| b.value.cmp(&a.value));

    let values: Vec<u32> = usable.iter().map(|c| c.value).collect();
    let levels: Vec<u32> = usable.iter().map(|c| c.level).collect();

    let used = Search::new(&values, &levels).run(0, target)?;

    let mut plan = DenominationPlan::new();
    for (channel, count) in usable.into_iter().zip(used) {
        if count > 0 {
            plan.add(channel, count);
        }
    }
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use ssprust_types::Currency;

    fn channel(channel: u8, value: u32, level: u32) -> ChannelInfo {
        let mut info = ChannelInfo::new(channel, value, Currency(*b"EUR"));
        info.level = level;
        info
    }

    #[test]
    fn test_zero_target() {
        let plan = resolve(0, &[channel(1, 500, 2)]).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.entries().len(), REFERENCE_DENOMINATIONS.len());
    }

    #[test]
    fn test_unreachable() {
        let channels = [channel(1, 500, 1), channel(2, 2000, 1)];
        assert!(resolve(1000, &channels).is_none());
        assert!(resolve(300, &channels).is_none());
        assert!(resolve(100, &[]).is_none());
    }

    #[test]
    fn test_largest_first() {
        let channels = [channel(1, 500, 10), channel(2, 1000, 10), channel(3, 5000, 1)];
        let plan = resolve(6500, &channels).unwrap();

        assert_eq!(plan.count(5000), 1);
        assert_eq!(plan.count(1000), 1);
        assert_eq!(plan.count(500), 1);
        assert_eq!(plan.total(), 6500);
    }

    #[test]
    fn test_backtracks_past_greedy_dead_end() {
        // Greedy takes 5000 and is stuck at 1000 with only 2000s left
        let channels = [channel(1, 5000, 1), channel(2, 2000, 3)];
        let plan = resolve(6000, &channels).unwrap();

        assert_eq!(plan.count(5000), 0);
        assert_eq!(plan.count(2000), 3);
    }

    #[test]
    fn test_non_reference_denomination() {
        let plan = resolve(5000, &[channel(1, 2500, 2)]).unwrap();
        assert_eq!(plan.count(2500), 2);
        assert_eq!(plan.entries().len(), REFERENCE_DENOMINATIONS.len() + 1);
    }

    #[test]
    fn test_requests() {
        let channels = [channel(1, 500, 2), channel(2, 1000, 1)];
        let plan = resolve(2000, &channels).unwrap();

        assert_eq!(
            plan.requests(),
            &[
                PayoutRequest { count: 1, value: 1000, currency: Currency(*b"EUR") },
                PayoutRequest { count: 2, value: 500, currency: Currency(*b"EUR") },
            ]
        );
        assert_eq!(plan.to_string(), "Plan[1x1000 EUR, 2x500 EUR]");
    }

    #[test]
    fn test_requests_split_by_currency() {
        let mut pounds = channel(2, 1000, 1);
        pounds.currency = Currency(*b"GBP");
        let channels = [channel(1, 1000, 1), pounds];

        let plan = resolve(2000, &channels).unwrap();

        assert_eq!(plan.count(1000), 2);
        assert_eq!(
            plan.requests(),
            &[
                PayoutRequest { count: 1, value: 1000, currency: Currency(*b"EUR") },
                PayoutRequest { count: 1, value: 1000, currency: Currency(*b"GBP") },
            ]
        );
    }

    #[test]
    fn test_unreachable_amounts_fail_fast() {
        let full: Vec<ChannelInfo> = REFERENCE_DENOMINATIONS
            .iter()
            .enumerate()
            .map(|(i, &v)| channel(i as u8 + 1, v, 30))
            .collect();
        let no_fives: Vec<ChannelInfo> = full
            .iter()
            .filter(|c| c.value != 500)
            .cloned()
            .collect();
        let wide = [channel(1, 7000, 30), channel(2, 5000, 30), channel(3, 3000, 30)];

        let started = Instant::now();
        for target in [20_250, 40_250, 60_250, 100_250, 2_000_000] {
            assert!(resolve(target, &full).is_none());
        }
        assert!(resolve(599_500, &no_fives).is_none());
        for target in [1000, 2000, 4000] {
            assert!(resolve(target, &wide).is_none());
        }
        assert_eq!(resolve(1_154_500, &full).unwrap().total(), 1_154_500);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    /// Plain depth-first search without pruning, for comparison
    fn first_found(values: &[u32], levels: &mut [u32], remaining: u32) -> Option<Vec<u32>> {
        if remaining == 0 {
            return Some(vec![0; values.len()]);
        }
        for i in 0..values.len() {
            if levels[i] == 0 || values[i] > remaining {
                continue;
            }
            levels[i] -= 1;
            let found = first_found(values, levels, remaining - values[i]);
            levels[i] += 1;
            if let Some(mut used) = found {
                used[i] += 1;
                return Some(used);
            }
        }
        None
    }

    proptest! {
        #[test]
        fn plan_is_exact_and_within_levels(
            levels in prop::collection::vec(0u32..4, 4),
            target in (0u32..60).prop_map(|n| n * 500),
        ) {
            let values = [500, 1000, 2000, 5000];
            let channels: Vec<ChannelInfo> = values
                .iter()
                .zip(&levels)
                .enumerate()
                .map(|(i, (&v, &l))| channel(i as u8 + 1, v, l))
                .collect();

            if let Some(plan) = resolve(target, &channels) {
                prop_assert_eq!(plan.total(), target as u64);
                for ch in &channels {
                    prop_assert!(plan.count(ch.value) <= ch.level);
                }
            }
        }

        #[test]
        fn pruned_search_matches_plain_search(
            mut levels in prop::collection::vec(0u32..3, 4),
            target in (0u32..40).prop_map(|n| n * 500),
        ) {
            let values = [5000, 2500, 2000, 500];
            let channels: Vec<ChannelInfo> = values
                .iter()
                .zip(&levels)
                .enumerate()
                .map(|(i, (&v, &l))| channel(i as u8 + 1, v, l))
                .collect();

            let expected = first_found(&values, &mut levels, target);
            let plan = resolve(target, &channels);

            prop_assert_eq!(plan.is_some(), expected.is_some());
            if let (Some(plan), Some(used)) = (plan, expected) {
                for (value, count) in values.iter().zip(used) {
                    prop_assert_eq!(plan.count(*value), count);
                }
            }
        }
    }
}
