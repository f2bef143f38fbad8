use chrono::Duration;

use crate::{AccumulationZone, Price};

/// Padding applied to each price range before testing overlap, as a share
/// of the combined range.
const PRICE_BUFFER: Price = Price::from_parts(1, 0, 0, false, 1);

/// Merges time-adjacent zones with overlapping prices until no pair in
/// start order merges any more.
///
/// Running it again on its own output is a no-op.
pub(crate) fn merge_zones(
    mut zones: Vec<AccumulationZone>,
    min_gap_minutes: u32,
) -> Vec<AccumulationZone> {
    let max_gap = Duration::minutes(i64::from(min_gap_minutes));

    loop {
        zones.sort_by_key(|z| (z.start_time, z.end_time));

        let before = zones.len();
        let mut merged: Vec<AccumulationZone> = Vec::with_capacity(before);
        for zone in zones {
            match merged.last_mut() {
                Some(last) if mergeable(last, &zone, max_gap) => absorb(last, zone),
                _ => merged.push(zone),
            }
        }

        if merged.len() == before {
            return merged;
        }
        zones = merged;
    }
}

/// `b` starts no earlier than `a`.
fn mergeable(a: &AccumulationZone, b: &AccumulationZone, max_gap: Duration) -> bool {
    let adjacent = b.start_time <= a.end_time || b.start_time - a.end_time <= max_gap;
    if !adjacent {
        return false;
    }

    let combined = a.high_price.max(b.high_price) - a.low_price.min(b.low_price);
    let pad = combined * PRICE_BUFFER;

    a.low_price - pad <= b.high_price + pad && b.low_price - pad <= a.high_price + pad
}

fn absorb(into: &mut AccumulationZone, other: AccumulationZone) {
    let shared = (into.end_index.min(other.end_index) + 1)
        .saturating_sub(into.start_index.max(other.start_index));

    into.candle_count = into.candle_count + other.candle_count - shared.min(other.candle_count);
    into.start_time = into.start_time.min(other.start_time);
    into.end_time = into.end_time.max(other.end_time);
    into.start_index = into.start_index.min(other.start_index);
    into.end_index = into.end_index.max(other.end_index);
    into.high_price = into.high_price.max(other.high_price);
    into.low_price = into.low_price.min(other.low_price);

    if other.strength > into.strength {
        into.strength = other.strength;
        into.wyckoff = other.wyckoff;
    }

    into.liquidity_sweeps.extend(other.liquidity_sweeps);
    into.liquidity_sweeps.sort_by_key(|s| s.start_time);
    into.liquidity_sweeps.dedup();
}
