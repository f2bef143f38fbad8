#[path = "../tests/fixtures/mod.rs"]
mod fixtures;

use crate::fixtures::synthetic_candles;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use market_structure_ta::{
    DetectionMode, IndicatorSettings, IndicatorSettingsBuilder, Liquidity, LiquiditySettings,
    PivotMethod, Trend, TrendSettings, WyckoffSettings,
};
use rust_decimal_macros::dec;
use std::{hint::black_box, time::Duration};

const SIZES: [usize; 2] = [500, 2_000];

fn liquidity(mode: DetectionMode, wyckoff: bool) -> LiquiditySettings {
    LiquiditySettings::builder()
        .min_candles_in_zone(20)
        .max_range_percent(dec!(1.5))
        .min_strength(0.2)
        .min_boundary_touches(2)
        .mode(mode)
        .wyckoff(wyckoff.then(WyckoffSettings::default))
        .build()
        .expect("valid settings")
}

fn trend_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("trend");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(8));

    for n in SIZES {
        let candles = synthetic_candles(n);
        group.throughput(Throughput::Elements(n as u64));

        for (name, method) in [("lookback", PivotMethod::Lookback), ("zigzag", PivotMethod::ZigZag)] {
            let settings = TrendSettings::builder()
                .pivot_method(method)
                .build()
                .expect("valid settings");
            group.bench_function(format!("{name}/{n}"), |b| {
                b.iter_batched(
                    || Trend::new(settings),
                    |mut trend| black_box(trend.analyze(&candles)),
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

fn liquidity_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("liquidity");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for n in SIZES {
        let candles = synthetic_candles(n);
        group.throughput(Throughput::Elements(n as u64));

        let cases = [
            ("seed", liquidity(DetectionMode::SeedAndGrow, false)),
            ("seed_wyckoff", liquidity(DetectionMode::SeedAndGrow, true)),
            ("sliding", liquidity(DetectionMode::SlidingWindow, false)),
        ];
        for (name, settings) in cases {
            group.bench_function(format!("{name}/{n}"), |b| {
                b.iter_batched(
                    || Liquidity::new(settings),
                    |mut engine| black_box(engine.analyze(&candles)),
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(benches, trend_benchmarks, liquidity_benchmarks);
criterion_main!(benches);
