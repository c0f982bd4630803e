use criterion::{criterion_group, criterion_main, Criterion};
use hashchain_core::{Block, Chain, ChainConfig, Miner};

const PREV: &str = "00bf320576f8fbac3cc361cef8ea768952146adf673e4a2bf02f529bd5862b30";

fn bench_pow(c: &mut Criterion) {
    for difficulty in [2u32, 3] {
        c.bench_function(&format!("mine_block_difficulty_{difficulty}"), |b| {
            let miner = Miner::new(difficulty);
            let mut ts = 1_600_000_000_000u64;
            b.iter(|| {
                ts += 1;
                Block::mine_at(1, ts, "A pays B 10", PREV, &miner).unwrap()
            });
        });
        c.bench_function(&format!("mine_block_parallel_difficulty_{difficulty}"), |b| {
            let miner = Miner::new(difficulty).parallel(true);
            let mut ts = 1_600_000_000_000u64;
            b.iter(|| {
                ts += 1;
                Block::mine_at(1, ts, "A pays B 10", PREV, &miner).unwrap()
            });
        });
    }
}

fn bench_validate(c: &mut Criterion) {
    let mut chain = Chain::with_config(ChainConfig::default()).unwrap();
    for i in 0..32 {
        chain.add(format!("payload {i}")).unwrap();
    }
    c.bench_function("validate_stored_nonce_33_blocks", |b| {
        b.iter(|| chain.validate().unwrap())
    });
}

criterion_group!(benches, bench_pow, bench_validate);
criterion_main!(benches);
