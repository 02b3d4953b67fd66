use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{
    mine::{CancelToken, Miner},
    Block, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn sample_block() -> Block<Vec<Transaction>> {
    let mut rng = StdRng::seed_from_u64(42);
    let txs: Vec<Transaction> = (0..10)
        .map(|i| Transaction::new(format!("alice-{i}"), "bob", rng.gen_range(1..10)))
        .collect();
    let mut block = Block::new(None, "1600000000000", txs).expect("serializable payload");
    block.previous_digest = "0".into();
    block
}

fn bench_pow(c: &mut Criterion) {
    let block = sample_block();

    c.bench_function("mine_block_difficulty_3", |b| {
        let miner = Miner::new(3);
        b.iter(|| {
            let mut candidate = block.clone();
            miner.mine(&mut candidate, &CancelToken::new())
        });
    });

    c.bench_function("mine_block_difficulty_3_parallel", |b| {
        let miner = Miner::new(3).parallel(true);
        b.iter(|| {
            let mut candidate = block.clone();
            miner.mine(&mut candidate, &CancelToken::new())
        });
    });

    c.bench_function("compute_digest", |b| b.iter(|| block.compute_digest()));
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
