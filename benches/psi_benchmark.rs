use banded_okvs_psi::channel_utils::sync_channel::{create_unix_stream_pair, unix_track_channel};
use banded_okvs_psi::okvs::{HashSeed, OkvsMode, OkvsParams};
use banded_okvs_psi::parallel::{ParallelConfig, WorkerPool};
use banded_okvs_psi::psi::{PsiReceiver, PsiSender};
use banded_okvs_psi::set_utils::create_sets_with_common;
use banded_okvs_psi::vole::{AlszVoleReceiver, AlszVoleSender};
use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::{criterion_group, criterion_main, Bencher};
use scuttlebutt::AesRng;
use std::time::{Duration, Instant};

fn psi_routine(sender_set: Vec<u128>, receiver_set: &[u128], mode: OkvsMode) -> Duration {
    let mut rng = AesRng::new();
    let (s, r) = create_unix_stream_pair(None).unwrap();

    let handle = std::thread::spawn(move || {
        let mut rng = AesRng::new();
        let mut channel = unix_track_channel(s).unwrap();
        let pool = WorkerPool::new(&ParallelConfig::new(4)).unwrap();
        let mut sender = PsiSender::new(pool, AlszVoleSender::new());
        sender.send(&mut channel, &sender_set, &mut rng).unwrap();
    });

    let mut channel = unix_track_channel(r).unwrap();
    let params = OkvsParams::new(receiver_set.len(), 128, 1.2).unwrap();
    let pool = WorkerPool::new(&ParallelConfig::new(4)).unwrap();
    let mut receiver = PsiReceiver::new(
        params,
        mode,
        HashSeed::random(&mut rng),
        pool,
        AlszVoleReceiver::new(),
    )
    .unwrap();

    let start = Instant::now();
    let _res = receiver
        .receive(&mut channel, receiver_set, &mut rng)
        .unwrap();
    let elapsed = start.elapsed();
    handle.join().unwrap();
    elapsed
}

fn psi_unix_fn(mode: OkvsMode) -> impl FnMut(&mut Bencher<'_>, &usize) {
    move |b, &size| {
        b.iter_custom(|iter| {
            let mut rng = AesRng::new();
            let (_common, sender_set, receiver_set) =
                create_sets_with_common(size, size / 10, &mut rng).unwrap();
            let mut total_time = Duration::new(0, 0);

            for _ in 0..iter {
                total_time += psi_routine(sender_set.clone(), &receiver_set, mode);
            }

            total_time
        });
    }
}

fn bench_psi(c: &mut Criterion) {
    let min_e = 10;
    let max_e = 16;

    let mut group = c.benchmark_group("psi_time");
    for e in min_e..=max_e {
        let size: usize = 1 << e;
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("binary", size),
            &size,
            psi_unix_fn(OkvsMode::Binary),
        );
        group.bench_with_input(
            BenchmarkId::new("gf128", size),
            &size,
            psi_unix_fn(OkvsMode::Gf128),
        );
    }
    group.finish();
}

criterion_group!(
    name = psi_benches;
    config = Criterion::default().sample_size(10);
    targets = bench_psi
);
criterion_main!(psi_benches);

// cargo bench psi_time
