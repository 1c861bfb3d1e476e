use criterion::{
    black_box,
    criterion_group,
    criterion_main,
    Criterion,
    Throughput,
    BenchmarkId
};

use segalloc::Heap;

fn alloc_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc sizes");

    for size in [1, 8, 16, 64, 256, 1024, 4096, 16384].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut heap = Heap::new().unwrap();

            b.iter(|| unsafe {
                let ptr = heap.malloc(black_box(size));
                heap.free(ptr);
            });
        });
    }

    group.finish();
}

fn churn(c: &mut Criterion) {
    c.bench_function("churn", |b| {
        let mut heap = Heap::new().unwrap();
        let mut live = Vec::with_capacity(256);

        b.iter(|| unsafe {
            for i in 0..256usize {
                live.push(heap.malloc(black_box(i * 37 % 2000 + 1)));
            }

            // free every other block first so the rest must coalesce
            for ptr in live.iter().step_by(2) {
                heap.free(*ptr);
            }
            for ptr in live.iter().skip(1).step_by(2) {
                heap.free(*ptr);
            }

            live.clear();
        });
    });
}

fn realloc_growth(c: &mut Criterion) {
    c.bench_function("realloc growth", |b| {
        let mut heap = Heap::new().unwrap();

        b.iter(|| unsafe {
            let mut ptr = heap.malloc(8);

            for size in (16..4096).step_by(64) {
                ptr = heap.realloc(ptr, black_box(size));
            }

            heap.free(ptr);
        });
    });
}

criterion_group!(benches, alloc_sizes, churn, realloc_growth);
criterion_main!(benches);
