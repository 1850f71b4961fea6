use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use logship::buffer::{BatchBuffer, BufferConfig};
use logship::sender::encode_batch;
use logship::{Batch, FlushTrigger, Record};
use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;

fn sample_record(id: usize) -> Record {
    let mut record = Record::new();
    record.insert(
        "message",
        format!("GET /api/v1/frames completed in 12ms (request {id})"),
    );
    record.insert("level", "info");
    record.insert("timestamp", "2025-01-01T00:00:00.000Z");
    record.insert("service", "checkout");
    record.insert("request_id", format!("req-{id}"));
    record.insert("status", 200);
    record
}

fn unbounded_buffer() -> BatchBuffer {
    BatchBuffer::new(BufferConfig {
        high_water_records: usize::MAX,
        high_water_bytes: usize::MAX,
    })
}

fn bench_single_threaded_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_threaded_append");

    for &size in [1000, 10000, 100000].iter() {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let buffer = unbounded_buffer();
                for id in 0..size {
                    buffer.append(black_box(sample_record(id)));
                }
                buffer
            });
        });
    }
    group.finish();
}

fn bench_append_drain_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_drain_cycle");

    for &size in [1000, 10000, 100000].iter() {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let buffer = unbounded_buffer();
                for id in 0..size {
                    buffer.append(sample_record(id));
                }
                black_box(buffer.drain(FlushTrigger::Interval))
            });
        });
    }
    group.finish();
}

fn bench_concurrent_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_append");
    let threads = 4;

    for &size in [8192, 65536].iter() {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let buffer = Arc::new(unbounded_buffer());
                let barrier = Arc::new(Barrier::new(threads));
                let per_thread = size / threads;

                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let buffer = Arc::clone(&buffer);
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            for id in 0..per_thread {
                                buffer.append(black_box(sample_record(id)));
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().expect("append thread panicked");
                }
                black_box(buffer.drain(FlushTrigger::HighWater))
            });
        });
    }
    group.finish();
}

fn bench_payload_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_encoding");

    for &size in [100, 1000, 10000].iter() {
        let batch = Batch::new((0..size).map(sample_record).collect(), FlushTrigger::Manual);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &batch, |b, batch| {
            b.iter(|| black_box(encode_batch(batch).expect("encoding failed in benchmark")));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_threaded_append,
    bench_append_drain_cycle,
    bench_concurrent_append,
    bench_payload_encoding
);
criterion_main!(benches);
