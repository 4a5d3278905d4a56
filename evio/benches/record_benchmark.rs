//! Record build / read benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use evio::format::bank_of_u32;
use evio::{ByteOrder, CompressionType, RecordInput, RecordOutput};

fn sample_events(count: usize, words: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let payload: Vec<u32> = (0..words as u32).map(|w| w ^ i as u32).collect();
            bank_of_u32((i % 100 + 1) as u16, i as u8, &payload, ByteOrder::Little)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let events = sample_events(500, 64);

    let mut group = c.benchmark_group("record_build");
    for compression in [
        CompressionType::None,
        CompressionType::Lz4,
        CompressionType::Gzip,
    ] {
        group.bench_function(format!("{compression:?}"), |b| {
            let mut record = RecordOutput::new(ByteOrder::Little, compression);
            b.iter(|| {
                record.reset();
                for ev in &events {
                    record.try_add_event(ev);
                }
                record.build().unwrap();
                black_box(record.as_bytes().len())
            });
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let events = sample_events(500, 64);

    let mut group = c.benchmark_group("record_read");
    for compression in [CompressionType::None, CompressionType::Lz4] {
        let mut record = RecordOutput::new(ByteOrder::Little, compression);
        for ev in &events {
            record.try_add_event(ev);
        }
        record.build().unwrap();
        let wire = record.as_bytes().to_vec();

        group.bench_function(format!("{compression:?}"), |b| {
            b.iter(|| {
                let rec = RecordInput::read_from_buffer(&wire, 0, ByteOrder::Little).unwrap();
                let mut total = 0usize;
                for i in 0..rec.entry_count() {
                    total += rec.event(i).unwrap().len();
                }
                black_box(total)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_read);
criterion_main!(benches);
