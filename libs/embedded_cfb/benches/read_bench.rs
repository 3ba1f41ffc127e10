use criterion::{Criterion, black_box, criterion_group, criterion_main};
use embedded_cfb::{MemoryCompound, SeekFrom, StreamCursor};

fn build() -> (MemoryCompound, embedded_cfb::StreamId, embedded_cfb::StreamId) {
    let mut compound = MemoryCompound::new(512);
    let small: Vec<u8> = (0..4000u32).map(|i| i as u8).collect();
    let large: Vec<u8> = (0..256 * 1024u32).map(|i| (i * 31) as u8).collect();
    let small = compound.add_stream(&small).unwrap();
    let large = compound.add_stream(&large).unwrap();
    (compound, small, large)
}

fn sequential(c: &mut Criterion) {
    let (compound, small, large) = build();
    c.bench_function("sequential regular 4k chunks", |b| {
        b.iter(|| {
            let mut cursor = compound.stream(large).unwrap();
            let mut buf = [0u8; 4096];
            while cursor.read(&mut buf).unwrap() > 0 {
                black_box(&buf);
            }
        })
    });
    c.bench_function("sequential mini u32", |b| {
        b.iter(|| {
            let mut cursor = compound.stream(small).unwrap();
            while let Ok(v) = cursor.read_u32() {
                black_box(v);
            }
        })
    });
}

fn random_seek(c: &mut Criterion) {
    let (compound, _, large) = build();
    let descriptor = compound.descriptor(large).unwrap();
    c.bench_function("random seek regular", |b| {
        let mut buffer = [0u8; 512];
        let mut cursor =
            StreamCursor::new_borrowed(compound.regular(), descriptor, &mut buffer).unwrap();
        let mut pos = 0u64;
        b.iter(|| {
            pos = pos
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407)
                % descriptor.len;
            let _ = cursor.seek(SeekFrom::Start(pos)).unwrap();
            black_box(cursor.read_u8().unwrap());
        })
    });
}

criterion_group!(benches, sequential, random_seek);
criterion_main!(benches);
