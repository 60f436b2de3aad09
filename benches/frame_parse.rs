use criterion::{Criterion, criterion_group, criterion_main};
use tagcraft::id3::Id3v2Tag;
use tagcraft::mpeg::{Mp3Frame, Mp3FrameHeader};

// V1, Layer III, 128 kbps, 44100 Hz, stereo.
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x04];

fn gen_frame() -> Vec<u8> {
    let mut data = FRAME_HEADER.to_vec();
    // Deterministic but non-trivial side info pattern
    for i in 0..32usize {
        data.push((i * 31 % 256) as u8);
    }
    data
}

fn gen_tag(frame_count: usize) -> Vec<u8> {
    let mut content = Vec::new();
    for i in 0..frame_count {
        let body = [0x00, b'v', b'0' + (i % 10) as u8, 0x00];
        content.extend_from_slice(b"TIT2");
        content.extend_from_slice(&(body.len() as u32).to_be_bytes());
        content.extend_from_slice(&[0, 0]);
        content.extend_from_slice(&body);
    }
    content.extend_from_slice(&[0u8; 64]); // padding

    let mut data = vec![b'I', b'D', b'3', 3, 0, 0];
    let mut size = content.len() as u32;
    let mut groups = [0u8; 4];
    for slot in groups.iter_mut().rev() {
        *slot = (size & 0x7f) as u8;
        size >>= 7;
    }
    data.extend_from_slice(&groups);
    data.extend_from_slice(&content);
    data
}

fn bench_frame_parse(c: &mut Criterion) {
    let frame = gen_frame();

    c.bench_function("parse_frame_header", |b| {
        b.iter(|| {
            let _ = Mp3FrameHeader::parse(&frame).unwrap();
        })
    });

    c.bench_function("parse_frame_with_side_info", |b| {
        b.iter(|| {
            let _ = Mp3Frame::parse(&frame).unwrap();
        })
    });
}

fn bench_tag_parse(c: &mut Criterion) {
    for &frame_count in &[1usize, 10, 100] {
        let tag = gen_tag(frame_count);

        c.bench_function(&format!("parse_tag_{}_frames", frame_count), |b| {
            b.iter(|| {
                let _ = Id3v2Tag::parse(&tag).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_frame_parse, bench_tag_parse);
criterion_main!(benches);
