use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fidmark::detect::{detect_candidates, DetectorParams};
use fidmark::dict::Dictionary;
use fidmark::{DetectorSession, SessionParams};
use fidmark_bench::synthetic_frame;

fn bench_pipeline(c: &mut Criterion) {
    let dict = Arc::new(Dictionary::generate(250, 6, 9).expect("dictionary"));
    let frame = synthetic_frame(&dict, &[(7, 40, 40), (23, 320, 60), (101, 160, 280)]);
    let view = frame.view();

    c.bench_function("detect_candidates/640x480", |b| {
        let params = DetectorParams::default();
        b.iter(|| black_box(detect_candidates(&view, &params)))
    });

    c.bench_function("session_detect/640x480x3", |b| {
        let mut session = DetectorSession::new(dict.clone(), SessionParams::default());
        b.iter(|| black_box(session.detect(&view)))
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
