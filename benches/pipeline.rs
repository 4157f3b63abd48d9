use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chatrelay_rs::stream::{decode_frame, Delta, FrameBatch, FrameSplitter, StreamEvent};

fn content_frame(content_len: usize) -> String {
    let prefix = r#"data: {"choices":[{"delta":{"content":""#;
    let suffix = r#""}}]}"#;
    let mut frame = String::with_capacity(prefix.len() + content_len + suffix.len());
    frame.push_str(prefix);
    frame.extend(std::iter::repeat('a').take(content_len));
    frame.push_str(suffix);
    frame
}

fn stream_body(frame_count: usize, content_len: usize) -> Vec<u8> {
    let mut body = String::new();
    for _ in 0..frame_count {
        body.push_str(&content_frame(content_len));
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

fn bench_splitter(c: &mut Criterion) {
    let body = stream_body(256, 64);

    for chunk_size in [256usize, 4096] {
        let chunks: Vec<&[u8]> = body.chunks(chunk_size).collect();
        c.bench_function(&format!("sse_split_256_frames_chunks_{chunk_size}"), |b| {
            b.iter(|| {
                let mut splitter = FrameSplitter::new();
                let mut batch = FrameBatch::new();
                let mut frames = 0usize;
                for chunk in &chunks {
                    splitter.feed_into(black_box(chunk), &mut batch);
                    frames += batch.len();
                    batch.clear();
                }
                black_box(frames)
            });
        });
    }
}

fn bench_decoder(c: &mut Criterion) {
    let content = content_frame(64);
    let reasoning =
        r#"data: {"choices":[{"delta":{"reasoning_content":"thinking about the answer"}}]}"#;
    let done = "data: [DONE]";
    let malformed = "data: {\"choices\":[{\"delta\":";

    c.bench_function("delta_decode_content_64", |b| {
        b.iter(|| black_box(decode_frame(black_box(&content))));
    });
    c.bench_function("delta_decode_reasoning", |b| {
        b.iter(|| black_box(decode_frame(black_box(reasoning))));
    });
    c.bench_function("delta_decode_done_sentinel", |b| {
        b.iter(|| black_box(decode_frame(black_box(done))));
    });
    c.bench_function("delta_decode_malformed_skip", |b| {
        b.iter(|| black_box(decode_frame(black_box(malformed))));
    });
}

fn bench_event_encode(c: &mut Criterion) {
    let plain = StreamEvent::ContentDelta("a".repeat(64));
    let escaped = StreamEvent::ContentDelta("line one\nline \"two\"\t".repeat(4));

    c.bench_function("event_encode_content_64_plain", |b| {
        b.iter(|| black_box(black_box(&plain).encode_sse()));
    });
    c.bench_function("event_encode_content_escaped", |b| {
        b.iter(|| black_box(black_box(&escaped).encode_sse()));
    });
}

fn bench_split_decode_encode(c: &mut Criterion) {
    let body = stream_body(256, 64);
    let chunks: Vec<&[u8]> = body.chunks(1024).collect();

    c.bench_function("pipeline_relay_256_frames_1k_chunks", |b| {
        b.iter(|| {
            let mut splitter = FrameSplitter::new();
            let mut batch = FrameBatch::new();
            let mut bytes_out = 0usize;
            for chunk in &chunks {
                splitter.feed_into(black_box(chunk), &mut batch);
                for frame in batch.drain(..) {
                    for delta in decode_frame(&frame) {
                        let event = match delta {
                            Delta::Content(text) => StreamEvent::ContentDelta(text),
                            Delta::Reasoning(text) => StreamEvent::ReasoningDelta(text),
                            Delta::UpstreamError(message) => StreamEvent::Error { message },
                            Delta::Done => StreamEvent::Done,
                        };
                        bytes_out += event.encode_sse().len();
                    }
                }
            }
            black_box(bytes_out)
        });
    });
}

criterion_group!(
    benches,
    bench_splitter,
    bench_decoder,
    bench_event_encode,
    bench_split_decode_encode
);
criterion_main!(benches);
