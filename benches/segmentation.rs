use clinscribe::audio::{self, AudioAsset};
use clinscribe::{MockProvider, Pipeline, PipelineConfig, TranscriptionOptions};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

const MIB: usize = 1024 * 1024;

/// 16 kHz mono 16-bit WAV of exactly `total_len` bytes.
fn wav_of_len(total_len: usize) -> Vec<u8> {
    let data_len = (total_len - 44) as u32;
    let mut bytes = Vec::with_capacity(total_len);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&16000u32.to_le_bytes());
    bytes.extend_from_slice(&32000u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.resize(total_len, 0);
    bytes
}

/// 128 kbps, 44.1 kHz Layer III stream of roughly `total_len` bytes.
fn mp3_of_len(total_len: usize) -> Vec<u8> {
    let frames = total_len / 417;
    let mut data = Vec::with_capacity(frames * 417);
    for i in 0..frames {
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        data.extend(std::iter::repeat_n((i % 251) as u8 & 0x7F, 413));
    }
    data
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");
    group.sample_size(20);

    for size_mb in [40usize, 100] {
        let size = size_mb * MIB;
        group.throughput(Throughput::Bytes(size as u64));

        let wav = AudioAsset::new(wav_of_len(size), "audio/wav");
        group.bench_with_input(BenchmarkId::new("wav", size_mb), &wav, |b, asset| {
            b.iter(|| audio::split(black_box(asset), 25 * MIB as u64))
        });

        let mp3 = AudioAsset::new(mp3_of_len(size), "audio/mpeg");
        group.bench_with_input(BenchmarkId::new("mp3", size_mb), &mp3, |b, asset| {
            b.iter(|| audio::split(black_box(asset), 25 * MIB as u64))
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        eprintln!("Skipping pipeline benchmark: cannot start tokio runtime");
        return;
    };

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(20));

    let asset = AudioAsset::new(wav_of_len(40 * MIB), "audio/wav");
    let options = TranscriptionOptions::default();
    for concurrency in [1usize, 4] {
        let config = PipelineConfig {
            concurrency,
            max_segment_bytes: 4 * MIB as u64,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config, Arc::new(MockProvider::new()));
        group.bench_with_input(
            BenchmarkId::new("mock_40mb", concurrency),
            &pipeline,
            |b, pipeline| b.iter(|| runtime.block_on(pipeline.run(&asset, &options))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_split, bench_pipeline);
criterion_main!(benches);
