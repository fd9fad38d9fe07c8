//! RustKit sanitizer benchmarks
//!
//! Run with: cargo bench -p rustkit-bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rustkit_bench::{comment_thread, corpora, nested_spans};
use rustkit_html::{parse_fragment, tokenize, ParseOptions};
use rustkit_sanitize::{sanitize, Policy};

fn parsing_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");

    for (name, input) in corpora() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("tokenize", name), &input, |b, html| {
            b.iter(|| tokenize(html))
        });
        group.bench_with_input(BenchmarkId::new("tree", name), &input, |b, html| {
            b.iter(|| parse_fragment(html, ParseOptions::default()))
        });
    }

    group.finish();
}

fn sanitize_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");
    let policy = Policy::ugc();

    for (name, input) in corpora() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("ugc", name), &input, |b, html| {
            b.iter(|| sanitize(html, &policy))
        });
    }

    group.finish();
}

fn policy_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy");
    let thread = comment_thread(200);
    group.throughput(Throughput::Bytes(thread.len() as u64));

    for (name, policy) in [
        ("ugc", Policy::ugc()),
        ("basic_with_images", Policy::basic_with_images()),
        ("social", Policy::social()),
        ("oembed", Policy::oembed()),
        ("links_only", Policy::links_only()),
        ("text_only", Policy::text_only()),
    ] {
        group.bench_with_input(BenchmarkId::new("comment_thread", name), &thread, |b, html| {
            b.iter(|| sanitize(html, &policy))
        });
    }

    group.finish();
}

fn depth_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("depth");
    let policy = Policy::ugc();

    for depth in [100, 1_000, 100_000] {
        let input = nested_spans(depth);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("nested_spans", depth), &input, |b, html| {
            b.iter(|| sanitize(html, &policy))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    parsing_benchmarks,
    sanitize_benchmarks,
    policy_benchmarks,
    depth_benchmarks,
);

criterion_main!(benches);
