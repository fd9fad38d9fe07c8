//! # RustKit Bench
//!
//! Input corpora and a quick timing harness for the sanitizer.
//!
//! The criterion benches in `benches/sanitize.rs` use the generators here;
//! [`Runner::run_all`] gives a rough table without criterion's statistics,
//! which is handy when comparing policies by hand.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rustkit_bench::Runner;
//!
//! let report = Runner::new().with_iterations(20).run_all();
//! report.print_summary();
//! report.save_json("target/sanitize-bench.json")?;
//! ```

use std::time::{Duration, Instant};

use rustkit_sanitize::{sanitize, Policy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Harness errors.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Timing of one input under one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub input_bytes: usize,
    pub iterations: u64,
    pub mean_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

impl Measurement {
    pub fn from_samples(name: impl Into<String>, input_bytes: usize, samples: &[Duration]) -> Self {
        let times: Vec<u64> = samples.iter().map(|d| d.as_nanos() as u64).collect();
        let iterations = times.len() as u64;
        let total: u64 = times.iter().sum();
        Self {
            name: name.into(),
            input_bytes,
            iterations,
            mean_ns: if iterations == 0 { 0 } else { total / iterations },
            min_ns: times.iter().copied().min().unwrap_or(0),
            max_ns: times.iter().copied().max().unwrap_or(0),
        }
    }

    /// Input bytes processed per second, based on the mean.
    pub fn bytes_per_sec(&self) -> f64 {
        if self.mean_ns == 0 {
            return 0.0;
        }
        self.input_bytes as f64 * 1_000_000_000.0 / self.mean_ns as f64
    }
}

fn format_duration(ns: u64) -> String {
    if ns >= 1_000_000_000 {
        format!("{:.2} s", ns as f64 / 1_000_000_000.0)
    } else if ns >= 1_000_000 {
        format!("{:.2} ms", ns as f64 / 1_000_000.0)
    } else if ns >= 1_000 {
        format!("{:.2} µs", ns as f64 / 1_000.0)
    } else {
        format!("{} ns", ns)
    }
}

fn format_rate(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= 1_048_576.0 {
        format!("{:.2} MiB/s", bytes_per_sec / 1_048_576.0)
    } else if bytes_per_sec >= 1_024.0 {
        format!("{:.2} KiB/s", bytes_per_sec / 1_024.0)
    } else {
        format!("{:.0} B/s", bytes_per_sec)
    }
}

/// All measurements from one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub measurements: Vec<Measurement>,
    pub total_time: Duration,
}

impl Report {
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!(
            "{:40} {:>10} {:>12} {:>14}",
            "Input", "Bytes", "Mean", "Throughput"
        );
        println!("{}", "-".repeat(80));
        for m in &self.measurements {
            println!(
                "{:40} {:>10} {:>12} {:>14}",
                m.name,
                m.input_bytes,
                format_duration(m.mean_ns),
                format_rate(m.bytes_per_sec())
            );
        }
        println!("{}", "-".repeat(80));
        println!("Total time: {:?}\n", self.total_time);
    }

    pub fn save_json(&self, path: &str) -> Result<(), BenchError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Simple warmup-then-measure loop.
pub struct Runner {
    pub warmup: u64,
    pub iterations: u64,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            warmup: 3,
            iterations: 50,
        }
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warmup(mut self, warmup: u64) -> Self {
        self.warmup = warmup;
        self
    }

    /// Time `sanitize(input, policy)`.
    pub fn measure(&self, name: &str, input: &str, policy: &Policy) -> Measurement {
        debug!(name, bytes = input.len(), iterations = self.iterations, "Measuring");
        for _ in 0..self.warmup {
            sanitize(input, policy);
        }
        let samples: Vec<Duration> = (0..self.iterations)
            .map(|_| {
                let start = Instant::now();
                sanitize(input, policy);
                start.elapsed()
            })
            .collect();
        Measurement::from_samples(name, input.len(), &samples)
    }

    /// Every corpus under the UGC policy, plus the thread under the other presets.
    pub fn run_all(&self) -> Report {
        let start = Instant::now();
        let ugc = Policy::ugc();
        let mut report = Report::default();

        for (name, input) in corpora() {
            report.measurements.push(self.measure(&format!("ugc/{}", name), &input, &ugc));
        }

        let thread = comment_thread(200);
        for (name, policy) in [
            ("social", Policy::social()),
            ("links_only", Policy::links_only()),
            ("text_only", Policy::text_only()),
        ] {
            report
                .measurements
                .push(self.measure(&format!("{}/comment_thread", name), &thread, &policy));
        }

        report.total_time = start.elapsed();
        report
    }
}

/// Named inputs used by both harnesses.
pub fn corpora() -> Vec<(&'static str, String)> {
    vec![
        ("comment_thread", comment_thread(200)),
        ("adversarial", adversarial(50)),
        ("nested_spans", nested_spans(10_000)),
        ("misnested_formatting", misnested_formatting(2_000)),
        ("removed_siblings", removed_siblings(20_000)),
    ]
}

/// Blog-style comments with links, lists and inline formatting.
pub fn comment_thread(comments: usize) -> String {
    let mut html = String::new();
    for i in 0..comments {
        html.push_str(&format!(
            "<div class=\"comment\" id=\"c{i}\"><p>Comment <b>{i}</b> by \
             <a href=\"https://example.com/u/{i}\" onclick=\"track({i})\">user{i}</a></p>\
             <ul><li>point <em>one</em><li>point two</ul>\
             <blockquote cite=\"https://example.com/q/{i}\">quoted &amp; escaped</blockquote></div>",
            i = i
        ));
    }
    html
}

/// Known XSS payloads, repeated.
pub fn adversarial(repeats: usize) -> String {
    const PAYLOADS: &[&str] = &[
        "<script>alert(1)</script>",
        "<img src=x onerror=alert(1)>",
        "<a href=\"java&#x09;script:alert(1)\">x</a>",
        "<svg><style><img src=x onerror=alert(1)></style></svg>",
        "<noscript><p title=\"</noscript><img src=x onerror=alert(1)>\"></noscript>",
        "<table><b>x<tr><td>y</table>",
        "<iframe srcdoc=\"&lt;script&gt;alert(1)&lt;/script&gt;\"></iframe>",
    ];
    PAYLOADS.concat().repeat(repeats)
}

/// `depth` unclosed spans around a word.
pub fn nested_spans(depth: usize) -> String {
    format!("{}deep", "<span>".repeat(depth))
}

/// Overlapping formatting elements that keep the adoption agency busy.
pub fn misnested_formatting(count: usize) -> String {
    "<b>1<i>2<a href=\"/x\">3</b>4</i>5</a>".repeat(count)
}

/// Long runs of siblings the UGC policy removes or unwraps.
pub fn removed_siblings(count: usize) -> String {
    "<!---->x<font>a</font>".repeat(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_from_samples() {
        let samples = vec![
            Duration::from_micros(100),
            Duration::from_micros(120),
            Duration::from_micros(90),
        ];
        let m = Measurement::from_samples("test", 1_000, &samples);
        assert_eq!(m.iterations, 3);
        assert_eq!(m.min_ns, 90_000);
        assert_eq!(m.max_ns, 120_000);
        assert!(m.bytes_per_sec() > 0.0);
    }

    #[test]
    fn test_empty_samples() {
        let m = Measurement::from_samples("empty", 10, &[]);
        assert_eq!(m.mean_ns, 0);
        assert_eq!(m.bytes_per_sec(), 0.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500), "500 ns");
        assert_eq!(format_duration(1_500), "1.50 µs");
        assert_eq!(format_duration(1_500_000), "1.50 ms");
    }

    #[test]
    fn test_corpora_sanitize_cleanly() {
        let policy = Policy::ugc();
        for (name, input) in corpora() {
            let output = sanitize(&input, &policy);
            assert!(!output.contains("<script"), "{}", name);
            assert!(!output.contains("onclick"), "{}", name);
        }
    }

    #[test]
    fn test_runner_measures() {
        let report = Runner::new().with_warmup(0).with_iterations(2).run_all();
        assert_eq!(report.measurements.len(), corpora().len() + 3);
        assert!(report.measurements.iter().all(|m| m.iterations == 2));
    }
}
