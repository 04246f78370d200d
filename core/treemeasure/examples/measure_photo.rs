//! Measure the tree in a photo file.
//!
//! Usage:
//!   cargo run --example measure_photo -- <image> [focal_length_mm] [margin|containment]
//!
//! Set `RUST_LOG=debug` to trace the pipeline stages.

use treemeasure::{FocalLengthRaw, TreeMeasurer, ValidationPolicy};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: measure_photo <image> [focal_length_mm] [margin|containment]");
        std::process::exit(2);
    };
    let focal = args.next().map(FocalLengthRaw::Text);
    let policy = match args.next().as_deref() {
        Some("containment") => ValidationPolicy::Containment,
        _ => ValidationPolicy::margin(),
    };

    let input = std::fs::read(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"));
    let mut measurer = TreeMeasurer::new(input)
        .unwrap_or_else(|e| panic!("failed to load {path}: {e}"))
        .validation(policy);
    if let Some(focal) = focal {
        measurer = measurer.focal_length(focal);
    }

    let (width, height) = measurer.dimensions();
    println!("=== {path} ({width}x{height}) ===");

    match measurer.measure() {
        Ok(m) => {
            let (x0, y0, x1, y1) = m.bounding_box.corners();
            println!("  bbox: ({x0}, {y0}) - ({x1}, {y1})");
            println!(
                "  coverage: {:.2}% of width, {:.2}% of height",
                m.width_fraction * 100.0,
                m.height_fraction * 100.0
            );
            println!(
                "  focal length: {} mm ({:?})",
                m.focal_length_mm, m.focal_origin
            );
            println!("  height: {:.2} m", m.result.height_m);
            println!("  width:  {:.2} m", m.result.width_m);
            println!("  crown:  {:.2} m", m.result.crown_size_m);
        }
        Err(e) => match e.rejection() {
            Some(reason) => println!("  rejected: {}", reason.user_message()),
            None => {
                eprintln!("  error: {e}");
                std::process::exit(1);
            }
        },
    }
}
