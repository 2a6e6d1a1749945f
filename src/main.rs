// main.rs — batch entry point.
//
// Usage:
//   smudge [--input-dir DIR] [--output-dir DIR]
//
// Defaults: ./input_images and ./output_images relative to the working
// directory. A compute-capable GPU is required; its absence is fatal at
// startup. Per-file diagnostics go to stdout:
//   "Failed to load {path}"              — decode failure, file skipped
//   "Processed: {input} -> {output}"     — success

use std::env;
use std::path::PathBuf;
use std::process;

use smudge::batch::{self, BatchConfig};
use smudge::gpu::blur::GpuBlur;
use smudge::gpu::device::GpuDevice;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} [--input-dir DIR] [--output-dir DIR]");
    eprintln!("  --input-dir   directory scanned for images (default: input_images)");
    eprintln!("  --output-dir  directory receiving JPEGs (default: output_images)");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut config = BatchConfig::default();
    let mut iter = args.into_iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--input-dir" => match iter.next() {
                Some(dir) => config.input_dir = PathBuf::from(dir),
                None => {
                    eprintln!("Error: --input-dir requires a value");
                    usage(&program);
                }
            },
            "--output-dir" => match iter.next() {
                Some(dir) => config.output_dir = PathBuf::from(dir),
                None => {
                    eprintln!("Error: --output-dir requires a value");
                    usage(&program);
                }
            },
            "--help" | "-h" => usage(&program),
            other => {
                eprintln!("Error: unknown option {other}");
                usage(&program);
            }
        }
    }

    // Device init is the one startup-fatal requirement: no GPU, no run.
    let gpu = match GpuDevice::new() {
        Ok(gpu) => gpu,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    eprintln!("[smudge] {gpu}");

    let backend = GpuBlur::new(gpu);

    match batch::run(&backend, &config) {
        Ok(summary) => {
            // Partial failure (skipped images) still terminates normally.
            eprintln!(
                "[smudge] done: {} processed, {} skipped",
                summary.processed, summary.skipped
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
