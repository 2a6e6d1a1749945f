// tests/test_batch.rs — Integration tests for the batch dispatcher.
//
// These run the real dispatcher against real files in a scratch directory,
// using the CPU backend so no GPU is needed. The GPU backend goes through
// the identical `Blur` seam and is validated against the CPU reference in
// src/gpu/blur.rs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use smudge::batch::{self, BatchConfig, BatchSummary};
use smudge::blur::CpuBlur;

/// Fresh scratch directory under the system temp dir, unique per test
/// name and process so parallel test runs don't collide.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("smudge-batch-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a small valid grayscale image at `path` (format from extension).
fn write_test_image(path: &Path, w: u32, h: u32) {
    let pixels: Vec<u8> = (0..w * h).map(|i| (i % 256) as u8).collect();
    image::GrayImage::from_raw(w, h, pixels).unwrap().save(path).unwrap();
}

#[test]
fn run_processes_valid_images() {
    let root = scratch_dir("valid");
    let input = root.join("in");
    let output = root.join("out");
    fs::create_dir_all(&input).unwrap();

    write_test_image(&input.join("a.png"), 20, 15);
    write_test_image(&input.join("b.bmp"), 8, 8);

    let config = BatchConfig { input_dir: input, output_dir: output.clone() };
    let summary = batch::run(&CpuBlur, &config).unwrap();

    assert_eq!(summary, BatchSummary { processed: 2, skipped: 0 });
    assert!(output.join("a.jpg").exists());
    assert!(output.join("b.jpg").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn run_creates_missing_output_directory() {
    let root = scratch_dir("mkdir");
    let input = root.join("in");
    fs::create_dir_all(&input).unwrap();
    write_test_image(&input.join("only.png"), 10, 10);

    // Two levels deep, neither exists yet.
    let output = root.join("deep").join("out");
    let config = BatchConfig { input_dir: input, output_dir: output.clone() };
    batch::run(&CpuBlur, &config).unwrap();
    assert!(output.join("only.jpg").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn run_skips_corrupt_file_and_continues() {
    // A zero-byte bad.jpg passes the extension filter but fails to decode.
    // The run must skip it, still process good.png, and return Ok.
    let root = scratch_dir("corrupt");
    let input = root.join("in");
    let output = root.join("out");
    fs::create_dir_all(&input).unwrap();

    fs::write(input.join("bad.jpg"), b"").unwrap();
    write_test_image(&input.join("good.png"), 12, 12);

    let config = BatchConfig { input_dir: input, output_dir: output.clone() };
    let summary = batch::run(&CpuBlur, &config).unwrap();

    assert_eq!(summary, BatchSummary { processed: 1, skipped: 1 });
    assert!(output.join("good.jpg").exists());
    assert!(!output.join("bad.jpg").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn run_ignores_non_image_files() {
    let root = scratch_dir("filter");
    let input = root.join("in");
    let output = root.join("out");
    fs::create_dir_all(&input).unwrap();

    write_test_image(&input.join("photo.png"), 6, 6);
    fs::write(input.join("notes.txt"), b"not an image").unwrap();
    fs::write(input.join("noextension"), b"also not").unwrap();

    let config = BatchConfig { input_dir: input, output_dir: output.clone() };
    let summary = batch::run(&CpuBlur, &config).unwrap();

    // The .txt and extensionless files never reach the decoder, so they
    // are neither processed nor counted as skipped.
    assert_eq!(summary, BatchSummary { processed: 1, skipped: 0 });
    assert!(!output.join("notes.jpg").exists());

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn uppercase_extension_is_accepted_and_renamed() {
    let root = scratch_dir("upper");
    let input = root.join("in");
    let output = root.join("out");
    fs::create_dir_all(&input).unwrap();

    // PNG content under an uppercase extension: the filter is on the name,
    // the decoder sniffs the content.
    write_test_image(&input.join("photo.PNG"), 9, 9);

    let config = BatchConfig { input_dir: input, output_dir: output.clone() };
    let summary = batch::run(&CpuBlur, &config).unwrap();

    assert_eq!(summary.processed, 1);
    assert!(output.join("photo.jpg").exists(), "output extension must be lowercase .jpg");

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn reruns_are_bit_identical() {
    // No randomness anywhere: running the batch twice over the same input
    // must produce byte-identical output files.
    let root = scratch_dir("determinism");
    let input = root.join("in");
    let output = root.join("out");
    fs::create_dir_all(&input).unwrap();
    write_test_image(&input.join("scene.png"), 33, 21);

    let config = BatchConfig { input_dir: input, output_dir: output.clone() };

    batch::run(&CpuBlur, &config).unwrap();
    let first = fs::read(output.join("scene.jpg")).unwrap();

    batch::run(&CpuBlur, &config).unwrap();
    let second = fs::read(output.join("scene.jpg")).unwrap();

    assert_eq!(first, second);

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn run_fails_on_missing_input_directory() {
    let root = scratch_dir("noinput");
    let config = BatchConfig {
        input_dir: root.join("does-not-exist"),
        output_dir: root.join("out"),
    };
    let err = batch::run(&CpuBlur, &config).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("input directory"), "unexpected error: {msg}");

    fs::remove_dir_all(&root).unwrap();
}

#[test]
fn output_content_matches_direct_blur() {
    // process_one's pipeline (decode → blur → quantize → JPEG) must write
    // exactly what blurring the decoded image directly would produce.
    // JPEG is lossy, so compare by decoding the output and checking it is
    // close to the quantized blur of the input.
    let root = scratch_dir("content");
    let input = root.join("in");
    let output = root.join("out");
    fs::create_dir_all(&input).unwrap();

    let path = input.join("flat.png");
    image::GrayImage::from_raw(16, 16, vec![180u8; 256]).unwrap().save(&path).unwrap();

    let config = BatchConfig { input_dir: input, output_dir: output.clone() };
    batch::run(&CpuBlur, &config).unwrap();

    let written = smudge::io::load_grayscale(&output.join("flat.jpg")).unwrap();
    // Interior of a flat 180 image stays 180 through the blur; JPEG may
    // wobble it by a couple of levels.
    let center = written.get(8, 8) as i32;
    assert!((center - 180).abs() <= 2, "center = {center}");

    // Corner is attenuated to 180 * 9/16 = 101 before encoding. The
    // border gradient sits inside one DCT block, so allow JPEG ringing.
    let corner = written.get(0, 0) as i32;
    assert!((corner - 101).abs() <= 10, "corner = {corner}, expected ~101");

    fs::remove_dir_all(&root).unwrap();
}
