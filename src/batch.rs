// batch.rs — Per-directory orchestration: enumerate, decode, blur, encode.
//
// The dispatcher processes images strictly one at a time, blocking on each
// image's blur before moving to the next. Parallelism exists only inside a
// single blur invocation (across that image's pixels, on the GPU).
//
// ERROR POLICY (two tiers, applied consistently):
//   - Decode failure is LOCAL: diagnostic on stdout, image skipped, batch
//     continues. A corrupt file in the input directory must not take down
//     the run.
//   - Everything else is FATAL: an uncreatable output directory, an
//     unreadable input directory, or an encode/write failure halts the
//     batch with a `BatchError`. No retries, no partial-output cleanup.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::blur::Blur;
use crate::io::{load_grayscale, save_jpeg};

/// Input file extensions accepted by [`enumerate_images`], matched
/// case-insensitively. Anything else in the input directory is ignored
/// without a diagnostic.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["jpg", "png", "bmp", "tiff", "tif"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Dispatcher configuration, passed in at startup.
///
/// The defaults are the two well-known literal paths; the binary promotes
/// them to `--input-dir` / `--output-dir` flags.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory scanned for input images.
    pub input_dir: PathBuf,
    /// Directory receiving the smoothed JPEGs. Created if absent.
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            input_dir: PathBuf::from("input_images"),
            output_dir: PathBuf::from("output_images"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal dispatcher errors. Decode failures never appear here — they are
/// handled locally inside [`process_one`].
#[derive(Debug)]
pub enum BatchError {
    /// The output directory could not be created.
    CreateOutputDir { path: PathBuf, source: io::Error },
    /// The input directory could not be read.
    ReadInputDir { path: PathBuf, source: io::Error },
    /// Encoding or writing an output file failed.
    Encode { path: PathBuf, source: image::ImageError },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::CreateOutputDir { path, source } => {
                write!(f, "cannot create output directory {}: {source}", path.display())
            }
            BatchError::ReadInputDir { path, source } => {
                write!(f, "cannot read input directory {}: {source}", path.display())
            }
            BatchError::Encode { path, source } => {
                write!(f, "cannot write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::CreateOutputDir { source, .. } => Some(source),
            BatchError::ReadInputDir { source, .. } => Some(source),
            BatchError::Encode { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Counts reported by [`run`] after a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Images decoded, smoothed, and written successfully.
    pub processed: usize,
    /// Images skipped because they failed to decode.
    pub skipped: usize,
}

/// Create the output directory if absent. Idempotent.
pub fn ensure_output_dir(path: &Path) -> Result<(), BatchError> {
    fs::create_dir_all(path).map_err(|source| BatchError::CreateOutputDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Enumerate eligible image files in `input_dir`.
///
/// Returns paths in directory-enumeration order (not sorted — the OS
/// decides). A file qualifies when its extension is in
/// [`ACCEPTED_EXTENSIONS`], compared case-insensitively; files without an
/// extension never qualify. Content is not sniffed — a text file renamed
/// to `.jpg` passes the filter here and is rejected at decode time.
pub fn enumerate_images(input_dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let entries = fs::read_dir(input_dir).map_err(|source| BatchError::ReadInputDir {
        path: input_dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| BatchError::ReadInputDir {
            path: input_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if has_accepted_extension(&path) {
            files.push(path);
        }
    }
    Ok(files)
}

fn has_accepted_extension(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let lower = ext.to_ascii_lowercase();
            ACCEPTED_EXTENSIONS.iter().any(|&a| a == lower)
        }
        None => false,
    }
}

/// Derive the output path: `<input basename without extension>.jpg` inside
/// `output_dir`. Output is always JPEG, regardless of input format —
/// a fixed policy, not configurable. Two inputs that differ only in
/// extension collide; last write wins.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .expect("enumerate_images only yields paths with a file name");
    let mut name = stem.to_os_string();
    name.push(".jpg");
    output_dir.join(name)
}

/// Outcome of processing a single file. Decode failures are reported here
/// rather than as errors so the batch loop can keep going.
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Output written to the contained path.
    Written(PathBuf),
    /// Input failed to decode; nothing written.
    Skipped,
}

/// Process one image: decode, blur through `backend`, encode as JPEG.
///
/// Emits `Failed to load {path}` on decode failure (and returns
/// `Ok(Skipped)` — local, non-fatal) or `Processed: {in} -> {out}` on
/// success. Encode failures are fatal and propagate.
pub fn process_one<B: Blur>(
    backend: &B,
    path: &Path,
    output_dir: &Path,
) -> Result<ProcessOutcome, BatchError> {
    let img = match load_grayscale(path) {
        Ok(img) => img,
        Err(_) => {
            println!("Failed to load {}", path.display());
            return Ok(ProcessOutcome::Skipped);
        }
    };

    let smoothed = backend.blur(&img);

    let out_path = output_path_for(path, output_dir);
    save_jpeg(&out_path, &smoothed).map_err(|source| BatchError::Encode {
        path: out_path.clone(),
        source,
    })?;

    println!("Processed: {} -> {}", path.display(), out_path.display());
    Ok(ProcessOutcome::Written(out_path))
}

/// Run the whole batch: ensure the output directory exists, enumerate the
/// input directory once, and process every eligible file sequentially in
/// enumeration order.
pub fn run<B: Blur>(backend: &B, config: &BatchConfig) -> Result<BatchSummary, BatchError> {
    ensure_output_dir(&config.output_dir)?;
    let files = enumerate_images(&config.input_dir)?;

    let mut summary = BatchSummary::default();
    for path in &files {
        match process_one(backend, path, &config.output_dir)? {
            ProcessOutcome::Written(_) => summary.processed += 1,
            ProcessOutcome::Skipped => summary.skipped += 1,
        }
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests (pure path logic; filesystem scenarios live in tests/test_batch.rs)
// ---------------------------------------------------------------------------
