//! Optical character recognition for image files.
//!
//! [`OcrEngine`] is the seam: it turns one image into detections of
//! `(bounding box, text, confidence)`. [`TesseractOcr`] drives the
//! `tesseract` command line tool. [`OcrRuntime`] owns the engine instance,
//! builds it on first use and hands the same instance out afterwards.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{RagError, Result};

/// Pixel rectangle of a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    fn union(self, other: BoundingBox) -> BoundingBox {
        let right = (self.left + self.width).max(other.left + other.width);
        let bottom = (self.top + self.height).max(other.top + other.height);
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        BoundingBox { left, top, width: right - left, height: bottom - top }
    }
}

/// One piece of recognized text.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrDetection {
    pub bbox: BoundingBox,
    pub text: String,
    /// Recognition confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// An OCR backend.
pub trait OcrEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Recognize text in the image at `image`.
    fn recognize(&self, image: &Path) -> Result<Vec<OcrDetection>>;
}

/// Join detection texts with single spaces, dropping boxes and confidences.
pub fn detections_to_text(detections: &[OcrDetection]) -> String {
    detections
        .iter()
        .map(|d| d.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

type EngineFactory = Box<dyn Fn() -> Result<Arc<dyn OcrEngine>> + Send + Sync>;

/// Lazily constructed, shared OCR engine.
///
/// Engines are expensive to build, so the factory runs at most once until
/// [`reset`](OcrRuntime::reset) is called. A failed construction is not
/// cached; the next call tries again.
pub struct OcrRuntime {
    factory: EngineFactory,
    engine: Mutex<Option<Arc<dyn OcrEngine>>>,
    initializations: AtomicUsize,
}

impl std::fmt::Debug for OcrRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRuntime")
            .field("initialized", &self.is_initialized())
            .field("initializations", &self.initializations())
            .finish()
    }
}

impl OcrRuntime {
    /// Create a runtime that builds its engine with `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn OcrEngine>> + Send + Sync + 'static,
    {
        Self { factory: Box::new(factory), engine: Mutex::new(None), initializations: AtomicUsize::new(0) }
    }

    /// A runtime backed by the `tesseract` binary.
    pub fn tesseract(config: TesseractConfig) -> Self {
        Self::new(move || Ok(Arc::new(TesseractOcr::new(config.clone())?) as Arc<dyn OcrEngine>))
    }

    /// The process-wide runtime, backed by `tesseract` with default settings.
    pub fn global() -> Arc<OcrRuntime> {
        static GLOBAL: OnceLock<Arc<OcrRuntime>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(OcrRuntime::tesseract(TesseractConfig::default()))))
    }

    /// Return the engine, constructing it on first use.
    pub fn engine(&self) -> Result<Arc<dyn OcrEngine>> {
        let mut slot = self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(engine) = slot.as_ref() {
            return Ok(Arc::clone(engine));
        }

        info!("initializing OCR engine (first use may take a moment)");
        let engine = (self.factory)()?;
        self.initializations.fetch_add(1, Ordering::SeqCst);
        *slot = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Recognize `image` and return its text joined with single spaces.
    pub fn extract_text(&self, image: &Path) -> Result<String> {
        let engine = self.engine()?;
        let started = Instant::now();
        let detections = engine.recognize(image)?;
        debug!(
            engine = engine.name(),
            path = %image.display(),
            detections = detections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR completed"
        );
        Ok(detections_to_text(&detections))
    }

    /// Whether an engine is currently held.
    pub fn is_initialized(&self) -> bool {
        self.engine.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// How many times the factory has successfully built an engine.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    /// Drop the held engine so the next use builds a fresh one.
    pub fn reset(&self) {
        let mut slot = self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

/// Settings for [`TesseractOcr`].
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Path or name of the `tesseract` executable.
    pub binary: PathBuf,
    /// Language packs, `+`-separated (e.g. `eng+deu`).
    pub languages: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self { binary: PathBuf::from("tesseract"), languages: "eng".to_string() }
    }
}

/// [`OcrEngine`] that shells out to `tesseract <image> stdout tsv`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    config: TesseractConfig,
}

impl TesseractOcr {
    /// Check that the binary runs and return an engine using it.
    pub fn new(config: TesseractConfig) -> Result<Self> {
        let output = Command::new(&config.binary).arg("--version").output().map_err(|e| {
            RagError::OcrError(format!(
                "cannot run '{}': {e}. Install tesseract to extract text from images",
                config.binary.display()
            ))
        })?;
        if !output.status.success() {
            return Err(RagError::OcrError(format!(
                "'{} --version' exited with {}",
                config.binary.display(),
                output.status
            )));
        }
        Ok(Self { config })
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &Path) -> Result<Vec<OcrDetection>> {
        let output = Command::new(&self.config.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.languages)
            .arg("tsv")
            .output()
            .map_err(|e| RagError::OcrError(format!("failed to run tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RagError::OcrError(format!(
                "tesseract failed on {}: {}",
                image.display(),
                stderr.trim()
            )));
        }
        Ok(parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse tesseract TSV output into one detection per text line.
///
/// Word rows (level 5) are grouped by `(page, block, paragraph, line)`; the
/// line box is the union of its word boxes and the confidence is the mean
/// word confidence scaled to `0.0..=1.0`.
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<OcrDetection> {
    struct Line {
        key: [u32; 4],
        bbox: BoundingBox,
        words: Vec<String>,
        confidence_sum: f32,
    }

    let mut lines: Vec<Line> = Vec::new();
    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let text = cols[11].trim();
        let Ok(confidence) = cols[10].trim().parse::<f32>() else { continue };
        if text.is_empty() || confidence < 0.0 {
            continue;
        }
        let nums: Vec<u32> = cols[1..10].iter().filter_map(|c| c.trim().parse().ok()).collect();
        if nums.len() != 9 {
            continue;
        }
        let key = [nums[0], nums[1], nums[2], nums[3]];
        let bbox = BoundingBox { left: nums[5], top: nums[6], width: nums[7], height: nums[8] };

        match lines.last_mut() {
            Some(line) if line.key == key => {
                line.bbox = line.bbox.union(bbox);
                line.words.push(text.to_string());
                line.confidence_sum += confidence;
            }
            _ => lines.push(Line { key, bbox, words: vec![text.to_string()], confidence_sum: confidence }),
        }
    }

    lines
        .into_iter()
        .map(|line| OcrDetection {
            bbox: line.bbox,
            confidence: line.confidence_sum / line.words.len() as f32 / 100.0,
            text: line.words.join(" "),
        })
        .collect()
}
