//! Snapshot comparison against stored reference images.
//!
//! The difference metric is the fraction of pixels whose largest RGBA
//! channel delta exceeds the per-pixel color tolerance. Images of different
//! dimensions differ by 1.0.

use crate::locator::Locator;
use crate::page::Page;
use crate::result::{VigilError, VigilResult};
use image::{ImageEncoder, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

/// What to do with the reference store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// Record missing references; never overwrite existing ones
    #[default]
    Accept,
    /// Record missing references and overwrite divergent ones
    Update,
    /// Never write; a missing reference is an error
    Strict,
}

impl FromStr for SnapshotMode {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "update" => Ok(Self::Update),
            "strict" => Ok(Self::Strict),
            other => Err(VigilError::Config {
                message: format!("unknown snapshot mode '{other}' (expected accept, update or strict)"),
            }),
        }
    }
}

/// Keyed storage of reference PNGs
pub trait SnapshotStore: fmt::Debug + Send + Sync {
    /// Load the reference named `name`, if any
    fn load(&self, name: &str) -> VigilResult<Option<Vec<u8>>>;

    /// Store `png` as the reference named `name`
    fn save(&self, name: &str, png: &[u8]) -> VigilResult<()>;

    /// Human-readable location of a reference
    fn location(&self, name: &str) -> String;
}

/// References as `<dir>/<name>.png`
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    /// Store rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.png"))
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn load(&self, name: &str) -> VigilResult<Option<Vec<u8>>> {
        match std::fs::read(self.path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, png: &[u8]) -> VigilResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(name), png)?;
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        self.path(name).display().to_string()
    }
}

/// In-memory references, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    images: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored references
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, name: &str) -> VigilResult<Option<Vec<u8>>> {
        Ok(self
            .images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn save(&self, name: &str, png: &[u8]) -> VigilResult<()> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), png.to_vec());
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        format!("memory://{name}.png")
    }
}

/// Result of comparing two images
#[derive(Debug, Clone)]
pub struct ImageDiff {
    /// Pixels whose channel delta exceeded the tolerance
    pub differing_pixels: u64,
    /// Pixels compared
    pub total_pixels: u64,
    /// Fraction of differing pixels (0.0-1.0); 1.0 on dimension mismatch
    pub difference: f64,
    /// Largest channel delta seen
    pub max_channel_delta: u8,
    /// Whether both images had the same dimensions
    pub dimensions_match: bool,
    /// Diff image (PNG), differing pixels in red. Empty for identical input.
    pub diff_png: Vec<u8>,
}

impl ImageDiff {
    fn identical() -> Self {
        Self {
            differing_pixels: 0,
            total_pixels: 0,
            difference: 0.0,
            max_channel_delta: 0,
            dimensions_match: true,
            diff_png: Vec::new(),
        }
    }

    /// Whether the difference is within `threshold`
    #[must_use]
    pub fn within(&self, threshold: f64) -> bool {
        self.difference <= threshold
    }
}

/// Pixel-level image comparator
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageComparator {
    color_tolerance: u8,
}

impl ImageComparator {
    /// Comparator with a per-pixel channel tolerance (0 = exact)
    #[must_use]
    pub const fn new(color_tolerance: u8) -> Self {
        Self { color_tolerance }
    }

    /// Per-pixel channel tolerance
    #[must_use]
    pub const fn color_tolerance(&self) -> u8 {
        self.color_tolerance
    }

    /// Compare two PNG-encoded images
    pub fn compare(&self, actual: &[u8], expected: &[u8]) -> VigilResult<ImageDiff> {
        if actual == expected {
            return Ok(ImageDiff::identical());
        }
        let actual = decode(actual, "actual")?;
        let expected = decode(expected, "expected")?;
        self.compare_images(&actual, &expected)
    }

    /// Compare two decoded images
    pub fn compare_images(&self, actual: &RgbaImage, expected: &RgbaImage) -> VigilResult<ImageDiff> {
        let (width, height) = actual.dimensions();
        let total_pixels = u64::from(width) * u64::from(height);

        if actual.dimensions() != expected.dimensions() {
            let diff = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
            return Ok(ImageDiff {
                differing_pixels: total_pixels,
                total_pixels,
                difference: 1.0,
                max_channel_delta: u8::MAX,
                dimensions_match: false,
                diff_png: encode(&diff)?,
            });
        }

        let mut diff = RgbaImage::new(width, height);
        let mut differing_pixels = 0u64;
        let mut max_channel_delta = 0u8;
        for ((a, e), out) in actual
            .pixels()
            .zip(expected.pixels())
            .zip(diff.pixels_mut())
        {
            let delta = channel_delta(*a, *e);
            max_channel_delta = max_channel_delta.max(delta);
            if delta > self.color_tolerance {
                differing_pixels += 1;
                *out = Rgba([255, 0, 0, 255]);
            } else {
                let Rgba([r, g, b, _]) = *a;
                *out = Rgba([r / 2, g / 2, b / 2, 128]);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let difference = if total_pixels == 0 {
            0.0
        } else {
            differing_pixels as f64 / total_pixels as f64
        };

        Ok(ImageDiff {
            differing_pixels,
            total_pixels,
            difference,
            max_channel_delta,
            dimensions_match: true,
            diff_png: encode(&diff)?,
        })
    }
}

/// Largest absolute per-channel difference (RGBA)
fn channel_delta(a: Rgba<u8>, b: Rgba<u8>) -> u8 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}

fn decode(png: &[u8], which: &str) -> VigilResult<RgbaImage> {
    image::load_from_memory(png)
        .map(|img| img.to_rgba8())
        .map_err(|e| VigilError::ImageComparison {
            message: format!("failed to decode {which} image: {e}"),
        })
}

/// Encode an RGBA image as PNG
pub fn encode(img: &RgbaImage) -> VigilResult<Vec<u8>> {
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| VigilError::ImageComparison {
            message: format!("failed to encode image: {e}"),
        })?;
    Ok(buffer)
}

/// What a passing snapshot assertion did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotOutcome {
    /// No reference existed; the capture became the reference
    Recorded,
    /// Within threshold of the reference
    Matched {
        /// Computed difference
        difference: f64,
    },
    /// Diverged and the reference was overwritten (update mode)
    Updated {
        /// Difference against the old reference
        difference: f64,
    },
}

/// Compares captures against a reference store
#[derive(Debug)]
pub struct SnapshotComparator {
    store: Box<dyn SnapshotStore>,
    comparator: ImageComparator,
    mode: SnapshotMode,
    artifact_dir: Option<PathBuf>,
}

impl SnapshotComparator {
    /// Comparator over `store` in accept mode, exact color matching, no artifacts
    #[must_use]
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self {
            store,
            comparator: ImageComparator::default(),
            mode: SnapshotMode::default(),
            artifact_dir: None,
        }
    }

    /// Set the store mode
    #[must_use]
    pub const fn with_mode(mut self, mode: SnapshotMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the per-pixel color tolerance
    #[must_use]
    pub const fn with_color_tolerance(mut self, tolerance: u8) -> Self {
        self.comparator = ImageComparator::new(tolerance);
        self
    }

    /// Write failure artifacts into `dir`
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Current mode
    #[must_use]
    pub const fn mode(&self) -> SnapshotMode {
        self.mode
    }

    /// The reference store
    #[must_use]
    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }

    /// Capture `locator` and compare it against the reference `name`
    pub fn assert_locator(
        &self,
        locator: &Locator<'_>,
        name: &str,
        threshold: f64,
    ) -> VigilResult<SnapshotOutcome> {
        validate(name, threshold)?;
        let png = locator.screenshot()?;
        self.assert_snapshot(name, &png, threshold)
    }

    /// Capture the whole page and compare it against the reference `name`
    pub fn assert_page(&self, page: &Page, name: &str, threshold: f64) -> VigilResult<SnapshotOutcome> {
        validate(name, threshold)?;
        let png = page.screenshot()?;
        self.assert_snapshot(name, &png, threshold)
    }

    /// Compare an already-captured PNG against the reference `name`.
    ///
    /// Passes iff the difference is at most `threshold`.
    pub fn assert_snapshot(
        &self,
        name: &str,
        actual: &[u8],
        threshold: f64,
    ) -> VigilResult<SnapshotOutcome> {
        validate(name, threshold)?;

        let Some(reference) = self.store.load(name)? else {
            if self.mode == SnapshotMode::Strict {
                return Err(VigilError::SnapshotMissing {
                    name: name.to_string(),
                });
            }
            self.store.save(name, actual)?;
            tracing::info!(name, location = %self.store.location(name), "recorded new snapshot");
            return Ok(SnapshotOutcome::Recorded);
        };

        let diff = self.comparator.compare(actual, &reference)?;
        if diff.within(threshold) {
            tracing::debug!(name, difference = diff.difference, threshold, "snapshot matched");
            return Ok(SnapshotOutcome::Matched {
                difference: diff.difference,
            });
        }

        if self.mode == SnapshotMode::Update {
            self.store.save(name, actual)?;
            tracing::warn!(name, difference = diff.difference, "snapshot reference updated");
            return Ok(SnapshotOutcome::Updated {
                difference: diff.difference,
            });
        }

        let (actual_path, diff_path) = self.write_artifacts(name, actual, &reference, &diff)?;
        tracing::warn!(
            name,
            difference = diff.difference,
            threshold,
            diff = %diff_path,
            "snapshot diverged"
        );
        Err(VigilError::SnapshotDivergence {
            name: name.to_string(),
            difference: diff.difference,
            threshold,
            actual_path,
            diff_path,
        })
    }

    fn write_artifacts(
        &self,
        name: &str,
        actual: &[u8],
        expected: &[u8],
        diff: &ImageDiff,
    ) -> VigilResult<(String, String)> {
        let Some(dir) = &self.artifact_dir else {
            let unwritten = String::from("<no artifact dir>");
            return Ok((unwritten.clone(), unwritten));
        };
        std::fs::create_dir_all(dir)?;
        let actual_path = dir.join(format!("{name}-actual.png"));
        let diff_path = dir.join(format!("{name}-diff.png"));
        std::fs::write(&actual_path, actual)?;
        std::fs::write(&diff_path, &diff.diff_png)?;
        std::fs::write(dir.join(format!("{name}-expected.png")), expected)?;
        Ok((
            actual_path.display().to_string(),
            diff_path.display().to_string(),
        ))
    }
}

fn validate(name: &str, threshold: f64) -> VigilResult<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(VigilError::InvalidThreshold { threshold });
    }
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(VigilError::Config {
            message: format!("invalid snapshot name '{name}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn png(img: &RgbaImage) -> Vec<u8> {
        encode(img).unwrap()
    }

    /// 10x10 grey image with the first `n` pixels turned white
    fn with_changed_pixels(n: u32) -> Vec<u8> {
        let mut img = solid(10, 10, [100, 100, 100, 255]);
        for i in 0..n {
            img.put_pixel(i % 10, i / 10, Rgba([255, 255, 255, 255]));
        }
        png(&img)
    }

    mod comparator_tests {
        use super::*;

        #[test]
        fn test_identical_bytes_short_circuit() {
            let a = with_changed_pixels(0);
            let diff = ImageComparator::default().compare(&a, &a).unwrap();
            assert_eq!(diff.difference, 0.0);
            assert!(diff.diff_png.is_empty());
        }

        #[test]
        fn test_fraction_of_differing_pixels() {
            let diff = ImageComparator::default()
                .compare(&with_changed_pixels(9), &with_changed_pixels(0))
                .unwrap();
            assert_eq!(diff.differing_pixels, 9);
            assert_eq!(diff.total_pixels, 100);
            assert!((diff.difference - 0.09).abs() < f64::EPSILON);
            assert!(!diff.diff_png.is_empty());
        }

        #[test]
        fn test_color_tolerance() {
            let a = png(&solid(4, 4, [100, 100, 100, 255]));
            let b = png(&solid(4, 4, [105, 100, 100, 255]));
            assert_eq!(ImageComparator::new(0).compare(&a, &b).unwrap().difference, 1.0);
            assert_eq!(ImageComparator::new(5).compare(&a, &b).unwrap().difference, 0.0);
            assert_eq!(ImageComparator::new(5).compare(&a, &b).unwrap().max_channel_delta, 5);
        }

        #[test]
        fn test_alpha_channel_counts() {
            let a = png(&solid(2, 2, [0, 0, 0, 255]));
            let b = png(&solid(2, 2, [0, 0, 0, 0]));
            assert_eq!(ImageComparator::default().compare(&a, &b).unwrap().difference, 1.0);
        }

        #[test]
        fn test_dimension_mismatch_is_total_divergence() {
            let a = png(&solid(4, 4, [0, 0, 0, 255]));
            let b = png(&solid(4, 5, [0, 0, 0, 255]));
            let diff = ImageComparator::default().compare(&a, &b).unwrap();
            assert!(!diff.dimensions_match);
            assert_eq!(diff.difference, 1.0);
        }

        #[test]
        fn test_garbage_input() {
            let err = ImageComparator::default()
                .compare(b"not a png", &with_changed_pixels(0))
                .unwrap_err();
            assert!(matches!(err, VigilError::ImageComparison { .. }));
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn test_fs_store_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            let store = FsSnapshotStore::new(dir.path().join("refs"));
            assert!(store.load("first").unwrap().is_none());
            store.save("first", b"png").unwrap();
            assert_eq!(store.load("first").unwrap().unwrap(), b"png");
            assert!(dir.path().join("refs/first.png").exists());
        }

        #[test]
        fn test_memory_store_names() {
            let store = MemorySnapshotStore::new();
            store.save("b", b"1").unwrap();
            store.save("a", b"2").unwrap();
            assert_eq!(store.names(), vec!["a", "b"]);
        }

        #[test]
        fn test_mode_parse() {
            assert_eq!("update".parse::<SnapshotMode>().unwrap(), SnapshotMode::Update);
            assert!("sometimes".parse::<SnapshotMode>().is_err());
        }
    }

    mod assert_snapshot_tests {
        use super::*;

        fn comparator() -> SnapshotComparator {
            SnapshotComparator::new(Box::new(MemorySnapshotStore::new()))
        }

        #[test]
        fn test_missing_reference_is_recorded() {
            let cmp = comparator();
            let outcome = cmp.assert_snapshot("first", &with_changed_pixels(0), 0.0).unwrap();
            assert_eq!(outcome, SnapshotOutcome::Recorded);
            assert!(cmp.store().load("first").unwrap().is_some());
        }

        #[test]
        fn test_strict_mode_never_records() {
            let cmp = comparator().with_mode(SnapshotMode::Strict);
            let err = cmp
                .assert_snapshot("first", &with_changed_pixels(0), 0.0)
                .unwrap_err();
            assert!(matches!(err, VigilError::SnapshotMissing { .. }));
            assert!(cmp.store().load("first").unwrap().is_none());
        }

        #[test]
        fn test_zero_threshold_fails_on_one_pixel() {
            let cmp = comparator();
            cmp.assert_snapshot("s", &with_changed_pixels(0), 0.0).unwrap();
            let err = cmp.assert_snapshot("s", &with_changed_pixels(1), 0.0).unwrap_err();
            assert!(matches!(err, VigilError::SnapshotDivergence { .. }));
        }

        #[test]
        fn test_threshold_is_inclusive() {
            let cmp = comparator();
            cmp.assert_snapshot("s", &with_changed_pixels(0), 0.0).unwrap();
            let outcome = cmp.assert_snapshot("s", &with_changed_pixels(9), 0.09).unwrap();
            assert!(matches!(outcome, SnapshotOutcome::Matched { .. }));
            assert!(cmp.assert_snapshot("s", &with_changed_pixels(10), 0.09).is_err());
        }

        #[test]
        fn test_accept_mode_never_overwrites() {
            let cmp = comparator();
            let original = with_changed_pixels(0);
            cmp.assert_snapshot("s", &original, 0.0).unwrap();
            let _ = cmp.assert_snapshot("s", &with_changed_pixels(50), 0.0);
            assert_eq!(cmp.store().load("s").unwrap().unwrap(), original);
        }

        #[test]
        fn test_update_mode_overwrites_divergent() {
            let cmp = comparator().with_mode(SnapshotMode::Update);
            cmp.assert_snapshot("s", &with_changed_pixels(0), 0.0).unwrap();
            let changed = with_changed_pixels(50);
            let outcome = cmp.assert_snapshot("s", &changed, 0.0).unwrap();
            assert_eq!(outcome, SnapshotOutcome::Updated { difference: 0.5 });
            assert_eq!(cmp.store().load("s").unwrap().unwrap(), changed);
        }

        #[test]
        fn test_invalid_threshold_rejected_before_capture() {
            let cmp = comparator();
            for bad in [-0.01, 1.01, f64::NAN] {
                let err = cmp.assert_snapshot("s", &with_changed_pixels(0), bad).unwrap_err();
                assert!(matches!(err, VigilError::InvalidThreshold { .. }));
            }
            assert!(cmp.store().load("s").unwrap().is_none());
        }

        #[test]
        fn test_invalid_name_rejected() {
            let err = comparator()
                .assert_snapshot("../escape", &with_changed_pixels(0), 0.0)
                .unwrap_err();
            assert!(matches!(err, VigilError::Config { .. }));
        }

        #[test]
        fn test_divergence_writes_artifacts() {
            let dir = tempfile::tempdir().unwrap();
            let cmp = SnapshotComparator::new(Box::new(FsSnapshotStore::new(dir.path().join("refs"))))
                .with_artifact_dir(dir.path().join("out"));
            cmp.assert_snapshot("video", &with_changed_pixels(0), 0.0).unwrap();
            let err = cmp.assert_snapshot("video", &with_changed_pixels(3), 0.0).unwrap_err();
            match err {
                VigilError::SnapshotDivergence {
                    difference,
                    actual_path,
                    diff_path,
                    ..
                } => {
                    assert!((difference - 0.03).abs() < 1e-9);
                    assert!(Path::new(&actual_path).exists());
                    assert!(Path::new(&diff_path).exists());
                }
                other => panic!("unexpected {other:?}"),
            }
            assert!(dir.path().join("out/video-expected.png").exists());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_passes_iff_metric_within_threshold(changed in 0u32..=100, threshold in 0f64..=1.0) {
            let cmp = SnapshotComparator::new(Box::new(MemorySnapshotStore::new()));
            cmp.assert_snapshot("p", &with_changed_pixels(0), 0.0).unwrap();
            let result = cmp.assert_snapshot("p", &with_changed_pixels(changed), threshold);
            let metric = f64::from(changed) / 100.0;
            prop_assert_eq!(result.is_ok(), metric <= threshold);
        }
    }
}
