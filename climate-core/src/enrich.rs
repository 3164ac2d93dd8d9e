//! Batch driver: read points, enrich each one, write them back.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};

use crate::{
    EnrichError, Result,
    model::{ArchiveRequest, Point, RenderedSummary},
    month::resolve_month,
    provider::ArchiveProvider,
    summary::summarize,
};

/// What to do when a single point cannot be enriched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the run; nothing is written.
    #[default]
    Abort,
    /// Log the failure and keep the point without averages.
    Skip,
}

/// Outcome of one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    pub read: usize,
    pub enriched: usize,
    /// Input positions of points left without averages.
    pub skipped: Vec<usize>,
}

/// Read and validate every point in `path`.
pub fn load_points(path: &Path) -> Result<Vec<Point>> {
    let contents = fs::read(path).map_err(|e| EnrichError::io(path, e))?;
    let root: Value = serde_json::from_slice(&contents).map_err(|e| {
        EnrichError::input(format!("{} is not valid JSON: {e}", path.display()))
    })?;

    let Value::Array(items) = root else {
        return Err(EnrichError::input(format!(
            "{} must contain a JSON array of points",
            path.display()
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| Point::from_value(index, item))
        .collect()
}

/// Render points as a JSON array with 4-space indentation. Non-ASCII text is
/// written as-is.
pub fn render_points(points: &[Point]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    points.serialize(&mut ser)?;
    Ok(out)
}

/// Replace `path` with `points`. The file is swapped in whole, so a failure
/// leaves the previous contents in place.
pub fn write_points(path: &Path, points: &[Point]) -> Result<()> {
    let bytes = render_points(points)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| EnrichError::io(&dir, e))?;
    tmp.write_all(&bytes)
        .map_err(|e| EnrichError::io(tmp.path(), e))?;
    // Temp files are created owner-only.
    if let Some(permissions) = target_permissions(path) {
        fs::set_permissions(tmp.path(), permissions)
            .map_err(|e| EnrichError::io(tmp.path(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| EnrichError::io(path, e.error))?;
    Ok(())
}

/// Mode for the replaced file: the existing file's, or a regular
/// world-readable file when creating it.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => new_file_permissions(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Enriches points one at a time through an injected archive provider.
#[derive(Debug)]
pub struct Enricher<'a, P: ArchiveProvider + ?Sized> {
    provider: &'a P,
    policy: FailurePolicy,
}

impl<'a, P: ArchiveProvider + ?Sized> Enricher<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Averages for a single point.
    pub async fn summarize_point(&self, point: &Point) -> Result<RenderedSummary> {
        let range = resolve_month(point.month());
        let request = ArchiveRequest::new(point.lat(), point.lng(), range);
        let series = self.provider.daily_series(&request).await?;
        Ok(summarize(&series, &range)?.render())
    }

    /// Enrich every point in input order.
    pub async fn enrich_points(&self, points: Vec<Point>) -> Result<(Vec<Point>, RunReport)> {
        let mut report = RunReport {
            read: points.len(),
            ..RunReport::default()
        };
        let mut updated = Vec::with_capacity(points.len());

        for (index, mut point) in points.into_iter().enumerate() {
            match self.summarize_point(&point).await {
                Ok(summary) => {
                    tracing::debug!(
                        index,
                        lat = point.lat(),
                        lng = point.lng(),
                        month = point.month(),
                        avg_temp = %summary.avg_temp,
                        avg_rain = %summary.avg_rain,
                        avg_wind = %summary.avg_wind,
                        "point enriched"
                    );
                    point.attach(summary);
                    report.enriched += 1;
                }
                Err(err) if self.policy == FailurePolicy::Skip && err.is_point_failure() => {
                    tracing::warn!(index, error = %err, "skipping point");
                    report.skipped.push(index);
                }
                Err(err) => return Err(err),
            }
            updated.push(point);
        }

        Ok((updated, report))
    }

    /// Read `input`, enrich every point, and write the result to `output`.
    ///
    /// All points are validated before the first request. Nothing is written
    /// unless the whole batch succeeds.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<RunReport> {
        let points = load_points(input)?;
        tracing::info!(count = points.len(), path = %input.display(), "loaded points");

        let (updated, report) = self.enrich_points(points).await?;

        write_points(output, &updated)?;
        tracing::info!(
            enriched = report.enriched,
            skipped = report.skipped.len(),
            path = %output.display(),
            "wrote points"
        );
        Ok(report)
    }
}
