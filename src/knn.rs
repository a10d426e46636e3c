// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Nearest-neighbor feature database and majority-vote classification.
//!
//! The database root is a directory with one flat text file per class label
//! (filename stem = sanitized label), each row a whitespace-separated float
//! vector written at fixed precision. Saving merges with any existing file
//! instead of overwriting: prior rows are loaded and new rows appended.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{PipelineError, Result};
use crate::labels::sanitize_label;

/// Decimal digits written per component, matching the historical format.
pub const DEFAULT_PRECISION: usize = 8;

/// In-memory KNN database: one feature matrix with a parallel label array.
#[derive(Debug, Clone, Default)]
pub struct KnnDatabase {
    features: Vec<Array1<f32>>,
    labels: Vec<String>,
    dims: Option<usize>,
}

impl KnnDatabase {
    /// Create an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.txt` class file under a database root.
    ///
    /// Returns an empty database when the directory holds no class files;
    /// callers treat that as a recoverable "record something first"
    /// condition, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DatabaseError`] on unreadable rows or mixed
    /// vector dimensionality, [`PipelineError::Io`] on filesystem failures.
    pub fn load_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(root)?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();

        let mut db = Self::new();
        for file in files {
            let label = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let rows = read_rows(&file)?;
            for row in rows {
                db.push(row, label.clone())?;
            }
        }
        Ok(db)
    }

    /// Append one labeled feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DatabaseError`] when the vector's
    /// dimensionality differs from the rest of the database.
    pub fn push(&mut self, feature: Array1<f32>, label: String) -> Result<()> {
        match self.dims {
            None => self.dims = Some(feature.len()),
            Some(dims) if dims != feature.len() => {
                return Err(PipelineError::DatabaseError(format!(
                    "feature vector has {} dims, database holds {dims}",
                    feature.len()
                )));
            }
            Some(_) => {}
        }
        self.features.push(feature);
        self.labels.push(label);
        Ok(())
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the database holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Distinct labels in sorted order.
    #[must_use]
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Classify a query vector by majority vote among its `k` nearest
    /// stored vectors.
    ///
    /// Distances are Euclidean (the square root is kept for fidelity with
    /// the historical ranking). Ties in the vote resolve to the first label
    /// in ascending sorted order. Returns `Ok(None)` when the database is
    /// empty or `k` is zero.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DatabaseError`] when the query's
    /// dimensionality differs from the stored vectors.
    pub fn classify(&self, query: ArrayView1<'_, f32>, k: usize) -> Result<Option<String>> {
        if self.is_empty() || k == 0 {
            return Ok(None);
        }
        if let Some(dims) = self.dims {
            if dims != query.len() {
                return Err(PipelineError::DatabaseError(format!(
                    "query vector has {} dims, database holds {dims}",
                    query.len()
                )));
            }
        }

        let mut dists: Vec<(f32, usize)> = self
            .features
            .iter()
            .enumerate()
            .map(|(i, feat)| {
                let d = feat
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                (d, i)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for &(_, i) in dists.iter().take(k) {
            *counts.entry(self.labels[i].as_str()).or_insert(0) += 1;
        }

        Ok(counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(label, _)| (*label).to_string()))
    }

    /// Stack the stored vectors into one `[n, dims]` matrix.
    ///
    /// # Panics
    ///
    /// Panics when the database is empty.
    #[must_use]
    pub fn feature_matrix(&self) -> Array2<f32> {
        let views: Vec<_> = self.features.iter().map(|f| f.view()).collect();
        ndarray::stack(Axis(0), &views).expect("uniform feature dims")
    }
}

/// Append feature rows to one class file, merging with any existing rows.
///
/// Never a destructive overwrite: if the file exists its rows are loaded and
/// the new rows concatenated before the write.
///
/// # Errors
///
/// Returns [`PipelineError::DatabaseError`] on unreadable existing rows or
/// mismatched dimensionality, [`PipelineError::Io`] on filesystem failures.
pub fn save_class<P: AsRef<Path>>(
    root: P,
    label: &str,
    rows: &[Array1<f32>],
    precision: usize,
) -> Result<PathBuf> {
    let root = root.as_ref();
    fs::create_dir_all(root)?;
    let path = root.join(format!("{}.txt", sanitize_label(label)));

    let mut all_rows: Vec<Array1<f32>> = if path.is_file() {
        read_rows(&path)?
    } else {
        Vec::new()
    };
    all_rows.extend(rows.iter().cloned());

    if let Some(dims) = all_rows.first().map(Array1::len) {
        if let Some(bad) = all_rows.iter().find(|r| r.len() != dims) {
            return Err(PipelineError::DatabaseError(format!(
                "mixed dimensionality in {}: {} vs {dims}",
                path.display(),
                bad.len()
            )));
        }
    }

    let mut out = String::new();
    for row in &all_rows {
        let line: Vec<String> = row.iter().map(|v| format!("{v:.precision$}")).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    fs::write(&path, out)?;
    Ok(path)
}

/// Parse whitespace-delimited float rows from a class file.
fn read_rows(path: &Path) -> Result<Vec<Array1<f32>>> {
    let text = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let values: std::result::Result<Vec<f32>, _> =
            line.split_whitespace().map(str::parse::<f32>).collect();
        let values = values.map_err(|e| {
            PipelineError::DatabaseError(format!(
                "{}:{}: unreadable row: {e}",
                path.display(),
                lineno + 1
            ))
        })?;
        rows.push(Array1::from_vec(values));
    }
    Ok(rows)
}
