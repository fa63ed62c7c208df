//! Grid transform stage: re-encode terrain points on the worker pool.

use std::path::Path;

use tracing::debug;

use crate::error::StageError;
use crate::fsutil;
use crate::grid::{encode_grid, GridJob, GridSummary};
use crate::workers::WorkerPool;

/// Encodes `source` into `drain` on the worker pool.
///
/// `origin` is the tile origin decoded from the record name. Data errors
/// reported by the worker become [`StageError::Worker`]; no output is left
/// behind in that case.
pub async fn grid_transform(
    pool: &WorkerPool,
    source: &str,
    drain: &Path,
    origin: Option<(i64, i64)>,
) -> Result<GridSummary, StageError> {
    let origin = origin
        .ok_or_else(|| StageError::Worker("tile origin not decodable from record name".into()))?;
    let source = fsutil::local_path(source)
        .ok_or_else(|| StageError::Worker(format!("{} is not a local file", source)))?;
    let temp = fsutil::temp_path_keep_extension(drain);

    let job = GridJob {
        source,
        output: temp.clone(),
        origin,
    };
    let summary = pool
        .submit(move || encode_grid(&job))
        .await?
        .map_err(|e| StageError::Worker(e.to_string()))?;

    if let Err(e) = fsutil::commit(&temp, drain).await {
        fsutil::remove_if_exists(&temp).await;
        return Err(StageError::Commit {
            path: drain.to_path_buf(),
            source: e,
        });
    }

    debug!(drain = %drain.display(), points = summary.points, "Grid encoded");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CELL_BYTES, GRID_SIZE};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_grid_transform_commits() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("TM1_462_101.asc");
        std::fs::write(&source, "462000;102000;10\n").unwrap();
        let drain = dir.path().join("TM1_462_101.bin");
        let pool = WorkerPool::new(1);

        let summary = grid_transform(&pool, source.to_str().unwrap(), &drain, Some((462_000, 101_000)))
            .await
            .unwrap();

        assert_eq!(summary.points, 1);
        assert_eq!(
            std::fs::metadata(&drain).unwrap().len() as usize,
            GRID_SIZE * GRID_SIZE * CELL_BYTES
        );
        assert!(!dir.path().join("TM1_462_101.part.bin").exists());
    }

    #[tokio::test]
    async fn test_bad_data_is_worker_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("TM1_462_101.asc");
        std::fs::write(&source, "0;0;10\n").unwrap();
        let drain = dir.path().join("TM1_462_101.bin");
        let pool = WorkerPool::new(1);

        let err = grid_transform(&pool, source.to_str().unwrap(), &drain, Some((462_000, 101_000)))
            .await
            .unwrap_err();

        assert!(err.is_worker_error());
        assert!(!drain.exists());
        assert!(!dir.path().join("TM1_462_101.part.bin").exists());
    }

    #[tokio::test]
    async fn test_missing_origin_is_worker_error() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::new(1);
        let err = grid_transform(&pool, "/m/x.asc", &dir.path().join("x.bin"), None)
            .await
            .unwrap_err();
        assert!(err.is_worker_error());
        // No job was submitted.
        assert!(!pool.is_live());
    }
}
