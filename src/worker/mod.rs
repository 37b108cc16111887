//! Admission-controlled worker pool for pixel transforms.
//!
//! Request handling concurrency is unbounded (task per request); the
//! CPU-heavy transform step is not. The pool admits at most
//! `max_workers + max_queue` jobs at a time: up to `max_workers` running,
//! the rest waiting on a worker permit. Anything beyond that is rejected
//! immediately instead of queueing unboundedly, so load spikes produce
//! fast retryable failures rather than a pile-up.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::backend::{ImageBackend, TransformJob, TransformOutput};
use crate::error::ScaleError;

/// Bounded-concurrency dispatcher for [`TransformJob`]s.
pub struct TransformPool<B: ImageBackend> {
    backend: Arc<B>,

    /// Permits for admitted jobs: running plus queued
    admission: Arc<Semaphore>,

    /// Permits for running jobs
    running: Arc<Semaphore>,

    max_workers: usize,
    max_queue: usize,
}

impl<B: ImageBackend> TransformPool<B> {
    /// Create a pool running at most `max_workers` transforms with at most
    /// `max_queue` admitted jobs waiting behind them.
    pub fn new(backend: Arc<B>, max_workers: usize, max_queue: usize) -> Self {
        Self {
            backend,
            admission: Arc::new(Semaphore::new(max_workers + max_queue)),
            running: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            max_queue,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    /// Whether a job submitted now would start running immediately.
    ///
    /// A hint only: the answer can change before `submit` is called.
    pub fn can_run(&self) -> bool {
        self.running.available_permits() > 0
    }

    /// Admit and run a transform job, or reject it.
    ///
    /// Admission is atomic: if running and queue capacity are exhausted
    /// this returns [`ScaleError::Overloaded`] immediately, it never blocks
    /// the caller behind an unbounded queue. An admitted job waits for a
    /// worker slot, runs to completion and reports the backend's result.
    pub async fn submit(&self, job: TransformJob) -> Result<TransformOutput, ScaleError> {
        let _admitted = match self.admission.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("transform pool saturated, rejecting job");
                return Err(ScaleError::Overloaded);
            }
        };

        let _running = match self.running.acquire().await {
            Ok(permit) => permit,
            // the semaphore is never closed; treat it like saturation
            Err(_) => return Err(ScaleError::Overloaded),
        };

        debug!("running transform of {}", job.source.display());
        self.backend
            .transform(&job)
            .await
            .map_err(ScaleError::Backend)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CropRect, ImageInfo, ScaleQuality};
    use crate::error::BackendError;
    use bytes::Bytes;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Backend that blocks until released, counting concurrent runs.
    struct GatedBackend {
        release: Notify,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl GatedBackend {
        fn new() -> Self {
            Self {
                release: Notify::new(),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ImageBackend for GatedBackend {
        fn identify(&self, _path: &Path) -> Result<ImageInfo, BackendError> {
            Err(BackendError::Other("not used".into()))
        }

        async fn transform(&self, _job: &TransformJob) -> Result<TransformOutput, BackendError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.release.notified().await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(TransformOutput {
                data: Bytes::from_static(b"ok"),
                mime: "image/png".to_string(),
            })
        }
    }

    fn job() -> TransformJob {
        TransformJob {
            source: "/imgs/p001.jpg".into(),
            crop: CropRect {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
            scale: 1.0,
            rotation: 0.0,
            contrast: 0.0,
            brightness: 0.0,
            rgb_multiply: None,
            rgb_add: None,
            mirror_horizontal: false,
            mirror_vertical: false,
            quality: ScaleQuality::Good,
            final_size: None,
            output_mime: "image/png".to_string(),
            jpeg_quality: 80,
        }
    }

    #[tokio::test]
    async fn test_second_submit_is_rejected_when_saturated() {
        let backend = Arc::new(GatedBackend::new());
        let pool = Arc::new(TransformPool::new(backend.clone(), 1, 0));

        let first = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.submit(job()).await })
        };

        // wait until the first job occupies the single worker
        while backend.running.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // with zero queue capacity the second submit is turned away
        let second = pool.submit(job()).await;
        assert!(matches!(second, Err(ScaleError::Overloaded)));

        backend.release.notify_waiters();
        let first = first.await.unwrap();
        assert!(first.is_ok());
    }

    #[tokio::test]
    async fn test_queued_job_waits_for_a_worker() {
        let backend = Arc::new(GatedBackend::new());
        let pool = Arc::new(TransformPool::new(backend.clone(), 1, 1));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move { pool.submit(job()).await }));
        }

        while backend.running.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // a third submit exceeds workers + queue
        let third = pool.submit(job()).await;
        assert!(matches!(third, Err(ScaleError::Overloaded)));

        // release both admitted jobs; the queued one runs after the first
        backend.release.notify_waiters();
        tokio::task::yield_now().await;
        backend.release.notify_waiters();
        for handle in handles {
            // keep releasing until both complete
            loop {
                backend.release.notify_waiters();
                if handle.is_finished() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert!(handle.await.unwrap().is_ok());
        }

        // never more than one transform at a time
        assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_can_run_reflects_worker_availability() {
        let backend = Arc::new(GatedBackend::new());
        let pool = Arc::new(TransformPool::new(backend.clone(), 1, 1));
        assert!(pool.can_run());

        let handle = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.submit(job()).await })
        };
        while backend.running.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!pool.can_run());

        backend.release.notify_waiters();
        handle.await.unwrap().unwrap();
        assert!(pool.can_run());
    }
}
