//! Handing a finished alignment from a worker thread to its readers

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use log::{debug, error};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::session::AlignmentSession;
use crate::algorithms::alignment::{compute_alignment, Alignment};
use crate::algorithms::similarity::SimilarityTransform;
use crate::validation::{AlignmentError, AlignmentResult};

/// Holds the transform readers currently use.
///
/// Publishing swaps in a new `Arc`; readers keep whatever snapshot they
/// took, so a transform is never changed while in use.
#[derive(Debug, Default)]
pub struct TransformCell {
    current: RwLock<Option<Arc<SimilarityTransform>>>,
}

impl TransformCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current transform, returning the previous one
    pub fn publish(&self, transform: SimilarityTransform) -> Option<Arc<SimilarityTransform>> {
        self.current.write().replace(Arc::new(transform))
    }

    /// Current transform, if any alignment has completed
    pub fn snapshot(&self) -> Option<Arc<SimilarityTransform>> {
        self.current.read().clone()
    }

    pub fn clear(&self) -> Option<Arc<SimilarityTransform>> {
        self.current.write().take()
    }
}

/// Alignment running on a worker thread
pub struct PendingAlignment {
    receiver: Receiver<AlignmentResult<Alignment>>,
    handle: Option<JoinHandle<()>>,
}

impl PendingAlignment {
    /// Result if the worker has finished, without blocking
    pub fn try_result(&mut self) -> Option<AlignmentResult<Alignment>> {
        match self.receiver.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                Some(Err(AlignmentError::WorkerLost))
            }
        }
    }

    /// Block until the worker delivers its result
    pub fn wait(mut self) -> AlignmentResult<Alignment> {
        let result = self
            .receiver
            .recv()
            .unwrap_or_else(|_| Err(AlignmentError::WorkerLost));
        self.join();
        result
    }

    /// Block for the result and publish its transform into `cell`
    pub fn wait_and_publish(self, cell: &TransformCell) -> AlignmentResult<Alignment> {
        let alignment = self.wait()?;
        cell.publish(alignment.transform.clone());
        Ok(alignment)
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("alignment worker panicked");
            }
        }
    }
}

/// Run the session's alignment against `telemetry_path` on a worker thread
pub fn spawn_alignment(session: &AlignmentSession, telemetry_path: PathBuf) -> PendingAlignment {
    let (sender, receiver) = bounded(1);
    let registry = Arc::clone(session.registry());
    let poses = Arc::clone(session.poses());
    let config = session.config().clone();

    let handle = thread::spawn(move || {
        debug!("aligning {} on worker thread", telemetry_path.display());
        let result = compute_alignment(&telemetry_path, &poses, &config, &registry);
        // the receiver may have been dropped; nobody wants the result then
        let _ = sender.send(result);
    });

    PendingAlignment {
        receiver,
        handle: Some(handle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeodeticPosition;
    use crate::utils::config::AlignmentConfig;
    use nalgebra::{Rotation3, Vector3};

    fn transform(scale: f64) -> SimilarityTransform {
        SimilarityTransform::new(
            Vector3::zeros(),
            GeodeticPosition::new("local", 0.0, 0.0, 0.0),
            scale,
            Rotation3::identity(),
        )
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let cell = TransformCell::new();
        assert!(cell.snapshot().is_none());

        cell.publish(transform(1.0));
        let before = cell.snapshot().unwrap();
        let previous = cell.publish(transform(2.0)).unwrap();

        assert_eq!(before.scale(), 1.0);
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(cell.snapshot().unwrap().scale(), 2.0);
        assert!(cell.clear().is_some());
        assert!(cell.snapshot().is_none());
    }

    #[test]
    fn test_readers_see_whole_transforms() {
        let cell = Arc::new(TransformCell::new());
        cell.publish(transform(1.0));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let t = cell.snapshot().unwrap();
                        assert!(t.scale() >= 1.0 && t.scale() <= 50.0);
                    }
                })
            })
            .collect();
        for k in 2..=50 {
            cell.publish(transform(k as f64));
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_failed_alignment_is_delivered() {
        let session = AlignmentSession::with_defaults(AlignmentConfig::default()).unwrap();
        let pending = spawn_alignment(&session, PathBuf::from("/nonexistent/captions.SRT"));
        let cell = TransformCell::new();

        let result = pending.wait_and_publish(&cell);
        assert!(matches!(result, Err(AlignmentError::MalformedTelemetry(_))));
        assert!(cell.snapshot().is_none());
    }

    #[test]
    fn test_lost_worker_is_reported_without_blocking() {
        let (sender, receiver) = bounded::<AlignmentResult<Alignment>>(1);
        let mut pending = PendingAlignment { receiver, handle: None };
        drop(sender);

        assert!(matches!(pending.try_result(), Some(Err(AlignmentError::WorkerLost))));
    }

    #[test]
    fn test_try_result_is_empty_until_the_worker_finishes() {
        let (sender, receiver) = bounded::<AlignmentResult<Alignment>>(1);
        let mut pending = PendingAlignment { receiver, handle: None };

        assert!(pending.try_result().is_none());
        sender.send(Err(AlignmentError::WorkerLost)).unwrap();
        assert!(matches!(pending.try_result(), Some(Err(AlignmentError::WorkerLost))));
    }

    #[test]
    fn test_try_result_delivers_worker_outcome() {
        let session = AlignmentSession::with_defaults(AlignmentConfig::default()).unwrap();
        let mut pending = spawn_alignment(&session, PathBuf::from("/nonexistent/captions.SRT"));

        let result = loop {
            if let Some(result) = pending.try_result() {
                break result;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        };
        assert!(matches!(result, Err(AlignmentError::MalformedTelemetry(_))));
    }
}
