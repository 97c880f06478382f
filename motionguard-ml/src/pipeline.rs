//! Classification pipeline and worker thread
//!
//! Consumer side of the batch pool. For every filled batch:
//!
//! ```text
//! take_filled ─→ charging? ──yes──→ CLASSIFIED/CHARGING ─┐
//!                   │no                                   │
//!                   ↓                                     ↓
//!             extract → classify → qualify ─→ add_classification
//!                                                         │
//!                              get_classification ←───────┘
//!                                     │
//!          "" → nothing yet   same → extended   new → changed
//!                                     │
//! return_empty ←──────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use motionguard_core::{
    ActivityChange, BatchPool, CoreError, FeatureExtractor, SampleBatch, Timestamp,
};

use crate::aggregator::Aggregator;
use crate::taxonomy::CHARGING_PATH;
use crate::{check_layout, Classifier, MLError, MLResult};

/// Receiver of smoothed activity updates
pub trait ActivitySink: Send {
    /// The stable activity changed
    fn activity_changed(&mut self, change: ActivityChange);

    /// The current activity continued through another batch
    fn activity_extended(&mut self, _activity_path: &str, _end_time: Timestamp) {}

    /// A batch could not be classified
    fn classification_failed(&mut self, error: &MLError) {
        log::error!("Classification failed: {}", error);
    }
}

/// What one batch did to the stable activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Batch held no samples
    Skipped,
    /// No activity established yet
    Pending,
    /// A different activity became stable
    Changed(ActivityChange),
    /// The stable activity continued
    Extended {
        /// Current activity path
        activity_path: String,
        /// End of the batch just processed
        end_time: Timestamp,
    },
}

/// Extractor, classifier and aggregator run in sequence
pub struct ClassificationPipeline<C: Classifier> {
    extractor: FeatureExtractor,
    classifier: C,
    aggregator: Aggregator,
    current: Option<ActivityChange>,
}

impl<C: Classifier> ClassificationPipeline<C> {
    /// Assemble a pipeline; extractor and classifier must share a layout
    pub fn new(extractor: FeatureExtractor, classifier: C, aggregator: Aggregator) -> MLResult<Self> {
        check_layout(extractor.layout(), classifier.layout().names())?;
        Ok(Self {
            extractor,
            classifier,
            aggregator,
            current: None,
        })
    }

    /// Activity reported last, with its time span
    pub fn current(&self) -> Option<&ActivityChange> {
        self.current.as_ref()
    }

    /// Smoothing state
    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Raw classifier
    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }

    /// Raw classification path of one batch
    fn raw_path(&mut self, batch: &SampleBatch) -> MLResult<Option<String>> {
        let taxonomy = self.aggregator.taxonomy();
        if batch.charging() && taxonomy.contains(CHARGING_PATH) {
            return Ok(Some(CHARGING_PATH.to_string()));
        }

        let Some(features) = self.extractor.extract(batch) else {
            return Ok(None);
        };
        let label = self.classifier.classify(&features)?;
        Ok(Some(self.aggregator.taxonomy().qualify(&label)))
    }

    /// Classify one filled batch and update the stable activity
    pub fn process_batch(&mut self, batch: &SampleBatch) -> MLResult<PipelineEvent> {
        let Some(path) = self.raw_path(batch)? else {
            log::warn!("Batch {} has no samples, skipped", batch.id());
            return Ok(PipelineEvent::Skipped);
        };
        self.aggregator.add_classification(&path)?;
        log::debug!("Batch {} classified as {}", batch.id(), path);

        let stable = self.aggregator.get_classification();
        if stable.is_empty() {
            return Ok(PipelineEvent::Pending);
        }

        let start_time = batch.sample_time();
        let end_time = batch.last().map_or(start_time, |s| s.timestamp.max(start_time));

        if let Some(current) = self.current.as_mut() {
            if current.activity_path == stable {
                current.end_time = end_time;
                return Ok(PipelineEvent::Extended {
                    activity_path: stable,
                    end_time,
                });
            }
        }

        log::info!("Activity changed to {}", stable);
        let change = ActivityChange {
            activity_path: stable,
            start_time,
            end_time,
        };
        self.current = Some(change.clone());
        Ok(PipelineEvent::Changed(change))
    }
}

/// Handle to a running classification thread
pub struct WorkerHandle {
    pool: Arc<BatchPool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Close the pool and wait for the thread to exit
    ///
    /// Closing the pool also stops a sampling scheduler sharing it.
    pub fn shutdown(mut self) -> thread::Result<()> {
        self.pool.close();
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.pool.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawns the consumer thread
pub struct ClassificationWorker;

impl ClassificationWorker {
    /// Process filled batches from `pool` until it is closed
    pub fn spawn<C, S>(
        pool: Arc<BatchPool>,
        pipeline: ClassificationPipeline<C>,
        sink: S,
    ) -> MLResult<WorkerHandle>
    where
        C: Classifier + 'static,
        S: ActivitySink + 'static,
    {
        let worker_pool = Arc::clone(&pool);
        let thread = thread::Builder::new()
            .name("motionguard-classifier".into())
            .spawn(move || run(worker_pool, pipeline, sink))
            .map_err(MLError::from)?;

        Ok(WorkerHandle {
            pool,
            thread: Some(thread),
        })
    }
}

fn run<C: Classifier, S: ActivitySink>(
    pool: Arc<BatchPool>,
    mut pipeline: ClassificationPipeline<C>,
    mut sink: S,
) {
    log::info!("Classification thread started");

    loop {
        let batch = match pool.take_filled() {
            Ok(batch) => batch,
            Err(CoreError::Interrupted) => break,
            Err(error) => {
                log::error!("Could not take a filled batch: {}", error);
                break;
            }
        };

        match pipeline.process_batch(&batch) {
            Ok(PipelineEvent::Changed(change)) => sink.activity_changed(change),
            Ok(PipelineEvent::Extended {
                activity_path,
                end_time,
            }) => sink.activity_extended(&activity_path, end_time),
            Ok(PipelineEvent::Pending | PipelineEvent::Skipped) => {}
            Err(error) => sink.classification_failed(&error),
        }

        if let Err(error) = pool.return_empty(batch) {
            log::error!("Could not return consumed batch: {}", error);
        }
    }

    log::info!("Classification thread stopped");
}
