//! Durability for the in-memory forum state.
//!
//! Every repository mutation reaches the [`observer::PersistenceObserver`],
//! which encodes one framed blob and hands it to the
//! [`pipeline::EventPipeline`]; the pipeline's writer thread batches
//! blobs into the rotating [`appender::FileAppender`]. On startup the
//! [`replay::EventReplayer`] reconstructs state from those files through
//! the repository's direct-write interface.

pub mod appender;
pub mod observer;
pub mod pipeline;
pub mod replay;

use std::path::Path;
use std::sync::Arc;

use agora_data::MemoryRepository;

use crate::appender::{AppenderError, FileAppender};
use crate::observer::PersistenceObserver;
use crate::pipeline::EventPipeline;

pub(crate) const LOG_TARGET: &str = "agora::persistence";

/// The assembled persistence side: queue, writer thread, appender and
/// observer.
pub struct Persistence {
    observer: Arc<PersistenceObserver>,
    pipeline: Arc<EventPipeline>,
}

impl Persistence {
    pub fn start(
        output_folder: &Path,
        rotation_seconds: i64,
        queue_capacity: usize,
    ) -> Result<Self, AppenderError> {
        let mut appender = FileAppender::new(output_folder, rotation_seconds)?;
        let pipeline = Arc::new(EventPipeline::start(queue_capacity, move |batch| {
            appender.append(&batch);
        }));
        let observer = PersistenceObserver::new(pipeline.clone());
        Ok(Self { observer, pipeline })
    }

    /// Wires the output folder and rotation cadence from the current
    /// configuration snapshot.
    pub fn start_from_config() -> Result<Self, AppenderError> {
        let config = agora_core::config::global();
        Self::start(
            Path::new(&config.persistence.output_folder),
            config.persistence.create_new_output_file_every_seconds,
            EventPipeline::DEFAULT_CAPACITY,
        )
    }

    /// Registers the persistence observer for every write and read
    /// signal of the repository.
    pub fn attach(&self, repository: &mut MemoryRepository) {
        repository.subscribe_write_observer(self.observer.clone());
        repository.subscribe_read_observer(self.observer.clone());
    }

    pub fn observer(&self) -> &Arc<PersistenceObserver> {
        &self.observer
    }

    /// Flushes coalesced counters, then drains the queue to disk.
    pub fn shutdown(self) {
        self.observer.shutdown();
        self.pipeline.shutdown();
    }
}

#[cfg(test)]
mod tests;
