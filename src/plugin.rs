//! Factory glue for the host plugin registry.

use crate::config::MaterializerConfig;
use crate::materializer::Materializer;

pub const PROCESS_NAME: &str = "train_yolo_seg";

/// Builds a process instance on behalf of the host application.
pub trait ProcessFactory {
    type Process;

    fn name(&self) -> &str;

    fn create(&self) -> Self::Process;
}

#[derive(Debug, Clone, Default)]
pub struct MaterializerFactory {
    config: MaterializerConfig,
}

impl MaterializerFactory {
    pub fn new(config: MaterializerConfig) -> Self {
        Self { config }
    }
}

impl ProcessFactory for MaterializerFactory {
    type Process = Materializer;

    fn name(&self) -> &str {
        PROCESS_NAME
    }

    fn create(&self) -> Materializer {
        Materializer::new(self.config.clone())
    }
}
