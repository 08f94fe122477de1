use crate::source::RawSwathSource;
use crate::telemetry::log::LogManager;
use std::ops::{Deref, DerefMut};

/// Scoped hold on an opened source; the source is released when the lease drops.
pub struct SourceLease<'a> {
    source: &'a mut dyn RawSwathSource,
    logger: LogManager,
}

impl<'a> SourceLease<'a> {
    pub fn acquire(source: &'a mut dyn RawSwathSource) -> Self {
        let logger = LogManager::new("source");
        logger.detail(&format!("acquired {:?} source", source.campaign()));
        Self { source, logger }
    }
}

impl<'a> Deref for SourceLease<'a> {
    type Target = dyn RawSwathSource + 'a;

    fn deref(&self) -> &Self::Target {
        self.source
    }
}

impl<'a> DerefMut for SourceLease<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.source
    }
}

impl Drop for SourceLease<'_> {
    fn drop(&mut self) {
        self.source.release();
        self.logger.detail("released source");
    }
}
