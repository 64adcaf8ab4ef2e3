//! The stage contract shared by user stages and the built-in
//! interceptors.

use crate::context::BuildContext;
use crate::error::MemoizeError;
use crate::file_info::FileInfo;

/// What the driver should do with a file after a stage processed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the file in the active context.
    Keep,
    /// Drop the file from the active context; downstream stages never
    /// see it.
    Discard,
}

/// A single pipeline stage.
///
/// For every stage the driver calls [`start`](Self::start) once, then
/// [`process`](Self::process) once per file currently in the context,
/// then [`after_all`](Self::after_all) once. Each method has a no-op
/// default so a stage only overrides what it needs. Returning an error
/// from any method aborts the whole run; stages are never retried.
pub trait Stage {
    /// Stage name, used in logs and failure reports.
    fn name(&self) -> &str;

    /// Called once before any file is processed.
    fn start(&mut self, _ctx: &mut BuildContext) -> Result<(), MemoizeError> {
        Ok(())
    }

    /// Called once per file. The file is detached from the context for
    /// the duration of the call; returning [`Disposition::Keep`]
    /// reinserts it.
    fn process(
        &mut self,
        _file: &mut FileInfo,
        _ctx: &mut BuildContext,
    ) -> Result<Disposition, MemoizeError> {
        Ok(Disposition::Keep)
    }

    /// Called once after every file has been processed.
    fn after_all(&mut self, _ctx: &mut BuildContext) -> Result<(), MemoizeError> {
        Ok(())
    }
}
