//! The pipeline driver: sequences the before-interceptor, the user
//! stages, and the after-interceptor, then flushes the cache store.
//!
//! The before-interceptor classifies every source file as fresh or
//! stale by comparing its content digest against the manifest digest
//! remembered for it. Fresh files are dropped from the active context
//! so the user stages never see them; stale files are evicted from the
//! cache and flow through the user stages. The after-interceptor
//! captures the outputs the user stages produced and finally re-injects
//! every cache-resident record into the active context, so the final
//! build result contains reused and reprocessed outputs alike.

use std::path::{Path, PathBuf};

use crate::context::BuildContext;
use crate::error::MemoizeError;
use crate::file_info::FileInfo;
use crate::stage::{Disposition, Stage};
use crate::store::{CacheStore, FlushStats};

/// Subdirectory under the cache path that namespaces memoization data.
const MEMOIZE_SUBDIR: &str = "memoize";

/// Default root-relative directory memoization data lives under.
pub const DEFAULT_CACHE_PATH: &str = ".cache";

/// A fixed slot in the pipeline's stage order.
///
/// Built-in interceptors and user stages are distinguished at
/// construction, never by runtime inspection, and all three variants
/// run under the same invocation sequence: per-file processing over a
/// path snapshot, then a single end-of-stage step.
enum PipelineStage {
    /// The fresh/stale classifier run ahead of the user stages.
    Before,
    /// A user-supplied stage.
    User(Box<dyn Stage>),
    /// The output-capturing and cache-restoring stage run behind the
    /// user stages.
    After,
}

impl PipelineStage {
    fn name(&self) -> &str {
        match self {
            PipelineStage::Before => "before",
            PipelineStage::User(stage) => stage.name(),
            PipelineStage::After => "after",
        }
    }
}

/// Mutable run state threaded through stage sequencing.
#[derive(Debug, Default)]
struct PipelineState {
    /// Index of the stage currently running.
    stage: usize,
    /// Files classified fresh this run.
    fresh: usize,
    /// Files classified stale this run.
    stale: usize,
    /// Records re-injected from the cache store into the context.
    restored: usize,
}

/// What one memoized run did.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    /// Files whose cached output was reused without reprocessing.
    pub fresh: usize,
    /// Files resubmitted to the user stages.
    pub stale: usize,
    /// Records re-injected into the build context from the cache.
    pub restored: usize,
    /// Disk mutations performed by the final flush.
    pub flush: FlushStats,
}

/// Wraps a sequence of user stages with the memoization interceptors.
///
/// [`run`](Self::run) replays the cache store from
/// `<base>/<cache_path>/memoize/<name>/`, drives the stage list
/// `[before, user stages.., after]` strictly in order with each stage
/// running to completion before the next starts, and ends by flushing
/// the store and rewriting the manifest at
/// `<base>/<cache_path>/memoize/<name>.json`.
pub struct Memoize {
    name: String,
    cache_path: String,
    stages: Vec<PipelineStage>,
}

impl Memoize {
    /// Creates a driver for the named stage group.
    ///
    /// `name` namespaces the cache directory and manifest file, so two
    /// stage groups with different names never share cache state.
    pub fn new(name: impl Into<String>, stages: Vec<Box<dyn Stage>>) -> Self {
        let mut pipeline = Vec::with_capacity(stages.len() + 2);
        pipeline.push(PipelineStage::Before);
        pipeline.extend(stages.into_iter().map(PipelineStage::User));
        pipeline.push(PipelineStage::After);
        Self {
            name: name.into(),
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            stages: pipeline,
        }
    }

    /// Overrides the root-relative directory memoization data lives
    /// under.
    pub fn with_cache_path(mut self, cache_path: impl Into<String>) -> Self {
        self.cache_path = cache_path.into();
        self
    }

    /// The directory all memoization data (for every stage group under
    /// this cache path) lives in, relative to the given base directory.
    pub fn memoize_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.cache_path).join(MEMOIZE_SUBDIR)
    }

    /// The directory cached outputs for this stage group live in,
    /// relative to the given base directory.
    pub fn cache_dir(&self, base_dir: &Path) -> PathBuf {
        self.memoize_dir(base_dir).join(&self.name)
    }

    /// The manifest file path for this stage group.
    pub fn manifest_path(&self, base_dir: &Path) -> PathBuf {
        self.memoize_dir(base_dir)
            .join(format!("{}.json", self.name))
    }

    /// Runs the full pipeline against `ctx` to completion.
    ///
    /// Any stage error aborts the run before the manifest is rewritten,
    /// wrapped with the name of the failing stage. On success the cache
    /// directory and manifest reflect exactly this run's file set.
    pub fn run(&mut self, ctx: &mut BuildContext) -> Result<RunSummary, MemoizeError> {
        let cache_dir = self.cache_dir(ctx.base_dir());
        let manifest_path = self.manifest_path(ctx.base_dir());
        let mut store = CacheStore::open(&cache_dir, &manifest_path, ctx.file_encodings())?;

        let mut state = PipelineState::default();
        for index in 0..self.stages.len() {
            state.stage = index;
            let name = self.stages[index].name().to_string();
            tracing::info!(stage = %name, "running stage");
            self.run_stage(index, ctx, &mut store, &mut state)
                .map_err(|e| MemoizeError::StageFailed {
                    stage: name,
                    source: Box::new(e),
                })?;
        }

        let flush = store.flush()?;
        Ok(RunSummary {
            fresh: state.fresh,
            stale: state.stale,
            restored: state.restored,
            flush,
        })
    }

    /// Runs one stage to completion: `start`, a per-file pass over a
    /// snapshot of the context's paths, then the end-of-stage step.
    ///
    /// Files added mid-stage are not visited until a later stage; files
    /// removed mid-stage are skipped.
    fn run_stage(
        &mut self,
        index: usize,
        ctx: &mut BuildContext,
        store: &mut CacheStore,
        state: &mut PipelineState,
    ) -> Result<(), MemoizeError> {
        if let PipelineStage::User(stage) = &mut self.stages[index] {
            stage.start(ctx)?;
        }

        for path in ctx.paths() {
            let Some(mut file) = ctx.remove_file(&path) else {
                continue;
            };
            let disposition = match &mut self.stages[index] {
                PipelineStage::Before => before_process(store, &mut file, state),
                PipelineStage::User(stage) => stage.process(&mut file, ctx)?,
                PipelineStage::After => {
                    after_process(store, &file);
                    Disposition::Keep
                }
            };
            if disposition == Disposition::Keep {
                ctx.add_file(file);
            }
        }

        match &mut self.stages[index] {
            PipelineStage::User(stage) => stage.after_all(ctx)?,
            PipelineStage::After => {
                store.evict_unseen();
                state.restored = restore_cached(store, ctx);
            }
            PipelineStage::Before => {}
        }
        Ok(())
    }
}

/// Classifies one source file as fresh or stale.
///
/// Fresh means a cached record exists for the path and its
/// manifest-remembered digest equals the file's current content digest;
/// mere existence of a cache file without a manifest entry is stale.
/// Either way the observed digest is recorded for the next manifest.
fn before_process(
    store: &mut CacheStore,
    file: &mut FileInfo,
    state: &mut PipelineState,
) -> Disposition {
    let digest = file.digest();
    let fresh = store
        .get(file.path())
        .and_then(|cached| cached.known_digest())
        == Some(digest);
    store.record_source(file.path(), digest);

    if fresh {
        state.fresh += 1;
        tracing::debug!(path = %file.path(), "fresh, reusing cached output");
        Disposition::Discard
    } else {
        state.stale += 1;
        store.evict(file.path());
        tracing::debug!(path = %file.path(), "stale, reprocessing");
        Disposition::Keep
    }
}

/// Captures one processed file into the cache store, re-rooted at the
/// cache directory.
fn after_process(store: &mut CacheStore, file: &FileInfo) {
    let cached = file.rebase(store.cache_dir());
    store.capture(cached);
}

/// Re-injects every store-resident record (untouched-fresh and newly
/// captured alike) into the active context, rooted at its base
/// directory. Returns the number of records restored.
fn restore_cached(store: &CacheStore, ctx: &mut BuildContext) -> usize {
    let base = ctx.base_dir().to_path_buf();
    let mut restored = 0;
    for file in store.files() {
        ctx.add_file(file.rebase(&base));
        restored += 1;
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use memoize_common::Digest;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Records every path it processes; optionally transforms content
    /// to uppercase.
    struct RecordingStage {
        name: String,
        processed: Arc<Mutex<Vec<String>>>,
        uppercase: bool,
    }

    impl RecordingStage {
        fn new(name: &str, uppercase: bool) -> (Self, Arc<Mutex<Vec<String>>>) {
            let processed = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    name: name.to_string(),
                    processed: Arc::clone(&processed),
                    uppercase,
                },
                processed,
            )
        }
    }

    impl Stage for RecordingStage {
        fn name(&self) -> &str {
            &self.name
        }

        fn process(
            &mut self,
            file: &mut FileInfo,
            _ctx: &mut BuildContext,
        ) -> Result<Disposition, MemoizeError> {
            self.processed.lock().unwrap().push(file.path().to_string());
            if self.uppercase {
                let upper = file.content().to_ascii_uppercase();
                file.set_content(upper);
            }
            Ok(Disposition::Keep)
        }
    }

    struct FailingStage;

    impl Stage for FailingStage {
        fn name(&self) -> &str {
            "broken"
        }

        fn process(
            &mut self,
            _file: &mut FileInfo,
            _ctx: &mut BuildContext,
        ) -> Result<Disposition, MemoizeError> {
            Err(MemoizeError::other("bad input"))
        }
    }

    fn context(base: &Path, files: &[(&str, &[u8])]) -> BuildContext {
        let mut ctx = BuildContext::new(base, base.join("output"));
        for (path, content) in files {
            ctx.add_file(FileInfo::new(base, path, content.to_vec()));
        }
        ctx
    }

    fn run_once(
        base: &Path,
        files: &[(&str, &[u8])],
        uppercase: bool,
    ) -> (BuildContext, RunSummary, Arc<Mutex<Vec<String>>>) {
        let (stage, processed) = RecordingStage::new("transform", uppercase);
        let mut memoize = Memoize::new("stage", vec![Box::new(stage)]);
        let mut ctx = context(base, files);
        let summary = memoize.run(&mut ctx).unwrap();
        (ctx, summary, processed)
    }

    #[test]
    fn first_run_processes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, summary, processed) =
            run_once(dir.path(), &[("a.txt", b"X"), ("b.txt", b"Y")], false);

        assert_eq!(summary.stale, 2);
        assert_eq!(summary.fresh, 0);
        assert_eq!(processed.lock().unwrap().len(), 2);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn unchanged_files_skip_user_stages() {
        let dir = tempfile::tempdir().unwrap();
        let files: &[(&str, &[u8])] = &[("a.txt", b"X"), ("b.txt", b"Y")];
        run_once(dir.path(), files, false);

        let (ctx, summary, processed) = run_once(dir.path(), files, false);
        assert_eq!(summary.fresh, 2);
        assert_eq!(summary.stale, 0);
        assert!(processed.lock().unwrap().is_empty());
        // Outputs still present in the final context.
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get_file("a.txt").unwrap().content(), b"X");
    }

    #[test]
    fn cached_outputs_are_restored_not_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello")];
        let (first_ctx, ..) = run_once(dir.path(), files, true);
        assert_eq!(first_ctx.get_file("a.txt").unwrap().content(), b"HELLO");

        // Second run: the stage never sees the file, yet the context
        // ends up with the transformed output from the cache.
        let (ctx, summary, processed) = run_once(dir.path(), files, true);
        assert_eq!(summary.fresh, 1);
        assert!(processed.lock().unwrap().is_empty());
        assert_eq!(ctx.get_file("a.txt").unwrap().content(), b"HELLO");
        assert_eq!(
            ctx.get_file("a.txt").unwrap().full_path(),
            dir.path().join("a.txt")
        );
    }

    #[test]
    fn changed_file_is_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        run_once(dir.path(), &[("a.txt", b"X"), ("b.txt", b"Y")], false);

        let (_, summary, processed) =
            run_once(dir.path(), &[("a.txt", b"Z"), ("b.txt", b"Y")], false);
        assert_eq!(summary.stale, 1);
        assert_eq!(summary.fresh, 1);
        assert_eq!(*processed.lock().unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn concrete_two_run_scenario() {
        let dir = tempfile::tempdir().unwrap();

        // Run 1: both files processed, manifest remembers both digests.
        let (_, summary, _) = run_once(dir.path(), &[("a.txt", b"X"), ("b.txt", b"Y")], true);
        assert_eq!(summary.stale, 2);

        let memoize = Memoize::new("stage", Vec::new());
        let manifest = Manifest::load(&memoize.manifest_path(dir.path())).unwrap();
        assert_eq!(manifest.get("a.txt"), Some(Digest::from_bytes(b"X")));
        assert_eq!(manifest.get("b.txt"), Some(Digest::from_bytes(b"Y")));

        let cached_b = memoize.cache_dir(dir.path()).join("b.txt");
        let b_before = std::fs::read(&cached_b).unwrap();

        // Run 2: a.txt changed, b.txt untouched.
        let (ctx, summary, processed) =
            run_once(dir.path(), &[("a.txt", b"Z"), ("b.txt", b"Y")], true);
        assert_eq!(*processed.lock().unwrap(), vec!["a.txt"]);
        assert_eq!(summary.fresh, 1);
        assert_eq!(summary.stale, 1);

        // b's cached output untouched and still in the final output set.
        assert_eq!(std::fs::read(&cached_b).unwrap(), b_before);
        assert_eq!(ctx.get_file("b.txt").unwrap().content(), b"Y");
        assert_eq!(ctx.get_file("a.txt").unwrap().content(), b"Z");

        let manifest = Manifest::load(&memoize.manifest_path(dir.path())).unwrap();
        assert_eq!(manifest.get("a.txt"), Some(Digest::from_bytes(b"Z")));
        assert_eq!(manifest.get("b.txt"), Some(Digest::from_bytes(b"Y")));
    }

    #[test]
    fn removed_file_propagates_to_cache_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        run_once(dir.path(), &[("a.txt", b"X"), ("b.txt", b"Y")], false);

        let memoize = Memoize::new("stage", Vec::new());
        let cached_a = memoize.cache_dir(dir.path()).join("a.txt");
        assert!(cached_a.exists());

        // Run 2 without a.txt: its cached output is deleted, it is not
        // restored into the build, and its manifest entry disappears.
        let (ctx, summary, _) = run_once(dir.path(), &[("b.txt", b"Y")], false);
        assert!(!cached_a.exists());
        assert!(ctx.get_file("a.txt").is_none());
        assert_eq!(summary.flush.deleted, 1);

        let manifest = Manifest::load(&memoize.manifest_path(dir.path())).unwrap();
        assert!(manifest.get("a.txt").is_none());
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn stale_file_eviction_deletes_old_cached_output() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, _) = RecordingStage::new("rename", false);
        let mut memoize = Memoize::new("stage", vec![Box::new(stage)]);

        // First run writes the cached output under an assigned path.
        let mut ctx = BuildContext::new(dir.path(), dir.path().join("output"));
        let mut file = FileInfo::new(dir.path(), "a.txt", b"X".to_vec());
        file.add_output_path("a-v1.txt");
        ctx.add_file(file);
        memoize.run(&mut ctx).unwrap();

        let cached_v1 = memoize.cache_dir(dir.path()).join("a-v1.txt");
        assert!(cached_v1.exists());

        // Second run with changed content: the old cached output is
        // evicted and deleted, the new one written.
        let (stage, _) = RecordingStage::new("rename", false);
        let mut memoize = Memoize::new("stage", vec![Box::new(stage)]);
        let mut ctx = BuildContext::new(dir.path(), dir.path().join("output"));
        let mut file = FileInfo::new(dir.path(), "a.txt", b"Z".to_vec());
        file.add_output_path("a-v2.txt");
        ctx.add_file(file);
        let summary = memoize.run(&mut ctx).unwrap();

        assert_eq!(summary.stale, 1);
        assert_eq!(summary.flush.written, 1);
        assert!(memoize.cache_dir(dir.path()).join("a-v2.txt").exists());
    }

    #[test]
    fn stage_failure_names_the_stage_and_preserves_manifest() {
        let dir = tempfile::tempdir().unwrap();
        run_once(dir.path(), &[("a.txt", b"X")], false);

        let memoize_probe = Memoize::new("stage", Vec::new());
        let manifest_path = memoize_probe.manifest_path(dir.path());
        let manifest_before = std::fs::read_to_string(&manifest_path).unwrap();

        let mut memoize = Memoize::new("stage", vec![Box::new(FailingStage)]);
        let mut ctx = context(dir.path(), &[("a.txt", b"changed")]);
        let err = memoize.run(&mut ctx).unwrap_err();

        match err {
            MemoizeError::StageFailed { stage, source } => {
                assert_eq!(stage, "broken");
                assert!(source.to_string().contains("bad input"));
            }
            other => panic!("expected StageFailed, got {other}"),
        }

        // The aborted run never reached the manifest write.
        let manifest_after = std::fs::read_to_string(&manifest_path).unwrap();
        assert_eq!(manifest_before, manifest_after);
    }

    #[test]
    fn stages_run_in_order_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let (first, first_seen) = RecordingStage::new("first", false);
        let (second, second_seen) = RecordingStage::new("second", false);
        let mut memoize = Memoize::new("stage", vec![Box::new(first), Box::new(second)]);

        let mut ctx = context(dir.path(), &[("a.txt", b"X")]);
        memoize.run(&mut ctx).unwrap();

        assert_eq!(*first_seen.lock().unwrap(), vec!["a.txt"]);
        assert_eq!(*second_seen.lock().unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn distinct_stage_names_use_distinct_caches() {
        let dir = tempfile::tempdir().unwrap();

        let (stage, _) = RecordingStage::new("transform", false);
        let mut minify = Memoize::new("minify", vec![Box::new(stage)]);
        let mut ctx = context(dir.path(), &[("a.txt", b"X")]);
        minify.run(&mut ctx).unwrap();

        // A differently named group sees nothing as fresh.
        let (stage, processed) = RecordingStage::new("transform", false);
        let mut bundle = Memoize::new("bundle", vec![Box::new(stage)]);
        let mut ctx = context(dir.path(), &[("a.txt", b"X")]);
        let summary = bundle.run(&mut ctx).unwrap();
        assert_eq!(summary.stale, 1);
        assert_eq!(processed.lock().unwrap().len(), 1);
        assert!(minify.cache_dir(dir.path()).ends_with("memoize/minify"));
        assert!(bundle.cache_dir(dir.path()).ends_with("memoize/bundle"));
    }

    #[test]
    fn cache_path_override_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let (stage, _) = RecordingStage::new("transform", false);
        let mut memoize =
            Memoize::new("stage", vec![Box::new(stage)]).with_cache_path("build-cache");
        let mut ctx = context(dir.path(), &[("a.txt", b"X")]);
        memoize.run(&mut ctx).unwrap();

        assert!(dir
            .path()
            .join("build-cache")
            .join("memoize")
            .join("stage")
            .join("a.txt")
            .exists());
        assert!(dir
            .path()
            .join("build-cache")
            .join("memoize")
            .join("stage.json")
            .exists());
    }

    #[test]
    fn empty_context_runs_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, summary, _) = run_once(dir.path(), &[], false);
        assert_eq!(summary.fresh + summary.stale, 0);
        assert!(ctx.is_empty());

        let memoize = Memoize::new("stage", Vec::new());
        let manifest = Manifest::load(&memoize.manifest_path(dir.path())).unwrap();
        assert!(manifest.is_empty());
    }
}
