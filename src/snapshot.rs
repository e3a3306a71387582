//! Heap snapshot capture.
//!
//! The allocator facility is hidden behind [`HeapProfiler`] so the HTTP layer
//! never needs to know whether profiling is compiled in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{AppError, AppResult};

/// Number of reclamation passes run before a "gc" snapshot.
pub const GC_PASSES: usize = 3;

pub trait HeapProfiler: Send + Sync {
    /// One synchronous reclamation pass.
    fn collect_garbage(&self) -> AppResult<()>;

    /// Writes one heap profile, named by the facility's own convention.
    fn dump_heap(&self) -> AppResult<()>;

    fn name(&self) -> &'static str;
}

/// Stand-in used when the binary is built without heap profiling support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProfiler;

impl HeapProfiler for UnavailableProfiler {
    fn collect_garbage(&self) -> AppResult<()> {
        Err(AppError::capability(
            "explicit reclamation requires the `jemalloc` feature",
        ))
    }

    fn dump_heap(&self) -> AppResult<()> {
        Err(AppError::capability(
            "heap snapshots require the `jemalloc` feature",
        ))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[derive(Clone)]
pub struct SnapshotCapturer {
    profiler: Arc<dyn HeapProfiler>,
}

impl SnapshotCapturer {
    pub fn new(profiler: Arc<dyn HeapProfiler>) -> Self {
        Self { profiler }
    }

    /// Picks the best profiler compiled into this binary.
    pub fn detect() -> Self {
        #[cfg(feature = "jemalloc")]
        let profiler: Arc<dyn HeapProfiler> = Arc::new(jemalloc::JemallocProfiler);
        #[cfg(not(feature = "jemalloc"))]
        let profiler: Arc<dyn HeapProfiler> = Arc::new(UnavailableProfiler);

        Self::new(profiler)
    }

    pub fn profiler_name(&self) -> &'static str {
        self.profiler.name()
    }

    pub fn capture_snapshot(&self) -> AppResult<Duration> {
        info!(profiler = self.profiler.name(), "heap snapshot started");
        let started = Instant::now();
        self.profiler.dump_heap()?;
        let elapsed = started.elapsed();
        info!(
            profiler = self.profiler.name(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "heap snapshot written"
        );
        Ok(elapsed)
    }

    /// Three back-to-back reclamation passes, then one snapshot. Completion of
    /// each pass is not verified beyond the call returning.
    pub fn capture_snapshot_after_gc(&self) -> AppResult<Duration> {
        info!("run gc");
        for _ in 0..GC_PASSES {
            self.profiler.collect_garbage()?;
        }
        self.capture_snapshot()
    }
}

#[cfg(feature = "jemalloc")]
pub mod jemalloc {
    //! jemalloc-backed profiler.
    //!
    //! Profiling must be switched on at process start, e.g.
    //! `_RJEM_MALLOC_CONF=prof:true` (the prefixed build reads the prefixed
    //! variable). Dumps land in the working directory as
    //! `jeprof.<pid>.<seq>.m<mseq>.heap` unless `prof_prefix` says otherwise.

    use std::os::raw::c_char;
    use std::ptr;

    use super::HeapProfiler;
    use crate::error::{AppError, AppResult};

    // MALLCTL_ARENAS_ALL
    const PURGE_ALL_ARENAS: &[u8] = b"arena.4096.purge\0";
    const PROF_DUMP: &[u8] = b"prof.dump\0";
    const OPT_PROF: &[u8] = b"opt.prof\0";

    #[derive(Debug, Default, Clone, Copy)]
    pub struct JemallocProfiler;

    impl JemallocProfiler {
        fn profiling_enabled() -> bool {
            // SAFETY: `opt.prof` is a read-only bool.
            unsafe { jemalloc_ctl::raw::read::<bool>(OPT_PROF) }.unwrap_or(false)
        }
    }

    impl HeapProfiler for JemallocProfiler {
        fn collect_garbage(&self) -> AppResult<()> {
            // SAFETY: purge is a void mallctl; all in/out pointers are null.
            let rc = unsafe {
                jemalloc_sys::mallctl(
                    PURGE_ALL_ARENAS.as_ptr() as *const c_char,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    0,
                )
            };
            if rc != 0 {
                return Err(AppError::capability(format!(
                    "jemalloc arena purge failed (errno {rc})"
                )));
            }

            jemalloc_ctl::epoch::advance()
                .map_err(|err| AppError::capability(format!("jemalloc epoch: {err}")))?;
            Ok(())
        }

        fn dump_heap(&self) -> AppResult<()> {
            if !Self::profiling_enabled() {
                return Err(AppError::capability(
                    "jemalloc profiling is off; start with _RJEM_MALLOC_CONF=prof:true",
                ));
            }

            // SAFETY: a NULL file name asks jemalloc for its default naming.
            unsafe { jemalloc_ctl::raw::write(PROF_DUMP, ptr::null::<c_char>()) }
                .map_err(|err| AppError::capability(format!("jemalloc prof.dump: {err}")))
        }

        fn name(&self) -> &'static str {
            "jemalloc"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::snapshot::SnapshotCapturer;
        use std::sync::Arc;

        #[test]
        fn purge_succeeds_and_advances_the_stats_epoch() {
            let before = jemalloc_ctl::epoch::advance().expect("epoch readable");

            JemallocProfiler
                .collect_garbage()
                .expect("purging all arenas should succeed");

            let after = jemalloc_ctl::epoch::advance().expect("epoch readable");
            assert!(after > before, "epoch {after} should be past {before}");
        }

        #[test]
        fn dump_without_profiling_is_a_missing_capability() {
            if JemallocProfiler::profiling_enabled() {
                eprintln!("Skipping: process was started with jemalloc profiling on.");
                return;
            }

            assert!(matches!(
                JemallocProfiler.dump_heap(),
                Err(AppError::CapabilityUnavailable(_))
            ));

            // the three passes still run before the dump is refused
            let capturer = SnapshotCapturer::new(Arc::new(JemallocProfiler));
            assert!(matches!(
                capturer.capture_snapshot_after_gc(),
                Err(AppError::CapabilityUnavailable(_))
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Gc,
        Dump,
    }

    #[derive(Default)]
    struct RecordingProfiler {
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingProfiler {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HeapProfiler for RecordingProfiler {
        fn collect_garbage(&self) -> AppResult<()> {
            self.calls.lock().unwrap().push(Call::Gc);
            Ok(())
        }

        fn dump_heap(&self) -> AppResult<()> {
            self.calls.lock().unwrap().push(Call::Dump);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn gc_snapshot_runs_three_passes_then_one_dump() {
        let profiler = Arc::new(RecordingProfiler::default());
        let capturer = SnapshotCapturer::new(profiler.clone());

        capturer.capture_snapshot_after_gc().unwrap();

        assert_eq!(
            profiler.calls(),
            vec![Call::Gc, Call::Gc, Call::Gc, Call::Dump]
        );
    }

    #[test]
    fn plain_snapshot_skips_gc() {
        let profiler = Arc::new(RecordingProfiler::default());
        let capturer = SnapshotCapturer::new(profiler.clone());

        capturer.capture_snapshot().unwrap();
        capturer.capture_snapshot().unwrap();

        assert_eq!(profiler.calls(), vec![Call::Dump, Call::Dump]);
    }

    #[test]
    fn unavailable_profiler_reports_missing_capability() {
        let capturer = SnapshotCapturer::new(Arc::new(UnavailableProfiler));

        assert!(matches!(
            capturer.capture_snapshot(),
            Err(AppError::CapabilityUnavailable(_))
        ));
        assert!(matches!(
            capturer.capture_snapshot_after_gc(),
            Err(AppError::CapabilityUnavailable(_))
        ));
    }
}
