//! Runtime configuration.
//!
//! [`ConvConfig`] is the plain, serializable part (what a model file or a
//! service config would carry). [`ConvOptions`] is what the kernels take:
//! it owns the worker pool built from the config and the scratch allocator.

use std::fmt;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::scratch::{HeapAllocator, ScratchAllocator};
use crate::threaded::parallel_for::choose_thread_count;

/// Which contraction microkernel to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MicrokernelChoice {
    /// Fastest kernel the CPU supports, detected at runtime.
    #[default]
    Auto,
    /// Always the portable lane kernel.
    Portable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvConfig {
    /// Worker threads; 0 means one per available core.
    pub num_threads: usize,
    pub microkernel: MicrokernelChoice,
    /// Scale the worker count down for stages with little work.
    pub adaptive_threads: bool,
}

impl Default for ConvConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            microkernel: MicrokernelChoice::Auto,
            adaptive_threads: true,
        }
    }
}

/// Execution options passed to every entry point.
///
/// Cheap to clone; clones share the pool and the allocator.
#[derive(Clone)]
pub struct ConvOptions {
    pool: Option<Arc<ThreadPool>>,
    num_threads: usize,
    microkernel: MicrokernelChoice,
    adaptive_threads: bool,
    allocator: Arc<dyn ScratchAllocator>,
}

impl ConvOptions {
    /// Builds the worker pool described by `config`.
    pub fn from_config(config: &ConvConfig) -> Result<Self> {
        let num_threads = match config.num_threads {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        };

        let pool = if num_threads > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("winograd63-{i}"))
                .build()?;
            Some(Arc::new(pool))
        } else {
            None
        };

        debug!(
            num_threads,
            microkernel = ?config.microkernel,
            adaptive = config.adaptive_threads,
            "conv options ready"
        );

        Ok(Self {
            pool,
            num_threads,
            microkernel: config.microkernel,
            adaptive_threads: config.adaptive_threads,
            allocator: Arc::new(HeapAllocator),
        })
    }

    /// Everything on the calling thread, heap scratch, auto microkernel.
    pub fn single_threaded() -> Self {
        Self {
            pool: None,
            num_threads: 1,
            microkernel: MicrokernelChoice::Auto,
            adaptive_threads: true,
            allocator: Arc::new(HeapAllocator),
        }
    }

    pub fn with_allocator(mut self, allocator: Arc<dyn ScratchAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_microkernel(mut self, microkernel: MicrokernelChoice) -> Self {
        self.microkernel = microkernel;
        self
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn microkernel(&self) -> MicrokernelChoice {
        self.microkernel
    }

    pub fn allocator(&self) -> &dyn ScratchAllocator {
        self.allocator.as_ref()
    }

    /// Worker count for a stage with `units` independent pieces and
    /// roughly `work` multiply-accumulates.
    pub(crate) fn threads_for(&self, units: usize, work: usize) -> usize {
        if self.adaptive_threads {
            choose_thread_count(units, work, self.num_threads)
        } else {
            self.num_threads.min(units).max(1)
        }
    }

    /// Runs `f` inside this option's worker pool.
    pub(crate) fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl fmt::Debug for ConvOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvOptions")
            .field("num_threads", &self.num_threads)
            .field("microkernel", &self.microkernel)
            .field("adaptive_threads", &self.adaptive_threads)
            .finish_non_exhaustive()
    }
}
