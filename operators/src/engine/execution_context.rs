use std::sync::Arc;

use rastercalc_datatypes::raster::{GridShape2D, TilingSpecification, TilingStrategy};
use rastercalc_datatypes::util::test::TestDefault;
use rayon::ThreadPool;

use crate::util::config::EngineSettings;
use crate::util::{Result, create_rayon_thread_pool};

/// The resources of a computation: the thread pool that runs the tiles and the tiling.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    thread_pool: Arc<ThreadPool>,
    tiling_specification: TilingSpecification,
}

impl ExecutionContext {
    pub fn new(thread_pool: Arc<ThreadPool>, tiling_specification: TilingSpecification) -> Self {
        Self {
            thread_pool,
            tiling_specification,
        }
    }

    /// Creates the thread pool and tiling described by `settings`
    ///
    /// # Errors
    ///
    /// Fails for zero tile sizes or if the thread pool cannot be built.
    ///
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        let tiling_specification = settings.tiling_specification()?;
        let thread_pool = create_rayon_thread_pool(settings.num_threads)?;

        tracing::info!(
            tile_width = settings.tile_width,
            tile_height = settings.tile_height,
            num_threads = thread_pool.current_num_threads(),
            "created execution context"
        );

        Ok(Self::new(thread_pool, tiling_specification))
    }

    pub fn thread_pool(&self) -> &Arc<ThreadPool> {
        &self.thread_pool
    }

    pub fn tiling_specification(&self) -> TilingSpecification {
        self.tiling_specification
    }

    /// The tiling of a grid of `shape`
    pub fn tiling_strategy(&self, shape: GridShape2D) -> TilingStrategy {
        self.tiling_specification.strategy(shape)
    }

    #[must_use]
    pub fn with_tiling_specification(mut self, tiling_specification: TilingSpecification) -> Self {
        self.tiling_specification = tiling_specification;
        self
    }
}

impl TestDefault for ExecutionContext {
    /// A single worker thread and small tiles
    ///
    /// # Panics
    ///
    /// If the thread pool cannot be created.
    ///
    fn test_default() -> Self {
        let thread_pool =
            create_rayon_thread_pool(1).expect("a single thread pool should be creatable");

        Self::new(thread_pool, TilingSpecification::test_default())
    }
}
