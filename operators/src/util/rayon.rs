use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::Result;

/// Tries to create a global thread pool that does not spawn any threads.
/// This prevents accidentally using it.
///
/// Hopefully, rayon either provides a real method for achieving this in the future
/// or does not fix this behavior.
fn rayon_destroy_global_thread_pool() {
    let global_pool = ThreadPoolBuilder::new()
        .num_threads(1)
        .spawn_handler(|_thread| {
            Err(std::io::Error::other(
                "Do not spawn rayon global pool on purpose",
            ))
        })
        .build_global();

    if global_pool.is_ok() {
        tracing::warn!("the global rayon thread pool could not be disabled");
    }
}

/// Create a rayon thread pool with the given number of threads.
/// Use `num_threads = 0` for auto number of threads.
pub fn create_rayon_thread_pool(num_threads: usize) -> Result<Arc<ThreadPool>> {
    rayon_destroy_global_thread_pool();

    let thread_pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|index| format!("rastercalc-worker-{index}"))
        .build()?;

    tracing::debug!(
        num_threads = thread_pool.current_num_threads(),
        "created thread pool"
    );

    Ok(Arc::new(thread_pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(
        expected = "The global thread pool has not been initialized.: ThreadPoolBuildError { kind: GlobalPoolAlreadyInitialized }"
    )]
    fn global_rayon_fail() {
        create_rayon_thread_pool(0).unwrap();

        rayon::current_num_threads();
    }

    #[test]
    fn it_creates_pools_of_the_requested_size() {
        let thread_pool = create_rayon_thread_pool(2).unwrap();

        assert_eq!(thread_pool.current_num_threads(), 2);
        assert_eq!(thread_pool.install(rayon::current_num_threads), 2);
    }
}
