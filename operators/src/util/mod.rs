pub mod config;
pub mod number_statistics;
mod rayon;
pub mod statistics;

use crate::error::Error;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use self::rayon::create_rayon_thread_pool;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Get a read lock and recover from poisoning
pub fn safe_read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Get a write lock and recover from poisoning
pub fn safe_write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
