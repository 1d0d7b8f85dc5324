//! Single-assignment memo cells.
//!
//! A [`Lazy`] defers a fallible computation until first use and stores the
//! first successful result for the lifetime of the cell. Failures are never
//! stored, so a later access retries the producer.
//!
//! Two variants exist:
//! - [`Lazy::racy`]: concurrent first accesses may each run the producer; the
//!   first value stored wins and the rest are dropped. Use it when the
//!   producer is pure.
//! - [`Lazy::double_checked`]: first initialization is serialized behind a
//!   mutex so the producer runs at most once per successful initialization.
//!   Use it when the producer has observable side effects.

use crate::Result;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

type Producer<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A memoized, lazily computed value.
pub struct Lazy<T> {
    cell: OnceLock<T>,
    init_lock: Option<Mutex<()>>,
    producer: Producer<T>,
}

impl<T> Lazy<T> {
    /// Create a cell whose producer may run more than once under contention.
    pub fn racy(producer: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: None,
            producer: Box::new(producer),
        }
    }

    /// Create a cell whose first initialization is guarded by a mutex.
    pub fn double_checked(producer: impl Fn() -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceLock::new(),
            init_lock: Some(Mutex::new(())),
            producer: Box::new(producer),
        }
    }

    /// Get the memoized value, computing it on first access.
    ///
    /// # Errors
    ///
    /// Returns the producer's error. The failure is not memoized.
    pub fn get(&self) -> Result<&T> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let Some(lock) = &self.init_lock else {
            let value = (self.producer)()?;
            return Ok(self.cell.get_or_init(|| value));
        };

        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = (self.producer)()?;
        Ok(self.cell.get_or_init(|| value))
    }

    /// The value, if it has already been computed.
    pub fn get_if_initialized(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Whether a value has been stored.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lazy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("value", &self.cell.get())
            .field("synchronized", &self.init_lock.is_some())
            .finish_non_exhaustive()
    }
}
