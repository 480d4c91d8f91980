//! created → ready → closed state shared by every processor

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::OnceCell;

use super::ports::BackendError;
use crate::errors::Result;

pub struct Lifecycle<T> {
    backend: &'static str,
    state: OnceCell<T>,
    closed: AtomicBool,
}

impl<T> Lifecycle<T> {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            state: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Build and install the ready state; a second call fails
    pub fn initialize(&self, build: impl FnOnce() -> Result<T>) -> Result<&T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error().into());
        }
        if self.state.get().is_some() {
            return Err(self.already_initialized().into());
        }
        let state = build()?;
        self.state
            .set(state)
            .map_err(|_| self.already_initialized())?;
        self.ready().map_err(Into::into)
    }

    /// Ready state, or the lifecycle error explaining why there is none
    pub fn ready(&self) -> std::result::Result<&T, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(self.closed_error());
        }
        self.state.get().ok_or_else(|| BackendError::NotInitialized {
            backend: self.backend.to_string(),
        })
    }

    /// Mark closed; returns the state on the first close only
    pub fn close(&self) -> Option<&T> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.state.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> BackendError {
        BackendError::Closed {
            backend: self.backend.to_string(),
        }
    }

    fn already_initialized(&self) -> BackendError {
        BackendError::AlreadyInitialized {
            backend: self.backend.to_string(),
        }
    }
}
