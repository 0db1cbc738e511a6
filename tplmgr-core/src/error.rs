//! Structured errors surfaced at pool-construction time.
//!
//! Every other fallible operation in this crate reports failure as a plain
//! `bool` (see the crate-level docs), since the spec treats allocation
//! failure, precondition violations and a closed pool as flat "did it work"
//! signals. Construction is the one place a richer error carries its weight:
//! spawning the first OS thread can fail for reasons worth distinguishing
//! from "not enough memory for a queue node". Hand-rolled rather than built
//! on `thiserror`, matching the teacher's own un-derived `ThreadPoolBuildError`.

use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum ErrorKind {
    /// Spawning an OS thread for a worker failed.
    IoError(io::Error),
    /// `ThreadPoolBuilder::num_threads` resolved to a requested size, but the
    /// pool still ended up with zero workers after clamping logic (defensive;
    /// should not occur since the builder always clamps to at least one).
    NoThreadsAvailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::IoError(err) => write!(f, "failed to spawn worker thread: {err}"),
            ErrorKind::NoThreadsAvailable => write!(f, "thread pool would have zero workers"),
        }
    }
}

#[derive(Debug)]
pub struct ThreadPoolBuildError {
    kind: ErrorKind,
}

impl ThreadPoolBuildError {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        ThreadPoolBuildError { kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for ThreadPoolBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread pool build failed: {}", self.kind)
    }
}

impl Error for ThreadPoolBuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            ErrorKind::IoError(err) => Some(err),
            ErrorKind::NoThreadsAvailable => None,
        }
    }
}
