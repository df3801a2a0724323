//! Single-flight request cells.
//!
//! Every request of a compilation unit is a [`RequestCell`]: the first caller
//! computes the value, concurrent callers block until it is ready, and all of
//! them receive the same `Arc`. Failures are shared the same way, except that
//! an interrupted computation is retried by the next caller whose
//! cancellation token is still live.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{CompileError, Result};

/// How often a blocked waiter re-checks its cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(20);

#[derive(Debug)]
enum CellState<T> {
    Pending,
    Running,
    Ready(Arc<T>),
    Failed(CompileError),
}

/// Observable state of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Running,
    Ready,
    Failed,
}

#[derive(Debug)]
pub(crate) struct RequestCell<T> {
    state: Mutex<CellState<T>>,
    done: Condvar,
}

impl<T> Default for RequestCell<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CellState::Pending),
            done: Condvar::new(),
        }
    }
}

impl<T> RequestCell<T> {
    /// Return the shared result, computing it on this thread if nobody has.
    pub(crate) fn get_or_compute(
        &self,
        cancel: &CancellationToken,
        compute: impl FnOnce() -> Result<T>,
    ) -> Result<Arc<T>> {
        {
            let mut state = self.state.lock();
            loop {
                match &*state {
                    CellState::Ready(value) => return Ok(value.clone()),
                    CellState::Failed(err) if err.is_interrupted() && !cancel.is_cancelled() => {
                        *state = CellState::Pending;
                    }
                    CellState::Failed(err) => return Err(err.clone()),
                    CellState::Running => {
                        if cancel.is_cancelled() {
                            return Err(CompileError::Interrupted);
                        }
                        self.done.wait_for(&mut state, CANCEL_POLL);
                    }
                    CellState::Pending => {
                        if cancel.is_cancelled() {
                            return Err(CompileError::Interrupted);
                        }
                        *state = CellState::Running;
                        break;
                    }
                }
            }
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(compute));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                self.finish(CellState::Failed(CompileError::Internal(
                    "request computation panicked".into(),
                )));
                panic::resume_unwind(payload);
            }
        };

        match result {
            Ok(value) => {
                let value = Arc::new(value);
                self.finish(CellState::Ready(value.clone()));
                Ok(value)
            }
            Err(err) => {
                self.finish(CellState::Failed(err.clone()));
                Err(err)
            }
        }
    }

    fn finish(&self, next: CellState<T>) {
        *self.state.lock() = next;
        self.done.notify_all();
    }

    /// The result, if it is ready.
    pub(crate) fn peek(&self) -> Option<Arc<T>> {
        match &*self.state.lock() {
            CellState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub(crate) fn state(&self) -> RequestState {
        match &*self.state.lock() {
            CellState::Pending => RequestState::Pending,
            CellState::Running => RequestState::Running,
            CellState::Ready(_) => RequestState::Ready,
            CellState::Failed(_) => RequestState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_single_flight_across_threads() {
        let cell: Arc<RequestCell<u32>> = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));
        let token = CancellationToken::new();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                let token = token.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cell.get_or_compute(&token, || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(30));
                        Ok(42)
                    })
                    .unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in &results {
            assert!(Arc::ptr_eq(result, &results[0]));
        }
        assert_eq!(cell.state(), RequestState::Ready);
    }

    #[test]
    fn test_failure_is_shared() {
        let cell: RequestCell<u32> = RequestCell::default();
        let token = CancellationToken::new();
        let err = cell
            .get_or_compute(&token, || Err(CompileError::Internal("bad".into())))
            .unwrap_err();
        assert!(matches!(err, CompileError::Internal(_)));
        let again = cell.get_or_compute(&token, || Ok(1)).unwrap_err();
        assert!(matches!(again, CompileError::Internal(_)));
    }

    #[test]
    fn test_interrupted_result_is_retried_with_fresh_token() {
        let cell: RequestCell<u32> = RequestCell::default();
        let old = CancellationToken::new();
        old.cancel();
        assert!(cell.get_or_compute(&old, || Ok(1)).unwrap_err().is_interrupted());

        let fresh = CancellationToken::new();
        let first = cell.get_or_compute(&fresh, || Err(CompileError::Interrupted));
        assert!(first.unwrap_err().is_interrupted());
        assert_eq!(*cell.get_or_compute(&fresh, || Ok(5)).unwrap(), 5);
    }

    #[test]
    fn test_waiters_observe_cancellation() {
        let cell: Arc<RequestCell<u32>> = Arc::default();
        let token = CancellationToken::new();
        let started = Arc::new(Barrier::new(2));

        let worker = {
            let cell = cell.clone();
            let token = token.clone();
            let started = started.clone();
            thread::spawn(move || {
                cell.get_or_compute(&token, || {
                    started.wait();
                    while !token.is_cancelled() {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(CompileError::Interrupted)
                })
            })
        };

        started.wait();
        let waiter = {
            let cell = cell.clone();
            let token = token.clone();
            thread::spawn(move || cell.get_or_compute(&token, || Ok(0)))
        };
        thread::sleep(Duration::from_millis(30));
        token.cancel();

        assert!(worker.join().unwrap().unwrap_err().is_interrupted());
        assert!(waiter.join().unwrap().unwrap_err().is_interrupted());
    }

    #[test]
    fn test_panic_marks_cell_failed() {
        let cell: Arc<RequestCell<u32>> = Arc::default();
        let token = CancellationToken::new();
        let panicking = {
            let cell = cell.clone();
            let token = token.clone();
            thread::spawn(move || {
                let _ = cell.get_or_compute(&token, || panic!("collaborator bug"));
            })
        };
        assert!(panicking.join().is_err());
        assert_eq!(cell.state(), RequestState::Failed);
        assert!(matches!(
            cell.get_or_compute(&token, || Ok(1)),
            Err(CompileError::Internal(_))
        ));
    }
}
