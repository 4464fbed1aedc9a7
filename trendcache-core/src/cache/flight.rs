//! Per-index single-flight slots.
//!
//! The first caller to miss on an index registers a `Flight` and computes;
//! later callers for the same index block on the flight's condvar and receive
//! a clone of the leader's outcome, error included.

use crate::error::{IndicatorError, Result};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

enum FlightState<V> {
    Running,
    Finished(Result<V>),
}

pub(crate) struct Flight<V> {
    owner: ThreadId,
    state: Mutex<FlightState<V>>,
    done: Condvar,
}

impl<V: Clone> Flight<V> {
    pub(crate) fn new() -> Self {
        Self {
            owner: thread::current().id(),
            state: Mutex::new(FlightState::Running),
            done: Condvar::new(),
        }
    }

    /// True if the calling thread is the one computing this flight.
    pub(crate) fn is_owned_by_current_thread(&self) -> bool {
        self.owner == thread::current().id()
    }

    /// Blocks until the leader publishes an outcome.
    pub(crate) fn wait(&self) -> Result<V> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*state {
                FlightState::Finished(outcome) => return outcome.clone(),
                FlightState::Running => {
                    state = self
                        .done
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    pub(crate) fn finish(&self, outcome: Result<V>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = FlightState::Finished(outcome);
        self.done.notify_all();
    }

    pub(crate) fn abandon(&self, index: usize) {
        self.finish(Err(IndicatorError::Abandoned { index }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn waiter_receives_leader_outcome() {
        let flight = Arc::new(Flight::<f64>::new());
        let waiter = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || flight.wait())
        };
        flight.finish(Ok(4.5));
        assert_eq!(waiter.join().unwrap(), Ok(4.5));
    }

    #[test]
    fn abandoned_flight_reports_index() {
        let flight = Flight::<f64>::new();
        flight.abandon(9);
        assert_eq!(flight.wait(), Err(IndicatorError::Abandoned { index: 9 }));
    }

    #[test]
    fn owner_is_creating_thread() {
        let flight = Arc::new(Flight::<f64>::new());
        assert!(flight.is_owned_by_current_thread());
        let other = Arc::clone(&flight);
        let owned_elsewhere = thread::spawn(move || other.is_owned_by_current_thread())
            .join()
            .unwrap();
        assert!(!owned_elsewhere);
    }
}
