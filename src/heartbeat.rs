//! Liveness heartbeat.
//!
//! A one-shot timer that re-arms itself: each time it fires the liveness flag is set, and
//! the timer is armed again with the current period. The period is measured from the time
//! of firing, so drift accumulates.
use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Duration;

/// Default re-arm period.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy)]
struct State {
    alive: bool,
    period: Duration,
    fired: u32,
}

pub struct Heartbeat<M: RawMutex> {
    state: Mutex<M, Cell<State>>,
}

impl<M: RawMutex> Heartbeat<M> {
    pub const fn new(period: Duration) -> Self {
        Self {
            state: Mutex::new(Cell::new(State {
                alive: false,
                period,
                fired: 0,
            })),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let r = f(&mut state);
            cell.set(state);
            r
        })
    }

    pub fn period(&self) -> Duration {
        self.state.lock(|cell| cell.get().period)
    }

    /// Change the period. An already armed timer keeps its deadline; the new period
    /// applies from the next re-arm.
    pub fn set_period(&self, period: Duration) {
        self.update(|state| state.period = period);
    }

    /// Timer callback. Sets the liveness flag and returns the period to re-arm with.
    pub fn fire(&self) -> Duration {
        self.update(|state| {
            state.alive = true;
            state.fired = state.fired.wrapping_add(1);
            state.period
        })
    }

    /// Read and clear the liveness flag.
    pub fn take(&self) -> bool {
        self.update(|state| core::mem::replace(&mut state.alive, false))
    }

    /// Read the liveness flag without clearing it.
    pub fn is_alive(&self) -> bool {
        self.state.lock(|cell| cell.get().alive)
    }

    /// Number of times the timer has fired.
    pub fn fired(&self) -> u32 {
        self.state.lock(|cell| cell.get().fired)
    }
}

impl<M: RawMutex> Default for Heartbeat<M> {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_PERIOD)
    }
}
