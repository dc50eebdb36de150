//! Host timer queue backing `setTimeout` and friends.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rquickjs::{Function, Persistent};

pub(crate) struct Timer {
    pub due: Instant,
    pub interval: Option<Duration>,
    pub callback: Persistent<Function<'static>>,
}

/// Pending timers keyed by id. Ids are never reused within one interpreter.
#[derive(Default)]
pub(crate) struct TimerQueue {
    next_id: u32,
    timers: BTreeMap<u32, Timer>,
}

impl TimerQueue {
    /// Schedule `callback` after `delay`, repeating when `repeat` is set.
    pub fn schedule(
        &mut self,
        callback: Persistent<Function<'static>>,
        delay: Duration,
        repeat: bool,
    ) -> u32 {
        self.next_id += 1;
        let id = self.next_id;
        self.timers.insert(
            id,
            Timer {
                due: Instant::now() + delay,
                interval: repeat.then_some(delay),
                callback,
            },
        );
        id
    }

    pub fn cancel(&mut self, id: u32) {
        self.timers.remove(&id);
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// When the earliest timer is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.due).min()
    }

    /// Take the earliest timer if it is due at `now`.
    ///
    /// Interval timers stay queued (rescheduled from `now`) so that the
    /// callback can cancel itself; the returned callback is a clone.
    pub fn pop_due(&mut self, now: Instant) -> Option<Persistent<Function<'static>>> {
        // Ties resolve by id, i.e. scheduling order.
        let (&id, _) = self
            .timers
            .iter()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(id, t)| (t.due, **id))?;

        let timer = self.timers.get_mut(&id)?;
        match timer.interval {
            Some(interval) => {
                timer.due = now + interval.max(Duration::from_millis(1));
                Some(timer.callback.clone())
            }
            None => self.timers.remove(&id).map(|t| t.callback),
        }
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.timers.clear();
    }
}
