//! Timer subsystem.
//!
//! Every armed timer is a task on the runtime holding only a completion
//! sender. The table of armed timers lives here and is mutated only by the
//! dispatch loop. Each arm gets a fresh generation; the loop checks it with
//! [`TimeResolver::accept`] before submitting a tick, so completions that
//! were already queued when their timer was cleared never reach the core.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::TimerSlots;
use crate::protocol::{Duration, Instant, RequestId, TimeRequest, TimeResponse, TimerId};
use crate::resolvers::{Completion, CompletionSender, Resolved};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Interval,
    OneShot,
}

struct ArmedTimer {
    timer: TimerId,
    kind: TimerKind,
    generation: u64,
    task: JoinHandle<()>,
}

pub struct TimeResolver {
    slots: TimerSlots,
    runtime: Handle,
    completions: CompletionSender,
    armed: Vec<ArmedTimer>,
    next_generation: u64,
}

impl TimeResolver {
    pub fn new(slots: TimerSlots, runtime: Handle, completions: CompletionSender) -> Self {
        Self {
            slots,
            runtime,
            completions,
            armed: Vec::new(),
            next_generation: 1,
        }
    }

    /// Resolve one time request. Only `Now` answers synchronously.
    pub fn resolve(&mut self, id: RequestId, request: TimeRequest) -> Option<TimeResponse> {
        match request {
            TimeRequest::Now => Some(TimeResponse::Now {
                instant: Instant::now(),
            }),
            TimeRequest::Interval { id: timer, duration } => {
                self.arm_interval(id, timer, duration);
                None
            }
            TimeRequest::Clear { id: timer } => {
                self.clear(timer);
                None
            }
            TimeRequest::NotBefore { id: timer, instant } => {
                let delay = instant.saturating_duration_since(Instant::now());
                self.arm_one_shot(id, timer, delay, TimeResponse::InstantArrived { id: timer });
                None
            }
            TimeRequest::NotAfter { id: timer, duration } => {
                self.arm_one_shot(
                    id,
                    timer,
                    duration.into(),
                    TimeResponse::DurationElapsed { id: timer },
                );
                None
            }
        }
    }

    /// Whether a completion from `generation` may still be delivered.
    ///
    /// One-shot timers are forgotten once accepted.
    pub fn accept(&mut self, generation: u64) -> bool {
        let Some(position) = self
            .armed
            .iter()
            .position(|armed| armed.generation == generation)
        else {
            return false;
        };

        if self.armed[position].kind == TimerKind::OneShot {
            self.armed.swap_remove(position);
        }
        true
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    pub fn is_armed(&self, timer: TimerId) -> bool {
        self.armed.iter().any(|armed| armed.timer == timer)
    }

    pub fn disarm_all(&mut self) {
        for armed in self.armed.drain(..) {
            armed.task.abort();
        }
    }

    fn clear(&mut self, timer: TimerId) {
        let slots = self.slots;
        let disarmed = self.disarm_where(|armed| occupies_slot(slots, armed, timer));
        if disarmed == 0 {
            tracing::trace!(timer = %timer, "clear for a timer that is not armed");
        } else {
            tracing::debug!(timer = %timer, disarmed, "timer cleared");
        }
    }

    fn disarm_where(&mut self, predicate: impl Fn(&ArmedTimer) -> bool) -> usize {
        let before = self.armed.len();
        let (disarmed, kept): (Vec<_>, Vec<_>) =
            self.armed.drain(..).partition(|armed| predicate(armed));
        for armed in disarmed {
            armed.task.abort();
        }
        self.armed = kept;
        before - self.armed.len()
    }

    fn next_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    fn arm_interval(&mut self, request: RequestId, timer: TimerId, duration: Duration) {
        let slots = self.slots;
        self.disarm_where(|armed| occupies_slot(slots, armed, timer));

        if duration.is_zero() {
            tracing::warn!(request = %request, timer = %timer, "refusing to arm interval with zero period");
            return;
        }

        let generation = self.next_generation();
        let period: std::time::Duration = duration.into();
        let completions = self.completions.clone();

        let task = self.runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let tick = TimeResponse::Tick {
                    id: timer,
                    instant: Instant::now(),
                };
                if completions
                    .send(Completion::timer(request, generation, Resolved::Time(tick)))
                    .is_err()
                {
                    break;
                }
            }
        });

        tracing::debug!(request = %request, timer = %timer, period_ns = duration.nanos, "interval armed");
        self.armed.push(ArmedTimer {
            timer,
            kind: TimerKind::Interval,
            generation,
            task,
        });
    }

    fn arm_one_shot(
        &mut self,
        request: RequestId,
        timer: TimerId,
        delay: std::time::Duration,
        response: TimeResponse,
    ) {
        self.disarm_where(|armed| armed.kind == TimerKind::OneShot && armed.timer == timer);

        let generation = self.next_generation();
        let completions = self.completions.clone();

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = completions.send(Completion::timer(
                request,
                generation,
                Resolved::Time(response),
            ));
        });

        tracing::debug!(request = %request, timer = %timer, delay_ms = delay.as_millis() as u64, "one-shot timer armed");
        self.armed.push(ArmedTimer {
            timer,
            kind: TimerKind::OneShot,
            generation,
            task,
        });
    }
}

/// In single-slot mode any interval occupies the slot; otherwise only
/// timers with the same id collide.
fn occupies_slot(slots: TimerSlots, armed: &ArmedTimer, timer: TimerId) -> bool {
    armed.timer == timer || (slots == TimerSlots::Single && armed.kind == TimerKind::Interval)
}

impl Drop for TimeResolver {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
