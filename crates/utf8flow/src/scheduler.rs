//! Single-threaded cooperative scheduling.
//!
//! A [`Scheduler`] owns a queue of [`Task`]s ordered by deadline. Running a
//! task yields a [`Step`]: either a delay after which the task is enqueued
//! again, or `Done`. Nothing preempts a running task; long work is broken
//! into cycles by the tasks themselves. Tasks with equal deadlines run in
//! the order they were enqueued.
//!
//! Time comes from a [`Clock`]. [`ManualClock`] is virtual time for tests
//! and simulations; [`SystemClock`] (feature `std`) is the wall clock.

use alloc::{boxed::Box, collections::BTreeMap, collections::BinaryHeap, rc::Rc};
use core::{cell::Cell, cmp::Reverse, fmt, time::Duration};

/// A monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed epoch.
    fn now(&self) -> Duration;

    /// Block until `now() >= deadline`.
    fn sleep_until(&self, deadline: Duration);
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Duration) {
        (**self).sleep_until(deadline);
    }
}

/// Virtual time shared between clones. Sleeping jumps straight to the
/// deadline; [`ManualClock::advance`] simulates time spent working.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

/// Wall-clock time measured from construction.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// What a task wants after one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Run again after the given delay.
    Reschedule(Duration),
    /// Retire the task.
    Done,
}

/// One cooperatively scheduled unit of work.
pub trait Task {
    /// Run one cycle. `now` is the clock reading when the cycle started.
    fn run(&mut self, now: Duration) -> Step;
}

impl<F: FnMut(Duration) -> Step> Task for F {
    fn run(&mut self, now: Duration) -> Step {
        self(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: Duration,
    seq: u64,
    id: TaskId,
}

pub struct Scheduler<C: Clock> {
    clock: C,
    queue: BinaryHeap<Reverse<Entry>>,
    tasks: BTreeMap<TaskId, Box<dyn Task>>,
    next_seq: u64,
    next_id: u64,
}

impl<C: Clock + fmt::Debug> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("clock", &self.clock)
            .field("queued", &self.queue.len())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            queue: BinaryHeap::new(),
            tasks: BTreeMap::new(),
            next_seq: 0,
            next_id: 0,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Enqueue `task` to run as soon as possible.
    pub fn spawn(&mut self, task: impl Task + 'static) -> TaskId {
        self.spawn_after(Duration::ZERO, task)
    }

    pub fn spawn_after(&mut self, delay: Duration, task: impl Task + 'static) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(id, Box::new(task));
        self.enqueue(id, self.clock.now().saturating_add(delay));
        id
    }

    /// Stop scheduling `id`. A cycle already running is not interrupted.
    /// Returns `false` if the task was unknown or already retired.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Deadline of the earliest live task.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.discard_cancelled();
        self.queue.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Run the earliest task if its deadline has passed.
    pub fn run_once(&mut self) -> Option<TaskId> {
        let deadline = self.next_deadline()?;
        if deadline > self.clock.now() {
            return None;
        }
        self.run_next()
    }

    /// Run tasks, sleeping between deadlines, until none remain. Returns the
    /// number of cycles run.
    pub fn run_until_idle(&mut self) -> usize {
        let mut cycles = 0;
        while let Some(deadline) = self.next_deadline() {
            self.clock.sleep_until(deadline);
            if self.run_next().is_some() {
                cycles += 1;
            }
        }
        cycles
    }

    fn run_next(&mut self) -> Option<TaskId> {
        let Reverse(entry) = self.queue.pop()?;
        let mut task = self.tasks.remove(&entry.id)?;
        let now = self.clock.now();
        match task.run(now) {
            Step::Reschedule(delay) => {
                self.tasks.insert(entry.id, task);
                self.enqueue(entry.id, self.clock.now().saturating_add(delay));
            }
            Step::Done => {}
        }
        Some(entry.id)
    }

    fn enqueue(&mut self, id: TaskId, deadline: Duration) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { deadline, seq, id }));
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.queue.peek() {
            if self.tasks.contains_key(&entry.id) {
                break;
            }
            self.queue.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, vec, vec::Vec};
    use core::cell::RefCell;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn equal_deadlines_run_fifo() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock);
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            scheduler.spawn(move |_: Duration| {
                log.borrow_mut().push(name);
                Step::Done
            });
        }
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn reschedule_waits_for_delay() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut remaining = 3;
        scheduler.spawn(move |now: Duration| {
            log.borrow_mut().push(now);
            remaining -= 1;
            if remaining == 0 {
                Step::Done
            } else {
                Step::Reschedule(ms(10))
            }
        });
        assert_eq!(scheduler.run_until_idle(), 3);
        assert_eq!(*seen.borrow(), vec![ms(0), ms(10), ms(20)]);
        assert_eq!(clock.now(), ms(20));
    }

    #[test]
    fn delay_counts_from_end_of_cycle() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let work = clock.clone();
        scheduler.spawn(move |now: Duration| {
            log.borrow_mut().push(now);
            work.advance(ms(4));
            if now >= ms(10) {
                Step::Done
            } else {
                Step::Reschedule(ms(6))
            }
        });
        scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), vec![ms(0), ms(10)]);
    }

    #[test]
    fn run_once_respects_deadline() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let id = scheduler.spawn_after(ms(5), |_: Duration| Step::Done);
        assert_eq!(scheduler.run_once(), None);
        clock.advance(ms(5));
        assert_eq!(scheduler.run_once(), Some(id));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn huge_delays_saturate_deadline() {
        let clock = ManualClock::new();
        clock.advance(ms(5));
        let mut scheduler = Scheduler::new(clock.clone());
        let late = scheduler.spawn_after(Duration::MAX, |_: Duration| Step::Done);
        assert_eq!(scheduler.next_deadline(), Some(Duration::MAX));
        assert!(scheduler.cancel(late));

        let id = scheduler.spawn(|_: Duration| Step::Reschedule(Duration::MAX));
        assert_eq!(scheduler.run_once(), Some(id));
        assert_eq!(scheduler.next_deadline(), Some(Duration::MAX));
        assert_eq!(scheduler.run_once(), None);

        clock.advance(Duration::MAX);
        assert_eq!(clock.now(), Duration::MAX);
        assert_eq!(scheduler.run_once(), Some(id));
    }

    #[test]
    fn cancelled_tasks_do_not_run() {
        let mut scheduler = Scheduler::new(ManualClock::new());
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let id = scheduler.spawn(move |_: Duration| {
            flag.set(true);
            Step::Done
        });
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert_eq!(scheduler.run_until_idle(), 0);
        assert!(!ran.get());
    }
}
