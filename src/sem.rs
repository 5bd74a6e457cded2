//! Counting semaphore built on the scheduler's block/unblock primitives.
//!
//! There is no lock object anywhere in the runtime: the tick-masking
//! bracket around each operation is the only mutual exclusion, and it is
//! sufficient because every thread, the tick handler included, executes on
//! the same OS thread.

struct SemState {
    count: usize,
    waiters: crate::queue::Queue<crate::runtime::Tcb>,
}

pub struct Semaphore {
    state: std::cell::UnsafeCell<SemState>,
}

// shared across green threads that all live on one OS thread; the
// disable/enable bracket keeps the tick handler out of the critical
// sections
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// A semaphore holding `count` resource units.
    pub fn new(count: usize) -> Self {
        Semaphore {
            state: std::cell::UnsafeCell::new(SemState {
                count,
                waiters: crate::queue::Queue::new(),
            }),
        }
    }

    /// Consumes the semaphore. Handed back unchanged while threads are
    /// still queued on it.
    pub fn destroy(self) -> std::result::Result<(), Self> {
        let waiting = unsafe { (*self.state.get()).waiters.len() };
        if waiting != 0 { Err(self) } else { Ok(()) }
    }

    /// Takes one resource unit, blocking until one is available. The
    /// count check and the enqueue-self-and-block step form one critical
    /// section; the yield inside `block` re-enables the tick, so the
    /// bracket is re-asserted the moment the thread resumes, before the
    /// count is checked again.
    pub fn down(&self) -> crate::error::Result<()> {
        crate::preempt::disable();
        let state = self.state.get();

        unsafe {
            while (*state).count == 0 {
                let Some(me) = crate::runtime::current() else {
                    // nothing can ever wake us outside of a run
                    crate::preempt::enable();
                    return Err(crate::error::Error::NotInitialized);
                };
                let _ = (*state).waiters.enqueue(me.as_raw());
                crate::runtime::block();
                crate::preempt::disable();
            }
            (*state).count -= 1;
        }

        crate::preempt::enable();
        Ok(())
    }

    /// Releases one resource unit, waking the longest-blocked waiter if
    /// any. The woken thread re-checks the count itself, so a third thread
    /// slipping in first costs the waiter another pass through its wait
    /// loop, never a unit.
    pub fn up(&self) {
        crate::preempt::disable();
        let state = self.state.get();

        unsafe {
            if let Ok(waiter) = (*state).waiters.dequeue() {
                let _ = crate::runtime::unblock(crate::runtime::ThreadRef::from_raw(waiter));
            }
            (*state).count += 1;
        }

        crate::preempt::enable();
    }
}
