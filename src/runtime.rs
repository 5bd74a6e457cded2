//! Scheduler core: TCB lifecycle, the ready/zombie queues, and the
//! context-switching primitives every other module builds on.
//!
//! All of the state here is confined to the OS thread that called
//! [`run`]; the only concurrent writer is the tick handler, which runs on
//! that same thread and is fenced off by the `preempt::disable`/`enable`
//! brackets around every read-modify-write of shared state.

/// Thread control block. Owns the thread's saved register state and its
/// stack; both are released together when the idle driver reaps the TCB
/// after the thread has been switched out for the last time.
pub struct Tcb {
    id: u64,
    state: crate::types::ThreadState,
    regs: crate::context::Registers,
    stack: Option<crate::context::Stack>,
    entry: Option<Box<dyn crate::types::Executable>>,
}

impl Tcb {
    fn new(entry: Box<dyn crate::types::Executable>, stack: crate::context::Stack) -> Self {
        Tcb {
            id: rand::random::<u64>(),
            state: crate::types::ThreadState::Ready,
            regs: crate::context::Registers::new(&stack, thread_start),
            stack: Some(stack),
            entry: Some(entry),
        }
    }

    /// The driver's own TCB. It executes on the caller's stack, so there
    /// is nothing to allocate; its register file is filled in the first
    /// time it is switched away from.
    fn bootstrap() -> Self {
        Tcb {
            id: rand::random::<u64>(),
            state: crate::types::ThreadState::Running,
            regs: crate::context::Registers::zeroed(),
            stack: None,
            entry: None,
        }
    }
}

/// Copyable handle to a thread, valid for identity comparisons and
/// [`unblock`] for as long as the thread has not been reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadRef {
    tcb: *mut Tcb,
    id: u64,
}

// handles cross between green threads freely; every dereference happens on
// the single OS thread the runtime is confined to
unsafe impl Send for ThreadRef {}

impl ThreadRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn as_raw(&self) -> *mut Tcb {
        self.tcb
    }

    pub(crate) fn from_raw(tcb: *mut Tcb) -> Self {
        ThreadRef {
            tcb,
            id: unsafe { (*tcb).id },
        }
    }
}

struct Runtime {
    ready: crate::queue::Queue<Tcb>,
    zombie: crate::queue::Queue<Tcb>,
    current: *mut Tcb,
    idle: *mut Tcb,
    stack_size: usize,
}

static mut RUNTIME: Option<Box<Runtime>> = None;

fn runtime_ptr() -> *mut Runtime {
    unsafe {
        let slot = &raw mut RUNTIME;
        match (*slot).as_deref_mut() {
            Some(rt) => rt as *mut Runtime,
            None => std::ptr::null_mut(),
        }
    }
}

/// Handle to the running thread, or `None` outside of [`run`].
pub fn current() -> Option<ThreadRef> {
    let rt = runtime_ptr();
    if rt.is_null() {
        None
    } else {
        Some(ThreadRef::from_raw(unsafe { (*rt).current }))
    }
}

/// Creates a thread executing `f` and queues it as ready. The whole
/// sequence is one critical section: it is called both from the driver and
/// from already-running threads that a tick could interrupt.
pub fn spawn<F>(f: F) -> crate::error::Result<ThreadRef>
where
    F: FnOnce() + Send + 'static,
{
    crate::preempt::disable();
    let result = spawn_boxed(Box::new(f));
    crate::preempt::enable();
    result
}

fn spawn_boxed(entry: Box<dyn crate::types::Executable>) -> crate::error::Result<ThreadRef> {
    let rt = runtime_ptr();
    if rt.is_null() {
        return Err(crate::error::Error::NotInitialized);
    }

    unsafe {
        // a failed stack allocation unwinds here with nothing else to undo
        let stack = crate::context::Stack::alloc((*rt).stack_size)?;
        let tcb = Box::into_raw(Box::new(Tcb::new(entry, stack)));
        (*rt).ready.enqueue(tcb)?;
        Ok(ThreadRef::from_raw(tcb))
    }
}

/// Hands the processor to the next ready thread. Re-queues the caller only
/// if it is still RUNNING; a thread that blocked or exited already left
/// through a different queue. Returns when the caller is scheduled again.
pub fn yield_now() {
    crate::preempt::disable();

    let rt = runtime_ptr();
    if rt.is_null() {
        crate::preempt::enable();
        return;
    }

    unsafe {
        let previous = (*rt).current;
        if (*previous).state == crate::types::ThreadState::Running {
            (*previous).state = crate::types::ThreadState::Ready;
            let _ = (*rt).ready.enqueue(previous);
        }

        // the idle thread is always queued or running, so a live runtime
        // always has somewhere to go
        let next = (*rt).ready.dequeue().expect("no runnable thread");
        (*next).state = crate::types::ThreadState::Running;
        (*rt).current = next;

        // the mask stays in place across the switch so a tick cannot land
        // between the bookkeeping and the swap; whoever is resumed next
        // unmasks on its own side (below, or in the entry trampoline)
        crate::context::switch_context(&raw mut (*previous).regs, &raw const (*next).regs);
        crate::preempt::enable();
    }
}

/// Marks the caller blocked and yields. It will not run again until some
/// other thread passes its handle to [`unblock`]; there is no timeout.
pub fn block() {
    let rt = runtime_ptr();
    if rt.is_null() {
        return;
    }
    unsafe {
        (*(*rt).current).state = crate::types::ThreadState::Blocked;
    }
    yield_now();
}

/// Makes a blocked thread runnable again. Callers that must be atomic
/// against the tick (the semaphore) wrap this in their own bracket.
pub fn unblock(thread: ThreadRef) -> crate::error::Result<()> {
    let rt = runtime_ptr();
    if rt.is_null() {
        return Err(crate::error::Error::NotInitialized);
    }
    unsafe {
        (*thread.tcb).state = crate::types::ThreadState::Ready;
        (*rt).ready.enqueue(thread.tcb)
    }
}

/// Terminates the calling thread. Its TCB moves to the zombie queue for
/// the idle driver to reap; a thread cannot free the stack it is executing
/// on. Never returns.
pub fn exit() -> ! {
    let rt = runtime_ptr();
    if rt.is_null() {
        panic!("exit() called outside of a running scheduler");
    }

    crate::preempt::disable();
    unsafe {
        let me = (*rt).current;
        (*me).state = crate::types::ThreadState::Zombie;
        let _ = (*rt).zombie.enqueue(me);
    }
    // the mask taken here is released by whichever thread resumes next
    yield_now();
    unreachable!("zombie thread was scheduled again");
}

/// Entry trampoline for fresh threads: runs the spawn closure, then falls
/// into `exit` when it returns.
extern "C" fn thread_start() -> ! {
    // the switch that got us here was made under the mask
    crate::preempt::enable();

    let rt = runtime_ptr();
    unsafe {
        let me = (*rt).current;
        if let Some(entry) = (*me).entry.take() {
            entry.execute();
        }
    }
    exit()
}

/// Top-level driver: sets up the runtime, spawns the first thread, then
/// plays idle thread, yielding and reaping zombies until every thread has
/// exited.
pub(crate) fn run<F>(config: crate::types::SchedulerConfig, entry: F) -> crate::error::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    unsafe {
        let slot = &raw mut RUNTIME;
        if (*slot).is_some() {
            return Err(crate::error::Error::AlreadyInitialized);
        }

        let idle = Box::into_raw(Box::new(Tcb::bootstrap()));
        *slot = Some(Box::new(Runtime {
            ready: crate::queue::Queue::new(),
            zombie: crate::queue::Queue::new(),
            current: idle,
            idle,
            stack_size: config.stack_size,
        }));

        crate::preempt::start(config.preempt, config.preemption_interval_ms);

        if let Err(err) = spawn(entry) {
            crate::preempt::stop();
            teardown();
            return Err(err);
        }

        loop {
            let rt = runtime_ptr();
            if (*rt).ready.is_empty() {
                break;
            }
            yield_now();
            reap_zombies();
        }

        crate::preempt::stop();
        teardown();
        Ok(())
    }
}

/// Releases every TCB on the zombie queue: context, stack and TCB memory
/// go together, strictly after the thread stopped running.
unsafe fn reap_zombies() {
    crate::preempt::disable();
    let rt = runtime_ptr();
    unsafe {
        while let Ok(dead) = (*rt).zombie.dequeue() {
            let mut tcb = Box::from_raw(dead);
            drop(tcb.stack.take());
            drop(tcb);
        }
    }
    crate::preempt::enable();
}

unsafe fn teardown() {
    unsafe {
        let slot = &raw mut RUNTIME;
        if let Some(rt) = (*slot).take() {
            let Runtime {
                ready,
                zombie,
                idle,
                ..
            } = *rt;
            drop(Box::from_raw(idle));
            // the driver loop drained both queues before we got here
            let _ = ready.destroy();
            let _ = zombie.destroy();
        }
    }
}
