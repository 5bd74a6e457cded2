//! Timer-driven preemption.
//!
//! A ticker thread delivers SIGVTALRM to the scheduler's OS thread at a
//! fixed interval; the handler forces a yield. `disable`/`enable` bracket
//! every mutation of shared scheduler state by masking the tick for the
//! scheduler thread, which is the runtime's only critical-section
//! primitive.

pub const DEFAULT_HZ: u64 = 100;

static TICK_STOP: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);
static mut TICKER_HANDLE: Option<std::thread::JoinHandle<()>> = None;

extern "C" fn tick_handler(signum: i32) {
    if signum == nix::sys::signal::Signal::SIGVTALRM as i32 {
        crate::runtime::yield_now();
    }
}

fn tick_set() -> nix::sys::signal::SigSet {
    let mut set = nix::sys::signal::SigSet::empty();
    set.add(nix::sys::signal::Signal::SIGVTALRM);
    set
}

/// Masks tick delivery for the calling thread. Not reference counted:
/// every critical section calls this exactly once before `enable`.
pub(crate) fn disable() {
    nix::sys::signal::sigprocmask(
        nix::sys::signal::SigmaskHow::SIG_BLOCK,
        Some(&tick_set()),
        None,
    )
    .expect("sigprocmask failed");
}

/// Unmasks tick delivery for the calling thread. Also clears the implicit
/// mask the kernel applies while the tick handler itself is running, which
/// is what lets a handler-initiated yield switch to a thread that can be
/// preempted again.
pub(crate) fn enable() {
    nix::sys::signal::sigprocmask(
        nix::sys::signal::SigmaskHow::SIG_UNBLOCK,
        Some(&tick_set()),
        None,
    )
    .expect("sigprocmask failed");
}

/// Arms the periodic tick. With `enabled` false nothing is installed and
/// `disable`/`enable` stay safe no-op brackets. Failures installing the
/// handler are fatal: a runtime that cannot arm its timer cannot keep the
/// guarantees preemption exists to provide.
pub(crate) fn start(enabled: bool, interval_ms: u64) {
    if !enabled {
        return;
    }

    unsafe {
        let action = nix::sys::signal::SigAction::new(
            nix::sys::signal::SigHandler::Handler(tick_handler),
            nix::sys::signal::SaFlags::SA_RESTART,
            nix::sys::signal::SigSet::empty(),
        );
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGVTALRM, &action)
            .expect("failed to install tick handler");
    }

    TICK_STOP.store(false, std::sync::atomic::Ordering::Relaxed);

    // deliver directly to the scheduler's OS thread so its signal mask
    // gates the tick exactly; carried as usize because pthread_t is a
    // pointer type on some platforms
    let target = nix::sys::pthread::pthread_self() as usize;
    let handle = std::thread::spawn(move || {
        let interval = std::time::Duration::from_millis(interval_ms);

        while !TICK_STOP.load(std::sync::atomic::Ordering::Relaxed) {
            std::thread::sleep(interval);

            if !TICK_STOP.load(std::sync::atomic::Ordering::Relaxed) {
                let _ = nix::sys::pthread::pthread_kill(
                    target as nix::sys::pthread::Pthread,
                    nix::sys::signal::Signal::SIGVTALRM,
                );
            }
        }
    });

    unsafe {
        let handle_ptr = &raw mut TICKER_HANDLE;
        *handle_ptr = Some(handle);
    }
}

/// Disarms the tick and detaches the handler. Idempotent, and safe to call
/// when `start` armed nothing.
pub(crate) fn stop() {
    TICK_STOP.store(true, std::sync::atomic::Ordering::Relaxed);

    unsafe {
        let handle_ptr = &raw mut TICKER_HANDLE;
        if let Some(handle) = (*handle_ptr).take() {
            let _ = handle.join();
        }

        // ignore rather than default-terminate, in case a tick was already
        // in flight when the ticker stopped
        let action = nix::sys::signal::SigAction::new(
            nix::sys::signal::SigHandler::SigIgn,
            nix::sys::signal::SaFlags::empty(),
            nix::sys::signal::SigSet::empty(),
        );
        let _ = nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGVTALRM, &action);
    }
}
