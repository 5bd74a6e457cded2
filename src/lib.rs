pub mod queue;
pub mod scheduler;

mod context;
mod error;
mod preempt;
mod runtime;
mod sem;
mod types;

pub use error::{Error, Result};
pub use queue::Queue;
pub use runtime::{ThreadRef, block, current, exit, spawn, unblock, yield_now};
pub use scheduler::{Clotho, ConfigBuilder, run};
pub use sem::Semaphore;
pub use types::{MIN_STACK_SIZE, SchedulerConfig, ThreadState};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    // the runtime is a per-process singleton, so tests that start it must
    // not overlap
    fn serial() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn threads_alternate_in_round_robin_order() {
        let _guard = serial();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        let outer = std::sync::Arc::clone(&order);
        crate::run(false, move || {
            let inner = std::sync::Arc::clone(&outer);
            crate::spawn(move || {
                for _ in 0..3 {
                    inner.lock().unwrap().push("b");
                    crate::yield_now();
                }
            })
            .unwrap();

            for _ in 0..3 {
                outer.lock().unwrap().push("a");
                crate::yield_now();
            }
        })
        .unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "a", "b", "a", "b"]);
    }

    #[test]
    fn blocked_thread_runs_again_only_after_unblock() {
        let _guard = serial();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let parked = std::sync::Arc::new(std::sync::Mutex::new(None));

        let order_main = std::sync::Arc::clone(&order);
        let parked_main = std::sync::Arc::clone(&parked);
        crate::run(false, move || {
            *parked_main.lock().unwrap() = crate::current();

            let order_waker = std::sync::Arc::clone(&order_main);
            let parked_waker = std::sync::Arc::clone(&parked_main);
            crate::spawn(move || {
                order_waker.lock().unwrap().push("waking");
                let target = parked_waker.lock().unwrap().take().unwrap();
                crate::unblock(target).unwrap();
            })
            .unwrap();

            order_main.lock().unwrap().push("blocking");
            crate::block();
            order_main.lock().unwrap().push("resumed");
        })
        .unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["blocking", "waking", "resumed"]
        );
    }

    #[test]
    fn semaphore_wakes_waiters_in_fifo_order() {
        let _guard = serial();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sem = std::sync::Arc::new(crate::Semaphore::new(0));

        let order_main = std::sync::Arc::clone(&order);
        let sem_main = std::sync::Arc::clone(&sem);
        crate::run(false, move || {
            for name in ["w1", "w2"] {
                let order_waiter = std::sync::Arc::clone(&order_main);
                let sem_waiter = std::sync::Arc::clone(&sem_main);
                crate::spawn(move || {
                    order_waiter.lock().unwrap().push(format!("{name} wait"));
                    sem_waiter.down().unwrap();
                    order_waiter.lock().unwrap().push(format!("{name} woke"));
                })
                .unwrap();
            }

            // let both waiters park
            crate::yield_now();

            order_main.lock().unwrap().push("post one".to_string());
            sem_main.up();
            crate::yield_now();

            order_main.lock().unwrap().push("post two".to_string());
            sem_main.up();
            crate::yield_now();
        })
        .unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec![
                "w1 wait".to_string(),
                "w2 wait".to_string(),
                "post one".to_string(),
                "w1 woke".to_string(),
                "post two".to_string(),
                "w2 woke".to_string(),
            ]
        );
    }

    #[test]
    fn semaphore_counts_without_blocking_when_units_remain() {
        let _guard = serial();
        let sem = crate::Semaphore::new(2);

        sem.down().unwrap();
        sem.down().unwrap();
        // no scheduler, so a third down cannot park
        assert_eq!(sem.down(), Err(crate::Error::NotInitialized));

        sem.up();
        sem.down().unwrap();
        assert!(sem.destroy().is_ok());
    }

    #[test]
    fn exit_skips_the_rest_of_the_thread_body() {
        let _guard = serial();
        let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        let log_main = std::sync::Arc::clone(&log);
        crate::run(false, move || {
            log_main.lock().unwrap().push("first");
            let logged = log_main.lock().unwrap().len();
            if logged == 1 {
                crate::exit();
            }
            log_main.lock().unwrap().push("second");
        })
        .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn run_rejects_reentry() {
        let _guard = serial();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));

        let seen_main = std::sync::Arc::clone(&seen);
        crate::run(false, move || {
            *seen_main.lock().unwrap() = crate::run(false, || {}).err();
        })
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), Some(crate::Error::AlreadyInitialized));
    }

    #[test]
    fn scheduler_operations_outside_a_run() {
        let _guard = serial();
        assert_eq!(crate::current(), None);
        assert!(matches!(
            crate::spawn(|| {}),
            Err(crate::Error::NotInitialized)
        ));

        // harmless no-ops with no runtime to act on
        crate::yield_now();
        crate::block();

        // a handle that outlived its run is rejected before it is touched
        let parked = std::sync::Arc::new(std::sync::Mutex::new(None));
        let parked_main = std::sync::Arc::clone(&parked);
        crate::run(false, move || {
            *parked_main.lock().unwrap() = crate::current();
        })
        .unwrap();
        let stale = parked.lock().unwrap().take().unwrap();
        assert_eq!(crate::unblock(stale), Err(crate::Error::NotInitialized));
    }

    #[test]
    fn undersized_stacks_are_rejected_up_front() {
        let _guard = serial();
        let scheduler = crate::Clotho::builder().stack_size(4 * 1024).build();
        assert!(matches!(
            scheduler.run(|| {}),
            Err(crate::Error::InvalidStackSize { .. })
        ));
        // nothing was set up, so the runtime is still free
        assert_eq!(crate::current(), None);
    }

    #[test]
    fn preemption_interrupts_spinning_threads() {
        let _guard = serial();

        static SPIN_A: AtomicBool = AtomicBool::new(true);
        static SPIN_B: AtomicBool = AtomicBool::new(true);
        static A_DONE: AtomicBool = AtomicBool::new(false);
        static B_DONE: AtomicBool = AtomicBool::new(false);
        SPIN_A.store(true, Ordering::Relaxed);
        SPIN_B.store(true, Ordering::Relaxed);
        A_DONE.store(false, Ordering::Relaxed);
        B_DONE.store(false, Ordering::Relaxed);

        // bounded so a broken tick fails the test instead of hanging it
        fn spin_while(flag: &AtomicBool) -> bool {
            let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
            while flag.load(Ordering::Relaxed) {
                if std::time::Instant::now() > deadline {
                    return false;
                }
                std::hint::spin_loop();
            }
            true
        }

        fn clear_b() {
            SPIN_B.store(false, Ordering::Relaxed);
        }

        fn spin_then_release_a() {
            // runs only if the first thread is preempted mid-spin
            let done = spin_while(&SPIN_B);
            B_DONE.store(done, Ordering::Relaxed);
            SPIN_A.store(false, Ordering::Relaxed);
        }

        let scheduler = crate::Clotho::builder()
            .preemption(true)
            .preemption_interval(5)
            .build();
        scheduler
            .run(|| {
                crate::spawn(spin_then_release_a).unwrap();
                crate::spawn(clear_b).unwrap();
                let done = spin_while(&SPIN_A);
                A_DONE.store(done, Ordering::Relaxed);
            })
            .unwrap();

        assert!(B_DONE.load(Ordering::Relaxed));
        assert!(A_DONE.load(Ordering::Relaxed));
    }
}
