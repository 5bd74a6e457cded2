pub trait Executable: Send + 'static {
    fn execute(self: Box<Self>);
}

impl<F> Executable for F
where
    F: FnOnce() + Send + 'static,
{
    fn execute(self: Box<Self>) {
        self();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
    Zombie,
}

pub const MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub stack_size: usize,
    pub preempt: bool,
    pub preemption_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            stack_size: 2 * 1024 * 1024, // 2MB
            preempt: false,
            preemption_interval_ms: 1000 / crate::preempt::DEFAULT_HZ,
        }
    }
}
