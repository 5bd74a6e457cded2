pub struct Clotho {
    config: crate::types::SchedulerConfig,
}

impl Clotho {
    pub fn new(config: crate::types::SchedulerConfig) -> Self {
        Clotho { config }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Drives `main_func` and every thread it spawns to completion.
    /// Returns once all of them have exited.
    pub fn run<F>(&self, main_func: F) -> crate::error::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let stack_size = self.config.stack_size;
        if stack_size < crate::types::MIN_STACK_SIZE {
            return Err(crate::error::Error::InvalidStackSize {
                size: stack_size,
                min: crate::types::MIN_STACK_SIZE,
            });
        }

        crate::runtime::run(self.config.clone(), main_func)
    }
}

pub struct ConfigBuilder {
    config: crate::types::SchedulerConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder {
            config: crate::types::SchedulerConfig::default(),
        }
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = size;
        self
    }

    pub fn preemption(mut self, enabled: bool) -> Self {
        self.config.preempt = enabled;
        self
    }

    pub fn preemption_interval(mut self, ms: u64) -> Self {
        self.config.preemption_interval_ms = ms;
        self
    }

    pub fn build(self) -> Clotho {
        Clotho {
            config: self.config,
        }
    }
}

/// Runs `main_func` under the default configuration, with or without
/// timer-driven preemption.
pub fn run<F>(preempt: bool, main_func: F) -> crate::error::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    Clotho::builder().preemption(preempt).build().run(main_func)
}
