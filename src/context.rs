pub const PAGE_SIZE: usize = 4 * 1024; // 4KiB

/// Callee-saved register file, swapped wholesale by `switch_context`.
/// Field order and size are shared with the assembly in `asm/`.
#[cfg(target_arch = "x86_64")]
#[repr(C)]
pub struct Registers {
    rbx: u64,
    rbp: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
    rsp: u64,
}

#[cfg(target_arch = "x86_64")]
const _: () = assert!(std::mem::size_of::<Registers>() == 0x38);

#[cfg(target_arch = "aarch64")]
#[repr(C)]
pub struct Registers {
    // Floating-point registers d8-d15 (each pair is 16 bytes)
    d8_d9: [u64; 2],
    d10_d11: [u64; 2],
    d12_d13: [u64; 2],
    d14_d15: [u64; 2],
    // General-purpose registers x19-x28 (each pair is 16 bytes)
    x19_x20: [u64; 2],
    x21_x22: [u64; 2],
    x23_x24: [u64; 2],
    x25_x26: [u64; 2],
    x27_x28: [u64; 2],
    // Frame pointer and link register
    x29_x30: [u64; 2],
    // Stack pointer
    sp: u64,
}

#[cfg(target_arch = "aarch64")]
const _: () = assert!(std::mem::size_of::<Registers>() == 0xa8);

#[cfg(target_arch = "x86_64")]
impl Registers {
    /// Builds a context that begins executing `entry` the first time it is
    /// switched to. The entry address is planted on the new stack so the
    /// switch's final `ret` lands on it, with the alignment the SysV ABI
    /// expects at function entry.
    pub fn new(stack: &Stack, entry: extern "C" fn() -> !) -> Self {
        let mut top = stack.top() & !15;
        top -= 16;
        unsafe {
            (top as *mut u64).write(entry as usize as u64);
            // null return address terminates backtraces
            (top as *mut u64).add(1).write(0);
        }

        Registers {
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rsp: top,
        }
    }

    pub fn zeroed() -> Self {
        Registers {
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rsp: 0,
        }
    }
}

#[cfg(target_arch = "aarch64")]
impl Registers {
    /// Builds a context that begins executing `entry` the first time it is
    /// switched to: the link register holds the entry address, so the
    /// switch's final `ret` jumps there with a 16-byte-aligned sp.
    pub fn new(stack: &Stack, entry: extern "C" fn() -> !) -> Self {
        Registers {
            d8_d9: [0, 0],
            d10_d11: [0, 0],
            d12_d13: [0, 0],
            d14_d15: [0, 0],
            x19_x20: [0, 0],
            x21_x22: [0, 0],
            x23_x24: [0, 0],
            x25_x26: [0, 0],
            x27_x28: [0, 0],
            x29_x30: [0, entry as usize as u64],
            sp: stack.top() & !15,
        }
    }

    pub fn zeroed() -> Self {
        Registers {
            d8_d9: [0, 0],
            d10_d11: [0, 0],
            d12_d13: [0, 0],
            d14_d15: [0, 0],
            x19_x20: [0, 0],
            x21_x22: [0, 0],
            x23_x24: [0, 0],
            x25_x26: [0, 0],
            x27_x28: [0, 0],
            x29_x30: [0, 0],
            sp: 0,
        }
    }
}

unsafe extern "C" {
    /// Saves the calling thread's callee-saved state into `from` and
    /// resumes `to`. Returns only when a later switch targets `from`.
    pub fn switch_context(from: *mut Registers, to: *const Registers);
}

/// Heap-backed thread stack. The lowest page is mapped PROT_NONE so an
/// overflow faults instead of scribbling over neighbouring allocations.
pub struct Stack {
    base: *mut u8,
    layout: std::alloc::Layout,
}

impl Stack {
    pub fn alloc(size: usize) -> crate::error::Result<Self> {
        let layout = std::alloc::Layout::from_size_align(size, PAGE_SIZE).map_err(|_| {
            crate::error::Error::InvalidStackSize {
                size,
                min: crate::types::MIN_STACK_SIZE,
            }
        })?;

        let base = unsafe { std::alloc::alloc(layout) };
        if base.is_null() {
            return Err(crate::error::Error::StackAllocation);
        }

        // guard page at the low end; the stack grows down toward it
        let guard = std::ptr::NonNull::new(base.cast::<std::ffi::c_void>()).unwrap();
        if let Err(errno) =
            unsafe { nix::sys::mman::mprotect(guard, PAGE_SIZE, nix::sys::mman::ProtFlags::PROT_NONE) }
        {
            unsafe { std::alloc::dealloc(base, layout) };
            return Err(crate::error::Error::SystemResource(format!(
                "mprotect failed: {}",
                errno
            )));
        }

        Ok(Stack { base, layout })
    }

    pub fn top(&self) -> u64 {
        self.base as u64 + self.layout.size() as u64
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            // lift the guard before the allocator reuses the page
            let guard = std::ptr::NonNull::new_unchecked(self.base.cast::<std::ffi::c_void>());
            let _ = nix::sys::mman::mprotect(
                guard,
                PAGE_SIZE,
                nix::sys::mman::ProtFlags::PROT_READ | nix::sys::mman::ProtFlags::PROT_WRITE,
            );
            std::alloc::dealloc(self.base, self.layout);
        }
    }
}
