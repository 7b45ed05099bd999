//! Interrupt-disable critical section for the script layer.
//!
//! This is not a mutex: acquiring it disables interrupts, which keeps the interrupt-context
//! producers (packet handler, ATT callbacks, heartbeat timer) out while the script performs a
//! multi-step read of shared state. It offers no protection against other threads.
use core::cell::UnsafeCell;
use core::marker::PhantomData;

/// Script-facing critical section.
///
/// `try_lock` always succeeds. Acquisitions nest: interrupts are restored only when the
/// outermost holder unlocks.
pub struct IrqMutex {
    depth: UnsafeCell<u32>,
    restore: UnsafeCell<critical_section::RestoreState>,
}

// Safety: both cells are only touched while the critical section is held.
unsafe impl Sync for IrqMutex {}

impl Default for IrqMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqMutex {
    pub const fn new() -> Self {
        Self {
            depth: UnsafeCell::new(0),
            restore: UnsafeCell::new(critical_section::RestoreState::invalid()),
        }
    }

    /// Disable interrupts. Always reports success.
    pub fn try_lock(&self) -> bool {
        let restore = unsafe { critical_section::acquire() };
        // Safety: we are inside the critical section.
        unsafe {
            let depth = &mut *self.depth.get();
            if *depth == 0 {
                self.restore.get().write(restore);
            } else {
                // Nested: interrupts are already off and stay off.
                critical_section::release(restore);
            }
            *depth += 1;
        }
        true
    }

    /// Re-enable interrupts, if this releases the outermost acquisition.
    pub fn unlock(&self) {
        if !self.is_locked() {
            warn!("[irq] unlock without matching lock");
            return;
        }
        // Safety: depth > 0, so the critical section is held by us.
        unsafe {
            let depth = &mut *self.depth.get();
            *depth -= 1;
            if *depth == 0 {
                let restore = self.restore.get().read();
                critical_section::release(restore);
            }
        }
    }

    pub fn is_locked(&self) -> bool {
        critical_section::with(|_| unsafe { *self.depth.get() > 0 })
    }

    /// Scoped acquisition, released when the guard drops.
    pub fn lock(&self) -> IrqGuard<'_> {
        self.try_lock();
        IrqGuard {
            mutex: self,
            _not_send: PhantomData,
        }
    }

    /// Run `f` with interrupts disabled.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }
}

/// Holds the critical section until dropped.
pub struct IrqGuard<'a> {
    mutex: &'a IrqMutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for IrqGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
