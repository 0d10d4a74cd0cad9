use std::{
    mem::take,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

/// A cheaply-cloneable condvar-backed signal shared between a foreground
/// caller and a background worker thread.
///
/// Cloning shares the same underlying mutex/condvar pair; [`cancel_all`]
/// wakes every clone waiting in [`wait_condvar`].
#[derive(Debug, Clone, Default)]
pub struct Context<T>(Arc<(Mutex<T>, Condvar)>);

impl<T> Context<T>
where
    T: Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signal value and wakes every waiter.
    pub fn cancel_all(&self, val: T) -> Result<(), PoisonError<MutexGuard<'_, T>>> {
        let (lck, cvar) = &*self.0;
        let mut lck = lck.lock()?;
        *lck = val;
        cvar.notify_all();
        Ok(())
    }

    /// Blocks until [`cancel_all`] is called, returning the value it was
    /// called with and resetting the internal state to the default.
    pub fn wait_condvar(&self) -> Result<T, PoisonError<MutexGuard<'_, T>>> {
        let (lck, cvar) = &*self.0;
        let mut lck = lck.lock()?;
        lck = cvar.wait(lck)?;
        let current = take(&mut *lck);
        Ok(current)
    }

    pub(crate) fn get_lock_cvar(&self) -> &(Mutex<T>, Condvar) {
        &self.0
    }

    pub fn reset(&self) -> Result<(), PoisonError<MutexGuard<'_, T>>> {
        let (lck, _) = &*self.0;
        let mut lck = lck.lock()?;
        *lck = <T as Default>::default();
        Ok(())
    }
}

impl Context<bool> {
    /// Blocks until the signal is set to `true`. Unlike [`wait_condvar`],
    /// this checks the current value before waiting, so a signal raised
    /// before the call is not lost.
    pub fn wait_true(&self) {
        let (lck, cvar) = &*self.0;
        let guard = lck.lock().unwrap();
        let _ = cvar.wait_while(guard, |v| !*v).unwrap();
    }

    /// Like [`wait_true`], but gives up after `timeout` and reports whether
    /// the signal fired in time.
    pub fn wait_true_timeout(&self, timeout: std::time::Duration) -> bool {
        let (lck, cvar) = &*self.0;
        let guard = lck.lock().unwrap();
        if *guard {
            return true;
        }
        let (guard, _) = cvar.wait_timeout_while(guard, timeout, |v| !*v).unwrap();
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wait_true_timeout_returns_false_on_timeout() {
        let ctx: Context<bool> = Context::new();
        assert!(!ctx.wait_true_timeout(Duration::from_millis(30)));
    }

    #[test]
    fn wait_true_timeout_sees_signal_already_set() {
        let ctx: Context<bool> = Context::new();
        ctx.cancel_all(true).unwrap();
        assert!(ctx.wait_true_timeout(Duration::from_millis(30)));
    }

    #[test]
    fn wait_true_wakes_on_signal_from_other_thread() {
        let ctx: Context<bool> = Context::new();
        let ctx2 = ctx.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            ctx2.cancel_all(true).unwrap();
        });
        ctx.wait_true();
        handle.join().unwrap();
    }
}
