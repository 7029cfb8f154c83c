//! Scoped process file-creation mask.

/// Restores the previous process umask when dropped.
///
/// The umask is process-wide: keep a single guard alive for the whole run, from the binary entry point.
/// On non-unix targets this is a no-op.
#[derive(Debug)]
#[must_use = "the previous umask is restored as soon as the guard is dropped"]
pub struct UmaskGuard {
    #[cfg_attr(not(unix), allow(dead_code))]
    previous: u32,
}

impl UmaskGuard {
    /// Apply `mask` until the returned guard is dropped.
    #[cfg(unix)]
    pub fn set(mask: u32) -> Self {
        // SAFETY: `umask` cannot fail and only swaps the process mask.
        let previous = unsafe { libc::umask(mask as libc::mode_t) };

        tracing::debug!("Set process umask to {mask:03o}, was {previous:03o}");

        Self { previous: previous.into() }
    }

    #[cfg(not(unix))]
    pub fn set(_mask: u32) -> Self {
        Self { previous: 0 }
    }

    #[inline]
    pub fn previous(&self) -> u32 {
        self.previous
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            // SAFETY: see `UmaskGuard::set`.
            unsafe { libc::umask(self.previous as libc::mode_t) };

            tracing::debug!("Restored process umask to {:03o}", self.previous);
        }
    }
}
