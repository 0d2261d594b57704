//! Host identity lookup used by the greeting route.

use std::io;

// ---

/// Source of the name this process reports about its host.
///
/// Routes hold this behind an `Arc<dyn HostIdentity>` so a lookup failure
/// can be simulated in tests without touching the real machine.
pub trait HostIdentity: Send + Sync {
    /// Return the host's network name, or the lookup error.
    fn hostname(&self) -> io::Result<String>;
}

/// Resolves the hostname from the operating system on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl HostIdentity for SystemHost {
    // ---
    fn hostname(&self) -> io::Result<String> {
        // ---
        let name = hostname::get()?.to_string_lossy().into_owned();
        if name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "operating system returned an empty hostname",
            ));
        }
        Ok(name)
    }
}
