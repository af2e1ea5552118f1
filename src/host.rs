/// Local host facts consumed during SAN assembly.
///
/// Injected rather than read from ambient process state so provisioning is
/// deterministic under test.
pub trait HostInfo {
    /// Canonical name of the local host, or `None` if it cannot be determined.
    fn hostname(&self) -> Option<String>;
}

/// Host facts from the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn hostname(&self) -> Option<String> {
        let name = hostname::get().ok()?.to_string_lossy().into_owned();
        if name.trim().is_empty() { None } else { Some(name) }
    }
}
