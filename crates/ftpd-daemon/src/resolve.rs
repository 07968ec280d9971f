//! Reverse name lookups.

use std::net::IpAddr;

use dns_lookup::lookup_addr;
use tracing::debug;

/// Resolves `ip` to a host name.
///
/// The resolver call blocks, so it runs on the blocking pool. Returns `None`
/// when the lookup fails; callers fall back to the numeric address.
pub async fn reverse_lookup(ip: IpAddr) -> Option<String> {
    match tokio::task::spawn_blocking(move || lookup_addr(&ip)).await {
        Ok(Ok(name)) if !name.is_empty() => Some(name),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!(ip = %ip, error = %e, "Reverse lookup failed");
            None
        }
        Err(e) => {
            debug!(ip = %ip, error = %e, "Reverse lookup task failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_loopback_resolves_to_something() {
        // Whatever the resolver says, the call completes and never yields an
        // empty name.
        let name = reverse_lookup(IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert!(name.map_or(true, |n| !n.is_empty()));
    }
}
