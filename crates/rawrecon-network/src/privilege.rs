//! Privilege checks for raw socket / `AF_PACKET` access.
//!
//! The engine never attempts privilege escalation; it only checks and
//! reports, surfacing permission errors as `Error::Privilege`.

use rawrecon_core::{Error, Result};

/// Check whether the current process can plausibly open raw sockets.
///
/// # Platform-specific behavior
///
/// - **Linux/macOS**: true if running as root (UID 0).
/// - Anything else: unsupported, reported as [`Error::Privilege`].
pub fn has_raw_socket_capability() -> Result<bool> {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        unix_has_capability()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(Error::Privilege(
            "unsupported platform for privilege checking".to_string(),
        ))
    }
}

/// Fail fast, with a user-facing message, if raw socket access is unavailable.
pub fn check_privileges() -> Result<()> {
    if !has_raw_socket_capability()? {
        #[cfg(target_os = "linux")]
        let msg = "insufficient privileges for raw socket access; run with sudo or grant \
                   CAP_NET_RAW with: sudo setcap cap_net_raw+eip /path/to/rawrecon";

        #[cfg(target_os = "macos")]
        let msg = "insufficient privileges for raw socket access; run with sudo";

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let msg = "insufficient privileges for raw socket access";

        return Err(Error::Privilege(msg.to_string()));
    }

    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn unix_has_capability() -> Result<bool> {
    use nix::unistd::Uid;

    if Uid::effective().is_root() {
        tracing::debug!("running as root (UID 0)");
        return Ok(true);
    }

    tracing::debug!("not running as root; CAP_NET_RAW is not independently probed");
    Ok(false)
}
