//! Connection greeting: the MOTD as `220-` lines, then the hello string.

use std::path::Path;

use tracing::debug;

use ftpd_core::reply::SERVICE_READY;
use ftpd_core::{motd_lines, needs_hostname, render_hello, HelloVars, Reply, VERSION};

use crate::error::ControlError;
use crate::resolve::reverse_lookup;

use super::{ControlChannel, SessionContext};

/// Builds the greeting reply.
///
/// An unreadable MOTD is skipped. `%h` triggers a reverse lookup of the
/// local address; the numeric address is used if it fails.
pub async fn build_greeting(
    hello_template: &str,
    motd: Option<&Path>,
    context: &SessionContext,
) -> Reply {
    let mut lines = match motd {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => motd_lines(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "MOTD not sent");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let hostname = if needs_hostname(hello_template) {
        reverse_lookup(context.local.ip()).await
    } else {
        None
    };

    lines.push(render_hello(
        hello_template,
        &HelloVars {
            version: VERSION,
            hostname: hostname.as_deref(),
            local_ip: context.local.ip(),
        },
    ));

    Reply::multiline(SERVICE_READY, lines)
}

/// Sends the greeting.
pub async fn send_greeting(
    control: &mut ControlChannel,
    hello_template: &str,
    motd: Option<&Path>,
    context: &SessionContext,
) -> Result<(), ControlError> {
    let greeting = build_greeting(hello_template, motd, context).await;
    control.send(&greeting).await
}
