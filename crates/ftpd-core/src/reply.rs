//! FTP reply formatting.
//!
//! A reply is a three-digit code and one or more text lines. Single-line
//! replies go out as `CODE text\r\n`; multi-line replies prefix every line
//! but the last with `CODE-`.

use std::fmt;

/// 200 Command okay.
pub const COMMAND_OK: u16 = 200;
/// 215 System type.
pub const SYSTEM_TYPE: u16 = 215;
/// 220 Service ready for new user.
pub const SERVICE_READY: u16 = 220;
/// 221 Service closing control connection.
pub const CLOSING_CONTROL: u16 = 221;
/// 421 Service not available, closing control connection.
pub const SERVICE_UNAVAILABLE: u16 = 421;
/// 500 Syntax error, command unrecognized.
pub const SYNTAX_ERROR: u16 = 500;
/// 502 Command not implemented.
pub const NOT_IMPLEMENTED: u16 = 502;

/// A reply ready to be written on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    /// Creates a reply. Embedded line breaks turn it into a multi-line reply.
    pub fn new(code: u16, text: impl AsRef<str>) -> Self {
        let lines: Vec<String> = text
            .as_ref()
            .split('\n')
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        Self { code, lines }
    }

    /// Creates a multi-line reply from individual lines.
    pub fn multiline<I, S>(code: u16, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self { code, lines }
    }

    /// Returns the reply code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Returns the text lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Formats the reply as it is sent on the wire.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.lines.len().saturating_sub(1);
        for (i, line) in self.lines.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            write!(f, "{}{}{}\r\n", self.code, sep, line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let reply = Reply::new(SERVICE_READY, "ftpd ready.");
        assert_eq!(reply.to_wire(), "220 ftpd ready.\r\n");
    }

    #[test]
    fn test_embedded_newlines_become_multiline() {
        let reply = Reply::new(
            SERVICE_UNAVAILABLE,
            "Could not get peer IP address.\r\nTransport endpoint is not connected.",
        );
        assert_eq!(
            reply.to_wire(),
            "421-Could not get peer IP address.\r\n421 Transport endpoint is not connected.\r\n"
        );
    }

    #[test]
    fn test_multiline() {
        let reply = Reply::multiline(SERVICE_READY, ["Welcome", "to ftpd"]);
        assert_eq!(reply.to_wire(), "220-Welcome\r\n220 to ftpd\r\n");
        assert_eq!(reply.lines().len(), 2);
    }

    #[test]
    fn test_empty_multiline() {
        let reply = Reply::multiline(COMMAND_OK, Vec::<String>::new());
        assert_eq!(reply.to_wire(), "200 \r\n");
    }
}
