//! Typed view over the configuration with the daemon's defaults applied.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ConfigError, ConfigResult};

/// Port bound when `PORT` is unset or zero.
pub const DEFAULT_PORT: u16 = 21;

/// Control and data timeout when unset or zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Transfer buffer size when `XFER_BUFSIZE` is unset or zero.
pub const DEFAULT_XFER_BUFSIZE: usize = 4096;

/// Hello string when `HELLO_STRING` is unset.
pub const DEFAULT_HELLO: &str = "ftpd %v at %i ready.";

/// Address and port the listener binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenAddr {
    pub ip: IpAddr,
    pub port: u16,
}

impl ListenAddr {
    /// Returns the socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Returns true if this is the wildcard address.
    pub fn is_wildcard(&self) -> bool {
        self.ip.is_unspecified()
    }
}

impl Default for ListenAddr {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }
}

/// Settings used by the listener and every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bind address (`BIND_TO_ADDR`, `PORT`)
    pub listen: ListenAddr,

    /// Idle limit while waiting for a command (`CONTROL_TIMEOUT`)
    pub control_timeout: Duration,

    /// Stall limit during a data transfer (`DATA_TIMEOUT`)
    pub data_timeout: Duration,

    /// Buffer size handed to transfer code (`XFER_BUFSIZE`)
    pub xfer_bufsize: usize,

    /// Reverse-resolve the peer address (`RESOLVE_CLIENT_IP`)
    pub resolve_client_ip: bool,

    /// Greeting template (`HELLO_STRING`)
    pub hello_string: String,

    /// File sent as `220-` lines before the greeting (`MOTD_GLOBAL`)
    pub motd_global: Option<PathBuf>,

    /// Log destination (`LOGFILE`), standard error if unset
    pub log_file: Option<PathBuf>,

    /// Accounting record destination (`ACCOUNTING_FILE`)
    pub accounting_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: ListenAddr::default(),
            control_timeout: DEFAULT_TIMEOUT,
            data_timeout: DEFAULT_TIMEOUT,
            xfer_bufsize: DEFAULT_XFER_BUFSIZE,
            resolve_client_ip: false,
            hello_string: DEFAULT_HELLO.to_string(),
            motd_global: None,
            log_file: None,
            accounting_file: None,
        }
    }
}

impl Settings {
    /// Builds settings from the configuration lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a bind address that is not an
    /// IP address or a port above 65535.
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let listen = ListenAddr {
            ip: parse_bind_addr(config.get_option("BIND_TO_ADDR"))?,
            port: parse_port(config.get_option("PORT"))?,
        };

        let hello = config.get_option("HELLO_STRING");

        Ok(Self {
            listen,
            control_timeout: parse_timeout(config.get_option("CONTROL_TIMEOUT")),
            data_timeout: parse_timeout(config.get_option("DATA_TIMEOUT")),
            xfer_bufsize: match parse_unsigned(config.get_option("XFER_BUFSIZE")) {
                0 => DEFAULT_XFER_BUFSIZE,
                n => usize::try_from(n).unwrap_or(DEFAULT_XFER_BUFSIZE),
            },
            resolve_client_ip: config
                .get_option("RESOLVE_CLIENT_IP")
                .eq_ignore_ascii_case("yes"),
            hello_string: if hello.is_empty() {
                DEFAULT_HELLO.to_string()
            } else {
                hello.to_string()
            },
            motd_global: optional_path(config.get_option("MOTD_GLOBAL")),
            log_file: optional_path(config.get_option("LOGFILE")),
            accounting_file: optional_path(config.get_option("ACCOUNTING_FILE")),
        })
    }
}

/// `"any"` (any case) or empty binds the wildcard address.
fn parse_bind_addr(value: &str) -> ConfigResult<IpAddr> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("any") {
        return Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
    value
        .parse()
        .map_err(|_| ConfigError::invalid("BIND_TO_ADDR", value, "not an IP address"))
}

fn parse_port(value: &str) -> ConfigResult<u16> {
    match leading_digits(value.trim(), 10) {
        0 => Ok(DEFAULT_PORT),
        n => u16::try_from(n).map_err(|_| ConfigError::invalid("PORT", value, "port out of range")),
    }
}

fn parse_timeout(value: &str) -> Duration {
    match parse_unsigned(value) {
        0 => DEFAULT_TIMEOUT,
        secs => Duration::from_secs(secs),
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Parses an unsigned number with C-style base detection: `0x` prefix is
/// hexadecimal, a leading `0` is octal, anything else decimal. Parsing stops
/// at the first invalid digit; no digits at all yields zero.
pub fn parse_unsigned(value: &str) -> u64 {
    let value = value.trim();
    let value = value.strip_prefix('+').unwrap_or(value);

    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        leading_digits(hex, 16)
    } else if value.len() > 1 && value.starts_with('0') {
        leading_digits(value, 8)
    } else {
        leading_digits(value, 10)
    }
}

fn leading_digits(value: &str, radix: u32) -> u64 {
    value
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0u64, |acc, d| {
            acc.saturating_mul(u64::from(radix)).saturating_add(u64::from(d))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let mut config = Config::empty();
        for (k, v) in pairs {
            config.set_option(*k, *v);
        }
        config
    }

    #[test]
    fn test_defaults_from_empty_config() {
        let settings = Settings::from_config(&Config::empty()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.listen.port, 21);
        assert!(settings.listen.is_wildcard());
        assert_eq!(settings.control_timeout, Duration::from_secs(300));
        assert_eq!(settings.data_timeout, Duration::from_secs(300));
        assert_eq!(settings.xfer_bufsize, 4096);
    }

    #[test]
    fn test_port_unset_or_zero_binds_21() {
        let settings = Settings::from_config(&config(&[("PORT", "0")])).unwrap();
        assert_eq!(settings.listen.port, DEFAULT_PORT);

        let settings = Settings::from_config(&config(&[("PORT", "ftp")])).unwrap();
        assert_eq!(settings.listen.port, DEFAULT_PORT);
    }

    #[test]
    fn test_port_out_of_range() {
        let err = Settings::from_config(&config(&[("PORT", "70000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn test_bind_any_is_wildcard() {
        for value in ["any", "ANY", "", "  "] {
            let settings = Settings::from_config(&config(&[("BIND_TO_ADDR", value)])).unwrap();
            assert_eq!(settings.listen.ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
    }

    #[test]
    fn test_bind_explicit_address() {
        let settings = Settings::from_config(&config(&[
            ("BIND_TO_ADDR", "127.0.0.1"),
            ("PORT", "2121"),
        ]))
        .unwrap();
        assert_eq!(
            settings.listen.socket_addr(),
            "127.0.0.1:2121".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_bind_invalid_address() {
        let err = Settings::from_config(&config(&[("BIND_TO_ADDR", "ftp.example")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BIND_TO_ADDR"));
    }

    #[test]
    fn test_timeouts_and_bufsize() {
        let settings = Settings::from_config(&config(&[
            ("CONTROL_TIMEOUT", "60"),
            ("DATA_TIMEOUT", "0x10"),
            ("XFER_BUFSIZE", "65536"),
        ]))
        .unwrap();
        assert_eq!(settings.control_timeout, Duration::from_secs(60));
        assert_eq!(settings.data_timeout, Duration::from_secs(16));
        assert_eq!(settings.xfer_bufsize, 65536);
    }

    #[test]
    fn test_garbage_timeout_uses_default() {
        let settings = Settings::from_config(&config(&[("CONTROL_TIMEOUT", "soon")])).unwrap();
        assert_eq!(settings.control_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_string_options() {
        let settings = Settings::from_config(&config(&[
            ("RESOLVE_CLIENT_IP", "Yes"),
            ("HELLO_STRING", "hi %v"),
            ("MOTD_GLOBAL", "/etc/ftpd/motd"),
            ("LOGFILE", "/var/log/ftpd.log"),
        ]))
        .unwrap();
        assert!(settings.resolve_client_ip);
        assert_eq!(settings.hello_string, "hi %v");
        assert_eq!(settings.motd_global, Some(PathBuf::from("/etc/ftpd/motd")));
        assert_eq!(settings.log_file, Some(PathBuf::from("/var/log/ftpd.log")));
        assert_eq!(settings.accounting_file, None);
    }

    #[test]
    fn test_parse_unsigned_bases() {
        assert_eq!(parse_unsigned("300"), 300);
        assert_eq!(parse_unsigned("0x1f"), 31);
        assert_eq!(parse_unsigned("010"), 8);
        assert_eq!(parse_unsigned("0"), 0);
        assert_eq!(parse_unsigned("12abc"), 12);
        assert_eq!(parse_unsigned(""), 0);
        assert_eq!(parse_unsigned("-5"), 0);
    }
}
