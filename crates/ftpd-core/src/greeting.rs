//! Hello-string templating.
//!
//! `HELLO_STRING` may contain `%v` (daemon version), `%h` (host name of the
//! local address) and `%i` (local address). Resolving `%h` costs a reverse
//! lookup, so callers check [`needs_hostname`] first.

use std::net::IpAddr;

/// Values substituted into the hello string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVars<'a> {
    pub version: &'a str,
    pub hostname: Option<&'a str>,
    pub local_ip: IpAddr,
}

/// Returns true if the template references the local host name.
pub fn needs_hostname(template: &str) -> bool {
    template.contains("%h")
}

/// Renders the hello string.
///
/// Without a resolved host name `%h` falls back to the numeric address.
pub fn render_hello(template: &str, vars: &HelloVars<'_>) -> String {
    let ip = vars.local_ip.to_string();
    let host = vars.hostname.unwrap_or(&ip);

    template
        .replace("%v", vars.version)
        .replace("%h", host)
        .replace("%i", &ip)
}

/// Splits a MOTD file into greeting lines.
pub fn motd_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn vars(hostname: Option<&str>) -> HelloVars<'_> {
        HelloVars {
            version: "0.3.0",
            hostname,
            local_ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
        }
    }

    #[test]
    fn test_render_all_tokens() {
        let hello = render_hello("ftpd %v at %h (%i) ready.", &vars(Some("ftp.example.org")));
        assert_eq!(hello, "ftpd 0.3.0 at ftp.example.org (192.0.2.10) ready.");
    }

    #[test]
    fn test_hostname_falls_back_to_ip() {
        let hello = render_hello("%h", &vars(None));
        assert_eq!(hello, "192.0.2.10");
    }

    #[test]
    fn test_needs_hostname() {
        assert!(needs_hostname("at %h"));
        assert!(!needs_hostname("ftpd %v at %i ready."));
    }

    #[test]
    fn test_repeated_tokens() {
        assert_eq!(render_hello("%v/%v", &vars(None)), "0.3.0/0.3.0");
    }

    #[test]
    fn test_motd_lines() {
        assert_eq!(motd_lines("one\r\ntwo\n"), vec!["one", "two"]);
        assert!(motd_lines("").is_empty());
    }
}
