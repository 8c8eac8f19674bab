//! Host extraction from discovery command output.
//!
//! Two strategies, one per [`ScanMethod`](harbinger_core::ScanMethod)
//! variant: generic commands may print addresses anywhere in a line, while
//! the discovery tool is only trusted on its "scan report for" lines.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

const NMAP_REPORT_MARKER: &str = "scan report for";

fn dotted_quad() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("dotted-quad pattern compiles")
    })
}

/// True for four dot-separated decimal octets, each in 0..=255.
pub fn is_valid_ipv4(candidate: &str) -> bool {
    let mut octets = 0;
    for octet in candidate.split('.') {
        octets += 1;
        if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        match octet.parse::<u16>() {
            Ok(value) if value <= 255 => {}
            _ => return false,
        }
    }
    octets == 4
}

/// Extract IPv4 addresses from free-form command output.
///
/// A line that is exactly an address is taken as-is; otherwise every valid
/// dotted-quad inside the line is taken. Duplicates are dropped, keeping
/// first-seen order.
pub fn extract_addresses(output: &str) -> Vec<String> {
    let mut found = Vec::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_valid_ipv4(line) {
            found.push(line.to_string());
            continue;
        }
        found.extend(
            dotted_quad()
                .find_iter(line)
                .map(|m| m.as_str())
                .filter(|candidate| is_valid_ipv4(candidate))
                .map(String::from),
        );
    }
    dedup_in_order(found)
}

/// Extract hosts from discovery-tool text output.
///
/// Handles `... scan report for 10.0.0.1`, `... for name (10.0.0.1)` and
/// `... for 10.0.0.1 (10.0.0.1)`: the first well-formed token wins.
pub fn extract_nmap_hosts(output: &str) -> Vec<String> {
    let found = output
        .lines()
        .filter(|line| line.contains(NMAP_REPORT_MARKER))
        .filter_map(|line| {
            line.split_whitespace()
                .map(|token| token.trim_matches(|c| c == '(' || c == ')'))
                .find(|token| is_valid_ipv4(token))
                .map(String::from)
        })
        .collect();
    dedup_in_order(found)
}

fn dedup_in_order(addresses: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|ip| seen.insert(ip.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ipv4() {
        assert!(is_valid_ipv4("10.0.0.1"));
        assert!(is_valid_ipv4("255.255.255.255"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(!is_valid_ipv4("999.1.1.1"));
        assert!(!is_valid_ipv4("10.0.0"));
        assert!(!is_valid_ipv4("10.0.0.1.5"));
        assert!(!is_valid_ipv4("10.0.0.-1"));
        assert!(!is_valid_ipv4("10.0..1"));
        assert!(!is_valid_ipv4("a.b.c.d"));
    }

    #[test]
    fn test_bare_address_line() {
        assert_eq!(extract_addresses("10.0.0.1\n"), vec!["10.0.0.1"]);
    }

    #[test]
    fn test_out_of_range_line_yields_nothing() {
        assert!(extract_addresses("999.1.1.1").is_empty());
    }

    #[test]
    fn test_embedded_addresses() {
        let output = "open 10.0.0.5:6379 (redis)\nhost=192.168.1.20 other=192.168.1.21\n";
        assert_eq!(
            extract_addresses(output),
            vec!["10.0.0.5", "192.168.1.20", "192.168.1.21"]
        );
    }

    #[test]
    fn test_nmap_line_through_generic_parser() {
        let line = "Nmap scan report for host.example.com (10.0.0.5)";
        assert_eq!(extract_addresses(line), vec!["10.0.0.5"]);
    }

    #[test]
    fn test_duplicates_keep_first_order() {
        let output = "10.0.0.2\n10.0.0.1\nseen 10.0.0.2 again\n  10.0.0.1  \n";
        assert_eq!(extract_addresses(output), vec!["10.0.0.2", "10.0.0.1"]);
    }

    #[test]
    fn test_blank_and_noise_lines() {
        assert!(extract_addresses("\n\nStarting scan...\nDone: 0 hosts\n").is_empty());
    }

    #[test]
    fn test_nmap_report_formats() {
        let output = "\
Starting Nmap 7.94 ( https://nmap.org ) at 2026-10-19 08:00 UTC
Nmap scan report for 10.0.0.1
Host is up (0.00023s latency).
Nmap scan report for host.example.com (10.0.0.5)
Nmap scan report for 10.0.0.7 (10.0.0.7)
Nmap scan report for unresolved.example.com
PORT     STATE SERVICE
6379/tcp open  redis
Nmap done: 256 IP addresses (3 hosts up) scanned in 2.51 seconds
";
        assert_eq!(
            extract_nmap_hosts(output),
            vec!["10.0.0.1", "10.0.0.5", "10.0.0.7"]
        );
    }

    #[test]
    fn test_nmap_ignores_addresses_outside_report_lines() {
        let output = "Interesting ports on 10.9.9.9:\nNmap done: 1 IP address (0 hosts up)\n";
        assert!(extract_nmap_hosts(output).is_empty());
    }
}
