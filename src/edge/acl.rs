use std::{fmt::Write as _, net::IpAddr};

use crate::config::EdgeSettings;

/// One `acl purge` entry: a bare address or a CIDR network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    pub addr: IpAddr,
    pub prefix: Option<u8>,
}

/// Parses `10.0.0.1`, `10.0.0.0/8` or `::1`.
pub fn parse_acl_entry(raw: &str) -> Result<AclEntry, String> {
    let raw = raw.trim();
    let (addr, prefix) = match raw.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (raw, None),
    };
    let addr: IpAddr = addr
        .parse()
        .map_err(|_| format!("`{raw}` is not an IP address or CIDR network"))?;
    let prefix = prefix
        .map(|prefix| {
            let max = if addr.is_ipv4() { 32 } else { 128 };
            prefix
                .parse::<u8>()
                .ok()
                .filter(|len| *len <= max)
                .ok_or_else(|| format!("`{raw}` has an invalid prefix length"))
        })
        .transpose()?;
    Ok(AclEntry { addr, prefix })
}

/// Renders the accelerator's `acl purge` block. Entries that fail to parse
/// are skipped; settings validation rejects them up front.
pub fn render_purge_acl(settings: &EdgeSettings) -> String {
    let mut out = String::from("acl purge {\n");
    for entry in settings
        .allowed_ips
        .iter()
        .filter_map(|raw| parse_acl_entry(raw).ok())
    {
        let _ = match entry.prefix {
            Some(prefix) => writeln!(out, "    \"{}\"/{prefix};", entry.addr),
            None => writeln!(out, "    \"{}\";", entry.addr),
        };
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_addresses_and_networks() {
        let entry = parse_acl_entry("10.0.0.0/8").expect("cidr");
        assert_eq!(entry.prefix, Some(8));
        assert_eq!(parse_acl_entry("::1").expect("v6").prefix, None);
        assert!(parse_acl_entry("not-an-ip").is_err());
        assert!(parse_acl_entry("10.0.0.0/33").is_err());
        assert!(parse_acl_entry("fd00::/64").is_ok());
    }

    #[test]
    fn renders_vcl_block() {
        let settings = EdgeSettings {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 80,
            admin_port: None,
            public_host: "localhost".to_string(),
            timeout: Duration::from_secs(5),
            allowed_ips: vec![
                "127.0.0.1".to_string(),
                "::1".to_string(),
                "192.168.0.0/16".to_string(),
            ],
        };

        assert_eq!(
            render_purge_acl(&settings),
            "acl purge {\n    \"127.0.0.1\";\n    \"::1\";\n    \"192.168.0.0\"/16;\n}\n"
        );
    }
}
