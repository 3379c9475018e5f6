//! Interface fact extraction with a lazy-cache discipline.
//!
//! [`InterfaceInfo`] derives a network interface's IPv4 address/mask, IPv6
//! addresses (global and link-local), and MAC address from the free-form
//! output of an inspection command (`ifconfig`, `ip address show`, vendor
//! equivalents). Each fact is fetched on first access, cached until
//! [`refresh`](InterfaceInfo::refresh), and never settable by callers.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;
use std::time::Duration;

use ipnet::{Ipv4Net, Ipv6Net};
use log::debug;
use macaddr::MacAddr6;
use regex::Regex;

use crate::error::{IfaceError, Result};
use crate::session::Session;

/// Trailing guard after the MAC read, soaking up leftover prompt noise.
const MAC_DRAIN: Duration = Duration::from_secs(1);

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"inet:?\s*(?:addr:\s*)?((?:\d{1,3}\.){3}\d{1,3})(?:/(\d{1,2}))?").unwrap()
    })
}

fn netmask_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:netmask\s+|Mask:\s*)((?:\d{1,3}\.){3}\d{1,3})").unwrap())
}

fn mac_pattern() -> &'static regex::bytes::Regex {
    static RE: OnceLock<regex::bytes::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::bytes::Regex::new(r"([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}").unwrap())
}

/// Extract the first IPv4 address/mask pair from inspection output.
///
/// Accepts both `inet 192.0.2.5/24` (iproute2) and
/// `inet addr:192.0.2.5 ... Mask:255.255.255.0` (net-tools) shapes. The
/// mask defaults to /32 when neither a CIDR suffix nor a netmask field is
/// present.
pub fn extract_ipv4(output: &str) -> Option<Ipv4Net> {
    let caps = ipv4_regex().captures(output)?;
    let addr: Ipv4Addr = caps.get(1)?.as_str().parse().ok()?;

    if let Some(prefix) = caps.get(2) {
        let prefix: u8 = prefix.as_str().parse().ok()?;
        return Ipv4Net::new(addr, prefix).ok();
    }

    if let Some(mask_caps) = netmask_regex().captures(output) {
        if let Ok(mask) = mask_caps[1].parse::<Ipv4Addr>() {
            return Ipv4Net::with_netmask(addr, mask).ok();
        }
    }

    Ipv4Net::new(addr, 32).ok()
}

/// Extract IPv6 addresses from inspection output.
///
/// Every IPv6 literal in the output is classified as link-local
/// (`fe80::/10`) or not; within each classification the last occurrence in
/// scan order wins. Returns `(global, link_local)`.
pub fn extract_ipv6(output: &str) -> (Option<Ipv6Net>, Option<Ipv6Net>) {
    let mut global = None;
    let mut link_local = None;

    for token in output.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_ascii_hexdigit() && !":/%".contains(c));
        let (literal, prefix) = match token.split_once('/') {
            Some((lit, p)) => (lit, p.parse::<u8>().ok()),
            None => (token, None),
        };
        // Zone suffixes like fe80::1%eth0 are not part of the address.
        let literal = literal.split('%').next().unwrap_or(literal);

        let Ok(addr) = literal.parse::<Ipv6Addr>() else {
            continue;
        };
        let Ok(net) = Ipv6Net::new(addr, prefix.unwrap_or(128)) else {
            continue;
        };

        if is_link_local(&addr) {
            link_local = Some(net);
        } else {
            global = Some(net);
        }
    }

    (global, link_local)
}

fn is_link_local(addr: &Ipv6Addr) -> bool {
    addr.segments()[0] & 0xffc0 == 0xfe80
}

/// Lazily cached address facts for one network interface.
///
/// Bound to an interface name and an inspection command; the session is
/// borrowed per call, so one session serves any number of interfaces.
#[derive(Debug)]
pub struct InterfaceInfo {
    iface: String,
    ip_cmd: String,
    ipv4: Option<Ipv4Net>,
    ipv6: Option<Ipv6Net>,
    ipv6_link_local: Option<Ipv6Net>,
    mac: Option<MacAddr6>,
}

impl InterfaceInfo {
    /// Bind to an interface using the default `ifconfig` inspection command.
    pub fn new(iface: impl Into<String>) -> Self {
        Self::with_command(iface, "ifconfig")
    }

    /// Bind to an interface with a specific inspection command.
    pub fn with_command(iface: impl Into<String>, ip_cmd: impl Into<String>) -> Self {
        Self {
            iface: iface.into(),
            ip_cmd: ip_cmd.into(),
            ipv4: None,
            ipv6: None,
            ipv6_link_local: None,
            mac: None,
        }
    }

    /// The bound interface name.
    pub fn iface(&self) -> &str {
        &self.iface
    }

    fn inspect_command(&self) -> String {
        format!("{} {}", self.ip_cmd, self.iface)
    }

    async fn inspect(&self, session: &mut Session) -> Result<String> {
        session.check_output(&self.inspect_command()).await
    }

    /// Get the IPv4 interface (address + mask), running the inspection
    /// command if not cached.
    pub async fn get_ipv4(&mut self, session: &mut Session) -> Result<Ipv4Net> {
        if let Some(net) = self.ipv4 {
            return Ok(net);
        }
        let output = self.inspect(session).await?;
        self.apply_ipv4(&output)
    }

    /// Extract and cache the IPv4 interface from already-captured output.
    pub fn apply_ipv4(&mut self, output: &str) -> Result<Ipv4Net> {
        match extract_ipv4(output) {
            Some(net) => {
                self.ipv4 = Some(net);
                Ok(net)
            }
            None => Err(IfaceError::NoIpv4Address {
                iface: self.iface.clone(),
            }
            .into()),
        }
    }

    /// Get the non-link-local IPv6 interface, running the inspection
    /// command if not cached.
    pub async fn get_ipv6(&mut self, session: &mut Session) -> Result<Ipv6Net> {
        if let Some(net) = self.ipv6 {
            return Ok(net);
        }
        let output = self.inspect(session).await?;
        self.apply_ipv6(&output)
    }

    /// Extract and cache IPv6 addresses from already-captured output.
    ///
    /// Link-local matches populate only the link-local slot; an interface
    /// with nothing but link-local addresses is treated as lacking IPv6.
    pub fn apply_ipv6(&mut self, output: &str) -> Result<Ipv6Net> {
        let (global, link_local) = extract_ipv6(output);
        if link_local.is_some() {
            self.ipv6_link_local = link_local;
        }
        match global {
            Some(net) => {
                self.ipv6 = Some(net);
                Ok(net)
            }
            None => Err(IfaceError::NoIpv6Address {
                iface: self.iface.clone(),
            }
            .into()),
        }
    }

    /// Get the MAC address, issuing the fixed-path read if not cached.
    pub async fn get_mac(&mut self, session: &mut Session) -> Result<MacAddr6> {
        if let Some(mac) = self.mac {
            return Ok(mac);
        }
        self.fetch_mac(session).await
    }

    async fn fetch_mac(&mut self, session: &mut Session) -> Result<MacAddr6> {
        let cmd = format!("cat /sys/class/net/{}/address", self.iface);
        session.sendline(&cmd)?;
        session.expect_exact(&[cmd.as_str()]).await?;
        let m = session.expect(std::slice::from_ref(mac_pattern())).await?;

        let mac: MacAddr6 = m.matched.parse().map_err(|_| IfaceError::BadMacAddress {
            iface: self.iface.clone(),
            text: m.matched.clone(),
        })?;

        // Soak up the trailing prompt so the next command starts clean.
        session.drain(MAC_DRAIN).await;

        debug!("{}: mac {}", self.iface, mac);
        self.mac = Some(mac);
        Ok(mac)
    }

    /// Re-derive all facts from one fresh inspection.
    ///
    /// IPv4 and IPv6 extraction run independently: a family absent from the
    /// new output is cleared without failing or clearing the other. The MAC
    /// is always re-fetched.
    pub async fn refresh(&mut self, session: &mut Session) -> Result<()> {
        let output = self.inspect(session).await?;

        self.ipv4 = extract_ipv4(&output);
        let (global, link_local) = extract_ipv6(&output);
        self.ipv6 = global;
        self.ipv6_link_local = link_local;

        self.mac = None;
        self.fetch_mac(session).await?;
        Ok(())
    }

    /// IPv4 address.
    pub async fn ipv4(&mut self, session: &mut Session) -> Result<Ipv4Addr> {
        Ok(self.get_ipv4(session).await?.addr())
    }

    /// IPv4 netmask.
    pub async fn netmask(&mut self, session: &mut Session) -> Result<Ipv4Addr> {
        Ok(self.get_ipv4(session).await?.netmask())
    }

    /// IPv4 network (host bits zeroed).
    pub async fn network(&mut self, session: &mut Session) -> Result<Ipv4Net> {
        Ok(self.get_ipv4(session).await?.trunc())
    }

    /// Non-link-local IPv6 address.
    pub async fn ipv6(&mut self, session: &mut Session) -> Result<Ipv6Addr> {
        Ok(self.get_ipv6(session).await?.addr())
    }

    /// IPv6 network (host bits zeroed).
    pub async fn network_v6(&mut self, session: &mut Session) -> Result<Ipv6Net> {
        Ok(self.get_ipv6(session).await?.trunc())
    }

    /// IPv6 prefix length.
    pub async fn prefixlen(&mut self, session: &mut Session) -> Result<u8> {
        Ok(self.get_ipv6(session).await?.prefix_len())
    }

    /// Link-local IPv6 address, if the interface carries one.
    ///
    /// A cache miss runs the IPv6 extraction; a link-local-only interface
    /// still reports its link-local address here even though
    /// [`get_ipv6`](Self::get_ipv6) fails for it.
    pub async fn ipv6_link_local(&mut self, session: &mut Session) -> Result<Ipv6Addr> {
        if self.ipv6_link_local.is_none() {
            let output = self.inspect(session).await?;
            // Populates the link-local slot as a side effect; a missing
            // global address is not an error for this accessor.
            let _ = self.apply_ipv6(&output);
        }
        self.ipv6_link_local
            .map(|net| net.addr())
            .ok_or_else(|| {
                IfaceError::NoIpv6Address {
                    iface: self.iface.clone(),
                }
                .into()
            })
    }

    /// MAC address in canonical colon-separated hex form.
    pub async fn mac(&mut self, session: &mut Session) -> Result<MacAddr6> {
        self.get_mac(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IP_ADDR_OUTPUT: &str = "\
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP
    link/ether aa:bb:cc:dd:ee:ff brd ff:ff:ff:ff:ff:ff
    inet 192.0.2.5/24 brd 192.0.2.255 scope global eth0
    inet6 fe80::1/64 scope link
    inet6 2001:db8::1/64 scope global
";

    const IFCONFIG_OUTPUT: &str = "\
eth0      Link encap:Ethernet  HWaddr aa:bb:cc:dd:ee:ff
          inet addr:10.1.2.3  Bcast:10.1.2.255  Mask:255.255.255.0
          inet6 addr: fe80::a8bb:ccff:fedd:eeff/64 Scope:Link
";

    #[test]
    fn test_extract_ipv4_cidr() {
        let net = extract_ipv4(IP_ADDR_OUTPUT).unwrap();
        assert_eq!(net.addr(), "192.0.2.5".parse::<Ipv4Addr>().unwrap());
        assert_eq!(net.prefix_len(), 24);
    }

    #[test]
    fn test_extract_ipv4_netmask_field() {
        let net = extract_ipv4(IFCONFIG_OUTPUT).unwrap();
        assert_eq!(net.addr(), "10.1.2.3".parse::<Ipv4Addr>().unwrap());
        assert_eq!(net.netmask(), "255.255.255.0".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn test_extract_ipv4_bare_address_defaults_to_host_route() {
        let net = extract_ipv4("inet 172.16.0.9").unwrap();
        assert_eq!(net.prefix_len(), 32);
    }

    #[test]
    fn test_extract_ipv4_absent() {
        assert!(extract_ipv4("inet6 2001:db8::1/64 scope global").is_none());
    }

    #[test]
    fn test_extract_ipv6_classification() {
        let (global, link_local) = extract_ipv6(IP_ADDR_OUTPUT);
        assert_eq!(
            global.unwrap().addr(),
            "2001:db8::1".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(
            link_local.unwrap().addr(),
            "fe80::1".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_extract_ipv6_last_match_wins() {
        let output = "inet6 2001:db8::1/64\ninet6 2001:db8::2/64\ninet6 fe80::1/64\ninet6 fe80::2/64";
        let (global, link_local) = extract_ipv6(output);
        assert_eq!(
            global.unwrap().addr(),
            "2001:db8::2".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(
            link_local.unwrap().addr(),
            "fe80::2".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_extract_ipv6_zone_suffix() {
        let (_, link_local) = extract_ipv6("inet6 fe80::1%eth0/64 scope link");
        assert_eq!(
            link_local.unwrap().addr(),
            "fe80::1".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_link_local_only_is_not_ipv6() {
        let mut info = InterfaceInfo::new("wlan0");
        let err = info.apply_ipv6(IFCONFIG_OUTPUT).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Iface(IfaceError::NoIpv6Address { .. })
        ));
        // The link-local slot is populated regardless.
        assert!(info.ipv6_link_local.is_some());
        assert!(info.ipv6.is_none());
    }

    #[test]
    fn test_apply_ipv4_caches() {
        let mut info = InterfaceInfo::new("eth0");
        let net = info.apply_ipv4(IP_ADDR_OUTPUT).unwrap();
        assert_eq!(net.to_string(), "192.0.2.5/24");
        assert_eq!(info.ipv4, Some(net));
    }

    #[test]
    fn test_mixed_family_extraction() {
        let output = "inet 192.0.2.5/24\ninet6 fe80::1/64\ninet6 2001:db8::1/64";
        let mut info = InterfaceInfo::new("eth0");

        assert_eq!(info.apply_ipv4(output).unwrap().to_string(), "192.0.2.5/24");
        assert_eq!(
            info.apply_ipv6(output).unwrap().addr(),
            "2001:db8::1".parse::<Ipv6Addr>().unwrap()
        );
        assert_eq!(
            info.ipv6_link_local.unwrap().addr(),
            "fe80::1".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_network_derivations() {
        let net = extract_ipv4(IP_ADDR_OUTPUT).unwrap();
        assert_eq!(net.trunc().to_string(), "192.0.2.0/24");
        assert_eq!(net.netmask().to_string(), "255.255.255.0");

        let (global, _) = extract_ipv6(IP_ADDR_OUTPUT);
        let global = global.unwrap();
        assert_eq!(global.prefix_len(), 64);
        assert_eq!(global.trunc().to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_mac_pattern_matches() {
        assert!(mac_pattern().is_match(b"aa:bb:cc:dd:ee:ff"));
        assert!(mac_pattern().is_match(b"00:00:00:00:00:00\r\n"));
        assert!(!mac_pattern().is_match(b"aa:bb:cc:dd:ee"));
    }
}
