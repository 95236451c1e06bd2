//! # Lista de Control de Acceso por IP
//! src/server/acl.rs
//!
//! Formato de la opción `acl`: lista separada por comas de redes IPv4
//! precedidas por `+` (permitir) o `-` (denegar), por ejemplo
//! `-0.0.0.0/0,+192.168.0.0/16`. Gana la última regla que coincide. Una
//! lista vacía permite a todos; una lista no vacía deniega lo que ninguna
//! regla permita.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// Una regla `+red/bits` o `-red/bits`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AclRule {
    allow: bool,
    network: u32,
    mask: u32,
}

impl AclRule {
    fn matches(&self, ip: u32) -> bool {
        ip & self.mask == self.network
    }
}

/// ACL ya parseada
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    rules: Vec<AclRule>,
}

impl Acl {
    /// ¿Se acepta una conexión desde `ip`?
    ///
    /// # Ejemplo
    /// ```
    /// use emberd::server::acl::Acl;
    ///
    /// let acl: Acl = "-0.0.0.0/0,+127.0.0.1".parse().unwrap();
    /// assert!(acl.allows("127.0.0.1".parse().unwrap()));
    /// assert!(!acl.allows("10.1.2.3".parse().unwrap()));
    /// ```
    pub fn allows(&self, ip: IpAddr) -> bool {
        if self.rules.is_empty() {
            return true;
        }

        let v4 = match ip {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4,
                None => return false,
            },
        };
        let ip = u32::from(v4);

        self.rules
            .iter()
            .filter(|rule| rule.matches(ip))
            .last()
            .map(|rule| rule.allow)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromStr for Acl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rules = Vec::new();

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let allow = match entry.as_bytes()[0] {
                b'+' => true,
                b'-' => false,
                _ => return Err(format!("ACL entry must start with + or -: {}", entry)),
            };

            let spec = &entry[1..];
            let (addr, bits) = match spec.split_once('/') {
                Some((addr, bits)) => {
                    let bits: u32 = bits
                        .parse()
                        .map_err(|_| format!("bad subnet mask: {}", entry))?;
                    (addr, bits)
                }
                None => (spec, 32),
            };
            if bits > 32 {
                return Err(format!("bad subnet mask: {}", entry));
            }

            let addr: Ipv4Addr = addr
                .parse()
                .map_err(|_| format!("bad IPv4 address: {}", entry))?;
            let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };

            rules.push(AclRule {
                allow,
                network: u32::from(addr) & mask,
                mask,
            });
        }

        Ok(Acl { rules })
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self
            .rules
            .iter()
            .map(|r| {
                format!(
                    "{}{}/{}",
                    if r.allow { '+' } else { '-' },
                    Ipv4Addr::from(r.network),
                    r.mask.count_ones()
                )
            })
            .collect();
        write!(f, "{}", entries.join(","))
    }
}
