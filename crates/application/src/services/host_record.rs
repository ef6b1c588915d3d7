use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record};
use sieve_dns_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Parses a record in the text form produced by hosts sources:
/// `"<name> <ttl> IN <A|AAAA> <ip>"`.
pub fn parse_host_record(text: &str) -> Result<Record, DomainError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let [name, ttl, class, record_type, value] = fields.as_slice() else {
        return Err(DomainError::InvalidRecord(format!(
            "Expected '<name> <ttl> IN <type> <ip>', got '{}'",
            text
        )));
    };

    if !class.eq_ignore_ascii_case("IN") {
        return Err(DomainError::InvalidRecord(format!(
            "Unsupported class '{}' in '{}'",
            class, text
        )));
    }

    let ttl: u32 = ttl
        .parse()
        .map_err(|_| DomainError::InvalidRecord(format!("Invalid TTL '{}' in '{}'", ttl, text)))?;

    let fqdn = if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    };
    let name = Name::from_str(&fqdn)
        .map_err(|e| DomainError::InvalidRecord(format!("Invalid name '{}': {}", fqdn, e)))?;

    let rdata = match record_type.to_ascii_uppercase().as_str() {
        "A" => {
            let ip = Ipv4Addr::from_str(value).map_err(|_| {
                DomainError::InvalidRecord(format!("Invalid IPv4 address '{}'", value))
            })?;
            RData::A(A(ip))
        }
        "AAAA" => {
            let ip = Ipv6Addr::from_str(value).map_err(|_| {
                DomainError::InvalidRecord(format!("Invalid IPv6 address '{}'", value))
            })?;
            RData::AAAA(AAAA(ip))
        }
        other => {
            return Err(DomainError::InvalidRecord(format!(
                "Unsupported record type '{}'",
                other
            )))
        }
    };

    Ok(Record::from_rdata(name, ttl, rdata))
}
