//! Parsers for the numbers printed by the quota tools.
//!
//! All backends share one rule for limits: `0`, `unlimited` and `∞` mean
//! "no limit" and become `None`, never a limit of zero.
use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

lazy_static! {
    static ref MAGNITUDE: Regex = Regex::new(r"^([0-9.]+)([A-Za-z]*)$").unwrap();
}

// binary units, as printed by BeeGFS for space.
const SIZE_UNITS: [(&str, u64); 6] = [
    ("B", 1),
    ("KIB", 1 << 10),
    ("MIB", 1 << 20),
    ("GIB", 1 << 30),
    ("TIB", 1 << 40),
    ("PIB", 1 << 50),
];

// SI units, as printed by BeeGFS for inode counts.
const COUNT_UNITS: [(&str, u64); 4] = [
    ("", 1),
    ("K", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
];

fn scaled(token: &str, units: &[(&str, u64)], what: &str) -> Result<u64> {
    let token = token.trim();
    let caps = MAGNITUDE
        .captures(token)
        .ok_or_else(|| Error::Parse(format!("cannot parse {}: {}", what, token)))?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| Error::Parse(format!("cannot parse {}: {}", what, token)))?;
    let unit = caps[2].to_ascii_uppercase();
    let multiplier = units
        .iter()
        .find(|(u, _)| *u == unit)
        .map(|(_, m)| *m)
        .ok_or_else(|| Error::Parse(format!("unknown {} unit: {}", what, &caps[2])))?;
    Ok((value * multiplier as f64) as u64)
}

/// Parse a BeeGFS size like `190.02GiB` into bytes.
pub fn parse_beegfs_size(token: &str) -> Result<u64> {
    scaled(token, &SIZE_UNITS, "size")
}

/// Parse a BeeGFS count like `836.44k` into a plain number.
pub fn parse_beegfs_count(token: &str) -> Result<u64> {
    scaled(token, &COUNT_UNITS, "count")
}

/// Parse a plain integer. A trailing `*`, which Lustre adds when a
/// limit is exceeded, is ignored.
pub fn parse_integer(token: &str) -> Result<u64> {
    let t = token.trim();
    let t = t.strip_suffix('*').unwrap_or(t);
    t.parse::<u64>()
        .map_err(|_| Error::Parse(format!("not a number: {}", token.trim())))
}

pub fn kib_to_bytes(kib: u64) -> u64 {
    kib.saturating_mul(1024)
}

/// True if a raw limit field means "no limit".
pub fn is_unlimited(token: &str) -> bool {
    let t = token.trim();
    t == "0" || t == "∞" || t.eq_ignore_ascii_case("unlimited")
}

/// Parse a limit field. Unlimited sentinels, and anything that parses
/// to zero, become `None`.
pub fn parse_limit<F>(token: &str, parse: F) -> Result<Option<u64>>
where F: FnOnce(&str) -> Result<u64> {
    if is_unlimited(token) {
        return Ok(None);
    }
    Ok(Some(parse(token)?).filter(|&v| v > 0))
}
