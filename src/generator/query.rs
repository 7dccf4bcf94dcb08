//! `<seed>,<count>` query parsing
//!
//! Integers follow C `strtol` base-0 rules: optional leading whitespace,
//! optional sign, then `0x`/`0X` for hex, a leading `0` for octal, decimal
//! otherwise.

use super::{ConfigError, GeneratorConfig, Result};

/// Body sent instead of generated traffic when the query is unusable
pub const USAGE_MESSAGE: &str = "Must include args! ... of the form <code>?seed,count</code>";

pub(super) fn parse(query: Option<&str>) -> Result<GeneratorConfig> {
    let query = query.ok_or(ConfigError::MissingArgs)?;
    if query.is_empty() {
        return Err(ConfigError::MissingArgs);
    }

    let (seed, rest) =
        parse_c_integer(query).ok_or_else(|| ConfigError::InvalidSeed(query.to_string()))?;
    let rest = rest
        .strip_prefix(',')
        .ok_or_else(|| ConfigError::MissingComma(query.to_string()))?;

    let (count, tail) =
        parse_c_integer(rest).ok_or_else(|| ConfigError::InvalidCount(rest.to_string()))?;
    if !tail.is_empty() || count < 0 {
        return Err(ConfigError::InvalidCount(rest.to_string()));
    }

    // Seeds wrap into 32 bits the way C integer conversion does
    Ok(GeneratorConfig::new(seed as u32, count as u64))
}

/// Parse a leading C integer literal, returning the value and the rest
///
/// Returns `None` when there are no digits or the value overflows `i64`.
fn parse_c_integer(input: &str) -> Option<(i64, &str)> {
    let s = input.trim_start_matches([' ', '\t', '\n', '\r', '\x0b', '\x0c']);

    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let bytes = s.as_bytes();
    let (radix, digits_start) = match bytes {
        [b'0', b'x' | b'X', next, ..] if next.is_ascii_hexdigit() => (16, 2),
        [b'0', ..] => (8, 0),
        _ => (10, 0),
    };

    let digits = &s[digits_start..];
    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude = i64::from_str_radix(&digits[..end], radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    Some((value, &digits[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(query: &str) -> Result<GeneratorConfig> {
        parse(Some(query))
    }

    #[test]
    fn test_decimal() {
        let cfg = config("0,10").unwrap();
        assert_eq!((cfg.seed(), cfg.count()), (0, 10));

        let cfg = config("42,1000000").unwrap();
        assert_eq!((cfg.seed(), cfg.count()), (42, 1_000_000));
    }

    #[test]
    fn test_hex_and_octal() {
        let cfg = config("0x1F,010").unwrap();
        assert_eq!((cfg.seed(), cfg.count()), (31, 8));

        let cfg = config("0XdeadBEEF,0x0").unwrap();
        assert_eq!((cfg.seed(), cfg.count()), (0xdead_beef, 0));

        let cfg = config("0,0").unwrap();
        assert_eq!((cfg.seed(), cfg.count()), (0, 0));
    }

    #[test]
    fn test_octal_stops_at_non_octal_digit() {
        // "09" is "0" followed by a stray '9'
        assert_eq!(
            config("09,1"),
            Err(ConfigError::MissingComma("09,1".to_string()))
        );
    }

    #[test]
    fn test_whitespace_and_sign() {
        let cfg = config(" +7, 3").unwrap();
        assert_eq!((cfg.seed(), cfg.count()), (7, 3));

        // Negative seeds wrap like a C unsigned conversion
        let cfg = config("-1,2").unwrap();
        assert_eq!(cfg.seed(), u32::MAX);
    }

    #[test]
    fn test_seed_wraps_to_32_bits() {
        let cfg = config("0x100000005,1").unwrap();
        assert_eq!(cfg.seed(), 5);
    }

    #[test]
    fn test_missing() {
        assert_eq!(parse(None), Err(ConfigError::MissingArgs));
        assert_eq!(config(""), Err(ConfigError::MissingArgs));
    }

    #[test]
    fn test_missing_comma() {
        assert_eq!(
            config("10"),
            Err(ConfigError::MissingComma("10".to_string()))
        );
        assert_eq!(
            config("10;20"),
            Err(ConfigError::MissingComma("10;20".to_string()))
        );
    }

    #[test]
    fn test_invalid_seed() {
        assert!(matches!(config("abc,10"), Err(ConfigError::InvalidSeed(_))));
        assert!(matches!(config(",10"), Err(ConfigError::InvalidSeed(_))));
        assert!(matches!(
            config("99999999999999999999,1"),
            Err(ConfigError::InvalidSeed(_))
        ));
    }

    #[test]
    fn test_invalid_count() {
        assert!(matches!(config("1,"), Err(ConfigError::InvalidCount(_))));
        assert!(matches!(config("1,x"), Err(ConfigError::InvalidCount(_))));
        assert!(matches!(config("1,-5"), Err(ConfigError::InvalidCount(_))));
        assert!(matches!(config("1,10abc"), Err(ConfigError::InvalidCount(_))));
    }

    #[test]
    fn test_hex_prefix_without_digits() {
        // strtol reads "0x" as 0 followed by 'x'
        assert!(matches!(config("0x,1"), Err(ConfigError::MissingComma(_))));
    }
}
