//! StatsD line encoding.
//!
//! A [`StatsdLineBuilder`] renders everything that does not depend on the
//! sampled value (name, prefix, tags) once at construction; encoding a
//! timing only formats the value and concatenates.

use statsd_common::{MeterId, StatsdFlavor};

/// Turns one timing value into one wire line.
///
/// Implementations must be pure: the same value always yields the same line.
pub trait LineEncoder: Send + Sync {
    /// Encode a timing sample already expressed in the poller's base unit.
    fn timing(&self, value: f64) -> String;
}

const BASE_RESERVED: &[char] = &[':', '|', '@'];
const TAG_RESERVED: &[char] = &[':', '|', '@', ',', '=', '#'];

/// Line builder for one meter in one StatsD flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsdLineBuilder {
    flavor: StatsdFlavor,
    /// Everything before the `:value` separator.
    head: String,
    /// Everything after the value.
    tail: String,
}

impl StatsdLineBuilder {
    /// Create a builder for `id`, optionally prefixing the meter name.
    #[must_use]
    pub fn new(id: &MeterId, flavor: StatsdFlavor, prefix: Option<&str>) -> Self {
        let (head, tail) = match flavor {
            StatsdFlavor::Etsy => {
                let mut head = dotted_name(prefix, id.name(), BASE_RESERVED);
                for (key, value) in id.tags() {
                    head.push('.');
                    head.push_str(&sanitize(key, BASE_RESERVED));
                    head.push('.');
                    head.push_str(&sanitize(value, BASE_RESERVED));
                }
                (head, String::from("|ms"))
            }
            StatsdFlavor::Datadog => {
                let head = dotted_name(prefix, id.name(), TAG_RESERVED);
                let mut tail = String::from("|ms");
                if id.has_tags() {
                    tail.push_str("|#");
                    tail.push_str(&join_tags(id, ':', TAG_RESERVED));
                }
                (head, tail)
            }
            StatsdFlavor::Telegraf => {
                let name = dotted_name(prefix, id.name(), TAG_RESERVED).replace('.', "_");
                let mut head = name;
                if id.has_tags() {
                    head.push(',');
                    head.push_str(&join_tags(id, '=', TAG_RESERVED));
                }
                (head, String::from("|ms"))
            }
            StatsdFlavor::Sysdig => {
                let mut head = dotted_name(prefix, id.name(), TAG_RESERVED);
                if id.has_tags() {
                    head.push('#');
                    head.push_str(&join_tags(id, '=', TAG_RESERVED));
                }
                (head, String::from("|ms"))
            }
        };

        Self { flavor, head, tail }
    }

    /// Flavor this builder renders.
    #[must_use]
    pub fn flavor(&self) -> StatsdFlavor {
        self.flavor
    }
}

impl LineEncoder for StatsdLineBuilder {
    fn timing(&self, value: f64) -> String {
        format!("{}:{}{}", self.head, format_value(value), self.tail)
    }
}

/// Format a sample with at most six fractional digits and no trailing zeros.
#[must_use]
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let mut s = format!("{value:.6}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = String::from("0");
    }
    s
}

fn dotted_name(prefix: Option<&str>, name: &str, reserved: &[char]) -> String {
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}.{}", sanitize(prefix, reserved), sanitize(name, reserved)),
        None => sanitize(name, reserved),
    }
}

fn join_tags(id: &MeterId, separator: char, reserved: &[char]) -> String {
    id.tags()
        .map(|(key, value)| {
            format!(
                "{}{separator}{}",
                sanitize(key, reserved),
                sanitize(value, reserved)
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn sanitize(raw: &str, reserved: &[char]) -> String {
    raw.chars()
        .map(|c| {
            if c.is_whitespace() || reserved.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_id() -> MeterId {
        MeterId::new("http.requests")
            .with_tag("uri", "/api")
            .with_tag("method", "GET")
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(format_value(10.0), "10");
        assert_eq!(format_value(7.5), "7.5");
        assert_eq!(format_value(1.0 / 3.0), "0.333333");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(-0.000_000_1), "0");
        assert_eq!(format_value(1_234_567.125), "1234567.125");
    }

    #[test]
    fn test_etsy_line() {
        let builder = StatsdLineBuilder::new(&tagged_id(), StatsdFlavor::Etsy, None);
        assert_eq!(
            builder.timing(10.0),
            "http.requests.method.GET.uri./api:10|ms"
        );
    }

    #[test]
    fn test_datadog_line() {
        let builder = StatsdLineBuilder::new(&tagged_id(), StatsdFlavor::Datadog, None);
        assert_eq!(
            builder.timing(7.5),
            "http.requests:7.5|ms|#method:GET,uri:/api"
        );

        let untagged = StatsdLineBuilder::new(&MeterId::new("gc.pause"), StatsdFlavor::Datadog, None);
        assert_eq!(untagged.timing(2.0), "gc.pause:2|ms");
    }

    #[test]
    fn test_telegraf_line() {
        let builder =
            StatsdLineBuilder::new(&tagged_id(), StatsdFlavor::Telegraf, Some("shop"));
        assert_eq!(
            builder.timing(1.25),
            "shop_http_requests,method=GET,uri=/api:1.25|ms"
        );
    }

    #[test]
    fn test_sysdig_line() {
        let builder = StatsdLineBuilder::new(&tagged_id(), StatsdFlavor::Sysdig, None);
        assert_eq!(
            builder.timing(3.0),
            "http.requests#method=GET,uri=/api:3|ms"
        );
    }

    #[test]
    fn test_prefix_applied() {
        let builder =
            StatsdLineBuilder::new(&MeterId::new("jobs"), StatsdFlavor::Datadog, Some("worker"));
        assert_eq!(builder.timing(1.0), "worker.jobs:1|ms");

        let empty_prefix =
            StatsdLineBuilder::new(&MeterId::new("jobs"), StatsdFlavor::Datadog, Some(""));
        assert_eq!(empty_prefix.timing(1.0), "jobs:1|ms");
    }

    #[test]
    fn test_reserved_characters_replaced() {
        let id = MeterId::new("odd:name|x").with_tag("k,1", "v=1 #2");
        let datadog = StatsdLineBuilder::new(&id, StatsdFlavor::Datadog, None);
        assert_eq!(datadog.timing(1.0), "odd_name_x:1|ms|#k_1:v_1__2");

        let etsy = StatsdLineBuilder::new(&MeterId::new("a@b"), StatsdFlavor::Etsy, None);
        assert_eq!(etsy.timing(1.0), "a_b:1|ms");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let builder = StatsdLineBuilder::new(&tagged_id(), StatsdFlavor::Datadog, None);
        assert_eq!(builder.timing(0.1), builder.timing(0.1));
        assert_eq!(builder.flavor(), StatsdFlavor::Datadog);
    }
}
