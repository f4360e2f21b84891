//! Metric types.
use std::fmt;

use flowtide_common::collections::FastIndexMap;

mod value;
pub use self::value::FieldValue;

/// Metric tags, in the order they were emitted.
pub type Tags = FastIndexMap<String, String>;

/// Metric fields, in the order they were emitted.
pub type Fields = FastIndexMap<String, FieldValue>;

/// A metric.
///
/// A metric is a named measurement taken at a point in time. Tags carry the dimensions that identify what was measured
/// (addresses, ports, the exporting device) as strings, while fields carry the measured values themselves (byte and
/// packet counters, timers).
///
/// ## Ordering
///
/// Tags and fields keep the order in which a decoder emitted them. Setting an existing key again replaces its value in
/// place. Equality between metrics ignores ordering.
///
/// ## Timestamps
///
/// The timestamp is expressed in seconds since the Unix epoch. For flow protocols it is the export time announced by
/// the exporter, not the time the packet was received.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metric {
    name: String,
    tags: Tags,
    fields: Fields,
    timestamp: u64,
}

impl Metric {
    /// Creates an empty metric with the given name.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Creates a `Metric` from the given parts.
    pub fn from_parts(name: String, tags: Tags, fields: Fields, timestamp: u64) -> Self {
        Self {
            name,
            tags,
            fields,
            timestamp,
        }
    }

    /// Consumes the metric and returns the individual parts.
    pub fn into_parts(self) -> (String, Tags, Fields, u64) {
        (self.name, self.tags, self.fields, self.timestamp)
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a reference to the tags.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Gets a mutable reference to the tags.
    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    /// Gets the value of the given tag, if present.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// Gets a reference to the fields.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Gets a mutable reference to the fields.
    pub fn fields_mut(&mut self) -> &mut Fields {
        &mut self.fields
    }

    /// Gets the value of the given field, if present.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Gets the timestamp, in seconds since the Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Sets the timestamp, in seconds since the Unix epoch.
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// Sets a tag, replacing any previous value.
    pub fn insert_tag<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.tags.insert(name.into(), value.into());
    }

    /// Sets a field, replacing any previous value.
    pub fn insert_field<K: Into<String>, V: Into<FieldValue>>(&mut self, name: K, value: V) {
        self.fields.insert(name.into(), value.into());
    }

    /// Sets a tag and returns the metric.
    pub fn with_tag<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.insert_tag(name, value);
        self
    }

    /// Sets a field and returns the metric.
    pub fn with_field<K: Into<String>, V: Into<FieldValue>>(mut self, name: K, value: V) -> Self {
        self.insert_field(name, value);
        self
    }

    /// Sets the timestamp and returns the metric.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered in InfluxDB line protocol, with the timestamp in seconds.
        write!(f, "{}", escape_measurement(&self.name))?;
        for (name, value) in &self.tags {
            write!(f, ",{}={}", escape_key(name), escape_key(value))?;
        }

        let mut separator = ' ';
        for (name, value) in &self.fields {
            write!(f, "{}{}={}", separator, escape_key(name), value)?;
            separator = ',';
        }

        write!(f, " {}", self.timestamp)
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_line_protocol() {
        let metric = Metric::new("netflow")
            .with_tag("sourceID", "7")
            .with_tag("sourceIPv4Address", "192.168.1.1")
            .with_field("octetDeltaCount", 1500u64)
            .with_field("mplsTopLabelStackSection", "0a0b")
            .with_timestamp(1_700_000_000);

        assert_eq!(
            metric.to_string(),
            "netflow,sourceID=7,sourceIPv4Address=192.168.1.1 octetDeltaCount=1500u,mplsTopLabelStackSection=\"0a0b\" 1700000000"
        );
    }

    #[test]
    fn display_escapes_tag_values() {
        let metric = Metric::new("netflow").with_tag("service", "a b,c=d").with_field("x", 1u8);
        assert_eq!(metric.to_string(), "netflow,service=a\\ b\\,c\\=d x=1u 0");
    }

    #[test]
    fn display_escapes_measurement() {
        let metric = Metric::new("flow records,v9=x").with_field("x", 1u8);
        assert_eq!(metric.to_string(), "flow\\ records\\,v9=x x=1u 0");
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut metric = Metric::new("netflow").with_tag("a", "1").with_tag("b", "2");
        metric.insert_tag("a", "3");

        let tags = metric.tags().iter().map(|(k, v)| (k.as_str(), v.as_str())).collect::<Vec<_>>();
        assert_eq!(tags, [("a", "3"), ("b", "2")]);
    }

    #[test]
    fn equality_ignores_order() {
        let a = Metric::new("netflow").with_tag("a", "1").with_tag("b", "2");
        let b = Metric::new("netflow").with_tag("b", "2").with_tag("a", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn field_accessors() {
        let metric = Metric::new("netflow")
            .with_field("packetDeltaCount", 3u32)
            .with_field("sourceMacAddress", "00:11:22:33:44:55");

        assert_eq!(metric.field("packetDeltaCount").and_then(FieldValue::as_unsigned), Some(3));
        assert_eq!(
            metric.field("sourceMacAddress").and_then(FieldValue::as_str),
            Some("00:11:22:33:44:55")
        );
        assert_eq!(metric.field("missing"), None);
    }
}
