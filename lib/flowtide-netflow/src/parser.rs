use std::sync::Arc;

use flowtide_decoder::{DecodeError, Schema};
use flowtide_event::Metric;
use flowtide_protodb::ProtoDb;
use snafu::{ResultExt as _, Snafu};
use tracing::{debug, trace};

use crate::{
    schema::{self, VERSION_IPFIX, VERSION_V9},
    template::TemplateCache,
};

/// Parse errors.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ParseError {
    /// The packet header announced a protocol version this parser does not handle.
    #[snafu(display("unsupported NetFlow version {}", version))]
    UnsupportedVersion {
        /// Version found in the packet header.
        version: u16,
    },

    /// The packet is malformed.
    #[snafu(display("failed to decode packet: {}", source))]
    Decode {
        /// Error source.
        source: DecodeError,
    },
}

/// A parser turning packet payloads into metrics.
pub trait Parser {
    /// Parses a single payload, appending the resulting metrics to `metrics`.
    ///
    /// Returns the number of metrics appended.
    ///
    /// # Errors
    ///
    /// If the payload cannot be parsed, an error is returned. Metrics fully decoded before the error was hit are still
    /// appended to `metrics`.
    fn parse(&mut self, payload: &[u8], metrics: &mut Vec<Metric>) -> Result<usize, ParseError>;
}

/// Transport protocols whose ports are named through protodb, by IP protocol number.
const TRANSPORT_PROTOCOLS: [(u8, &str); 4] = [(6, "tcp"), (17, "udp"), (33, "dccp"), (132, "sctp")];

/// A NetFlow v9 and IPFIX parser.
///
/// Each parser learns templates from the packets it parses, and keeps them for its whole life, so all packets from a
/// given exporter must go through the same parser. Parsers are not shared between threads: use one parser per worker,
/// with exporters pinned to workers.
pub struct NetflowParser {
    schema: Schema<TemplateCache>,
    templates: TemplateCache,
    protodb: Arc<ProtoDb>,
}

impl NetflowParser {
    /// Creates a new `NetflowParser` using the process-wide [`ProtoDb`].
    pub fn new() -> Self {
        Self::with_protodb(ProtoDb::global())
    }

    /// Creates a new `NetflowParser` using the given [`ProtoDb`].
    pub fn with_protodb(protodb: Arc<ProtoDb>) -> Self {
        Self {
            schema: schema::build(),
            templates: TemplateCache::new(),
            protodb,
        }
    }

    /// Returns the learned templates.
    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    /// Returns the number of learned templates, across all exporters.
    pub fn template_count(&self) -> usize {
        self.templates.template_count()
    }

    /// Forgets every learned template.
    pub fn forget_templates(&mut self) {
        self.templates.clear();
    }

    /// Forgets the templates learned for one observation domain.
    ///
    /// Returns `true` if the domain was known.
    pub fn forget_domain(&mut self, source_id: u32) -> bool {
        self.templates.remove_domain(source_id).is_some()
    }

    fn enrich(&self, metric: &mut Metric) {
        let Some(protocol) = metric
            .tag("protocolIdentifier")
            .and_then(|value| value.parse::<u8>().ok())
            .and_then(|number| TRANSPORT_PROTOCOLS.iter().find(|(n, _)| *n == number))
            .map(|(_, name)| *name)
        else {
            return;
        };

        for (port_tag, service_tag) in [
            ("sourceTransportPort", "sourceTransportService"),
            ("destinationTransportPort", "destinationTransportService"),
        ] {
            let service = metric
                .tag(port_tag)
                .and_then(|value| value.parse::<u16>().ok())
                .and_then(|port| self.protodb.lookup(protocol, port));
            if let Some(service) = service {
                metric.insert_tag(service_tag, service);
            }
        }
    }
}

impl Parser for NetflowParser {
    fn parse(&mut self, payload: &[u8], metrics: &mut Vec<Metric>) -> Result<usize, ParseError> {
        if let [hi, lo, ..] = payload {
            let version = u16::from_be_bytes([*hi, *lo]);
            if version != VERSION_V9 && version != VERSION_IPFIX {
                return UnsupportedVersion { version }.fail();
            }
        }

        let mut cx = self.schema.new_context(true);
        let mut buf = payload;
        let result = self.schema.execute(&mut buf, &mut cx, &mut self.templates);

        let start = metrics.len();
        metrics.extend(cx.take_metrics());
        for metric in &mut metrics[start..] {
            self.enrich(metric);
        }
        let appended = metrics.len() - start;

        match result {
            Ok(()) => {
                trace!(len = payload.len(), metrics = appended, "Parsed packet.");
                Ok(appended)
            }
            Err(e) => {
                debug!(error = %e, len = payload.len(), metrics = appended, "Failed to parse packet.");
                Err(e).context(Decode)
            }
        }
    }
}
