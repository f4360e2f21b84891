//! Learned templates.
use std::sync::Arc;

use flowtide_common::{collections::FastHashMap, hash::get_fast_build_hasher};
use flowtide_decoder::{close_metric, iterate, open_metric, skip_rest, Directive, IterOptions};
use tracing::{debug, warn};

use crate::catalog::{self, FieldDecoder};

/// Name of every metric decoded from a data record.
pub const METRIC_NAME: &str = "netflow";

/// Number of templates in a single observation domain above which a warning is logged.
///
/// Templates are never evicted, so a domain growing past this is usually a misbehaving exporter.
pub const TEMPLATE_WARN_THRESHOLD: usize = 1024;

/// Template IDs below this value are reserved for set IDs.
const MIN_TEMPLATE_ID: u16 = 256;

/// Fields announced with this length are variable-length, which records decoded by a fixed layout cannot contain.
const VARIABLE_LENGTH: u16 = u16::MAX;

const MAX_SET_BYTES: usize = u16::MAX as usize;

/// A field as announced by a template record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    /// Information element ID, without the enterprise bit.
    pub element_id: u16,

    /// Length of the field in each data record, in bytes.
    pub length: u16,

    /// Private enterprise number, for enterprise-specific elements.
    pub enterprise: Option<u32>,
}

/// A template field, resolved to its decoder.
#[derive(Clone, Debug)]
pub struct FieldDefn {
    spec: FieldSpec,
    decoder: FieldDecoder,
}

impl FieldDefn {
    fn resolve(spec: FieldSpec) -> Self {
        let decoder = match spec.enterprise {
            Some(enterprise) => {
                debug!(
                    element_id = spec.element_id,
                    enterprise,
                    length = spec.length,
                    "Skipping enterprise-specific field."
                );
                FieldDecoder::opaque(spec.length)
            }
            None => catalog::field_decoder(spec.element_id, spec.length).unwrap_or_else(|e| {
                debug!(error = %e, "Skipping field with unsupported length.");
                FieldDecoder::opaque(spec.length)
            }),
        };

        Self { spec, decoder }
    }

    /// Returns the field as announced by the template.
    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    /// Returns the decoder resolved for the field.
    pub fn decoder(&self) -> &FieldDecoder {
        &self.decoder
    }
}

/// A learned record layout.
pub struct TemplateDefn {
    template_id: u16,
    fields: Vec<FieldDefn>,
    record_len: usize,
    record: Arc<Directive<TemplateCache>>,
}

impl TemplateDefn {
    /// Compiles a template from its announced fields.
    ///
    /// Returns `None` if records of this template cannot be decoded: when the fields add up to zero bytes, or when any
    /// field is variable-length.
    pub fn compile<I>(template_id: u16, specs: I) -> Option<Self>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        let fields = specs.into_iter().map(FieldDefn::resolve).collect::<Vec<_>>();
        if fields.iter().any(|field| field.spec.length == VARIABLE_LENGTH) {
            debug!(template_id, "Ignoring template with variable-length fields.");
            return None;
        }

        let record_len = fields.iter().map(|field| usize::from(field.spec.length)).sum::<usize>();
        if record_len == 0 {
            debug!(template_id, "Ignoring template with empty records.");
            return None;
        }

        let mut steps = Vec::with_capacity(fields.len() + 2);
        steps.push(open_metric(METRIC_NAME));
        steps.extend(fields.iter().map(|field| field.decoder.directive()));
        steps.push(close_metric());

        // Records repeat until less than one whole record is left, which is padding.
        let record = Directive::seq([
            iterate(
                MAX_SET_BYTES / record_len,
                Directive::seq(steps),
                IterOptions::new().stop_below(record_len),
            ),
            skip_rest(),
        ]);

        Some(Self {
            template_id,
            fields,
            record_len,
            record: Arc::new(record),
        })
    }

    /// Returns the template ID.
    pub fn template_id(&self) -> u16 {
        self.template_id
    }

    /// Returns the fields, in record order.
    pub fn fields(&self) -> &[FieldDefn] {
        &self.fields
    }

    /// Returns the length of one data record, in bytes.
    pub fn record_len(&self) -> usize {
        self.record_len
    }
}

impl std::fmt::Debug for TemplateDefn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateDefn")
            .field("template_id", &self.template_id)
            .field("fields", &self.fields)
            .field("record_len", &self.record_len)
            .finish_non_exhaustive()
    }
}

/// Templates announced by one exporter.
#[derive(Debug)]
pub struct ObservationDomain {
    source_id: u32,
    templates: FastHashMap<u16, Arc<TemplateDefn>>,
    warned: bool,
}

impl ObservationDomain {
    fn new(source_id: u32) -> Self {
        Self {
            source_id,
            templates: FastHashMap::with_hasher(get_fast_build_hasher()),
            warned: false,
        }
    }

    /// Returns the observation domain ID (the source ID, in NetFlow v9).
    pub fn source_id(&self) -> u32 {
        self.source_id
    }

    /// Gets a template by ID.
    pub fn template(&self, template_id: u16) -> Option<&TemplateDefn> {
        self.templates.get(&template_id).map(Arc::as_ref)
    }

    /// Returns the number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if the domain has no templates.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Templates learned from every exporter, by observation domain.
///
/// Templates are kept until they are withdrawn by their exporter or explicitly forgotten.
#[derive(Debug)]
pub struct TemplateCache {
    domains: FastHashMap<u32, ObservationDomain>,
    pending: Vec<FieldSpec>,
}

impl TemplateCache {
    /// Creates an empty `TemplateCache`.
    pub fn new() -> Self {
        Self {
            domains: FastHashMap::with_hasher(get_fast_build_hasher()),
            pending: Vec::new(),
        }
    }

    /// Returns the total number of templates, across all observation domains.
    pub fn template_count(&self) -> usize {
        self.domains.values().map(ObservationDomain::len).sum()
    }

    /// Gets an observation domain.
    pub fn domain(&self, source_id: u32) -> Option<&ObservationDomain> {
        self.domains.get(&source_id)
    }

    /// Gets a template.
    pub fn template(&self, source_id: u32, template_id: u16) -> Option<&TemplateDefn> {
        self.domain(source_id).and_then(|domain| domain.template(template_id))
    }

    /// Removes an observation domain and all of its templates.
    pub fn remove_domain(&mut self, source_id: u32) -> Option<ObservationDomain> {
        self.domains.remove(&source_id)
    }

    /// Removes every template.
    pub fn clear(&mut self) {
        self.domains.clear();
        self.pending.clear();
    }

    /// Inserts a template, replacing any previous definition with the same ID.
    pub fn insert(&mut self, source_id: u32, template: TemplateDefn) {
        let domain = self
            .domains
            .entry(source_id)
            .or_insert_with(|| ObservationDomain::new(source_id));

        let template_id = template.template_id;
        if domain.templates.insert(template_id, Arc::new(template)).is_some() {
            debug!(source_id, template_id, "Replaced template.");
        } else {
            debug!(source_id, template_id, "Learned template.");
        }

        if !domain.warned && domain.templates.len() > TEMPLATE_WARN_THRESHOLD {
            domain.warned = true;
            warn!(
                source_id,
                templates = domain.templates.len(),
                "Observation domain holds an unusually large number of templates."
            );
        }
    }

    /// Removes a template.
    pub fn withdraw(&mut self, source_id: u32, template_id: u16) -> bool {
        let removed = self
            .domains
            .get_mut(&source_id)
            .is_some_and(|domain| domain.templates.remove(&template_id).is_some());
        if removed {
            debug!(source_id, template_id, "Withdrew template.");
        }
        removed
    }

    pub(crate) fn begin_template(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn push_field(&mut self, spec: FieldSpec) {
        self.pending.push(spec);
    }

    pub(crate) fn finish_template(&mut self, source_id: u32, template_id: u16) {
        let fields = std::mem::take(&mut self.pending);

        if template_id < MIN_TEMPLATE_ID {
            debug!(source_id, template_id, "Ignoring template with reserved ID.");
            return;
        }

        if fields.is_empty() {
            self.withdraw(source_id, template_id);
            return;
        }

        match TemplateDefn::compile(template_id, fields) {
            Some(template) => self.insert(source_id, template),
            // Whatever the previous layout was, it no longer describes this ID.
            None => {
                self.withdraw(source_id, template_id);
            }
        }
    }

    pub(crate) fn record_directive(&self, source_id: u32, set_id: u16) -> Option<Arc<Directive<Self>>> {
        self.domains
            .get(&source_id)?
            .templates
            .get(&set_id)
            .map(|template| Arc::clone(&template.record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(element_id: u16, length: u16) -> FieldSpec {
        FieldSpec {
            element_id,
            length,
            enterprise: None,
        }
    }

    #[test]
    fn compile_resolves_fields() {
        let template = TemplateDefn::compile(256, [spec(8, 4), spec(7, 2), spec(9999, 3)]).unwrap();
        assert_eq!(template.record_len(), 9);

        let names = template
            .fields()
            .iter()
            .map(|field| field.decoder().element().map(|e| e.name))
            .collect::<Vec<_>>();
        assert_eq!(names, [Some("sourceIPv4Address"), Some("sourceTransportPort"), None]);
    }

    #[test]
    fn compile_degrades_bad_lengths_and_enterprise_fields() {
        let enterprise = FieldSpec {
            element_id: 8,
            length: 4,
            enterprise: Some(9),
        };
        let template = TemplateDefn::compile(256, [spec(8, 3), enterprise]).unwrap();
        assert!(template.fields().iter().all(|field| field.decoder().element().is_none()));
        assert_eq!(template.record_len(), 7);
    }

    #[test]
    fn compile_rejects_undecodable_layouts() {
        assert!(TemplateDefn::compile(256, []).is_none());
        assert!(TemplateDefn::compile(256, [spec(70, 0)]).is_none());
        assert!(TemplateDefn::compile(256, [spec(1, 4), spec(70, u16::MAX)]).is_none());
    }

    #[test]
    fn redefinition_replaces() {
        let mut cache = TemplateCache::new();
        cache.begin_template();
        cache.push_field(spec(8, 4));
        cache.finish_template(7, 256);
        assert_eq!(cache.template(7, 256).map(TemplateDefn::record_len), Some(4));

        cache.begin_template();
        cache.push_field(spec(1, 8));
        cache.push_field(spec(2, 8));
        cache.finish_template(7, 256);
        assert_eq!(cache.template_count(), 1);
        assert_eq!(cache.template(7, 256).map(TemplateDefn::record_len), Some(16));
    }

    #[test]
    fn domains_are_independent() {
        let mut cache = TemplateCache::new();
        cache.insert(1, TemplateDefn::compile(256, [spec(1, 4)]).unwrap());
        cache.insert(2, TemplateDefn::compile(256, [spec(1, 8)]).unwrap());

        assert_eq!(cache.template_count(), 2);
        assert!(cache.record_directive(1, 256).is_some());
        assert!(cache.record_directive(3, 256).is_none());

        let removed = cache.remove_domain(1).unwrap();
        assert_eq!(removed.source_id(), 1);
        assert_eq!(cache.template_count(), 1);

        cache.clear();
        assert_eq!(cache.template_count(), 0);
    }

    #[test]
    fn empty_record_withdraws() {
        let mut cache = TemplateCache::new();
        cache.insert(7, TemplateDefn::compile(300, [spec(1, 4)]).unwrap());

        cache.begin_template();
        cache.finish_template(7, 300);
        assert!(cache.template(7, 300).is_none());
        assert!(cache.domain(7).is_some_and(ObservationDomain::is_empty));
    }

    #[test]
    fn reserved_ids_ignored() {
        let mut cache = TemplateCache::new();
        cache.begin_template();
        cache.push_field(spec(1, 4));
        cache.finish_template(7, 255);
        assert_eq!(cache.template_count(), 0);
    }
}
