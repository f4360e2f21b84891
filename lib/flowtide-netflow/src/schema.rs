//! NetFlow v9 and IPFIX packet grammar.
use std::sync::Arc;

use flowtide_decoder::{
    iterate, notify, ops, reference, seq, skip_rest, u16, u32, Directive, EncapsulationOptions, IterOptions, Schema,
    SchemaBuilder, SlotRef, Switch,
};
use tracing::debug;

use crate::template::{FieldSpec, TemplateCache};

/// NetFlow v9 header version.
pub const VERSION_V9: u16 = 9;

/// IPFIX header version.
pub const VERSION_IPFIX: u16 = 10;

const V9_TEMPLATE_SET: u16 = 0;
const V9_OPTIONS_TEMPLATE_SET: u16 = 1;
const IPFIX_TEMPLATE_SET: u16 = 2;
const IPFIX_OPTIONS_TEMPLATE_SET: u16 = 3;

/// Bit of the element ID marking an enterprise-specific element, in IPFIX field specifiers.
const ENTERPRISE_BIT: u16 = 0x8000;

/// Length of a set header, counted by the set's length field.
const SET_HEADER_LEN: usize = 4;

/// Length of the version and length fields, counted by the IPFIX message length.
const IPFIX_PREFIX_LEN: usize = 4;

const MAX_MESSAGE_LEN: usize = u16::MAX as usize;
const MAX_SETS: usize = MAX_MESSAGE_LEN / SET_HEADER_LEN;
const MAX_TEMPLATE_RECORDS: usize = MAX_MESSAGE_LEN / 4;
const MAX_TEMPLATE_FIELDS: usize = 1024;

/// Builds the schema decoding NetFlow v9 and IPFIX packets.
///
/// Any version other than 9 or 10 fails the decode with [`NoMatchingCase`][flowtide_decoder::DecodeError].
pub fn build() -> Schema<TemplateCache> {
    let mut builder = SchemaBuilder::new();
    let v9 = v9(&mut builder);
    let ipfix = ipfix(&mut builder);

    builder.build(u16().switch(Switch::new().case(VERSION_V9, v9).case(VERSION_IPFIX, ipfix)))
}

/// `count | sysUptime | exportTime | sequenceNumber | sourceID`, then FlowSets until the end of the packet.
fn v9(builder: &mut SchemaBuilder) -> Directive<TemplateCache> {
    let (domain_w, domain_r) = builder.slot::<u32>();

    let template_field = {
        let (type_w, type_r) = builder.slot::<u16>();
        let (len_w, len_r) = builder.slot::<u16>();
        seq![
            u16().alias(type_w),
            u16().alias(len_w),
            notify(move |cx, cache: &mut TemplateCache| {
                cache.push_field(FieldSpec {
                    element_id: cx.get(type_r),
                    length: cx.get(len_r),
                    enterprise: None,
                });
                Ok(())
            }),
        ]
    };
    let template_set = template_set(builder, domain_r, template_field);
    let flowset = set(builder, domain_r, V9_TEMPLATE_SET, V9_OPTIONS_TEMPLATE_SET, template_set);

    seq![
        // Counts records across all FlowSets, so it can't bound the FlowSet loop.
        u16(),
        u32().then(ops::as_field("sysUptime")),
        u32().then(ops::timestamp()),
        u32(),
        u32().alias(domain_w).then(ops::as_tag("sourceID")),
        iterate(MAX_SETS, flowset, IterOptions::new().eof_terminates()),
    ]
}

/// `length | exportTime | sequenceNumber | observationDomainID`, then Sets until `length` is exhausted.
fn ipfix(builder: &mut SchemaBuilder) -> Directive<TemplateCache> {
    let (domain_w, domain_r) = builder.slot::<u32>();

    let template_field = {
        let (type_w, type_r) = builder.slot::<u16>();
        let (len_w, len_r) = builder.slot::<u16>();
        let (pen_w, pen_r) = builder.slot::<u32>();
        let enterprise_number = Arc::new(Directive::from(u32().alias(pen_w)));
        seq![
            u16().alias(type_w),
            u16().alias(len_w),
            reference(type_r).switch(
                Switch::new()
                    .dynamic(move |element_id: &u16, _, _| {
                        (element_id & ENTERPRISE_BIT != 0).then(|| Arc::clone(&enterprise_number))
                    })
                    .default(Directive::noop()),
            ),
            notify(move |cx, cache: &mut TemplateCache| {
                let element_id = cx.get(type_r);
                cache.push_field(FieldSpec {
                    element_id: element_id & !ENTERPRISE_BIT,
                    length: cx.get(len_r),
                    enterprise: (element_id & ENTERPRISE_BIT != 0).then(|| cx.get(pen_r)),
                });
                Ok(())
            }),
        ]
    };
    let template_set = template_set(builder, domain_r, template_field);
    let flowset = set(builder, domain_r, IPFIX_TEMPLATE_SET, IPFIX_OPTIONS_TEMPLATE_SET, template_set);

    seq![u16().encapsulated(
        EncapsulationOptions::new(MAX_MESSAGE_LEN).including(IPFIX_PREFIX_LEN),
        seq![
            u32().then(ops::timestamp()),
            u32(),
            u32().alias(domain_w).then(ops::as_tag("sourceID")),
            iterate(MAX_SETS, flowset, IterOptions::new().eof_terminates()),
        ],
    )]
}

/// Template records, each `templateID | fieldCount | fieldCount × field`, until only padding is left.
fn template_set(
    builder: &mut SchemaBuilder, domain: SlotRef<u32>, field: Directive<TemplateCache>,
) -> Directive<TemplateCache> {
    let (template_id_w, template_id_r) = builder.slot::<u16>();

    let record = seq![
        notify(|_, cache: &mut TemplateCache| {
            cache.begin_template();
            Ok(())
        }),
        u16().alias(template_id_w),
        u16().iter(MAX_TEMPLATE_FIELDS, field, IterOptions::new()),
        notify(move |cx, cache: &mut TemplateCache| {
            cache.finish_template(cx.get(domain), cx.get(template_id_r));
            Ok(())
        }),
    ];

    seq![
        iterate(MAX_TEMPLATE_RECORDS, record, IterOptions::new().stop_below(4)),
        skip_rest(),
    ]
}

/// `setID | length`, then the set body, dispatched on the set ID.
///
/// Data sets are decoded with the template learned for their ID in the packet's observation domain, and skipped when
/// there is none.
fn set(
    builder: &mut SchemaBuilder, domain: SlotRef<u32>, template_set_id: u16, options_template_set_id: u16,
    template_set: Directive<TemplateCache>,
) -> Directive<TemplateCache> {
    let (set_id_w, set_id_r) = builder.slot::<u16>();

    let unknown = seq![
        notify(move |cx, _: &mut TemplateCache| {
            debug!(
                set_id = cx.get(set_id_r),
                source_id = cx.get(domain),
                "Skipping set without a known template."
            );
            Ok(())
        }),
        skip_rest(),
    ];

    seq![
        u16().alias(set_id_w),
        u16().encapsulated(
            EncapsulationOptions::new(MAX_MESSAGE_LEN).including(SET_HEADER_LEN),
            reference(set_id_r).switch(
                Switch::new()
                    .case(template_set_id, template_set)
                    .case(options_template_set_id, skip_rest())
                    .dynamic(move |set_id: &u16, cx, cache: &TemplateCache| {
                        cache.record_directive(cx.get(domain), *set_id)
                    })
                    .default(unknown),
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use flowtide_decoder::DecodeError;

    use super::*;

    fn assert_send_sync<T: Send + Sync>(_: &T) {}

    #[test]
    fn schema_is_shareable() {
        let schema = build();
        assert_send_sync(&schema);
        assert!(schema.slot_count() > 0);
    }

    #[test]
    fn unknown_version_has_no_branch() {
        let schema = build();
        let mut cx = schema.new_context(true);
        let mut cache = TemplateCache::new();

        let mut buf: &[u8] = &[0, 5, 0, 0];
        let err = schema.execute(&mut buf, &mut cx, &mut cache).unwrap_err();
        assert!(matches!(err, DecodeError::NoMatchingCase { .. }));
    }

    #[test]
    fn ipfix_message_length_shorter_than_prefix() {
        let schema = build();
        let mut cx = schema.new_context(true);
        let mut cache = TemplateCache::new();

        let mut buf: &[u8] = &[0, 10, 0, 2, 0, 0];
        let err = schema.execute(&mut buf, &mut cx, &mut cache).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidEncapsulationLength { declared: 2, header: 4 }
        ));
    }

    #[test]
    fn v9_header_without_flowsets() {
        let schema = build();
        let mut cx = schema.new_context(true);
        let mut cache = TemplateCache::new();

        let mut packet = vec![0, 9, 0, 0];
        packet.extend_from_slice(&[0; 4]);
        packet.extend_from_slice(&1_700_000_000u32.to_be_bytes());
        packet.extend_from_slice(&[0; 4]);
        packet.extend_from_slice(&7u32.to_be_bytes());

        let mut buf = packet.as_slice();
        schema.execute(&mut buf, &mut cx, &mut cache).unwrap();
        assert!(buf.is_empty());
        assert_eq!(cx.timestamp(), 1_700_000_000);
        assert!(cx.metrics().is_empty());
    }
}
