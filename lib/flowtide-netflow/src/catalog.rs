//! Field decoders for IPFIX information elements.
//!
//! Every element a template can reference is described by an [`InformationElement`]: its name, how its bytes are
//! interpreted, and whether it identifies a flow (emitted as a tag) or measures it (emitted as a field). The catalog
//! turns an element and the length announced for it by a template into a [`FieldDecoder`].
use flowtide_decoder::{bytes, ops, u16, u32, u64, u8, Directive};
use flowtide_event::FieldValue;
use snafu::Snafu;

/// How the bytes of an element are interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// A big-endian unsigned integer, 1, 2, 4 or 8 bytes long.
    Unsigned,

    /// An IPv4 address, rendered in dotted-decimal notation.
    Ipv4,

    /// An IPv6 address, rendered in its canonical text form.
    Ipv6,

    /// A MAC address, rendered as colon-separated hex.
    Mac,

    /// Opaque bytes of any length, rendered as lowercase hex.
    Hex,
}

impl Kind {
    fn accepts(&self, length: u16) -> bool {
        match self {
            Self::Unsigned => matches!(length, 1 | 2 | 4 | 8),
            Self::Ipv4 => length == 4,
            Self::Ipv6 => length == 16,
            Self::Mac => length == 6,
            Self::Hex => true,
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Self::Unsigned => "1, 2, 4 or 8",
            Self::Ipv4 => "4",
            Self::Ipv6 => "16",
            Self::Mac => "6",
            Self::Hex => "any",
        }
    }
}

/// Whether an element is emitted as a tag or as a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Class {
    /// Emitted as a tag.
    Tag,

    /// Emitted as a field.
    Field,
}

/// A known information element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InformationElement {
    /// Element ID.
    pub id: u16,

    /// Element name, used as the tag or field name.
    pub name: &'static str,

    /// Interpretation of the element's bytes.
    pub kind: Kind,

    /// Tag or field.
    pub class: Class,
}

const fn ie(id: u16, name: &'static str, kind: Kind, class: Class) -> InformationElement {
    InformationElement { id, name, kind, class }
}

/// Catalog errors.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum CatalogError {
    /// A template announced a length the element cannot be decoded with.
    #[snafu(display(
        "unsupported length {} for element {} ({}): expected {} bytes",
        length,
        name,
        id,
        expected
    ))]
    UnsupportedLength {
        /// Element ID.
        id: u16,

        /// Element name.
        name: &'static str,

        /// Announced length.
        length: u16,

        /// Accepted lengths.
        expected: &'static str,
    },
}

/// A resolved decoder for one field of a template.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldDecoder {
    element: Option<&'static InformationElement>,
    length: u16,
}

impl FieldDecoder {
    /// Creates a decoder that skips `length` bytes without emitting anything.
    pub fn opaque(length: u16) -> Self {
        Self { element: None, length }
    }

    /// Returns the element this decoder emits, or `None` if it only skips bytes.
    pub fn element(&self) -> Option<&'static InformationElement> {
        self.element
    }

    /// Returns the number of bytes this decoder consumes.
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Builds the directive decoding the field.
    pub fn directive<S: 'static>(&self) -> Directive<S> {
        let Some(element) = self.element else {
            return bytes(usize::from(self.length)).into();
        };

        let name = element.name;
        match (element.kind, element.class) {
            (Kind::Unsigned, class) => match self.length {
                1 => u8().then(emit(name, class)),
                2 => u16().then(emit(name, class)),
                4 => u32().then(emit(name, class)),
                // Only 8 remains once the length has been checked.
                _ => u64().then(emit(name, class)),
            },
            (kind, class) => {
                let chain = match kind {
                    Kind::Ipv4 => ops::ipv4(),
                    Kind::Ipv6 => ops::ipv6(),
                    Kind::Mac => ops::mac(),
                    _ => ops::hex(),
                };
                let op = match class {
                    Class::Tag => chain.as_tag(name),
                    Class::Field => chain.as_field(name),
                };
                bytes(usize::from(self.length)).then(op)
            }
        }
    }
}

fn emit<T>(name: &'static str, class: Class) -> ops::Op<T>
where
    T: Into<FieldValue> + std::fmt::Display + 'static,
{
    match class {
        Class::Tag => ops::as_tag(name),
        Class::Field => ops::as_field(name),
    }
}

/// Looks up an information element by ID.
pub fn element(id: u16) -> Option<&'static InformationElement> {
    ELEMENTS
        .binary_search_by_key(&id, |element| element.id)
        .ok()
        .map(|index| &ELEMENTS[index])
}

/// Resolves the decoder for element `id` announced with `length` bytes.
///
/// Unknown elements resolve to an opaque decoder skipping `length` bytes.
///
/// # Errors
///
/// If the element is known but cannot be decoded from `length` bytes, an error is returned.
pub fn field_decoder(id: u16, length: u16) -> Result<FieldDecoder, CatalogError> {
    match element(id) {
        None => Ok(FieldDecoder::opaque(length)),
        Some(element) if element.kind.accepts(length) => Ok(FieldDecoder {
            element: Some(element),
            length,
        }),
        Some(element) => UnsupportedLength {
            id,
            name: element.name,
            length,
            expected: element.kind.expected(),
        }
        .fail(),
    }
}

static ELEMENTS: &[InformationElement] = &[
    ie(1, "octetDeltaCount", Kind::Unsigned, Class::Field),
    ie(2, "packetDeltaCount", Kind::Unsigned, Class::Field),
    ie(3, "deltaFlowCount", Kind::Unsigned, Class::Field),
    ie(4, "protocolIdentifier", Kind::Unsigned, Class::Tag),
    ie(5, "ipClassOfService", Kind::Unsigned, Class::Tag),
    ie(6, "tcpControlBits", Kind::Unsigned, Class::Tag),
    ie(7, "sourceTransportPort", Kind::Unsigned, Class::Tag),
    ie(8, "sourceIPv4Address", Kind::Ipv4, Class::Tag),
    ie(9, "sourceIPv4PrefixLength", Kind::Unsigned, Class::Tag),
    ie(10, "ingressInterface", Kind::Unsigned, Class::Tag),
    ie(11, "destinationTransportPort", Kind::Unsigned, Class::Tag),
    ie(12, "destinationIPv4Address", Kind::Ipv4, Class::Tag),
    ie(13, "destinationIPv4PrefixLength", Kind::Unsigned, Class::Tag),
    ie(14, "egressInterface", Kind::Unsigned, Class::Tag),
    ie(15, "ipNextHopIPv4Address", Kind::Ipv4, Class::Field),
    ie(16, "bgpSourceAsNumber", Kind::Unsigned, Class::Tag),
    ie(17, "bgpDestinationAsNumber", Kind::Unsigned, Class::Tag),
    ie(18, "bgpNextHopIPv4Address", Kind::Ipv4, Class::Tag),
    ie(19, "postMCastPacketDeltaCount", Kind::Unsigned, Class::Field),
    ie(20, "postMCastOctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(21, "flowEndSysUpTime", Kind::Unsigned, Class::Field),
    ie(22, "flowStartSysUpTime", Kind::Unsigned, Class::Field),
    ie(23, "postOctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(24, "postPacketDeltaCount", Kind::Unsigned, Class::Field),
    ie(25, "minimumIpTotalLength", Kind::Unsigned, Class::Field),
    ie(26, "maximumIpTotalLength", Kind::Unsigned, Class::Field),
    ie(27, "sourceIPv6Address", Kind::Ipv6, Class::Tag),
    ie(28, "destinationIPv6Address", Kind::Ipv6, Class::Tag),
    ie(29, "sourceIPv6PrefixLength", Kind::Unsigned, Class::Field),
    ie(30, "destinationIPv6PrefixLength", Kind::Unsigned, Class::Field),
    ie(31, "flowLabelIPv6", Kind::Unsigned, Class::Field),
    ie(32, "icmpTypeCodeIPv4", Kind::Unsigned, Class::Field),
    ie(33, "igmpType", Kind::Unsigned, Class::Field),
    ie(34, "samplingInterval", Kind::Unsigned, Class::Field),
    ie(35, "samplingAlgorithm", Kind::Unsigned, Class::Field),
    ie(36, "flowActiveTimeout", Kind::Unsigned, Class::Field),
    ie(37, "flowIdleTimeout", Kind::Unsigned, Class::Field),
    ie(38, "engineType", Kind::Unsigned, Class::Field),
    ie(39, "engineId", Kind::Unsigned, Class::Field),
    ie(40, "exportedOctetTotalCount", Kind::Unsigned, Class::Field),
    ie(41, "exportedMessageTotalCount", Kind::Unsigned, Class::Field),
    ie(42, "exportedFlowRecordTotalCount", Kind::Unsigned, Class::Field),
    ie(43, "ipv4RouterSc", Kind::Ipv4, Class::Field),
    ie(44, "sourceIPv4Prefix", Kind::Ipv4, Class::Field),
    ie(45, "destinationIPv4Prefix", Kind::Ipv4, Class::Field),
    ie(46, "mplsTopLabelType", Kind::Unsigned, Class::Field),
    ie(47, "mplsTopLabelIPv4Address", Kind::Ipv4, Class::Field),
    ie(48, "samplerId", Kind::Unsigned, Class::Tag),
    ie(49, "samplerMode", Kind::Unsigned, Class::Field),
    ie(50, "samplerRandomInterval", Kind::Unsigned, Class::Field),
    ie(51, "classId", Kind::Unsigned, Class::Field),
    ie(52, "minimumTTL", Kind::Unsigned, Class::Field),
    ie(53, "maximumTTL", Kind::Unsigned, Class::Field),
    ie(54, "fragmentIdentification", Kind::Unsigned, Class::Field),
    ie(55, "postIpClassOfService", Kind::Unsigned, Class::Field),
    ie(56, "sourceMacAddress", Kind::Mac, Class::Field),
    ie(57, "postDestinationMacAddress", Kind::Mac, Class::Field),
    ie(58, "vlanId", Kind::Unsigned, Class::Field),
    ie(59, "postVlanId", Kind::Unsigned, Class::Field),
    ie(60, "ipVersion", Kind::Unsigned, Class::Field),
    ie(61, "flowDirection", Kind::Unsigned, Class::Tag),
    ie(62, "ipNextHopIPv6Address", Kind::Ipv6, Class::Field),
    ie(63, "bgpNextHopIPv6Address", Kind::Ipv6, Class::Field),
    ie(64, "ipv6ExtensionHeaders", Kind::Unsigned, Class::Field),
    ie(70, "mplsTopLabelStackSection", Kind::Hex, Class::Tag),
    ie(71, "mplsLabelStackSection2", Kind::Hex, Class::Field),
    ie(72, "mplsLabelStackSection3", Kind::Hex, Class::Field),
    ie(73, "mplsLabelStackSection4", Kind::Hex, Class::Field),
    ie(74, "mplsLabelStackSection5", Kind::Hex, Class::Field),
    ie(75, "mplsLabelStackSection6", Kind::Hex, Class::Field),
    ie(76, "mplsLabelStackSection7", Kind::Hex, Class::Field),
    ie(77, "mplsLabelStackSection8", Kind::Hex, Class::Field),
    ie(78, "mplsLabelStackSection9", Kind::Hex, Class::Field),
    ie(79, "mplsLabelStackSection10", Kind::Hex, Class::Field),
    ie(80, "destinationMacAddress", Kind::Mac, Class::Field),
    ie(81, "postSourceMacAddress", Kind::Mac, Class::Field),
    ie(85, "octetTotalCount", Kind::Unsigned, Class::Field),
    ie(86, "packetTotalCount", Kind::Unsigned, Class::Field),
    ie(87, "flagsAndSamplerId", Kind::Unsigned, Class::Field),
    ie(88, "fragmentOffset", Kind::Unsigned, Class::Field),
    ie(89, "forwardingStatus", Kind::Unsigned, Class::Tag),
    ie(90, "mplsVpnRouteDistinguisher", Kind::Hex, Class::Field),
    ie(91, "mplsTopLabelPrefixLength", Kind::Unsigned, Class::Field),
    ie(92, "srcTrafficIndex", Kind::Unsigned, Class::Field),
    ie(93, "dstTrafficIndex", Kind::Unsigned, Class::Field),
    ie(95, "applicationId", Kind::Hex, Class::Field),
    ie(98, "postIpDiffServCodePoint", Kind::Unsigned, Class::Field),
    ie(99, "multicastReplicationFactor", Kind::Unsigned, Class::Field),
    ie(101, "classificationEngineId", Kind::Unsigned, Class::Field),
    ie(102, "layer2packetSectionOffset", Kind::Unsigned, Class::Field),
    ie(103, "layer2packetSectionSize", Kind::Unsigned, Class::Field),
    ie(104, "layer2packetSectionData", Kind::Hex, Class::Field),
    ie(128, "bgpNextAdjacentAsNumber", Kind::Unsigned, Class::Field),
    ie(129, "bgpPrevAdjacentAsNumber", Kind::Unsigned, Class::Field),
    ie(130, "exporterIPv4Address", Kind::Ipv4, Class::Field),
    ie(131, "exporterIPv6Address", Kind::Ipv6, Class::Field),
    ie(132, "droppedOctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(133, "droppedPacketDeltaCount", Kind::Unsigned, Class::Field),
    ie(134, "droppedOctetTotalCount", Kind::Unsigned, Class::Field),
    ie(135, "droppedPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(136, "flowEndReason", Kind::Unsigned, Class::Field),
    ie(137, "commonPropertiesId", Kind::Unsigned, Class::Field),
    ie(138, "observationPointId", Kind::Unsigned, Class::Field),
    ie(139, "icmpTypeCodeIPv6", Kind::Unsigned, Class::Field),
    ie(140, "mplsTopLabelIPv6Address", Kind::Ipv6, Class::Field),
    ie(141, "lineCardId", Kind::Unsigned, Class::Field),
    ie(142, "portId", Kind::Unsigned, Class::Field),
    ie(143, "meteringProcessId", Kind::Unsigned, Class::Field),
    ie(144, "exportingProcessId", Kind::Unsigned, Class::Field),
    ie(145, "templateId", Kind::Unsigned, Class::Field),
    ie(146, "wlanChannelId", Kind::Unsigned, Class::Field),
    ie(148, "flowId", Kind::Unsigned, Class::Field),
    ie(149, "observationDomainId", Kind::Unsigned, Class::Field),
    ie(158, "flowStartDeltaMicroseconds", Kind::Unsigned, Class::Field),
    ie(159, "flowEndDeltaMicroseconds", Kind::Unsigned, Class::Field),
    ie(161, "flowDurationMilliseconds", Kind::Unsigned, Class::Field),
    ie(162, "flowDurationMicroseconds", Kind::Unsigned, Class::Field),
    ie(163, "observedFlowTotalCount", Kind::Unsigned, Class::Field),
    ie(164, "ignoredPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(165, "ignoredOctetTotalCount", Kind::Unsigned, Class::Field),
    ie(166, "notSentFlowTotalCount", Kind::Unsigned, Class::Field),
    ie(167, "notSentPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(168, "notSentOctetTotalCount", Kind::Unsigned, Class::Field),
    ie(169, "destinationIPv6Prefix", Kind::Ipv6, Class::Field),
    ie(170, "sourceIPv6Prefix", Kind::Ipv6, Class::Field),
    ie(171, "postOctetTotalCount", Kind::Unsigned, Class::Field),
    ie(172, "postPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(173, "flowKeyIndicator", Kind::Unsigned, Class::Field),
    ie(174, "postMCastPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(175, "postMCastOctetTotalCount", Kind::Unsigned, Class::Field),
    ie(176, "icmpTypeIPv4", Kind::Unsigned, Class::Field),
    ie(177, "icmpCodeIPv4", Kind::Unsigned, Class::Field),
    ie(178, "icmpTypeIPv6", Kind::Unsigned, Class::Field),
    ie(179, "icmpCodeIPv6", Kind::Unsigned, Class::Field),
    ie(180, "udpSourcePort", Kind::Unsigned, Class::Field),
    ie(181, "udpDestinationPort", Kind::Unsigned, Class::Field),
    ie(182, "tcpSourcePort", Kind::Unsigned, Class::Field),
    ie(183, "tcpDestinationPort", Kind::Unsigned, Class::Field),
    ie(184, "tcpSequenceNumber", Kind::Unsigned, Class::Field),
    ie(185, "tcpAcknowledgementNumber", Kind::Unsigned, Class::Field),
    ie(186, "tcpWindowSize", Kind::Unsigned, Class::Field),
    ie(187, "tcpUrgentPointer", Kind::Unsigned, Class::Field),
    ie(188, "tcpHeaderLength", Kind::Unsigned, Class::Field),
    ie(189, "ipHeaderLength", Kind::Unsigned, Class::Field),
    ie(190, "totalLengthIPv4", Kind::Unsigned, Class::Field),
    ie(191, "payloadLengthIPv6", Kind::Unsigned, Class::Field),
    ie(192, "ipTTL", Kind::Unsigned, Class::Field),
    ie(193, "nextHeaderIPv6", Kind::Unsigned, Class::Field),
    ie(194, "mplsPayloadLength", Kind::Unsigned, Class::Field),
    ie(195, "ipDiffServCodePoint", Kind::Unsigned, Class::Field),
    ie(196, "ipPrecedence", Kind::Unsigned, Class::Field),
    ie(197, "fragmentFlags", Kind::Unsigned, Class::Field),
    ie(198, "octetDeltaSumOfSquares", Kind::Unsigned, Class::Field),
    ie(199, "octetTotalSumOfSquares", Kind::Unsigned, Class::Field),
    ie(200, "mplsTopLabelTTL", Kind::Unsigned, Class::Field),
    ie(201, "mplsLabelStackLength", Kind::Unsigned, Class::Field),
    ie(202, "mplsLabelStackDepth", Kind::Unsigned, Class::Field),
    ie(203, "mplsTopLabelExp", Kind::Unsigned, Class::Field),
    ie(204, "ipPayloadLength", Kind::Unsigned, Class::Field),
    ie(205, "udpMessageLength", Kind::Unsigned, Class::Field),
    ie(206, "isMulticast", Kind::Unsigned, Class::Field),
    ie(207, "ipv4IHL", Kind::Unsigned, Class::Field),
    ie(208, "ipv4Options", Kind::Unsigned, Class::Field),
    ie(209, "tcpOptions", Kind::Unsigned, Class::Field),
    ie(210, "paddingOctets", Kind::Hex, Class::Field),
    ie(211, "collectorIPv4Address", Kind::Ipv4, Class::Field),
    ie(212, "collectorIPv6Address", Kind::Ipv6, Class::Field),
    ie(213, "exportInterface", Kind::Unsigned, Class::Field),
    ie(214, "exportProtocolVersion", Kind::Unsigned, Class::Field),
    ie(215, "exportTransportProtocol", Kind::Unsigned, Class::Field),
    ie(216, "collectorTransportPort", Kind::Unsigned, Class::Field),
    ie(217, "exporterTransportPort", Kind::Unsigned, Class::Field),
    ie(218, "tcpSynTotalCount", Kind::Unsigned, Class::Field),
    ie(219, "tcpFinTotalCount", Kind::Unsigned, Class::Field),
    ie(220, "tcpRstTotalCount", Kind::Unsigned, Class::Field),
    ie(221, "tcpPshTotalCount", Kind::Unsigned, Class::Field),
    ie(222, "tcpAckTotalCount", Kind::Unsigned, Class::Field),
    ie(223, "tcpUrgTotalCount", Kind::Unsigned, Class::Field),
    ie(224, "ipTotalLength", Kind::Unsigned, Class::Field),
    ie(225, "postNATSourceIPv4Address", Kind::Ipv4, Class::Field),
    ie(226, "postNATDestinationIPv4Address", Kind::Ipv4, Class::Field),
    ie(227, "postNAPTSourceTransportPort", Kind::Unsigned, Class::Field),
    ie(228, "postNAPTDestinationTransportPort", Kind::Unsigned, Class::Field),
    ie(229, "natOriginatingAddressRealm", Kind::Unsigned, Class::Field),
    ie(230, "natEvent", Kind::Unsigned, Class::Field),
    ie(231, "initiatorOctets", Kind::Unsigned, Class::Field),
    ie(232, "responderOctets", Kind::Unsigned, Class::Field),
    ie(233, "firewallEvent", Kind::Unsigned, Class::Field),
    ie(234, "ingressVRFID", Kind::Unsigned, Class::Tag),
    ie(235, "egressVRFID", Kind::Unsigned, Class::Tag),
    ie(237, "postMplsTopLabelExp", Kind::Unsigned, Class::Field),
    ie(238, "tcpWindowScale", Kind::Unsigned, Class::Field),
    ie(239, "biflowDirection", Kind::Unsigned, Class::Field),
    ie(240, "ethernetHeaderLength", Kind::Unsigned, Class::Field),
    ie(241, "ethernetPayloadLength", Kind::Unsigned, Class::Field),
    ie(242, "ethernetTotalLength", Kind::Unsigned, Class::Field),
    ie(243, "dot1qVlanId", Kind::Unsigned, Class::Field),
    ie(244, "dot1qPriority", Kind::Unsigned, Class::Field),
    ie(245, "dot1qCustomerVlanId", Kind::Unsigned, Class::Field),
    ie(246, "dot1qCustomerPriority", Kind::Unsigned, Class::Field),
    ie(248, "metroEvcType", Kind::Unsigned, Class::Field),
    ie(249, "pseudoWireId", Kind::Unsigned, Class::Field),
    ie(250, "pseudoWireType", Kind::Unsigned, Class::Field),
    ie(251, "pseudoWireControlWord", Kind::Unsigned, Class::Field),
    ie(252, "ingressPhysicalInterface", Kind::Unsigned, Class::Field),
    ie(253, "egressPhysicalInterface", Kind::Unsigned, Class::Field),
    ie(254, "postDot1qVlanId", Kind::Unsigned, Class::Field),
    ie(255, "postDot1qCustomerVlanId", Kind::Unsigned, Class::Field),
    ie(256, "ethernetType", Kind::Unsigned, Class::Field),
    ie(257, "postIpPrecedence", Kind::Unsigned, Class::Field),
    ie(259, "exportSctpStreamId", Kind::Unsigned, Class::Field),
    ie(262, "messageMD5Checksum", Kind::Hex, Class::Field),
    ie(263, "messageScope", Kind::Unsigned, Class::Field),
    ie(266, "opaqueOctets", Kind::Hex, Class::Field),
    ie(267, "sessionScope", Kind::Unsigned, Class::Field),
    ie(274, "collectorCertificate", Kind::Hex, Class::Field),
    ie(275, "exporterCertificate", Kind::Hex, Class::Field),
    ie(277, "observationPointType", Kind::Unsigned, Class::Field),
    ie(278, "newConnectionDeltaCount", Kind::Unsigned, Class::Field),
    ie(279, "connectionSumDurationSeconds", Kind::Unsigned, Class::Field),
    ie(280, "connectionTransactionId", Kind::Unsigned, Class::Field),
    ie(281, "postNATSourceIPv6Address", Kind::Ipv6, Class::Field),
    ie(282, "postNATDestinationIPv6Address", Kind::Ipv6, Class::Field),
    ie(283, "natPoolId", Kind::Unsigned, Class::Field),
    ie(285, "anonymizationFlags", Kind::Unsigned, Class::Field),
    ie(286, "anonymizationTechnique", Kind::Unsigned, Class::Field),
    ie(287, "informationElementIndex", Kind::Unsigned, Class::Field),
    ie(294, "bgpValidityState", Kind::Unsigned, Class::Field),
    ie(295, "IPSecSPI", Kind::Unsigned, Class::Field),
    ie(296, "greKey", Kind::Unsigned, Class::Field),
    ie(297, "natType", Kind::Unsigned, Class::Field),
    ie(298, "initiatorPackets", Kind::Unsigned, Class::Field),
    ie(299, "responderPackets", Kind::Unsigned, Class::Field),
    ie(301, "selectionSequenceId", Kind::Unsigned, Class::Field),
    ie(302, "selectorId", Kind::Unsigned, Class::Field),
    ie(303, "informationElementId", Kind::Unsigned, Class::Field),
    ie(304, "selectorAlgorithm", Kind::Unsigned, Class::Field),
    ie(305, "samplingPacketInterval", Kind::Unsigned, Class::Field),
    ie(306, "samplingPacketSpace", Kind::Unsigned, Class::Field),
    ie(307, "samplingTimeInterval", Kind::Unsigned, Class::Field),
    ie(308, "samplingTimeSpace", Kind::Unsigned, Class::Field),
    ie(309, "samplingSize", Kind::Unsigned, Class::Field),
    ie(310, "samplingPopulation", Kind::Unsigned, Class::Field),
    ie(312, "dataLinkFrameSize", Kind::Unsigned, Class::Field),
    ie(313, "ipHeaderPacketSection", Kind::Hex, Class::Field),
    ie(314, "ipPayloadPacketSection", Kind::Hex, Class::Field),
    ie(315, "dataLinkFrameSection", Kind::Hex, Class::Field),
    ie(316, "mplsLabelStackSection", Kind::Hex, Class::Field),
    ie(317, "mplsPayloadPacketSection", Kind::Hex, Class::Field),
    ie(318, "selectorIdTotalPktsObserved", Kind::Unsigned, Class::Field),
    ie(319, "selectorIdTotalPktsSelected", Kind::Unsigned, Class::Field),
    ie(326, "digestHashValue", Kind::Unsigned, Class::Field),
    ie(327, "hashIPPayloadOffset", Kind::Unsigned, Class::Field),
    ie(328, "hashIPPayloadSize", Kind::Unsigned, Class::Field),
    ie(329, "hashOutputRangeMin", Kind::Unsigned, Class::Field),
    ie(330, "hashOutputRangeMax", Kind::Unsigned, Class::Field),
    ie(331, "hashSelectedRangeMin", Kind::Unsigned, Class::Field),
    ie(332, "hashSelectedRangeMax", Kind::Unsigned, Class::Field),
    ie(334, "hashInitialiserValue", Kind::Unsigned, Class::Field),
    ie(339, "informationElementDataType", Kind::Unsigned, Class::Field),
    ie(342, "informationElementRangeBegin", Kind::Unsigned, Class::Field),
    ie(343, "informationElementRangeEnd", Kind::Unsigned, Class::Field),
    ie(344, "informationElementSemantics", Kind::Unsigned, Class::Field),
    ie(345, "informationElementUnits", Kind::Unsigned, Class::Field),
    ie(346, "privateEnterpriseNumber", Kind::Unsigned, Class::Field),
    ie(347, "virtualStationInterfaceId", Kind::Hex, Class::Field),
    ie(349, "virtualStationUUID", Kind::Hex, Class::Field),
    ie(351, "layer2SegmentId", Kind::Unsigned, Class::Field),
    ie(352, "layer2OctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(353, "layer2OctetTotalCount", Kind::Unsigned, Class::Field),
    ie(354, "ingressUnicastPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(355, "ingressMulticastPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(356, "ingressBroadcastPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(357, "egressUnicastPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(358, "egressBroadcastPacketTotalCount", Kind::Unsigned, Class::Field),
    ie(361, "portRangeStart", Kind::Unsigned, Class::Field),
    ie(362, "portRangeEnd", Kind::Unsigned, Class::Field),
    ie(363, "portRangeStepSize", Kind::Unsigned, Class::Field),
    ie(364, "portRangeNumPorts", Kind::Unsigned, Class::Field),
    ie(365, "staMacAddress", Kind::Mac, Class::Field),
    ie(366, "staIPv4Address", Kind::Ipv4, Class::Field),
    ie(367, "wtpMacAddress", Kind::Mac, Class::Field),
    ie(368, "ingressInterfaceType", Kind::Unsigned, Class::Field),
    ie(369, "egressInterfaceType", Kind::Unsigned, Class::Field),
    ie(370, "rtpSequenceNumber", Kind::Unsigned, Class::Field),
    ie(375, "originalFlowsPresent", Kind::Unsigned, Class::Field),
    ie(376, "originalFlowsInitiated", Kind::Unsigned, Class::Field),
    ie(377, "originalFlowsCompleted", Kind::Unsigned, Class::Field),
    ie(378, "distinctCountOfSourceIPAddress", Kind::Unsigned, Class::Field),
    ie(379, "distinctCountOfDestinationIPAddress", Kind::Unsigned, Class::Field),
    ie(380, "distinctCountOfSourceIPv4Address", Kind::Unsigned, Class::Field),
    ie(381, "distinctCountOfDestinationIPv4Address", Kind::Unsigned, Class::Field),
    ie(382, "distinctCountOfSourceIPv6Address", Kind::Unsigned, Class::Field),
    ie(383, "distinctCountOfDestinationIPv6Address", Kind::Unsigned, Class::Field),
    ie(384, "valueDistributionMethod", Kind::Unsigned, Class::Field),
    ie(385, "rfc3550JitterMilliseconds", Kind::Unsigned, Class::Field),
    ie(386, "rfc3550JitterMicroseconds", Kind::Unsigned, Class::Field),
    ie(387, "rfc3550JitterNanoseconds", Kind::Unsigned, Class::Field),
    ie(390, "flowSelectorAlgorithm", Kind::Unsigned, Class::Field),
    ie(391, "flowSelectedOctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(392, "flowSelectedPacketDeltaCount", Kind::Unsigned, Class::Field),
    ie(393, "flowSelectedFlowDeltaCount", Kind::Unsigned, Class::Field),
    ie(394, "selectorIDTotalFlowsObserved", Kind::Unsigned, Class::Field),
    ie(395, "selectorIDTotalFlowsSelected", Kind::Unsigned, Class::Field),
    ie(396, "samplingFlowInterval", Kind::Unsigned, Class::Field),
    ie(397, "samplingFlowSpacing", Kind::Unsigned, Class::Field),
    ie(398, "flowSamplingTimeInterval", Kind::Unsigned, Class::Field),
    ie(399, "flowSamplingTimeSpacing", Kind::Unsigned, Class::Field),
    ie(400, "hashFlowDomain", Kind::Unsigned, Class::Field),
    ie(401, "transportOctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(402, "transportPacketDeltaCount", Kind::Unsigned, Class::Field),
    ie(403, "originalExporterIPv4Address", Kind::Ipv4, Class::Field),
    ie(404, "originalExporterIPv6Address", Kind::Ipv6, Class::Field),
    ie(405, "originalObservationDomainId", Kind::Unsigned, Class::Field),
    ie(406, "intermediateProcessId", Kind::Unsigned, Class::Field),
    ie(407, "ignoredDataRecordTotalCount", Kind::Unsigned, Class::Field),
    ie(408, "dataLinkFrameType", Kind::Unsigned, Class::Field),
    ie(409, "sectionOffset", Kind::Unsigned, Class::Field),
    ie(410, "sectionExportedOctets", Kind::Unsigned, Class::Field),
    ie(411, "dot1qServiceInstanceTag", Kind::Hex, Class::Field),
    ie(412, "dot1qServiceInstanceId", Kind::Unsigned, Class::Field),
    ie(413, "dot1qServiceInstancePriority", Kind::Unsigned, Class::Field),
    ie(414, "dot1qCustomerSourceMacAddress", Kind::Mac, Class::Field),
    ie(415, "dot1qCustomerDestinationMacAddress", Kind::Mac, Class::Field),
    ie(417, "postLayer2OctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(418, "postMCastLayer2OctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(420, "postLayer2OctetTotalCount", Kind::Unsigned, Class::Field),
    ie(421, "postMCastLayer2OctetTotalCount", Kind::Unsigned, Class::Field),
    ie(422, "minimumLayer2TotalLength", Kind::Unsigned, Class::Field),
    ie(423, "maximumLayer2TotalLength", Kind::Unsigned, Class::Field),
    ie(424, "droppedLayer2OctetDeltaCount", Kind::Unsigned, Class::Field),
    ie(425, "droppedLayer2OctetTotalCount", Kind::Unsigned, Class::Field),
    ie(426, "ignoredLayer2OctetTotalCount", Kind::Unsigned, Class::Field),
    ie(427, "notSentLayer2OctetTotalCount", Kind::Unsigned, Class::Field),
    ie(428, "layer2OctetDeltaSumOfSquares", Kind::Unsigned, Class::Field),
    ie(429, "layer2OctetTotalSumOfSquares", Kind::Unsigned, Class::Field),
    ie(430, "layer2FrameDeltaCount", Kind::Unsigned, Class::Field),
    ie(431, "layer2FrameTotalCount", Kind::Unsigned, Class::Field),
    ie(432, "pseudoWireDestinationIPv4Address", Kind::Ipv4, Class::Field),
    ie(433, "ignoredLayer2FrameTotalCount", Kind::Unsigned, Class::Field),
    ie(435, "mibObjectValueOctetString", Kind::Hex, Class::Field),
    ie(436, "mibObjectValueOID", Kind::Hex, Class::Field),
    ie(437, "mibObjectValueBits", Kind::Hex, Class::Field),
    ie(438, "mibObjectValueIPAddress", Kind::Ipv4, Class::Field),
    ie(439, "mibObjectValueCounter", Kind::Unsigned, Class::Field),
    ie(440, "mibObjectValueGauge", Kind::Unsigned, Class::Field),
    ie(441, "mibObjectValueTimeTicks", Kind::Unsigned, Class::Field),
    ie(442, "mibObjectValueUnsigned", Kind::Unsigned, Class::Field),
    ie(445, "mibObjectIdentifier", Kind::Hex, Class::Field),
    ie(446, "mibSubIdentifier", Kind::Unsigned, Class::Field),
    ie(447, "mibIndexIndicator", Kind::Unsigned, Class::Field),
    ie(448, "mibCaptureTimeSemantics", Kind::Unsigned, Class::Field),
    ie(449, "mibContextEngineID", Kind::Hex, Class::Field),
    ie(457, "httpStatusCode", Kind::Unsigned, Class::Field),
    ie(458, "sourceTransportPortsLimit", Kind::Unsigned, Class::Field),
    ie(463, "natInstanceID", Kind::Unsigned, Class::Field),
    ie(464, "internalAddressRealm", Kind::Hex, Class::Field),
    ie(465, "externalAddressRealm", Kind::Hex, Class::Field),
    ie(466, "natQuotaExceededEvent", Kind::Unsigned, Class::Field),
    ie(467, "natThresholdEvent", Kind::Unsigned, Class::Field),
    ie(471, "maxSessionEntries", Kind::Unsigned, Class::Field),
    ie(472, "maxBIBEntries", Kind::Unsigned, Class::Field),
    ie(473, "maxEntriesPerUser", Kind::Unsigned, Class::Field),
    ie(474, "maxSubscribers", Kind::Unsigned, Class::Field),
    ie(475, "maxFragmentsPendingReassembly", Kind::Unsigned, Class::Field),
    ie(476, "addressPoolHighThreshold", Kind::Unsigned, Class::Field),
    ie(477, "addressPoolLowThreshold", Kind::Unsigned, Class::Field),
    ie(478, "addressPortMappingHighThreshold", Kind::Unsigned, Class::Field),
    ie(479, "addressPortMappingLowThreshold", Kind::Unsigned, Class::Field),
    ie(480, "addressPortMappingPerUserHighThreshold", Kind::Unsigned, Class::Field),
    ie(481, "globalAddressMappingHighThreshold", Kind::Unsigned, Class::Field),
    ie(482, "vpnIdentifier", Kind::Hex, Class::Field),
    ie(483, "bgpCommunity", Kind::Unsigned, Class::Field),
    ie(486, "bgpExtendedCommunity", Kind::Hex, Class::Field),
    ie(489, "bgpLargeCommunity", Kind::Hex, Class::Field),
];

#[cfg(test)]
mod tests {
    use flowtide_decoder::{close_metric, open_metric, seq, DecodeContext};

    use super::*;

    fn decode_one(decoder: FieldDecoder, mut buf: &[u8]) -> flowtide_event::Metric {
        let directive: Directive<()> = seq![open_metric("netflow"), decoder.directive(), close_metric()];
        let mut cx = DecodeContext::new(true);
        cx.decode(&directive, &mut buf, &mut ()).unwrap();
        assert!(buf.is_empty());
        cx.take_metrics().remove(0)
    }

    #[test]
    fn table_sorted_and_unique() {
        assert_eq!(ELEMENTS.len(), 375);
        assert!(ELEMENTS.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[test]
    fn unsigned_field_at_eight_bytes() {
        let decoder = field_decoder(1, 8).unwrap();
        assert_eq!(decoder.element().map(|e| e.name), Some("octetDeltaCount"));

        let metric = decode_one(decoder, &0x0102_0304_0506_0708u64.to_be_bytes());
        assert_eq!(
            metric.field("octetDeltaCount"),
            Some(&FieldValue::Unsigned(0x0102_0304_0506_0708))
        );
    }

    #[test]
    fn unsigned_lengths() {
        for length in [1, 2, 4, 8] {
            assert!(field_decoder(2, length).is_ok());
        }
        for length in [0, 3, 5, 16] {
            assert!(field_decoder(2, length).is_err());
        }
    }

    #[test]
    fn ipv4_tag() {
        let metric = decode_one(field_decoder(8, 4).unwrap(), &[192, 168, 1, 1]);
        assert_eq!(metric.tag("sourceIPv4Address"), Some("192.168.1.1"));
    }

    #[test]
    fn ipv4_rejects_other_lengths() {
        for length in [0, 2, 6, 16] {
            let err = field_decoder(8, length).unwrap_err();
            assert!(matches!(err, CatalogError::UnsupportedLength { id: 8, .. }));
        }
    }

    #[test]
    fn port_tag_is_decimal() {
        let metric = decode_one(field_decoder(7, 2).unwrap(), &[0x1F, 0x90]);
        assert_eq!(metric.tag("sourceTransportPort"), Some("8080"));
    }

    #[test]
    fn ipv6_and_mac() {
        let mut octets = [0u8; 16];
        octets[0] = 0xfe;
        octets[1] = 0x80;
        octets[15] = 0x02;
        let metric = decode_one(field_decoder(27, 16).unwrap(), &octets);
        assert_eq!(metric.tag("sourceIPv6Address"), Some("fe80::2"));

        let metric = decode_one(field_decoder(56, 6).unwrap(), &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
        assert_eq!(
            metric.field("sourceMacAddress"),
            Some(&FieldValue::String("de:ad:be:ef:00:01".to_string()))
        );
    }

    #[test]
    fn hex_any_length() {
        let metric = decode_one(field_decoder(70, 3).unwrap(), &[0x00, 0x3e, 0x81]);
        assert_eq!(metric.tag("mplsTopLabelStackSection"), Some("003e81"));
    }

    #[test]
    fn unknown_element_is_skipped() {
        let decoder = field_decoder(u16::MAX, 5).unwrap();
        assert_eq!(decoder.element(), None);
        assert_eq!(decoder.length(), 5);

        let metric = decode_one(decoder, &[1, 2, 3, 4, 5]);
        assert!(metric.tags().is_empty());
        assert!(metric.fields().is_empty());
    }
}
