use crate::layers::{LayerField, LayerNode};

/// One captured packet: the summary columns plus the dissected layer chain
/// it was derived from. The frame number is not a column of its own; it is
/// read out of the chain when the packet is opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketRow {
    pub timestamp: String,
    pub source: String,
    pub destination: String,
    pub src_port: String,
    pub dst_port: String,
    pub protocol: String,
    pub length: String,
    pub info: String,
    pub dissected: Option<LayerNode>,
}

impl PacketRow {
    /// Summary derivation: addresses from the innermost ip/ipv6 layer,
    /// ports from tcp/udp, length and relative time from the frame layer,
    /// info from the protocol path.
    pub fn from_layers(layers: LayerNode) -> Self {
        let mut row = PacketRow::default();
        for layer in layers.layers() {
            match layer.name.as_str() {
                "frame" => {
                    if let Some(value) = field_value(layer, "frame.time_relative") {
                        row.timestamp = value;
                    }
                    if let Some(value) = field_value(layer, "frame.len") {
                        row.length = value;
                    }
                    if let Some(value) = field_value(layer, "frame.protocols") {
                        row.info = value;
                    }
                }
                "ip" => {
                    if let Some(value) = field_value(layer, "ip.src") {
                        row.source = value;
                    }
                    if let Some(value) = field_value(layer, "ip.dst") {
                        row.destination = value;
                    }
                }
                "ipv6" => {
                    if let Some(value) = field_value(layer, "ipv6.src") {
                        row.source = value;
                    }
                    if let Some(value) = field_value(layer, "ipv6.dst") {
                        row.destination = value;
                    }
                }
                "tcp" | "udp" => {
                    if let Some(value) = field_value(layer, &format!("{}.srcport", layer.name)) {
                        row.src_port = value;
                    }
                    if let Some(value) = field_value(layer, &format!("{}.dstport", layer.name)) {
                        row.dst_port = value;
                    }
                }
                _ => {}
            }
        }
        row.protocol = layers.protocol_label().to_string();
        row.dissected = Some(layers);
        row
    }

    /// Placeholder for a packet the dissector could not decode; keeps row
    /// counts aligned with the backend.
    pub fn undecoded() -> Self {
        PacketRow::default()
    }

    pub fn frame_number(&self) -> Option<u64> {
        self.dissected.as_ref()?.frame_number()
    }
}

fn field_value(layer: &LayerNode, name: &str) -> Option<String> {
    layer
        .fields
        .iter()
        .find(|field| field.name.eq_ignore_ascii_case(name))
        .map(|field| field.value.clone())
}

/// Append-only sequence of captured rows plus the backend's reported
/// total. The total may run ahead of the local length while a fetch is
/// pending; it never runs behind it.
#[derive(Debug, Default)]
pub struct RowStore {
    rows: Vec<PacketRow>,
    total: usize,
}

impl RowStore {
    pub fn new() -> Self {
        RowStore::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn rows(&self) -> &[PacketRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&PacketRow> {
        self.rows.get(index)
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total.max(self.rows.len());
    }

    /// Rows the backend has that we have not fetched yet.
    pub fn missing(&self) -> usize {
        self.total - self.rows.len()
    }

    pub fn append_page(&mut self, page: Vec<PacketRow>) {
        self.rows.extend(page);
        self.total = self.total.max(self.rows.len());
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{self, LayerNode};

    fn layer(name: &str, fields: &[(&str, &str)]) -> LayerNode {
        let mut node = LayerNode::new(name);
        for (field_name, value) in fields {
            node.fields.push(LayerField {
                name: field_name.to_string(),
                value: value.to_string(),
                offset: "0".to_string(),
                length: "1".to_string(),
            });
        }
        node
    }

    fn tcp_chain() -> LayerNode {
        layers::chain(vec![
            layer(
                "frame",
                &[
                    ("frame.number", "12"),
                    ("frame.len", "74"),
                    ("frame.time_relative", "0.001234"),
                    ("frame.protocols", "eth:ethertype:ip:tcp"),
                ],
            ),
            layer("eth", &[("eth.src", "aa:bb:cc:dd:ee:ff")]),
            layer("ip", &[("ip.src", "10.0.0.1"), ("ip.dst", "10.0.0.2")]),
            layer("tcp", &[("tcp.srcport", "443"), ("tcp.dstport", "51234")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_row_from_tcp_chain() {
        let row = PacketRow::from_layers(tcp_chain());

        assert_eq!(row.timestamp, "0.001234");
        assert_eq!(row.source, "10.0.0.1");
        assert_eq!(row.destination, "10.0.0.2");
        assert_eq!(row.src_port, "443");
        assert_eq!(row.dst_port, "51234");
        assert_eq!(row.protocol, "tcp");
        assert_eq!(row.length, "74");
        assert_eq!(row.info, "eth:ethertype:ip:tcp");
        assert_eq!(row.frame_number(), Some(12));
    }

    #[test]
    fn test_row_from_ipv6_udp_chain() {
        let root = layers::chain(vec![
            layer("frame", &[("frame.number", "3")]),
            layer("ipv6", &[("ipv6.src", "fe80::1"), ("ipv6.dst", "ff02::fb")]),
            layer("udp", &[("udp.srcport", "5353"), ("udp.dstport", "5353")]),
            layer("mdns", &[]),
        ])
        .unwrap();
        let row = PacketRow::from_layers(root);

        assert_eq!(row.source, "fe80::1");
        assert_eq!(row.destination, "ff02::fb");
        assert_eq!(row.src_port, "5353");
        assert_eq!(row.protocol, "mdns");
    }

    #[test]
    fn test_undecoded_row_has_no_frame_number() {
        let row = PacketRow::undecoded();
        assert_eq!(row.frame_number(), None);
        assert!(row.dissected.is_none());
    }

    #[test]
    fn test_store_append_and_total() {
        let mut store = RowStore::new();
        assert_eq!(store.len(), 0);
        assert_eq!(store.total(), 0);

        store.set_total(3);
        assert_eq!(store.missing(), 3);

        store.append_page(vec![PacketRow::undecoded(); 3]);
        assert_eq!(store.len(), 3);
        assert_eq!(store.total(), 3);
        assert_eq!(store.missing(), 0);
    }

    #[test]
    fn test_total_never_runs_behind_length() {
        let mut store = RowStore::new();
        store.append_page(vec![PacketRow::undecoded(); 5]);
        store.set_total(2);

        assert_eq!(store.total(), 5);
        assert_eq!(store.missing(), 0);
    }

    #[test]
    fn test_clear_resets_both_sides() {
        let mut store = RowStore::new();
        store.set_total(4);
        store.append_page(vec![PacketRow::undecoded(); 4]);
        store.clear();

        assert_eq!(store.len(), 0);
        assert_eq!(store.total(), 0);
    }
}
