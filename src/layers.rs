/// One decoded field within a protocol layer. Offset and length stay
/// string-encoded exactly as the dissector emitted them; synthetic fields
/// carry non-numeric values there and are simply not selectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerField {
    pub name: String,
    pub value: String,
    pub offset: String,
    pub length: String,
}

impl LayerField {
    pub fn byte_range(&self) -> Option<(usize, usize)> {
        let offset = self.offset.trim().parse::<usize>().ok()?;
        let length = self.length.trim().parse::<usize>().ok()?;
        if length == 0 {
            return None;
        }
        Some((offset, length))
    }

    pub fn is_selectable(&self) -> bool {
        self.byte_range().is_some()
    }
}

/// One protocol layer and the chain of layers it encapsulates. Protocols
/// nest linearly (Ethernet -> IP -> TCP -> ...), so each node has at most
/// one child. Field order is the dissector's emission order, which is
/// on-wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerNode {
    pub name: String,
    pub fields: Vec<LayerField>,
    pub child: Option<Box<LayerNode>>,
}

impl LayerNode {
    pub fn new(name: impl Into<String>) -> Self {
        LayerNode {
            name: name.into(),
            fields: Vec::new(),
            child: None,
        }
    }

    /// Walks the chain outermost layer first.
    pub fn layers(&self) -> Layers<'_> {
        Layers { next: Some(self) }
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &LayerField> {
        self.fields.iter().filter(|field| !field.value.is_empty())
    }

    pub fn find_field(&self, name: &str) -> Option<&LayerField> {
        self.layers()
            .flat_map(|layer| layer.fields.iter())
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }

    pub fn frame_number(&self) -> Option<u64> {
        self.find_field("frame.number")?.value.trim().parse().ok()
    }

    /// Innermost real protocol name, skipping tshark's bookkeeping layers.
    pub fn protocol_label(&self) -> &str {
        let mut label = self.name.as_str();
        for layer in self.layers() {
            if !matches!(layer.name.as_str(), "geninfo" | "fake-field-wrapper") {
                label = layer.name.as_str();
            }
        }
        label
    }

    /// Display projection: one row per layer header, one per visible field,
    /// with the field's byte range attached when it is selectable.
    pub fn flatten(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        for (depth, layer) in self.layers().enumerate() {
            rows.push(TreeRow {
                depth,
                label: layer.name.clone(),
                range: None,
                is_layer: true,
            });
            for field in layer.visible_fields() {
                rows.push(TreeRow {
                    depth: depth + 1,
                    label: format!("{}: {}", field.name, field.value),
                    range: field.byte_range(),
                    is_layer: false,
                });
            }
        }
        rows
    }
}

/// Folds an ordered layer list into a child chain; the first element
/// becomes the head.
pub fn chain(nodes: Vec<LayerNode>) -> Option<LayerNode> {
    nodes.into_iter().rev().fold(None, |child, mut node| {
        node.child = child.map(Box::new);
        Some(node)
    })
}

pub struct Layers<'a> {
    next: Option<&'a LayerNode>,
}

impl<'a> Iterator for Layers<'a> {
    type Item = &'a LayerNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.child.as_deref();
        Some(node)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub label: String,
    pub range: Option<(usize, usize)>,
    pub is_layer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, value: &str, offset: &str, length: &str) -> LayerField {
        LayerField {
            name: name.to_string(),
            value: value.to_string(),
            offset: offset.to_string(),
            length: length.to_string(),
        }
    }

    fn sample_chain() -> LayerNode {
        let mut frame = LayerNode::new("frame");
        frame.fields.push(field("frame.number", "7", "0", "0"));
        frame.fields.push(field("frame.len", "74", "0", "0"));
        let mut eth = LayerNode::new("eth");
        eth.fields.push(field("eth.dst", "00:0c:29:34:0b:de", "0", "6"));
        eth.fields.push(field("eth.src", "00:50:56:c0:00:08", "6", "6"));
        let mut ip = LayerNode::new("ip");
        ip.fields.push(field("ip.src", "10.0.0.1", "26", "4"));
        ip.fields.push(field("ip.dst", "10.0.0.2", "30", "4"));
        chain(vec![frame, eth, ip]).unwrap()
    }

    #[test]
    fn test_byte_range_parsing() {
        assert_eq!(field("f", "v", "4", "2").byte_range(), Some((4, 2)));
        assert_eq!(field("f", "v", " 4 ", "2").byte_range(), Some((4, 2)));
        assert_eq!(field("f", "v", "", "2").byte_range(), None);
        assert_eq!(field("f", "v", "x", "2").byte_range(), None);
        assert_eq!(field("f", "v", "4", "-1").byte_range(), None);
        assert_eq!(field("f", "v", "4", "0").byte_range(), None);
        assert!(!field("f", "v", "4", "0").is_selectable());
    }

    #[test]
    fn test_layers_walk_outermost_first() {
        let root = sample_chain();
        let names: Vec<&str> = root.layers().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["frame", "eth", "ip"]);
    }

    #[test]
    fn test_visible_fields_filters_empty_values() {
        let mut node = LayerNode::new("tcp");
        node.fields.push(field("tcp.srcport", "443", "34", "2"));
        node.fields.push(field("tcp.payload", "", "54", "20"));
        node.fields.push(field("tcp.dstport", "51234", "36", "2"));

        let visible: Vec<&str> = node.visible_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(visible, vec!["tcp.srcport", "tcp.dstport"]);
    }

    #[test]
    fn test_find_field_walks_chain() {
        let root = sample_chain();
        assert_eq!(root.find_field("ip.src").unwrap().value, "10.0.0.1");
        assert_eq!(root.find_field("IP.SRC").unwrap().value, "10.0.0.1");
        assert!(root.find_field("tcp.srcport").is_none());
    }

    #[test]
    fn test_frame_number_extraction() {
        let root = sample_chain();
        assert_eq!(root.frame_number(), Some(7));

        let mut bad = LayerNode::new("frame");
        bad.fields.push(field("frame.number", "n/a", "0", "0"));
        assert_eq!(bad.frame_number(), None);
        assert_eq!(LayerNode::new("eth").frame_number(), None);
    }

    #[test]
    fn test_protocol_label_skips_bookkeeping_layers() {
        let nodes = vec![
            LayerNode::new("geninfo"),
            LayerNode::new("frame"),
            LayerNode::new("eth"),
            LayerNode::new("ip"),
            LayerNode::new("tcp"),
            LayerNode::new("fake-field-wrapper"),
        ];
        let root = chain(nodes).unwrap();
        assert_eq!(root.protocol_label(), "tcp");

        let only_pseudo = chain(vec![LayerNode::new("geninfo")]).unwrap();
        assert_eq!(only_pseudo.protocol_label(), "geninfo");
    }

    #[test]
    fn test_chain_links_in_order() {
        assert!(chain(vec![]).is_none());
        let root = chain(vec![
            LayerNode::new("a"),
            LayerNode::new("b"),
            LayerNode::new("c"),
        ])
        .unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.child.as_ref().unwrap().name, "b");
        assert_eq!(root.child.as_ref().unwrap().child.as_ref().unwrap().name, "c");
    }

    #[test]
    fn test_flatten_rows() {
        let root = sample_chain();
        let rows = root.flatten();

        assert_eq!(rows.len(), 9);
        assert!(rows[0].is_layer);
        assert_eq!(rows[0].label, "frame");
        assert_eq!(rows[0].depth, 0);
        assert_eq!(rows[1].label, "frame.number: 7");
        assert_eq!(rows[1].depth, 1);
        assert_eq!(rows[1].range, None);
        assert!(rows[3].is_layer);
        assert_eq!(rows[3].label, "eth");
        assert_eq!(rows[3].depth, 1);
        assert_eq!(rows[4].range, Some((0, 6)));
        let ip_src = rows.iter().find(|r| r.label.starts_with("ip.src")).unwrap();
        assert_eq!(ip_src.range, Some((26, 4)));
        assert_eq!(ip_src.depth, 3);
    }
}
