pub const BYTES_PER_LINE: usize = 16;

// Screen columns of the hex-dump layout: 4-digit offset label, two spaces,
// hex field split in half by an extra space after the 8th byte, three
// spaces, then the ASCII field.
pub const HEX_FIELD_START: usize = 6;
const HEX_SECOND_HALF: usize = HEX_FIELD_START + 8 * 3 + 1;
pub const ASCII_FIELD_START: usize = HEX_FIELD_START + 16 * 3 + 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexCell {
    pub text: String,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiCell {
    pub ch: char,
    pub position: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HexLine {
    pub offset_label: String,
    pub cells: Vec<HexCell>,
    pub ascii: Vec<AsciiCell>,
}

/// Byte-addressable view over a packet's raw bytes, 16 to a line. Every hex
/// cell and ascii cell carries the absolute byte position it represents,
/// `position = line_index * 16 + column_within_line`.
#[derive(Debug, Clone, Default)]
pub struct ByteGrid {
    lines: Vec<HexLine>,
}

impl ByteGrid {
    #[allow(dead_code)]
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut lines = Vec::with_capacity(data.len().div_ceil(BYTES_PER_LINE));
        for (line_index, chunk) in data.chunks(BYTES_PER_LINE).enumerate() {
            let base = line_index * BYTES_PER_LINE;
            let cells = chunk
                .iter()
                .enumerate()
                .map(|(i, byte)| HexCell {
                    text: format!("{:02X}", byte),
                    position: base + i,
                })
                .collect();
            let ascii = chunk
                .iter()
                .enumerate()
                .map(|(i, byte)| AsciiCell {
                    ch: printable(*byte),
                    position: base + i,
                })
                .collect();
            lines.push(HexLine {
                offset_label: format!("{:04x}", base),
                cells,
                ascii,
            });
        }
        ByteGrid { lines }
    }

    /// Parses dissector hex-dump text. One line grammar: a 4-hex-digit
    /// offset label, hex byte pairs from column 6 separated by runs of one
    /// or two spaces, and an ASCII field opened by a run of three or more
    /// spaces (or by the 16th byte). When the separating run spans column
    /// 57 the ASCII field starts exactly there, which keeps leading ASCII
    /// spaces from padded producers. Lines that don't start with a hex
    /// label are dropped; a label that breaks the 16-bytes-per-line
    /// progression ends the parse.
    pub fn from_text(dump: &str) -> Self {
        let mut lines: Vec<HexLine> = Vec::new();
        for raw in dump.lines() {
            let Some((label_offset, line)) = parse_line(raw, lines.len()) else {
                continue;
            };
            if label_offset != lines.len() * BYTES_PER_LINE {
                break;
            }
            lines.push(line);
        }
        ByteGrid { lines }
    }

    pub fn lines(&self) -> &[HexLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.lines
            .last()
            .and_then(|line| line.cells.last())
            .map(|cell| cell.position + 1)
            .unwrap_or(0)
    }

    pub fn cell_at(&self, position: usize) -> Option<&HexCell> {
        self.lines
            .get(position / BYTES_PER_LINE)?
            .cells
            .get(position % BYTES_PER_LINE)
            .filter(|cell| cell.position == position)
    }

    pub fn ascii_at(&self, position: usize) -> Option<&AsciiCell> {
        self.lines
            .get(position / BYTES_PER_LINE)?
            .ascii
            .get(position % BYTES_PER_LINE)
            .filter(|cell| cell.position == position)
    }
}

fn printable(byte: u8) -> char {
    if (0x20..=0x7e).contains(&byte) {
        byte as char
    } else {
        '.'
    }
}

fn parse_line(raw: &str, line_index: usize) -> Option<(usize, HexLine)> {
    let line = raw.strip_suffix('\r').unwrap_or(raw);
    let bytes = line.as_bytes();
    if line.trim().is_empty() || bytes.len() < 4 {
        return None;
    }
    if !bytes[..4].iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let label = &line[..4];
    let label_offset = usize::from_str_radix(label, 16).ok()?;
    let mut hex_tokens: Vec<&str> = Vec::new();
    let mut ascii_text: Option<&str> = None;
    let mut i = HEX_FIELD_START.min(bytes.len());
    while i < bytes.len() {
        let gap_start = i;
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let gap = i - gap_start;
        let token_start = i;
        while i < bytes.len() && bytes[i] != b' ' {
            i += 1;
        }
        let token = &line[token_start..i];
        let is_pair = token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit());
        if is_pair && gap <= 2 && hex_tokens.len() < BYTES_PER_LINE {
            hex_tokens.push(token);
        } else {
            let ascii_start = if token_start > ASCII_FIELD_START && gap_start <= ASCII_FIELD_START
            {
                ASCII_FIELD_START
            } else {
                token_start
            };
            ascii_text = Some(&line[ascii_start..]);
            break;
        }
    }
    if hex_tokens.is_empty() {
        return None;
    }

    let base = line_index * BYTES_PER_LINE;
    let cells = hex_tokens
        .iter()
        .enumerate()
        .map(|(i, token)| HexCell {
            text: (*token).to_string(),
            position: base + i,
        })
        .collect::<Vec<_>>();
    let ascii = ascii_text
        .unwrap_or("")
        .chars()
        .take(cells.len())
        .enumerate()
        .map(|(i, ch)| AsciiCell {
            ch,
            position: base + i,
        })
        .collect();

    Some((
        label_offset,
        HexLine {
            offset_label: label.to_string(),
            cells,
            ascii,
        },
    ))
}

/// Screen column (within a grid line) where hex cell `index` starts.
pub fn hex_column(index: usize) -> usize {
    HEX_FIELD_START + 3 * index + usize::from(index >= 8)
}

/// Byte index for a screen column landing exactly on a hex or ascii cell.
pub fn byte_at_column(x: usize) -> Option<usize> {
    for index in 0..BYTES_PER_LINE {
        let col = hex_column(index);
        if x >= col && x < col + 2 {
            return Some(index);
        }
    }
    if x >= ASCII_FIELD_START && x < ASCII_FIELD_START + BYTES_PER_LINE {
        return Some(x - ASCII_FIELD_START);
    }
    None
}

/// Byte index nearest to a screen column; used while dragging so the
/// selection clamps instead of dropping when the pointer leaves the cells.
pub fn nearest_byte_at_column(x: usize) -> usize {
    if x < HEX_FIELD_START {
        0
    } else if x < HEX_SECOND_HALF {
        ((x - HEX_FIELD_START) / 3).min(BYTES_PER_LINE - 1)
    } else if x < ASCII_FIELD_START {
        ((x - HEX_SECOND_HALF) / 3 + 8).min(BYTES_PER_LINE - 1)
    } else {
        (x - ASCII_FIELD_START).min(BYTES_PER_LINE - 1)
    }
}
