use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeName {
    Default,
    Dark,
    Light,
    Mono,
}

impl ThemeName {
    pub fn all_themes() -> Vec<ThemeName> {
        vec![
            ThemeName::Default,
            ThemeName::Dark,
            ThemeName::Light,
            ThemeName::Mono,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeName::Default => "default",
            ThemeName::Dark => "dark",
            ThemeName::Light => "light",
            ThemeName::Mono => "mono",
        }
    }

    pub fn from_str(s: &str) -> Option<ThemeName> {
        ThemeName::all_themes()
            .into_iter()
            .find(|theme| theme.as_str() == s)
    }
}

#[derive(Clone)]
pub struct Theme {
    pub background: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_accent: Color,
    pub table_header: Color,
    pub border_normal: Color,
    pub border_focused: Color,
    pub selected_row_background: Color,
    pub selection_background: Color,
    pub selection_foreground: Color,
    pub header_fg: Color,
    pub header_bg: Color,
    pub status_error: Color,
    pub proto_tcp: Color,
    pub proto_udp: Color,
    pub proto_dns: Color,
    pub proto_http: Color,
    pub proto_tls: Color,
    pub proto_arp: Color,
    pub proto_icmp: Color,
}

impl Theme {
    pub fn new(name: ThemeName) -> Self {
        match name {
            ThemeName::Default => Self::default_theme(),
            ThemeName::Dark => Self::dark(),
            ThemeName::Light => Self::light(),
            ThemeName::Mono => Self::mono(),
        }
    }

    /// Row tinting for the packet table, keyed on the innermost protocol.
    pub fn protocol_color(&self, protocol: &str) -> Color {
        match protocol.to_ascii_lowercase().as_str() {
            "tcp" => self.proto_tcp,
            "udp" | "quic" => self.proto_udp,
            "dns" | "mdns" | "llmnr" => self.proto_dns,
            "http" | "http2" | "http3" => self.proto_http,
            "tls" | "ssl" => self.proto_tls,
            "arp" => self.proto_arp,
            "icmp" | "icmpv6" => self.proto_icmp,
            _ => self.text_primary,
        }
    }

    fn default_theme() -> Self {
        Theme {
            background: Color::Reset,
            text_primary: Color::Gray,
            text_secondary: Color::DarkGray,
            text_accent: Color::Cyan,
            table_header: Color::Yellow,
            border_normal: Color::DarkGray,
            border_focused: Color::Cyan,
            selected_row_background: Color::DarkGray,
            selection_background: Color::Blue,
            selection_foreground: Color::White,
            header_fg: Color::Black,
            header_bg: Color::Cyan,
            status_error: Color::Red,
            proto_tcp: Color::Green,
            proto_udp: Color::Blue,
            proto_dns: Color::Yellow,
            proto_http: Color::Magenta,
            proto_tls: Color::Cyan,
            proto_arp: Color::LightYellow,
            proto_icmp: Color::Red,
        }
    }

    fn dark() -> Self {
        Theme {
            background: Color::Rgb(16, 18, 24),
            text_primary: Color::Rgb(205, 214, 244),
            text_secondary: Color::Rgb(108, 112, 134),
            text_accent: Color::Rgb(137, 220, 235),
            table_header: Color::Rgb(249, 226, 175),
            border_normal: Color::Rgb(69, 71, 90),
            border_focused: Color::Rgb(137, 220, 235),
            selected_row_background: Color::Rgb(49, 50, 68),
            selection_background: Color::Rgb(88, 91, 112),
            selection_foreground: Color::Rgb(245, 245, 245),
            header_fg: Color::Rgb(16, 18, 24),
            header_bg: Color::Rgb(137, 220, 235),
            status_error: Color::Rgb(243, 139, 168),
            proto_tcp: Color::Rgb(166, 227, 161),
            proto_udp: Color::Rgb(137, 180, 250),
            proto_dns: Color::Rgb(249, 226, 175),
            proto_http: Color::Rgb(203, 166, 247),
            proto_tls: Color::Rgb(148, 226, 213),
            proto_arp: Color::Rgb(250, 179, 135),
            proto_icmp: Color::Rgb(243, 139, 168),
        }
    }

    fn light() -> Self {
        Theme {
            background: Color::Rgb(250, 250, 245),
            text_primary: Color::Rgb(40, 40, 40),
            text_secondary: Color::Rgb(130, 130, 125),
            text_accent: Color::Rgb(0, 95, 135),
            table_header: Color::Rgb(135, 95, 0),
            border_normal: Color::Rgb(180, 180, 175),
            border_focused: Color::Rgb(0, 95, 135),
            selected_row_background: Color::Rgb(220, 225, 235),
            selection_background: Color::Rgb(180, 205, 235),
            selection_foreground: Color::Rgb(20, 20, 20),
            header_fg: Color::Rgb(250, 250, 245),
            header_bg: Color::Rgb(0, 95, 135),
            status_error: Color::Rgb(175, 0, 0),
            proto_tcp: Color::Rgb(0, 115, 0),
            proto_udp: Color::Rgb(0, 65, 175),
            proto_dns: Color::Rgb(135, 95, 0),
            proto_http: Color::Rgb(115, 0, 115),
            proto_tls: Color::Rgb(0, 115, 115),
            proto_arp: Color::Rgb(175, 95, 0),
            proto_icmp: Color::Rgb(175, 0, 0),
        }
    }

    fn mono() -> Self {
        Theme {
            background: Color::Reset,
            text_primary: Color::Gray,
            text_secondary: Color::DarkGray,
            text_accent: Color::White,
            table_header: Color::White,
            border_normal: Color::DarkGray,
            border_focused: Color::White,
            selected_row_background: Color::DarkGray,
            selection_background: Color::Gray,
            selection_foreground: Color::Black,
            header_fg: Color::Black,
            header_bg: Color::Gray,
            status_error: Color::White,
            proto_tcp: Color::Gray,
            proto_udp: Color::Gray,
            proto_dns: Color::Gray,
            proto_http: Color::Gray,
            proto_tls: Color::Gray,
            proto_arp: Color::Gray,
            proto_icmp: Color::Gray,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_names_round_trip() {
        for name in ThemeName::all_themes() {
            assert_eq!(ThemeName::from_str(name.as_str()), Some(name));
        }
        assert_eq!(ThemeName::from_str("neon"), None);
    }

    #[test]
    fn test_protocol_color_mapping() {
        let theme = Theme::new(ThemeName::Default);
        assert_eq!(theme.protocol_color("tcp"), theme.proto_tcp);
        assert_eq!(theme.protocol_color("TLS"), theme.proto_tls);
        assert_eq!(theme.protocol_color("mdns"), theme.proto_dns);
        assert_eq!(theme.protocol_color("ptp"), theme.text_primary);
    }
}
