//! Network device enumeration for the capture picker.

use pnet::datalink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Wifi,
    Ethernet,
    Bluetooth,
    Loopback,
    Virtual,
    Unknown,
}

impl DeviceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Wifi => "wifi",
            DeviceKind::Ethernet => "ethernet",
            DeviceKind::Bluetooth => "bluetooth",
            DeviceKind::Loopback => "loopback",
            DeviceKind::Virtual => "virtual",
            DeviceKind::Unknown => "unknown",
        }
    }
}

/// One capturable interface. `name` is what the capture process is handed;
/// the rest is picker display material.
#[derive(Debug, Clone)]
pub struct Device {
    pub name: String,
    pub description: String,
    pub kind: DeviceKind,
    pub addresses: Vec<String>,
}

impl Device {
    pub fn display_line(&self) -> String {
        let mut line = self.name.clone();
        if !self.description.is_empty() {
            line.push_str(&format!(" - {}", self.description));
        }
        if let Some(addr) = self.addresses.first() {
            line.push_str(&format!(" [{addr}]"));
        }
        format!("{line} ({})", self.kind.label())
    }
}

/// Lists interfaces in enumeration order, classified by name and
/// description the way the capture tooling reports them.
pub fn available_devices() -> Vec<Device> {
    datalink::interfaces()
        .into_iter()
        .map(|iface| {
            let kind = classify(&iface.name, &iface.description, iface.is_loopback());
            let addresses = iface.ips.iter().map(|ip| ip.ip().to_string()).collect();
            Device {
                name: iface.name,
                description: iface.description,
                kind,
                addresses,
            }
        })
        .collect()
}

fn classify(name: &str, description: &str, loopback: bool) -> DeviceKind {
    let name = name.to_lowercase();
    let desc = description.to_lowercase();

    if name.contains("wlan")
        || name.contains("wi-fi")
        || desc.contains("wi-fi")
        || desc.contains("wireless")
    {
        DeviceKind::Wifi
    } else if name.contains("eth") || desc.contains("ethernet") {
        DeviceKind::Ethernet
    } else if name.contains("bluetooth") || desc.contains("bluetooth") {
        DeviceKind::Bluetooth
    } else if loopback || name.contains("loopback") || desc.contains("loopback") {
        DeviceKind::Loopback
    } else if name.contains("vmnet") || name.contains("docker") || desc.contains("virtual") {
        DeviceKind::Virtual
    } else {
        DeviceKind::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_name() {
        assert_eq!(classify("wlan0", "", false), DeviceKind::Wifi);
        assert_eq!(classify("eth0", "", false), DeviceKind::Ethernet);
        assert_eq!(classify("docker0", "", false), DeviceKind::Virtual);
        assert_eq!(classify("vmnet8", "", false), DeviceKind::Virtual);
        assert_eq!(classify("enp3s0", "", false), DeviceKind::Unknown);
    }

    #[test]
    fn test_classify_by_description() {
        assert_eq!(
            classify("en0", "Wi-Fi adapter", false),
            DeviceKind::Wifi
        );
        assert_eq!(
            classify("en1", "Intel Ethernet Connection", false),
            DeviceKind::Ethernet
        );
        assert_eq!(
            classify("bt0", "Bluetooth PAN", false),
            DeviceKind::Bluetooth
        );
        assert_eq!(
            classify("vnic0", "Virtual adapter", false),
            DeviceKind::Virtual
        );
    }

    #[test]
    fn test_loopback_flag_wins_over_plain_name() {
        assert_eq!(classify("lo", "", true), DeviceKind::Loopback);
        assert_eq!(
            classify("npf_loopback", "Loopback adapter", false),
            DeviceKind::Loopback
        );
    }

    #[test]
    fn test_wireless_outranks_later_matches() {
        // "Wireless Ethernet" carries both hints; the radio one counts.
        assert_eq!(
            classify("en0", "Wireless Ethernet adapter", false),
            DeviceKind::Wifi
        );
    }

    #[test]
    fn test_display_line_shape() {
        let device = Device {
            name: "wlan0".to_string(),
            description: String::new(),
            kind: DeviceKind::Wifi,
            addresses: vec!["192.168.1.10".to_string()],
        };
        assert_eq!(device.display_line(), "wlan0 [192.168.1.10] (wifi)");

        let bare = Device {
            name: "enp3s0".to_string(),
            description: String::new(),
            kind: DeviceKind::Unknown,
            addresses: Vec::new(),
        };
        assert_eq!(bare.display_line(), "enp3s0 (unknown)");
    }
}
