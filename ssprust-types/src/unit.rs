//! Unit identification replies (setup request, unit data)

use std::fmt;

use crate::channel::ChannelInfo;
use crate::currency::Currency;
use crate::error::{Error, Result};

/// Kind of peripheral reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnitType {
    Validator,
    SmartHopper,
    SmartPayout,
    Nv11,
    Tebs,
    #[default]
    Unknown,
}

impl UnitType {
    pub fn is_smart_payout(self) -> bool {
        matches!(self, Self::SmartPayout)
    }
}

impl From<u8> for UnitType {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Validator,
            0x03 => Self::SmartHopper,
            0x06 => Self::SmartPayout,
            0x07 => Self::Nv11,
            0x0D => Self::Tebs,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validator => "VALIDATOR",
            Self::SmartHopper => "SMART_HOPPER",
            Self::SmartPayout => "SMART_PAYOUT",
            Self::Nv11 => "NV11",
            Self::Tebs => "TEBS",
            Self::Unknown => "UNKNOWN_TYPE",
        };
        f.write_str(name)
    }
}

/// Header shared by the unit-data and setup-request replies
const HEADER_LEN: usize = 12;

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

fn u24_be(bytes: &[u8]) -> u32 {
    (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32
}

/// Reply to the unit-data command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitData {
    pub unit_type: UnitType,
    pub firmware_version: String,
    pub country: Currency,
    pub value_multiplier: u32,
    pub protocol_version: u8,
}

impl UnitData {
    /// Parse the reply body (without the leading status byte)
    pub fn parse(data: &[u8]) -> Result<Self> {
        Error::ensure("unit data", data, HEADER_LEN)?;

        Ok(Self {
            unit_type: UnitType::from(data[0]),
            firmware_version: ascii(&data[1..5]),
            country: Currency::from_slice(&data[5..8]).unwrap_or_default(),
            value_multiplier: u24_be(&data[8..11]),
            protocol_version: data[11],
        })
    }
}

impl fmt::Display for UnitData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unit[{}, FW: {}, {}, x{}, protocol {}]",
            self.unit_type,
            self.firmware_version,
            self.country,
            self.value_multiplier,
            self.protocol_version
        )
    }
}

/// Reply to the setup request
///
/// # Layout
///
/// ```text
/// unit(1) fw(4) country(3) multiplier(3, BE) n(1)
/// values(n) security(n) real_multiplier(3, BE) protocol(1)
/// currencies(3n) full_values(4n, LE)        -- protocol >= 6 only
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupInfo {
    pub unit_type: UnitType,
    pub firmware_version: String,
    pub country: Currency,
    pub value_multiplier: u32,
    pub real_value_multiplier: u32,
    pub protocol_version: u8,
    pub channels: Vec<ChannelInfo>,
}

impl SetupInfo {
    /// First protocol version that reports per-channel currency and full values
    pub const EXTENDED_PROTOCOL: u8 = 6;

    /// Parse the reply body (without the leading status byte)
    pub fn parse(data: &[u8]) -> Result<Self> {
        Error::ensure("setup request", data, HEADER_LEN)?;

        let n = data[11] as usize;
        let tail = HEADER_LEN + 2 * n;
        Error::ensure("setup request", data, tail + 4)?;

        let real_value_multiplier = u24_be(&data[tail..tail + 3]);
        let protocol_version = data[tail + 3];

        let mut channels = Vec::with_capacity(n);
        if protocol_version >= Self::EXTENDED_PROTOCOL {
            let currencies = tail + 4;
            let values = currencies + 3 * n;
            Error::ensure("setup request channels", data, values + 4 * n)?;

            for i in 0..n {
                let currency = Currency::from_slice(&data[currencies + 3 * i..])
                    .ok_or_else(|| Error::Parse(format!("channel {} currency", i + 1)))?;
                let at = values + 4 * i;
                let raw = u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

                channels.push(ChannelInfo::new(
                    (i + 1) as u8,
                    raw.saturating_mul(real_value_multiplier),
                    currency,
                ));
            }
        }

        Ok(Self {
            unit_type: UnitType::from(data[0]),
            firmware_version: ascii(&data[1..5]),
            country: Currency::from_slice(&data[5..8]).unwrap_or_default(),
            value_multiplier: u24_be(&data[8..11]),
            real_value_multiplier,
            protocol_version,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup_reply(protocol: u8) -> Vec<u8> {
        let mut data = vec![0x06];
        data.extend_from_slice(b"0420");
        data.extend_from_slice(b"EUR");
        data.extend_from_slice(&[0x00, 0x00, 0x01]);
        data.push(2); // channels
        data.extend_from_slice(&[5, 10]); // old-style values
        data.extend_from_slice(&[2, 2]); // security
        data.extend_from_slice(&[0x00, 0x00, 0x64]); // real multiplier 100
        data.push(protocol);
        data.extend_from_slice(b"EUREUR");
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(&10u32.to_le_bytes());
        data
    }

    #[test]
    fn test_parse_setup_request() {
        let info = SetupInfo::parse(&setup_reply(7)).unwrap();

        assert_eq!(info.unit_type, UnitType::SmartPayout);
        assert_eq!(info.firmware_version, "0420");
        assert_eq!(info.country, Currency(*b"EUR"));
        assert_eq!(info.value_multiplier, 1);
        assert_eq!(info.real_value_multiplier, 100);
        assert_eq!(
            info.channels,
            vec![
                ChannelInfo::new(1, 500, Currency(*b"EUR")),
                ChannelInfo::new(2, 1000, Currency(*b"EUR")),
            ]
        );
    }

    #[test]
    fn test_parse_setup_request_old_protocol() {
        let info = SetupInfo::parse(&setup_reply(5)).unwrap();
        assert!(info.channels.is_empty());
        assert_eq!(info.protocol_version, 5);
    }

    #[test]
    fn test_parse_setup_request_truncated() {
        let mut data = setup_reply(7);
        data.truncate(data.len() - 2);
        assert!(matches!(
            SetupInfo::parse(&data),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn test_parse_unit_data() {
        let mut data = vec![0x00];
        data.extend_from_slice(b"0301GBP");
        data.extend_from_slice(&[0x00, 0x00, 0x64, 0x06]);

        let unit = UnitData::parse(&data).unwrap();
        assert_eq!(unit.unit_type, UnitType::Validator);
        assert_eq!(unit.country, Currency(*b"GBP"));
        assert_eq!(unit.value_multiplier, 100);
        assert_eq!(unit.protocol_version, 6);
    }

    #[test]
    fn test_unit_type_codes() {
        assert_eq!(UnitType::from(0x0D), UnitType::Tebs);
        assert_eq!(UnitType::from(0x42), UnitType::Unknown);
        assert!(UnitType::from(0x06).is_smart_payout());
    }
}
