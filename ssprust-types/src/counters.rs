//! Counter and cashbox reports

use crate::currency::Currency;
use crate::error::{Error, Result};

fn u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Lifetime note counters kept by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    /// Number of counters the device reports in its set
    pub counters_in_set: u8,
    pub stacked: u32,
    pub stored: u32,
    pub dispensed: u32,
    pub transferred_to_stacker: u32,
    pub rejected: u32,
}

impl Counters {
    /// Parse the reply body (without the leading status byte)
    pub fn parse(data: &[u8]) -> Result<Self> {
        Error::ensure("counters", data, 21)?;

        Ok(Self {
            counters_in_set: data[0],
            stacked: u32_le(&data[1..]),
            stored: u32_le(&data[5..]),
            dispensed: u32_le(&data[9..]),
            transferred_to_stacker: u32_le(&data[13..]),
            rejected: u32_le(&data[17..]),
        })
    }
}

/// One denomination moved to the cashbox by the last payout operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashboxPayout {
    pub quantity: u16,
    pub value: u32,
    pub currency: Currency,
}

impl CashboxPayout {
    const ENTRY_LEN: usize = 9;

    /// Parse the reply body (without the leading status byte)
    pub fn parse_list(data: &[u8]) -> Result<Vec<Self>> {
        Error::ensure("cashbox payout data", data, 1)?;

        let count = data[0] as usize;
        Error::ensure("cashbox payout data", data, 1 + count * Self::ENTRY_LEN)?;

        Ok(data[1..1 + count * Self::ENTRY_LEN]
            .chunks_exact(Self::ENTRY_LEN)
            .map(|entry| CashboxPayout {
                quantity: u16::from_le_bytes([entry[0], entry[1]]),
                value: u32_le(&entry[2..]),
                currency: Currency::from_slice(&entry[6..]).unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_counters() {
        let mut data = vec![5];
        for v in [10u32, 20, 30, 40, 50] {
            data.extend_from_slice(&v.to_le_bytes());
        }

        let counters = Counters::parse(&data).unwrap();
        assert_eq!(
            counters,
            Counters {
                counters_in_set: 5,
                stacked: 10,
                stored: 20,
                dispensed: 30,
                transferred_to_stacker: 40,
                rejected: 50,
            }
        );
    }

    #[test]
    fn test_parse_counters_short() {
        assert!(Counters::parse(&[5, 0, 0]).is_err());
    }

    #[test]
    fn test_parse_cashbox_payout() {
        let mut data = vec![2];
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&500u32.to_le_bytes());
        data.extend_from_slice(b"EUR");
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&2000u32.to_le_bytes());
        data.extend_from_slice(b"EUR");

        let list = CashboxPayout::parse_list(&data).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].quantity, 1);
        assert_eq!(list[1].value, 2000);
        assert_eq!(list[0].currency, Currency(*b"EUR"));
    }

    #[test]
    fn test_parse_cashbox_payout_empty() {
        assert!(CashboxPayout::parse_list(&[0]).unwrap().is_empty());
    }
}
