//! # FPV Channel Table
//!
//! Static 5.8 GHz band/channel reference data used when configuring a slot.
//!
//! Bands are numbered the way the timer numbers them: F=1, R=2, E=3, B=4,
//! A=5. Channels are 1..=8 within a band.

use serde::Serialize;

use crate::error::{LapRfError, Result};

/// Number of bands in the table
pub const BAND_COUNT: u16 = 5;

/// Channels per band
pub const CHANNELS_PER_BAND: u16 = 8;

/// Band letters in band-code order
const BAND_LETTERS: [char; BAND_COUNT as usize] = ['F', 'R', 'E', 'B', 'A'];

/// Frequencies in MHz, one row per band in band-code order
const FREQUENCIES: [[u16; CHANNELS_PER_BAND as usize]; BAND_COUNT as usize] = [
    [5740, 5760, 5780, 5800, 5820, 5840, 5860, 5880],
    [5658, 5695, 5732, 5769, 5806, 5843, 5880, 5917],
    [5705, 5685, 5665, 5645, 5885, 5905, 5925, 5945],
    [5733, 5752, 5771, 5790, 5809, 5828, 5847, 5866],
    [5865, 5845, 5825, 5805, 5785, 5765, 5745, 5725],
];

/// One band/channel entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Channel {
    /// Band code, 1..=5
    pub band: u16,
    /// Channel within the band, 1..=8
    pub channel: u16,
    /// Frequency in MHz
    pub frequency: u16,
    /// Band letter followed by channel number, e.g. "R1"
    pub name: &'static str,
}

const CHANNEL_NAMES: [&str; (BAND_COUNT * CHANNELS_PER_BAND) as usize] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", //
    "R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8", //
    "E1", "E2", "E3", "E4", "E5", "E6", "E7", "E8", //
    "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", //
    "A1", "A2", "A3", "A4", "A5", "A6", "A7", "A8",
];

/// Every channel, ordered by band code then channel
pub const CHANNELS: [Channel; (BAND_COUNT * CHANNELS_PER_BAND) as usize] = generate_channels();

const fn generate_channels() -> [Channel; (BAND_COUNT * CHANNELS_PER_BAND) as usize] {
    let mut table = [Channel {
        band: 0,
        channel: 0,
        frequency: 0,
        name: "",
    }; (BAND_COUNT * CHANNELS_PER_BAND) as usize];
    let mut i = 0;

    while i < table.len() {
        let band = i / CHANNELS_PER_BAND as usize;
        let channel = i % CHANNELS_PER_BAND as usize;
        table[i] = Channel {
            band: band as u16 + 1,
            channel: channel as u16 + 1,
            frequency: FREQUENCIES[band][channel],
            name: CHANNEL_NAMES[i],
        };
        i += 1;
    }

    table
}

/// Look up a channel by band code and channel number
pub fn by_band_channel(band: u16, channel: u16) -> Option<&'static Channel> {
    if !(1..=BAND_COUNT).contains(&band) || !(1..=CHANNELS_PER_BAND).contains(&channel) {
        return None;
    }
    CHANNELS.get(((band - 1) * CHANNELS_PER_BAND + (channel - 1)) as usize)
}

/// Look up a channel by name, ignoring case ("r1", "A8")
pub fn by_name(name: &str) -> Option<&'static Channel> {
    let mut chars = name.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let channel: u16 = chars.as_str().parse().ok()?;
    let band = BAND_LETTERS.iter().position(|&b| b == letter)? as u16 + 1;
    by_band_channel(band, channel)
}

/// Channels on a frequency; several bands share some frequencies
pub fn by_frequency(frequency: u16) -> Vec<&'static Channel> {
    CHANNELS.iter().filter(|c| c.frequency == frequency).collect()
}

/// Resolve a channel name, failing with `UnknownChannel`
///
/// # Errors
///
/// Returns `UnknownChannel` if the name is not in the table
pub fn resolve(name: &str) -> Result<&'static Channel> {
    by_name(name).ok_or_else(|| LapRfError::UnknownChannel(name.to_string()))
}

/// Band letter for a band code
pub fn band_letter(band: u16) -> Option<char> {
    BAND_LETTERS.get(usize::from(band).checked_sub(1)?).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        assert_eq!(CHANNELS.len(), 40);
        for (index, channel) in CHANNELS.iter().enumerate() {
            assert_eq!(channel.band, index as u16 / 8 + 1);
            assert_eq!(channel.channel, index as u16 % 8 + 1);
            assert_eq!(channel.name.chars().next(), band_letter(channel.band));
        }
    }

    #[test]
    fn test_by_band_channel() {
        let f2 = by_band_channel(1, 2).unwrap();
        assert_eq!(f2.frequency, 5760);
        assert_eq!(f2.name, "F2");

        assert_eq!(by_band_channel(5, 8).unwrap().frequency, 5725);
        assert!(by_band_channel(0, 1).is_none());
        assert!(by_band_channel(6, 1).is_none());
        assert!(by_band_channel(1, 9).is_none());
    }

    #[test]
    fn test_by_name_is_case_insensitive() {
        assert_eq!(by_name("r1").unwrap().frequency, 5658);
        assert_eq!(by_name("R1"), by_name("r1"));
        assert_eq!(by_name("E4").unwrap().frequency, 5645);
        assert!(by_name("X1").is_none());
        assert!(by_name("R9").is_none());
        assert!(by_name("").is_none());
    }

    #[test]
    fn test_shared_frequency() {
        // F8 and R7 are both 5880 MHz
        let names: Vec<_> = by_frequency(5880).iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["F8", "R7"]);
        assert!(by_frequency(1234).is_empty());
    }

    #[test]
    fn test_resolve_unknown() {
        let err = resolve("Z3").unwrap_err();
        assert!(matches!(err, LapRfError::UnknownChannel(name) if name == "Z3"));
    }

    #[test]
    fn test_band_letters() {
        assert_eq!(band_letter(3), Some('E'));
        assert_eq!(band_letter(0), None);
        assert_eq!(band_letter(6), None);
    }
}
