//! Device constants and per-generation color tables.
//!
//! The vendor ships two hardware generations whose firmware disagrees on what
//! the palette codes in a run-length stream mean. Which table applies is
//! decided by the firmware version embedded in the file signature.

use serde::{Deserialize, Serialize};

/// Four-byte file type tag that opens every note container.
pub const FILE_TYPE_NOTE: &str = "note";
/// Length of the `SN_FILE_VER_XXXXXXXX` signature.
pub const SIGNATURE_LEN: usize = 20;
/// Smallest buffer that can hold file type, signature and footer pointer.
pub const MIN_CONTAINER_LEN: usize = 4 + SIGNATURE_LEN + 4;
/// First firmware build that writes the extended color codes.
pub const EXTENDED_FIRMWARE_MIN: u32 = 20230015;

/// Default page geometry (A5X / A6X class devices).
pub const DEFAULT_PAGE_WIDTH: u32 = 1404;
pub const DEFAULT_PAGE_HEIGHT: u32 = 1872;
/// Page geometry for `APPLY_EQUIPMENT == "N5"`.
pub const N5_PAGE_WIDTH: u32 = 1920;
pub const N5_PAGE_HEIGHT: u32 = 2560;
/// Rows the device actually stores per column in deflate layers.
pub const INTERNAL_PAGE_HEIGHT: u32 = 1888;

/// Palette value meaning "no ink here".
pub const TRANSPARENT: u8 = 0xFF;
pub const BLACK: u8 = 0x00;
pub const DARK_GRAY: u8 = 0x9D;
pub const GRAY: u8 = 0xC9;
pub const WHITE: u8 = 0xFE;
pub const DARK_GRAY_EXT: u8 = 0x30;
pub const GRAY_EXT: u8 = 0x50;

/// Style and size that mark a background layer as entirely blank.
pub const BLANK_STYLE: &str = "style_white";
pub const BLANK_BITMAP_LEN: usize = 0x140E;
/// Page styles with this prefix carry a PNG background instead of RLE.
pub const CUSTOM_BACKGROUND_PREFIX: &str = "user_";

/// Hardware generation, selected from the firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceGeneration {
    Base,
    Extended,
}

impl DeviceGeneration {
    pub fn from_firmware(version: u32) -> Self {
        if version >= EXTENDED_FIRMWARE_MIN {
            DeviceGeneration::Extended
        } else {
            DeviceGeneration::Base
        }
    }
}

/// Page dimensions for the `APPLY_EQUIPMENT` header value.
pub fn page_dimensions(equipment: Option<&str>) -> (u32, u32) {
    match equipment {
        Some("N5") => (N5_PAGE_WIDTH, N5_PAGE_HEIGHT),
        _ => (DEFAULT_PAGE_WIDTH, DEFAULT_PAGE_HEIGHT),
    }
}

/// Code → palette value lookup for one device generation.
#[derive(Debug, Clone)]
pub struct ColorTable {
    map: [u8; 256],
}

const SHARED_CODES: [(u8, u8); 4] = [(0x61, BLACK), (0x62, TRANSPARENT), (0x65, WHITE), (0x66, BLACK)];

const BASE_CODES: [(u8, u8); 4] = [
    (0x63, DARK_GRAY),
    (0x64, GRAY),
    (0x67, DARK_GRAY),
    (0x68, GRAY),
];

const EXTENDED_CODES: [(u8, u8); 6] = [
    (0x9D, DARK_GRAY),
    (0xC9, GRAY),
    (0x9E, DARK_GRAY),
    (0xCA, GRAY),
    (0x63, DARK_GRAY_EXT),
    (0x64, GRAY_EXT),
];

impl ColorTable {
    pub fn for_generation(generation: DeviceGeneration) -> Self {
        // Identity first so unknown codes pass through unchanged.
        let mut map = [0u8; 256];
        for (i, slot) in map.iter_mut().enumerate() {
            *slot = i as u8;
        }
        let extra: &[(u8, u8)] = match generation {
            DeviceGeneration::Base => &BASE_CODES,
            DeviceGeneration::Extended => &EXTENDED_CODES,
        };
        for &(code, value) in SHARED_CODES.iter().chain(extra) {
            map[code as usize] = value;
        }
        Self { map }
    }

    #[inline]
    pub fn map(&self, code: u8) -> u8 {
        self.map[code as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_threshold() {
        assert_eq!(DeviceGeneration::from_firmware(20230014), DeviceGeneration::Base);
        assert_eq!(DeviceGeneration::from_firmware(20230015), DeviceGeneration::Extended);
        assert_eq!(DeviceGeneration::from_firmware(20991231), DeviceGeneration::Extended);
    }

    #[test]
    fn shared_codes_agree_across_generations() {
        for gen in [DeviceGeneration::Base, DeviceGeneration::Extended] {
            let t = ColorTable::for_generation(gen);
            assert_eq!(t.map(0x61), BLACK);
            assert_eq!(t.map(0x62), TRANSPARENT);
            assert_eq!(t.map(0x65), WHITE);
            assert_eq!(t.map(0x66), BLACK);
        }
    }

    #[test]
    fn gray_codes_differ_by_generation() {
        let base = ColorTable::for_generation(DeviceGeneration::Base);
        let ext = ColorTable::for_generation(DeviceGeneration::Extended);
        assert_eq!(base.map(0x63), DARK_GRAY);
        assert_eq!(ext.map(0x63), DARK_GRAY_EXT);
        assert_eq!(base.map(0x64), GRAY);
        assert_eq!(ext.map(0x64), GRAY_EXT);
        assert_eq!(base.map(0x67), DARK_GRAY);
        assert_eq!(ext.map(0x9E), DARK_GRAY);
        assert_eq!(ext.map(0xCA), GRAY);
    }

    #[test]
    fn unknown_codes_pass_through() {
        let base = ColorTable::for_generation(DeviceGeneration::Base);
        assert_eq!(base.map(0x42), 0x42);
        assert_eq!(base.map(0x9E), 0x9E);
    }

    #[test]
    fn n5_selects_large_page() {
        assert_eq!(page_dimensions(Some("N5")), (1920, 2560));
        assert_eq!(page_dimensions(Some("N6")), (1404, 1872));
        assert_eq!(page_dimensions(None), (1404, 1872));
    }
}
