//! Per-chip readout and image geometry.
//!
//! The cameras cannot be told apart on the USB bus; the chip name read
//! from EEPROM selects one of these fixed profiles. The firmware does
//! answer GET_ROW_COUNT_* but reports wrong values on everything except
//! the original DSI, so the numbers live here instead.

pub const BYTES_PER_PIXEL: usize = 2;

/// Each raw row is padded by the firmware to a multiple of 512 bytes.
pub(crate) const fn padded_row_width(pixels: usize) -> usize {
    (BYTES_PER_PIXEL * pixels / 512 + 1) * 256
}

/// Fixed readout/crop geometry of one sensor variant. Resolved once when
/// the session opens and immutable afterwards.
#[derive(Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Raw row width in pixels, after firmware padding.
    pub raw_width: usize,
    pub rows_even: usize,
    pub rows_odd: usize,
    pub image_width: usize,
    pub image_height: usize,
    /// Horizontal crop offset into a raw row, in pixels.
    pub offset_x: usize,
    /// Vertical crop offset into the interlaced frame, in rows.
    pub offset_y: usize,
    pub is_color: bool,
    pub is_binnable: bool,
    /// Whether the row counts must be written back to the firmware at
    /// bring-up.
    pub(crate) program_rows: bool,
    /// A/D converter values written at bring-up.
    pub(crate) ad_calibration: &'static [u16],
}

impl Geometry {
    pub fn raw_height(&self) -> usize {
        self.rows_even + self.rows_odd
    }

    /// Size of the even half-frame transfer, in bytes.
    pub fn size_even(&self) -> usize {
        BYTES_PER_PIXEL * self.raw_width * self.rows_even
    }

    /// Size of the odd half-frame transfer, in bytes.
    pub fn size_odd(&self) -> usize {
        BYTES_PER_PIXEL * self.raw_width * self.rows_odd
    }

    pub fn image_pixels(&self) -> usize {
        self.image_width * self.image_height
    }
}

enum ChipMatch {
    Exact(&'static str),
    Prefix(&'static str),
}

impl ChipMatch {
    fn matches(&self, chip: &str) -> bool {
        match self {
            ChipMatch::Exact(name) => chip == *name,
            ChipMatch::Prefix(prefix) => chip.starts_with(prefix),
        }
    }
}

/// Ordered: exact entries must come before the prefix that would shadow
/// them.
static PROFILES: [(ChipMatch, Geometry); 4] = [
    (
        // DSI Pro. Sony lists 537x505 total pixels; the 508x489 crop
        // matches what the vendor software produces.
        ChipMatch::Exact("ICX254AL"),
        Geometry {
            raw_width: padded_row_width(537),
            rows_even: 253,
            rows_odd: 252,
            image_width: 508,
            image_height: 489,
            offset_x: 23,
            offset_y: 13,
            is_color: false,
            is_binnable: false,
            program_rows: false,
            ad_calibration: &[],
        },
    ),
    (
        // DSI Color, same die size with a Bayer matrix and a deeper
        // vertical crop.
        ChipMatch::Exact("ICX404AK"),
        Geometry {
            raw_width: padded_row_width(537),
            rows_even: 253,
            rows_odd: 252,
            image_width: 508,
            image_height: 489,
            offset_x: 23,
            offset_y: 17,
            is_color: true,
            is_binnable: false,
            program_rows: false,
            ad_calibration: &[],
        },
    ),
    (
        // DSI Color II.
        ChipMatch::Exact("ICX429AKL"),
        Geometry {
            raw_width: padded_row_width(795),
            rows_even: 299,
            rows_odd: 298,
            image_width: 748,
            image_height: 577,
            offset_x: 30,
            offset_y: 13,
            is_color: true,
            is_binnable: false,
            program_rows: true,
            ad_calibration: &[88, 704],
        },
    ),
    (
        // DSI Pro II (ICX429ALL and any other monochrome ICX429 stepping).
        ChipMatch::Prefix("ICX429"),
        Geometry {
            raw_width: padded_row_width(795),
            rows_even: 299,
            rows_odd: 298,
            image_width: 748,
            image_height: 577,
            offset_x: 30,
            offset_y: 13,
            is_color: false,
            is_binnable: false,
            program_rows: true,
            ad_calibration: &[88, 704],
        },
    ),
];

/// Looks up the geometry for a chip identifier. `None` means the camera
/// is not supported and the session cannot proceed.
pub fn for_chip(chip: &str) -> Option<&'static Geometry> {
    PROFILES
        .iter()
        .find(|(matcher, _)| matcher.matches(chip))
        .map(|(_, geometry)| geometry)
}

/// Marketing name derived from the chip identifier. Purely a rename; the
/// camera is never asked.
pub fn model_name(chip: &str) -> &'static str {
    match chip {
        "ICX254AL" => "DSI Pro",
        "ICX429ALL" => "DSI Pro II",
        "ICX429AKL" => "DSI Color II",
        "ICX404AK" => "DSI Color",
        "ICX285AL" => "DSI Pro III",
        _ => "DSI Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_padding() {
        // 537 px rows are 1074 bytes, padded to 1536 = 768 px
        assert_eq!(padded_row_width(537), 768);
        // 795 px rows are 1590 bytes, padded to 2048 = 1024 px
        assert_eq!(padded_row_width(795), 1024);
    }

    #[test]
    fn resolves_exact_chips() {
        let pro = for_chip("ICX254AL").unwrap();
        assert_eq!(pro.image_width, 508);
        assert_eq!(pro.image_height, 489);
        assert_eq!(pro.offset_y, 13);
        assert!(!pro.is_color);

        let color = for_chip("ICX404AK").unwrap();
        assert_eq!(color.offset_y, 17);
        assert!(color.is_color);
    }

    #[test]
    fn resolves_icx429_by_prefix() {
        let mono = for_chip("ICX429ALL").unwrap();
        assert!(!mono.is_color);
        let color = for_chip("ICX429AKL").unwrap();
        assert!(color.is_color);
        assert_eq!(mono.raw_width, 1024);
        assert_eq!(mono.image_width, 748);
        assert!(mono.program_rows);
        assert_eq!(mono.ad_calibration, &[88, 704]);
    }

    #[test]
    fn unknown_chip_has_no_profile() {
        assert!(for_chip("ICX285AL").is_none());
        assert!(for_chip("").is_none());
        assert!(for_chip("KAF-0402").is_none());
    }

    #[test]
    fn model_names() {
        assert_eq!(model_name("ICX254AL"), "DSI Pro");
        assert_eq!(model_name("ICX429ALL"), "DSI Pro II");
        assert_eq!(model_name("ICX429AKL"), "DSI Color II");
        assert_eq!(model_name("ICX404AK"), "DSI Color");
        assert_eq!(model_name("ICX285AL"), "DSI Pro III");
        assert_eq!(model_name("whatever"), "DSI Unknown");
    }

    #[test]
    fn transfer_sizes_follow_geometry() {
        let g = for_chip("ICX254AL").unwrap();
        assert_eq!(g.size_even(), 2 * 768 * 253);
        assert_eq!(g.size_odd(), 2 * 768 * 252);
        assert_eq!(g.raw_height(), 505);
        assert_eq!(g.image_pixels(), 508 * 489);
    }
}
