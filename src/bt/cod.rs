//! Class of Device major-category decoding.

use core::fmt;

/// Bits 8..12 of the COD carry the major device class.
const MAJOR_DEV_MASK: u32 = 0x1F00;
const MAJOR_DEV_OFFSET: u32 = 8;

/// Major device category of a Class of Device value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MajorDeviceClass {
    Miscellaneous,
    Computer,
    Phone,
    LanNetworkAccessPoint,
    AudioVideo,
    Peripheral,
    Imaging,
    Wearable,
    Toy,
    Health,
    Uncategorized,
    /// Reserved major class value.
    Invalid(u8),
}

impl MajorDeviceClass {
    pub const fn from_major(major: u8) -> Self {
        match major {
            0x00 => Self::Miscellaneous,
            0x01 => Self::Computer,
            0x02 => Self::Phone,
            0x03 => Self::LanNetworkAccessPoint,
            0x04 => Self::AudioVideo,
            0x05 => Self::Peripheral,
            0x06 => Self::Imaging,
            0x07 => Self::Wearable,
            0x08 => Self::Toy,
            0x09 => Self::Health,
            0x1F => Self::Uncategorized,
            other => Self::Invalid(other),
        }
    }

    /// Console label.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Miscellaneous => "Miscellaneous",
            Self::Computer => "Computer",
            Self::Phone => "Phone (cellular, cordless, pay phone, modem)",
            Self::LanNetworkAccessPoint => "LAN, Network Access Point",
            Self::AudioVideo => "Audio/Video (headset, speaker, stereo, video display, VCR)",
            Self::Peripheral => "Peripheral (mouse, joystick, keyboard)",
            Self::Imaging => "Imaging (printer, scanner, camera, display)",
            Self::Wearable => "Wearable",
            Self::Toy => "Toy",
            Self::Health => "Health",
            Self::Uncategorized => "Uncategorised: Device not specified",
            Self::Invalid(_) => "ERROR: Invalid Major Device Type",
        }
    }
}

impl fmt::Display for MajorDeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a raw COD to its major device category. Total over `u32`.
pub const fn classify(cod: u32) -> MajorDeviceClass {
    MajorDeviceClass::from_major(((cod & MAJOR_DEV_MASK) >> MAJOR_DEV_OFFSET) as u8)
}
