//! LCD I/O registers.
//!
//! Every register here is byte-addressable: the bus hands each MMIO byte
//! write to `write(byte_index, value)` and reads back through
//! `read(byte_index)`, reconstructing the documented bit layout exactly.
//! Out-of-range byte indexes read as zero and ignore writes.
//!
//! | Address       | Register    | Description                            |
//! |---------------|-------------|----------------------------------------|
//! | `0x0400_0000` | DISPCNT     | mode, frame select, layer enables      |
//! | `0x0400_0004` | DISPSTAT    | blanking flags, IRQ enables, VCOUNT    |
//! | `0x0400_0008` | BG0CNT..BG3CNT | per-background control              |
//! | `0x0400_0028` | BG2X/BG2Y   | affine reference point (write-only)    |
//! | `0x0400_0038` | BG3X/BG3Y   | affine reference point (write-only)    |
//! | `0x0400_0040` | WIN0H/WIN1H | window horizontal bounds (write-only)  |
//! | `0x0400_0044` | WIN0V/WIN1V | window vertical bounds (write-only)    |
//! | `0x0400_0048` | WININ/WINOUT| per-window layer enables               |
//! | `0x0400_0050` | BLDCNT      | blend targets and effect               |

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// DISPCNT: video mode and layer enables.
#[derive(Default, Serialize, Deserialize)]
pub struct DisplayControl {
    pub mode: u8,
    pub cgb_mode: bool,
    pub frame: u8,
    pub hblank_oam_access: bool,
    pub oam_mapping_1d: bool,
    pub forced_blank: bool,
    /// BG0-BG3, OBJ, WIN0, WIN1, OBJWIN.
    pub enable: [bool; 8],
}

impl DisplayControl {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn read(&self, byte: usize) -> u8 {
        match byte {
            0 => {
                self.mode
                    | u8::from(self.cgb_mode) << 3
                    | self.frame << 4
                    | u8::from(self.hblank_oam_access) << 5
                    | u8::from(self.oam_mapping_1d) << 6
                    | u8::from(self.forced_blank) << 7
            }
            1 => {
                let mut value = 0;
                for (i, enabled) in self.enable.iter().enumerate() {
                    value |= u8::from(*enabled) << i;
                }
                value
            }
            _ => 0,
        }
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        match byte {
            0 => {
                self.mode = value & 7;
                self.cgb_mode = value.get_bit(3);
                self.frame = (value >> 4) & 1;
                self.hblank_oam_access = value.get_bit(5);
                self.oam_mapping_1d = value.get_bit(6);
                self.forced_blank = value.get_bit(7);
            }
            1 => {
                for (i, enabled) in self.enable.iter_mut().enumerate() {
                    *enabled = value.get_bit(i as u8);
                }
            }
            _ => {}
        }
    }
}

/// DISPSTAT: blanking status and IRQ enables.
///
/// Bits 0-2 of byte 0 are read-only status set by the video scheduler;
/// CPU writes only latch the three IRQ-enable bits.
#[derive(Default, Serialize, Deserialize)]
pub struct DisplayStatus {
    pub vblank_flag: bool,
    pub hblank_flag: bool,
    pub vcount_flag: bool,
    pub vblank_irq_enable: bool,
    pub hblank_irq_enable: bool,
    pub vcount_irq_enable: bool,
    /// The scanline compared against VCOUNT. Values above 227 are stored
    /// verbatim; the compare simply never matches.
    pub vcount_setting: u8,
}

impl DisplayStatus {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn read(&self, byte: usize) -> u8 {
        match byte {
            0 => {
                u8::from(self.vblank_flag)
                    | u8::from(self.hblank_flag) << 1
                    | u8::from(self.vcount_flag) << 2
                    | u8::from(self.vblank_irq_enable) << 3
                    | u8::from(self.hblank_irq_enable) << 4
                    | u8::from(self.vcount_irq_enable) << 5
            }
            1 => self.vcount_setting,
            _ => 0,
        }
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        match byte {
            0 => {
                self.vblank_irq_enable = value.get_bit(3);
                self.hblank_irq_enable = value.get_bit(4);
                self.vcount_irq_enable = value.get_bit(5);
            }
            1 => self.vcount_setting = value,
            _ => {}
        }
    }
}

/// BGxCNT: one background's priority, tile data and map layout.
#[derive(Default, Serialize, Deserialize)]
pub struct BackgroundControl {
    pub priority: u8,
    pub tile_block: u8,
    pub mosaic_enable: bool,
    pub full_palette: bool,
    pub map_block: u8,
    pub wraparound: bool,
    pub size: u8,
}

impl BackgroundControl {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn read(&self, byte: usize) -> u8 {
        match byte {
            0 => {
                self.priority
                    | self.tile_block << 2
                    | u8::from(self.mosaic_enable) << 6
                    | u8::from(self.full_palette) << 7
            }
            1 => self.map_block | u8::from(self.wraparound) << 5 | self.size << 6,
            _ => 0,
        }
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        match byte {
            0 => {
                self.priority = value & 3;
                self.tile_block = (value >> 2) & 3;
                self.mosaic_enable = value.get_bit(6);
                self.full_palette = value.get_bit(7);
            }
            1 => {
                self.map_block = value & 0x1F;
                self.wraparound = value.get_bit(5);
                self.size = value >> 6;
            }
            _ => {}
        }
    }
}

/// BGxX/BGxY: a 28-bit affine reference point, write-only on hardware.
///
/// `current` is what the renderer walks during a frame. Hardware re-latches
/// it from `initial` at VBlank start; this model latches on every write,
/// which is the behavior the rest of the system is built around.
#[derive(Default, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub initial: u32,
    pub current: u32,
}

impl ReferencePoint {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        if byte > 3 {
            return;
        }
        self.initial.set_byte(byte as u8, value);

        // Sign-extend the 28-bit value through the top nibble.
        if self.initial.get_bit(27) {
            self.initial |= 0xF000_0000;
        }

        self.current = self.initial;
    }
}

/// WINxH/WINxV: one window dimension, write-only on hardware.
///
/// Byte 0 holds the exclusive maximum (X2/Y2), byte 1 the minimum (X1/Y1).
/// `changed` latches whenever a write alters either bound, so the renderer
/// can re-evaluate its window spans lazily.
#[derive(Default, Serialize, Deserialize)]
pub struct WindowRange {
    pub min: u8,
    pub max: u8,
    pub changed: bool,
}

impl WindowRange {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        match byte {
            0 => {
                if value != self.max {
                    self.changed = true;
                }
                self.max = value;
            }
            1 => {
                if value != self.min {
                    self.changed = true;
                }
                self.min = value;
            }
            _ => {}
        }
    }
}

/// WININ/WINOUT: layer enables for two window regions.
///
/// Each byte selects six layers (BG0-BG3, OBJ, color effects) for one
/// region: WININ covers window 0/1, WINOUT covers outside/object window.
#[derive(Default, Serialize, Deserialize)]
pub struct WindowLayerSelect {
    pub enable: [[bool; 6]; 2],
}

impl WindowLayerSelect {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn read(&self, byte: usize) -> u8 {
        match byte {
            0 | 1 => {
                let mut value = 0;
                for (i, enabled) in self.enable[byte].iter().enumerate() {
                    value |= u8::from(*enabled) << i;
                }
                value
            }
            _ => 0,
        }
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        if let Some(layers) = self.enable.get_mut(byte) {
            for (i, enabled) in layers.iter_mut().enumerate() {
                *enabled = value.get_bit(i as u8);
            }
        }
    }
}

/// The color special effect selected in BLDCNT bits 6-7.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum BlendEffect {
    #[default]
    None,
    AlphaBlend,
    Brighten,
    Darken,
}

impl From<u8> for BlendEffect {
    fn from(value: u8) -> Self {
        match value & 3 {
            0 => Self::None,
            1 => Self::AlphaBlend,
            2 => Self::Brighten,
            _ => Self::Darken,
        }
    }
}

/// BLDCNT: blend targets and effect selection.
///
/// Byte 0 holds the six first-target bits plus the effect; byte 1 the six
/// second-target bits.
#[derive(Default, Serialize, Deserialize)]
pub struct BlendControl {
    pub targets: [[bool; 6]; 2],
    pub sfx: BlendEffect,
}

impl BlendControl {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn read(&self, byte: usize) -> u8 {
        match byte {
            0 => {
                let mut value = 0;
                for (i, target) in self.targets[0].iter().enumerate() {
                    value |= u8::from(*target) << i;
                }
                value | (self.sfx as u8) << 6
            }
            1 => {
                let mut value = 0;
                for (i, target) in self.targets[1].iter().enumerate() {
                    value |= u8::from(*target) << i;
                }
                value
            }
            _ => 0,
        }
    }

    pub fn write(&mut self, byte: usize, value: u8) {
        match byte {
            0 => {
                for (i, target) in self.targets[0].iter_mut().enumerate() {
                    *target = value.get_bit(i as u8);
                }
                self.sfx = BlendEffect::from(value >> 6);
            }
            1 => {
                for (i, target) in self.targets[1].iter_mut().enumerate() {
                    *target = value.get_bit(i as u8);
                }
            }
            _ => {}
        }
    }
}
