//! The PPU register block.
//!
//! The CPU reaches these registers through MMIO byte writes routed by the
//! bus; the rasterizer (outside this crate) reads them between instructions.
//! [`registers`] defines the individual register types; [`LcdRegisters`]
//! groups one of each mapped instance the way the renderer consumes them.

pub mod registers;

use serde::{Deserialize, Serialize};

use registers::{
    BackgroundControl, BlendControl, DisplayControl, DisplayStatus, ReferencePoint,
    WindowLayerSelect, WindowRange,
};

/// All LCD registers of the mapped I/O block.
#[derive(Default, Serialize, Deserialize)]
pub struct LcdRegisters {
    pub dispcnt: DisplayControl,
    pub dispstat: DisplayStatus,

    pub bg0cnt: BackgroundControl,
    pub bg1cnt: BackgroundControl,
    pub bg2cnt: BackgroundControl,
    pub bg3cnt: BackgroundControl,

    pub bg2x: ReferencePoint,
    pub bg2y: ReferencePoint,
    pub bg3x: ReferencePoint,
    pub bg3y: ReferencePoint,

    pub win0h: WindowRange,
    pub win1h: WindowRange,
    pub win0v: WindowRange,
    pub win1v: WindowRange,
    pub winin: WindowLayerSelect,
    pub winout: WindowLayerSelect,

    pub bldcnt: BlendControl,
}

impl LcdRegisters {
    /// Restore the power-on state of the whole block.
    pub fn reset(&mut self) {
        self.dispcnt.reset();
        self.dispstat.reset();

        self.bg0cnt.reset();
        self.bg1cnt.reset();
        self.bg2cnt.reset();
        self.bg3cnt.reset();

        self.bg2x.reset();
        self.bg2y.reset();
        self.bg3x.reset();
        self.bg3y.reset();

        self.win0h.reset();
        self.win1h.reset();
        self.win0v.reset();
        self.win1v.reset();
        self.winin.reset();
        self.winout.reset();

        self.bldcnt.reset();
    }
}
