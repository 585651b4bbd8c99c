//! ST7789V display controller command table.
//!
//! Command codes, their parameter counts and the power-on initialisation
//! sequence for the 240×320 TFT on the display connector. This is data only:
//! the SPI transport and the pixel pipeline live with the application, which
//! walks [`INIT_SEQUENCE`] with `LCD_DC` low for each command byte and high for
//! its parameters.
//!
//! # Wiring
//!
//! | Signal | Pin | Direction |
//! |--------|-----|-----------|
//! | CS     | PD4 | Host → Display |
//! | DC     | PD5 | Host → Display |
//! | RST    | PD6 | Host → Display |
//! | BL     | PE1 | Host → Display |
//!
//! # Sources
//!
//! - Sitronix ST7789V datasheet v1.6: §9.1 system function commands, §9.2
//!   panel function commands, §9.17 power-on sequence

/// Panel width in pixels.
pub const DISPLAY_WIDTH: u16 = 240;

/// Panel height in pixels.
pub const DISPLAY_HEIGHT: u16 = 320;

/// ST7789V command codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// No operation.
    Nop = 0x00,
    /// Software reset; wait 5 ms, 120 ms before sleep out.
    SoftReset = 0x01,
    /// Sleep in; wait 5 ms before the next command.
    SleepIn = 0x10,
    /// Sleep out; wait 120 ms before sleep in, 5 ms before anything else.
    SleepOut = 0x11,
    /// Partial display mode on.
    PartialModeOn = 0x12,
    /// Normal display mode on.
    NormalModeOn = 0x13,
    /// Display inversion off.
    InversionOff = 0x20,
    /// Display inversion on (the panel is normally-black).
    InversionOn = 0x21,
    /// Display off.
    DisplayOff = 0x28,
    /// Display on.
    DisplayOn = 0x29,
    /// Column address set: 4 data bytes (start, end; big-endian).
    ColumnAddressSet = 0x2A,
    /// Row address set: 4 data bytes (start, end; big-endian).
    RowAddressSet = 0x2B,
    /// Memory write: pixel data until the next command.
    MemoryWrite = 0x2C,
    /// Memory data access control: 1 data byte (MY MX MV ML RGB MH).
    MemoryAccessControl = 0x36,
    /// Interface pixel format: 1 data byte (0x55 = RGB565).
    PixelFormat = 0x3A,
    /// Porch setting: 5 data bytes.
    PorchControl = 0xB2,
    /// Gate control (VGH/VGL): 1 data byte.
    GateControl = 0xB7,
    /// VCOM setting: 1 data byte.
    VcomSetting = 0xBB,
    /// LCM control: 1 data byte.
    LcmControl = 0xC0,
    /// VDV and VRH command enable: 2 data bytes.
    VdvVrhEnable = 0xC2,
    /// VRH set: 1 data byte.
    VrhSet = 0xC3,
    /// VDV set: 1 data byte.
    VdvSet = 0xC4,
    /// Frame rate control in normal mode: 1 data byte.
    FrameRateControl = 0xC6,
    /// Power control 1: 2 data bytes.
    PowerControl1 = 0xD0,
    /// Positive voltage gamma: 14 data bytes.
    PositiveGamma = 0xE0,
    /// Negative voltage gamma: 14 data bytes.
    NegativeGamma = 0xE1,
}

impl Command {
    /// Command byte.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Fixed number of parameter bytes; `None` for a pixel stream.
    pub const fn param_count(self) -> Option<usize> {
        Some(match self {
            Command::MemoryWrite => return None,
            Command::Nop
            | Command::SoftReset
            | Command::SleepIn
            | Command::SleepOut
            | Command::PartialModeOn
            | Command::NormalModeOn
            | Command::InversionOff
            | Command::InversionOn
            | Command::DisplayOff
            | Command::DisplayOn => 0,
            Command::MemoryAccessControl
            | Command::PixelFormat
            | Command::GateControl
            | Command::VcomSetting
            | Command::LcmControl
            | Command::VrhSet
            | Command::VdvSet
            | Command::FrameRateControl => 1,
            Command::VdvVrhEnable | Command::PowerControl1 => 2,
            Command::ColumnAddressSet | Command::RowAddressSet => 4,
            Command::PorchControl => 5,
            Command::PositiveGamma | Command::NegativeGamma => 14,
        })
    }
}

/// One entry of an initialisation sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitCommand {
    /// Command to send.
    pub command: Command,
    /// Parameter bytes.
    pub params: &'static [u8],
    /// Delay after the command before the next one, in milliseconds.
    pub delay_ms: u16,
}

impl InitCommand {
    const fn new(command: Command, params: &'static [u8], delay_ms: u16) -> Self {
        Self {
            command,
            params,
            delay_ms,
        }
    }
}

/// Power-on sequence: RGB565, portrait, 60 Hz, full-panel window.
pub const INIT_SEQUENCE: &[InitCommand] = &[
    InitCommand::new(Command::SoftReset, &[], 120),
    InitCommand::new(Command::SleepOut, &[], 120),
    InitCommand::new(Command::PixelFormat, &[0x55], 10),
    InitCommand::new(Command::MemoryAccessControl, &[0x00], 0),
    InitCommand::new(Command::PorchControl, &[0x0C, 0x0C, 0x00, 0x33, 0x33], 0),
    InitCommand::new(Command::GateControl, &[0x35], 0),
    InitCommand::new(Command::VcomSetting, &[0x19], 0),
    InitCommand::new(Command::LcmControl, &[0x2C], 0),
    InitCommand::new(Command::VdvVrhEnable, &[0x01, 0xFF], 0),
    InitCommand::new(Command::VrhSet, &[0x12], 0),
    InitCommand::new(Command::VdvSet, &[0x20], 0),
    InitCommand::new(Command::FrameRateControl, &[0x0F], 0),
    InitCommand::new(Command::PowerControl1, &[0xA4, 0xA1], 0),
    InitCommand::new(
        Command::PositiveGamma,
        &[0xD0, 0x04, 0x0D, 0x11, 0x13, 0x2B, 0x3F, 0x54, 0x4C, 0x18, 0x0D, 0x0B, 0x1F, 0x23],
        0,
    ),
    InitCommand::new(
        Command::NegativeGamma,
        &[0xD0, 0x04, 0x0C, 0x11, 0x13, 0x2C, 0x3F, 0x44, 0x51, 0x2F, 0x1F, 0x1F, 0x20, 0x23],
        0,
    ),
    InitCommand::new(Command::InversionOn, &[], 0),
    InitCommand::new(Command::ColumnAddressSet, &[0x00, 0x00, 0x00, 0xEF], 0),
    InitCommand::new(Command::RowAddressSet, &[0x00, 0x00, 0x01, 0x3F], 0),
    InitCommand::new(Command::NormalModeOn, &[], 10),
    InitCommand::new(Command::DisplayOn, &[], 20),
];

/// Total delay of [`INIT_SEQUENCE`] in milliseconds.
pub fn init_sequence_delay_ms() -> u32 {
    INIT_SEQUENCE.iter().map(|c| u32::from(c.delay_ms)).sum()
}
