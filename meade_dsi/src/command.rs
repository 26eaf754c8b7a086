//! Command codes of the DSI vendor protocol and the per-command frame
//! width tables.
//!
//! The codes were reverse engineered from USB captures of the Windows
//! driver. A handful (CLEAR_TS, the power-supply switches, TEST_PATTERN)
//! have never been observed on the wire but are accepted by the firmware.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Width of a parameter or result field inside a command frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Width {
    None,
    Byte,
    Word,
    DWord,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::None => 0,
            Width::Byte => 1,
            Width::Word => 2,
            Width::DWord => 4,
        }
    }
}

#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Command {
    Ping = 0x00,
    Reset = 0x01,
    Abort = 0x02,
    Trigger = 0x03,
    ClearTs = 0x04,
    GetVersion = 0x14,
    GetStatus = 0x15,
    GetTimestamp = 0x16,
    GetEepromLength = 0x1e,
    GetEepromByte = 0x1f,
    SetEepromByte = 0x20,
    GetGain = 0x32,
    SetGain = 0x33,
    GetOffset = 0x34,
    SetOffset = 0x35,
    GetExpTime = 0x36,
    SetExpTime = 0x37,
    GetExpMode = 0x38,
    SetExpMode = 0x39,
    GetVddMode = 0x3a,
    SetVddMode = 0x3b,
    GetFlushMode = 0x3c,
    SetFlushMode = 0x3d,
    GetCleanMode = 0x3e,
    SetCleanMode = 0x3f,
    GetReadoutSpeed = 0x40,
    SetReadoutSpeed = 0x41,
    GetReadoutMode = 0x42,
    SetReadoutMode = 0x43,
    GetReadoutDelay = 0x44,
    SetReadoutDelay = 0x45,
    GetRowCountOdd = 0x46,
    SetRowCountOdd = 0x47,
    GetRowCountEven = 0x48,
    SetRowCountEven = 0x49,
    GetTemp = 0x4a,
    GetExpTimerCount = 0x4b,
    PsOn = 0x64,
    PsOff = 0x65,
    CcdVddOn = 0x66,
    CcdVddOff = 0x67,
    AdRead = 0x68,
    AdWrite = 0x69,
    TestPattern = 0x6a,
    GetDebugValue = 0x6b,
    GetEepromVidPid = 0x6c,
    SetEepromVidPid = 0x6d,
    EraseEeprom = 0x6e,
}

impl Command {
    /// Byte code sent on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Command> {
        Command::from_u8(code)
    }

    /// Width of the parameter field. A fixed property of the command, not
    /// of the value being sent.
    pub fn param_width(self) -> Width {
        use Command::*;
        match self {
            GetEepromByte | SetGain | SetExpMode | SetVddMode | SetFlushMode | SetCleanMode
            | SetReadoutSpeed | SetReadoutMode | AdRead | GetDebugValue => Width::Byte,
            SetEepromByte | SetOffset | SetReadoutDelay | SetRowCountOdd | SetRowCountEven
            | AdWrite => Width::Word,
            SetExpTime | SetEepromVidPid => Width::DWord,
            _ => Width::None,
        }
    }

    /// Width of the result field in the reply.
    pub fn reply_width(self) -> Width {
        use Command::*;
        match self {
            GetEepromLength | GetEepromByte | GetGain | GetExpMode | GetVddMode | GetFlushMode
            | GetCleanMode | GetReadoutSpeed | GetReadoutMode => Width::Byte,
            // SET_EXP_MODE oddly acknowledges with a 16-bit result.
            GetOffset | GetReadoutDelay | SetExpMode | GetRowCountOdd | GetRowCountEven
            | GetTemp | AdRead | GetDebugValue => Width::Word,
            GetVersion | GetStatus | GetTimestamp | GetExpTime | GetExpTimerCount
            | GetEepromVidPid => Width::DWord,
            _ => Width::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trip() {
        assert_eq!(Command::from_code(0x37), Some(Command::SetExpTime));
        assert_eq!(Command::from_code(0x4a), Some(Command::GetTemp));
        assert_eq!(Command::SetExpTime.code(), 0x37);
        // Codes between the documented groups are unassigned
        assert_eq!(Command::from_code(0x05), None);
        assert_eq!(Command::from_code(0xff), None);
    }

    #[test]
    fn parameter_widths() {
        assert_eq!(Command::Ping.param_width(), Width::None);
        assert_eq!(Command::SetGain.param_width(), Width::Byte);
        assert_eq!(Command::SetOffset.param_width(), Width::Word);
        assert_eq!(Command::SetExpTime.param_width(), Width::DWord);
        assert_eq!(Command::GetTemp.param_width(), Width::None);
    }

    #[test]
    fn reply_widths() {
        assert_eq!(Command::Trigger.reply_width(), Width::None);
        assert_eq!(Command::GetGain.reply_width(), Width::Byte);
        assert_eq!(Command::GetTemp.reply_width(), Width::Word);
        assert_eq!(Command::GetVersion.reply_width(), Width::DWord);
        // The one set command with a non-empty result
        assert_eq!(Command::SetExpMode.reply_width(), Width::Word);
    }
}
