//! 5250 protocol byte constants: commands, orders, AID bytes, write
//! structured field subfield types, and operator error codes.
//!
//! Source: IBM 5494 Functions Reference (SC30-3533) and Data Stream
//! Negative Responses (SC30-3533-04) 13.4, cross-checked against the
//! byte values named in this library's own protocol notes.

/// 5250 top-level commands (§4.3).
pub const CMD_WRITE_TO_DISPLAY: u8 = 0xF1;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0xF3;
pub const CMD_READ_INPUT_FIELDS: u8 = 0xF5;
pub const CMD_READ_MDT_FIELDS: u8 = 0xF6;
pub const CMD_CLEAR_UNIT: u8 = 0x04;
pub const CMD_CLEAR_FORMAT_TABLE: u8 = 0x40;
pub const CMD_SAVE_SCREEN: u8 = 0xF2;
pub const CMD_SAVE_PARTIAL_SCREEN: u8 = 0x12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    WriteToDisplay,
    WriteStructuredField,
    ReadInputFields,
    ReadMdtFields,
    ClearUnit,
    ClearFormatTable,
    SaveScreen,
    SavePartialScreen,
}

impl CommandCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_WRITE_TO_DISPLAY => Some(Self::WriteToDisplay),
            CMD_WRITE_STRUCTURED_FIELD => Some(Self::WriteStructuredField),
            CMD_READ_INPUT_FIELDS => Some(Self::ReadInputFields),
            CMD_READ_MDT_FIELDS => Some(Self::ReadMdtFields),
            CMD_CLEAR_UNIT => Some(Self::ClearUnit),
            CMD_CLEAR_FORMAT_TABLE => Some(Self::ClearFormatTable),
            CMD_SAVE_SCREEN => Some(Self::SaveScreen),
            CMD_SAVE_PARTIAL_SCREEN => Some(Self::SavePartialScreen),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::WriteToDisplay => CMD_WRITE_TO_DISPLAY,
            Self::WriteStructuredField => CMD_WRITE_STRUCTURED_FIELD,
            Self::ReadInputFields => CMD_READ_INPUT_FIELDS,
            Self::ReadMdtFields => CMD_READ_MDT_FIELDS,
            Self::ClearUnit => CMD_CLEAR_UNIT,
            Self::ClearFormatTable => CMD_CLEAR_FORMAT_TABLE,
            Self::SaveScreen => CMD_SAVE_SCREEN,
            Self::SavePartialScreen => CMD_SAVE_PARTIAL_SCREEN,
        }
    }
}

/// Orders occurring inside a Write-to-Display command (§4.3).
pub const SOH: u8 = 0x01;
pub const RA: u8 = 0x02;
pub const EA: u8 = 0x03;
pub const SBA: u8 = 0x11;
pub const IC: u8 = 0x13;
pub const SF: u8 = 0x1D;
pub const SFE: u8 = 0x28;
pub const SA: u8 = 0x29;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartOfHeader,
    RepeatToAddress,
    EraseToAddress,
    SetBufferAddress,
    InsertCursor,
    StartOfField,
    StartOfFieldExtended,
    SetAttribute,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            SOH => Some(Self::StartOfHeader),
            RA => Some(Self::RepeatToAddress),
            EA => Some(Self::EraseToAddress),
            SBA => Some(Self::SetBufferAddress),
            IC => Some(Self::InsertCursor),
            SF => Some(Self::StartOfField),
            SFE => Some(Self::StartOfFieldExtended),
            SA => Some(Self::SetAttribute),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::StartOfHeader => SOH,
            Self::RepeatToAddress => RA,
            Self::EraseToAddress => EA,
            Self::SetBufferAddress => SBA,
            Self::InsertCursor => IC,
            Self::StartOfField => SF,
            Self::StartOfFieldExtended => SFE,
            Self::SetAttribute => SA,
        }
    }
}

/// Write-structured-field subfield header: `{len(2B), class(1B), type(1B), payload}`.
pub const SF_CLASS_5250: u8 = 0xD9;
pub const SF_TYPE_QUERY: u8 = 0x70;
pub const SF_TYPE_QUERY_STATION_STATE: u8 = 0x72;
pub const SF_TYPE_DEFINE_AUDIT_WINDOW: u8 = 0x30;
pub const SF_TYPE_REMOVE_AUDIT_WINDOW: u8 = 0x31;

/// AID (Attention Identifier) bytes sent in the first byte of an
/// outbound response record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aid {
    Enter,
    Help,
    RollDown,
    RollUp,
    Print,
    RecordBackspace,
    Clear,
    Pa1,
    Pa2,
    Pa3,
    SysReq,
    Attn,
    Pf(u8),
}

impl Aid {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Enter => 0xF1,
            Self::Help => 0xF3,
            Self::RollDown => 0xF4,
            Self::RollUp => 0xF5,
            Self::Print => 0xF6,
            Self::RecordBackspace => 0xF9,
            Self::Clear => 0xBD,
            Self::Pa1 => 0x6C,
            Self::Pa2 => 0x6E,
            Self::Pa3 => 0x6D,
            Self::SysReq => 0xF0,
            Self::Attn => 0x7E,
            Self::Pf(n) if (1..=12).contains(&n) => 0x30 + n,
            Self::Pf(n) if (13..=24).contains(&n) => 0xA4 + n,
            Self::Pf(n) => panic!("PF key out of range: {n}"),
        }
    }

    /// Short-form AIDs send only `{AID, cursor row, cursor col}`; all
    /// others also carry the modified-field contents (§4.5).
    pub fn is_short_form(self) -> bool {
        matches!(self, Self::Clear | Self::Help | Self::Pa1 | Self::Pa2 | Self::Pa3)
    }
}

/// Operator error codes (5494 User's Guide GA27-3960-03, 2.3.4), carried
/// in `OperatorError::Inhibited` and the negative-response record.
pub const ERR_DONT_KNOW: u8 = 0x01;
pub const ERR_BYPASS_FIELD: u8 = 0x04;
pub const ERR_NO_FIELD: u8 = 0x05;
pub const ERR_INVALID_SYSREQ: u8 = 0x06;
pub const ERR_MANDATORY_ENTRY: u8 = 0x07;
pub const ERR_ALPHA_ONLY: u8 = 0x08;
pub const ERR_NUMERIC_ONLY: u8 = 0x09;
pub const ERR_NO_ROOM: u8 = 0x12;
pub const ERR_EXIT_NOT_VALID: u8 = 0x18;
pub const ERR_DUP_NOT_ENABLED: u8 = 0x19;
pub const ERR_NO_FIELD_EXIT: u8 = 0x20;
pub const ERR_BAD_CHAR: u8 = 0x27;

pub const MSG_BYPASS_FIELD: &str = "Entry of data not allowed in this input/output field.";
pub const MSG_NO_FIELD: &str = "Cursor in protected area of display.";
pub const MSG_MANDATORY_ENTRY: &str = "Mandatory data entry field. Must have data entered.";
pub const MSG_ALPHA_ONLY: &str = "Field requires alphabetic characters.";
pub const MSG_NUMERIC_ONLY: &str = "Field requires numeric characters.";
pub const MSG_NO_ROOM: &str = "No room to insert data.";
pub const MSG_EXIT_NOT_VALID: &str = "The key used to exit field not valid.";
pub const MSG_DUP_NOT_ENABLED: &str = "Duplicate key or Field Mark key not allowed in field.";
pub const MSG_NO_FIELD_EXIT: &str = "Enter key not allowed in field.";
pub const MSG_BAD_CHAR: &str = "Cannot use undefined key.";

pub fn error_message(code: u8) -> Option<&'static str> {
    match code {
        ERR_BYPASS_FIELD => Some(MSG_BYPASS_FIELD),
        ERR_NO_FIELD => Some(MSG_NO_FIELD),
        ERR_MANDATORY_ENTRY => Some(MSG_MANDATORY_ENTRY),
        ERR_ALPHA_ONLY => Some(MSG_ALPHA_ONLY),
        ERR_NUMERIC_ONLY => Some(MSG_NUMERIC_ONLY),
        ERR_NO_ROOM => Some(MSG_NO_ROOM),
        ERR_EXIT_NOT_VALID => Some(MSG_EXIT_NOT_VALID),
        ERR_DUP_NOT_ENABLED => Some(MSG_DUP_NOT_ENABLED),
        ERR_NO_FIELD_EXIT => Some(MSG_NO_FIELD_EXIT),
        ERR_BAD_CHAR => Some(MSG_BAD_CHAR),
        _ => None,
    }
}

/// Negative-response record prefix: `NR_REQUEST_ERROR 0x05 0x01 0xNN`.
pub const NR_REQUEST_ERROR: [u8; 2] = [0x05, 0x01];

/// Data Stream Negative Response codes (SC30-3533-04 13.4) used as the
/// `0xNN` byte of a negative-response record.
pub const DSNR_INVCURSPOS: u8 = 0x22;
pub const DSNR_INVSFA: u8 = 0x26;
pub const DSNR_UNKNOWN_ORDER: u8 = 0x01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_code_round_trips() {
        assert_eq!(CommandCode::from_u8(CMD_WRITE_TO_DISPLAY), Some(CommandCode::WriteToDisplay));
        assert_eq!(CommandCode::WriteToDisplay.to_u8(), CMD_WRITE_TO_DISPLAY);
        assert_eq!(CommandCode::from_u8(0xFF), None);
    }

    #[test]
    fn order_code_round_trips() {
        assert_eq!(OrderCode::from_u8(SF), Some(OrderCode::StartOfField));
        assert_eq!(OrderCode::StartOfField.to_u8(), SF);
    }

    #[test]
    fn pf_keys_span_distinct_bytes() {
        let mut bytes: Vec<u8> = (1..=24).map(|n| Aid::Pf(n).to_u8()).collect();
        bytes.sort_unstable();
        bytes.dedup();
        assert_eq!(bytes.len(), 24);
    }

    #[test]
    fn short_form_aids_match_spec_list() {
        assert!(Aid::Clear.is_short_form());
        assert!(Aid::Help.is_short_form());
        assert!(Aid::Pa1.is_short_form());
        assert!(!Aid::Enter.is_short_form());
    }

    #[test]
    fn error_message_lookup() {
        assert_eq!(error_message(ERR_NO_FIELD), Some(MSG_NO_FIELD));
        assert_eq!(error_message(0xFF), None);
    }
}
