//! Operation, response and sub-operation codes
//!
//! Standard PTP codes (ISO 15740) used by this crate, plus the CHDK vendor
//! operation and its sub-operations (CHDK `ptp.h`, protocol 2.x).

// Standard operation codes
pub mod operation {
    pub const GET_DEVICE_INFO: u16 = 0x1001;
    pub const OPEN_SESSION: u16 = 0x1002;
    pub const CLOSE_SESSION: u16 = 0x1003;

    /// Single vendor operation carrying every CHDK request; param 0 selects the sub-operation
    pub const CHDK: u16 = 0x9999;
}

// Standard response codes
pub mod response {
    pub const OK: u16 = 0x2001;
    pub const GENERAL_ERROR: u16 = 0x2002;
    pub const SESSION_NOT_OPEN: u16 = 0x2003;
    pub const INVALID_TRANSACTION_ID: u16 = 0x2004;
    pub const OPERATION_NOT_SUPPORTED: u16 = 0x2005;
    pub const PARAMETER_NOT_SUPPORTED: u16 = 0x2006;
    pub const INCOMPLETE_TRANSFER: u16 = 0x2007;
    pub const INVALID_PARAMETER: u16 = 0x201D;
    pub const SESSION_ALREADY_OPEN: u16 = 0x201E;
}

// CHDK sub-operations, sent as the first parameter of operation::CHDK
pub mod chdk {
    pub const VERSION: u32 = 0;
    pub const GET_MEMORY: u32 = 1;
    pub const SET_MEMORY: u32 = 2;
    pub const CALL_FUNCTION: u32 = 3;
    pub const TEMP_DATA: u32 = 4;
    pub const UPLOAD_FILE: u32 = 5;
    pub const DOWNLOAD_FILE: u32 = 6;
    pub const EXECUTE_SCRIPT: u32 = 7;
    pub const SCRIPT_STATUS: u32 = 8;
    pub const SCRIPT_SUPPORT: u32 = 9;
    pub const READ_SCRIPT_MSG: u32 = 10;
    pub const WRITE_SCRIPT_MSG: u32 = 11;
    pub const GET_DISPLAY_DATA: u32 = 12;

    // Script languages for EXECUTE_SCRIPT
    pub const SCRIPT_LANG_LUA: u32 = 0;

    // SCRIPT_SUPPORT flags
    pub const SCRIPT_SUPPORT_LUA: u32 = 0x1;

    // TEMP_DATA flags
    pub const TEMP_DATA_DOWNLOAD: u32 = 0x0;
    pub const TEMP_DATA_EXTEND: u32 = 0x1;
}
