//! Stable exit codes for `framework-core` commands.

use crate::core::result::ProtocolStatus;

/// Protocol succeeded, or a non-protocol command finished.
pub const OK: i32 = 0;
/// Protocol reported errors, or the engine itself failed.
pub const ERROR: i32 = 1;
/// A decision is needed before work can continue (crash recovery).
pub const USER_INPUT_REQUIRED: i32 = 2;

pub fn for_status(status: ProtocolStatus) -> i32 {
    match status {
        ProtocolStatus::Success => OK,
        ProtocolStatus::Error => ERROR,
        ProtocolStatus::UserInputRequired => USER_INPUT_REQUIRED,
    }
}
