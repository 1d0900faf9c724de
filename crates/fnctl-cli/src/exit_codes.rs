//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - a collaborator or the cluster failed
pub const ERROR: i32 = 1;

/// Validation error - bad flag, setting or func.yaml content
pub const VALIDATION_ERROR: i32 = 2;

/// Deploy refused because no usable build exists
pub const NOT_BUILT: i32 = 3;

/// Function not found where the command expected it
pub const NOT_FOUND: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Interrupted by the user
pub const CANCELED: i32 = 130;
