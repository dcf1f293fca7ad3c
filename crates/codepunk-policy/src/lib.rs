//! Path safety and the shell command validator (C6's path rule and C16).

pub mod path_safety;
pub mod shell_validator;

pub use path_safety::{PathSafetyViolation, check_path_safety};
pub use shell_validator::{
    ShellValidatorConfig, ShellViolation, command_root, split_command_segments, validate_command,
};
