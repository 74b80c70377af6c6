pub mod base_commands;
pub mod command_error;
pub mod consolidate_cmd;
pub mod forecast_cmd;
pub mod report_format;
pub mod show_cmd;
