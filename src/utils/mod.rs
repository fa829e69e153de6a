pub mod format;
pub mod period;
pub mod time;
pub mod validation;
