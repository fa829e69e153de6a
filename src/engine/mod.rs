pub mod approval;
pub mod authorization;
pub mod deviation;
pub mod payroll;
pub mod reconciler;
pub mod resolver;
pub mod shift_matcher;
