pub mod espn;
pub mod ranking;
pub mod record;
pub mod summary;
pub mod validation;
pub mod week;
