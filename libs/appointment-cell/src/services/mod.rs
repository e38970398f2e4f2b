pub mod conflict;
pub mod lifecycle;
pub mod scheduling;

pub use scheduling::SchedulingService;
