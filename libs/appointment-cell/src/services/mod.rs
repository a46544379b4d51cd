// libs/appointment-cell/src/services/mod.rs
pub mod booking;
pub mod conflict;

pub use booking::AppointmentBookingService;
pub use conflict::ConflictService;
