pub mod admission;
pub mod appointments;
pub mod availability;
pub mod occupancy;
pub mod slots;
pub mod suggestion;

pub use admission::AdmissionService;
pub use appointments::AppointmentService;
pub use availability::AvailabilityService;
pub use occupancy::OccupancyService;
pub use slots::SlotIter;
pub use suggestion::{ClockProximity, ScoringStrategy, SuggestionService};
