pub mod refresh;
pub mod reservations;
pub mod status;
