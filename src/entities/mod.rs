pub mod cinema;
pub mod movie;
pub mod schedule;
