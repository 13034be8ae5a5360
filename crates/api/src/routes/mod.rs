//! Route handlers

pub mod alerts;
pub mod live;
pub mod patients;
pub mod readings;
pub mod rooms;
