pub mod lots;
pub mod movements;
pub mod plans;
pub mod products;
pub mod recipes;
pub mod reservations;
