pub mod pairing;
pub mod performance;
pub mod roster;
