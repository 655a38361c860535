pub mod board;
pub mod cascade;
pub mod engagement;
pub mod matching;
pub mod power_ups;
pub mod triggers;
