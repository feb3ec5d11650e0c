pub mod affects;
pub mod models;
pub mod osidb;
pub mod settings;
pub mod toast;
pub mod trackers;
pub mod utils;
