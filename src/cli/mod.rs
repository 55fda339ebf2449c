pub mod growth;
pub mod input;
pub mod menu;
pub mod overlap;
pub mod setup;
pub mod ui;
