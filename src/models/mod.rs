pub mod challenge;
pub mod player;
