pub mod color_pulse;
pub mod starfield;
