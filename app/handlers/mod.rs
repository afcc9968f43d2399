pub mod check;
pub mod screens;
