pub mod ad8232;
pub mod display;
pub mod max30102;
