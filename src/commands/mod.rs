pub mod calibrate;
pub mod ensemble;
pub mod estimate;
pub mod status;
