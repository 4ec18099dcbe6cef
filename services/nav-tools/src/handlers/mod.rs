pub mod calibrate_sensor;
pub mod estimate_position;
pub mod query_magnetic_field;
pub mod simulate_trajectory;
