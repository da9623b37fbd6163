pub mod doctor;
pub mod presubmit;
