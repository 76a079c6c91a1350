pub mod geofence;
pub mod noise;
pub mod notify;
pub mod timesheet;
