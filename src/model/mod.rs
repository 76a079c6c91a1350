pub mod attendance_event;
pub mod attendance_summary;
pub mod bank_holiday;
pub mod device_status;
pub mod employee;
pub mod external;
pub mod notification;
pub mod settings;
pub mod site;
pub mod sync_log;
