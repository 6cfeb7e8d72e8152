pub mod category_rule;
pub mod economic_event;
pub mod notification_log;
