pub mod announcer;
pub mod messages;
