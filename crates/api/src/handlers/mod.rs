pub mod dispatch;
pub mod jobs;
