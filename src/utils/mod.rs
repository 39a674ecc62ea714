pub mod cron;
pub mod locker;
