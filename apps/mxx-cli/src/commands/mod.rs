pub mod notify;
pub mod run;
