pub mod run;
pub mod session;
