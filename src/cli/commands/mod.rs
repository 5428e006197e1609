pub mod eval;
pub mod exec;
pub mod flush;
pub mod list;
pub mod login;
pub mod logout;
pub mod process;
