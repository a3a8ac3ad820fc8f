pub mod launch;
pub mod page;
pub mod session;
