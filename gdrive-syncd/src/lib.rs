pub mod daemon;
pub mod oauth_flow;
pub mod session;
pub mod storage;
pub mod sync;
