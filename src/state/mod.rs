pub mod events;
pub mod feed;
pub mod permissions;
pub mod routes;
pub mod session;
pub mod storage;
