pub mod address;
pub mod context;
pub mod conversation;
pub mod customer;
pub mod freight;
pub mod interaction;
pub mod package;
pub mod trip;
