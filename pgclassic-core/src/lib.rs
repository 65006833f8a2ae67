mod connection;
mod database;
mod error;
mod notify;
mod quoter;
mod row;
mod table_ref;
mod transaction;
mod type_family;
mod util;
mod value;

pub use ::anyhow::Context;
pub use connection::*;
pub use database::*;
pub use error::*;
pub use notify::*;
pub use quoter::*;
pub use row::*;
pub use table_ref::*;
pub use transaction::*;
pub use type_family::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
