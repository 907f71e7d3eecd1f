#[macro_use]
pub extern crate failure;

pub mod errors {
    pub use failure::err_msg;
    pub use failure::format_err;
    pub use failure::Error;
    pub use failure::Fail;

    pub type Result<T> = std::result::Result<T, Error>;
}
