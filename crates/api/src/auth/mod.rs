//! Bearer-token handling. Tokens are issued by the account service; this
//! crate only validates them (and mints them in tests and tooling).

pub mod jwt;
