//! Identity primitives for the access-control layer: role taxonomy and
//! normalization, token decoding, principals and token issuing.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod claims;
mod principal;
mod issuer;

pub use role::{normalize, home_path_for, Role, DEFAULT_HOME};
pub use claims::{Claims, TokenDecoder, TokenError, UnverifiedDecoder, Hs256Decoder};
pub use principal::Principal;
pub use issuer::{TokenIssuer, TokenPair, ACCESS_TOKEN_TYPE, REFRESH_TOKEN_TYPE};
