pub mod factory;
pub mod principal;
pub mod token;
pub mod userinfo;
pub mod verify;

pub use factory::{AuthorizeServices, assemble, build_authorize_services};
pub use principal::{Principal, PrincipalResolver, User};
pub use token::{ClaimValue, Claims, InvalidToken, JwtToken, Token};
pub use verify::{JwtVerifyTokenService, TokenAlgorithm, VerifyTokenService};
