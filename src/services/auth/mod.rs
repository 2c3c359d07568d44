pub mod account_status;
pub mod authenticator;
pub mod directory;
pub mod error;
pub mod magic_link;
pub mod one_time_token;
pub mod password;
pub mod principal;
pub mod route_policy;
pub mod token_codec;

pub use account_status::{StatusExemptions, check_account_status};
pub use directory::{PgUserDirectory, UserDirectory};
pub use error::AuthError;
pub use magic_link::MagicLinkIssuer;
pub use one_time_token::{CacheOneTimeTokenStore, OneTimeTokenStore};
pub use principal::{Identity, Principal, Role};
pub use route_policy::{Denial, RouteAccess, RoutePolicy};
pub use token_codec::{SigningSecret, TokenCodec};
