//! Built-in resolution strategies.

mod authority;
mod latest;
mod manual;
mod mirror;

pub use authority::AuthorityPriority;
pub use latest::LatestTimestamp;
pub use manual::Manual;
pub use mirror::MirrorAuthority;
