//! SurrealDB repository implementations.

mod authz;
mod grant;
mod group;
mod user;

pub use authz::SurrealAuthorizationChecker;
pub use grant::SurrealGrantService;
pub use group::SurrealGroupRepository;
pub use user::SurrealUserRepository;
