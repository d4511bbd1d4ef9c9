/// Authentication and authorization
///
/// - [`password`]: Argon2id hashing and strength rules
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`invite_token`]: one-time verification invite tokens
/// - [`middleware`]: Bearer authentication for axum
/// - [`authorization`]: tenant role checks
///
/// # Example
///
/// ```no_run
/// use repute_shared::auth::password::{hash_password, verify_password};
/// use repute_shared::auth::jwt::issue_token_pair;
/// # use uuid::Uuid;
///
/// # fn example(user_id: Uuid, tenant_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sup3r$ecret")?;
/// assert!(verify_password("Sup3r$ecret", &hash)?);
///
/// let tokens = issue_token_pair(user_id, tenant_id, "a-secret-of-at-least-thirty-two-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod invite_token;
pub mod jwt;
pub mod middleware;
pub mod password;
