use std::future::Future;

use super::error::AuthError;
use super::manager::CredentialManager;

/// Run `operation` with a valid access token.
///
/// The token is obtained through [`CredentialManager::get_access_token`]
/// (refreshing or logging in as configured); the operation's own result or
/// error is returned unchanged.
///
/// # Example
/// ```no_run
/// # async fn example(manager: &extkit::auth::CredentialManager) -> extkit::error::Result<()> {
/// let status = extkit::auth::with_valid_token(manager, |token| async move {
///     let resp = reqwest::Client::new()
///         .get("https://www.googleapis.com/oauth2/v3/userinfo")
///         .bearer_auth(token)
///         .send()
///         .await?;
///     Ok::<_, extkit::error::ExtkitError>(resp.status())
/// })
/// .await?;
/// # let _ = status;
/// # Ok(())
/// # }
/// ```
pub async fn with_valid_token<F, Fut, T, E>(
    manager: &CredentialManager,
    operation: F,
) -> Result<T, E>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<AuthError>,
{
    let token = manager.get_access_token().await?;
    operation(token).await
}
