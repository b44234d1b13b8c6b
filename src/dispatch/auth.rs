//! Pluggable authenticators selected by `Authorization` header scheme

use std::sync::Arc;

use hyper::header::AUTHORIZATION;

use super::context::RequestContext;
use super::session::SESSION_USER_KEY;
use crate::error::DispatchError;

/// Verifies credentials for one `Authorization` scheme
pub trait Authenticator: Send + Sync {
    /// Scheme name, matched case-insensitively (e.g. `Basic`)
    fn scheme(&self) -> &str;

    /// User identifier for valid credentials, `None` to reject
    fn authenticate(&self, credentials: &str) -> Option<String>;
}

/// Identify the caller.
///
/// An `Authorization` header whose scheme has a registered authenticator
/// decides on its own; rejected credentials are an authentication error.
/// Otherwise the user stored in the session, if any, is used.
pub fn resolve_identity(
    authenticators: &[Arc<dyn Authenticator>],
    ctx: &RequestContext,
) -> Result<Option<String>, DispatchError> {
    if let Some((scheme, credentials)) = ctx
        .header(AUTHORIZATION.as_str())
        .and_then(|value| value.trim().split_once(' '))
    {
        if let Some(authenticator) = authenticators
            .iter()
            .find(|a| a.scheme().eq_ignore_ascii_case(scheme))
        {
            return authenticator
                .authenticate(credentials.trim())
                .map(Some)
                .ok_or_else(|| {
                    DispatchError::Authentication(format!("invalid {scheme} credentials"))
                });
        }
    }

    Ok(ctx.session().get(SESSION_USER_KEY).map(ToString::to_string))
}

/// `Basic` scheme over a user/password verifier
pub struct BasicAuthenticator<F> {
    verify: F,
}

impl<F> BasicAuthenticator<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    pub const fn new(verify: F) -> Self {
        Self { verify }
    }
}

impl<F> Authenticator for BasicAuthenticator<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn scheme(&self) -> &str {
        "Basic"
    }

    fn authenticate(&self, credentials: &str) -> Option<String> {
        let decoded = base64::decode(credentials).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        (self.verify)(user, password).then(|| user.to_string())
    }
}

/// `Bearer` scheme over a token lookup
pub struct BearerAuthenticator<F> {
    lookup: F,
}

impl<F> BearerAuthenticator<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    pub const fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<F> Authenticator for BearerAuthenticator<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn authenticate(&self, credentials: &str) -> Option<String> {
        (self.lookup)(credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::session::Session;
    use hyper::body::Bytes;
    use hyper::Request;

    fn authenticators() -> Vec<Arc<dyn Authenticator>> {
        vec![
            Arc::new(BasicAuthenticator::new(|user, password| {
                user == "alice" && password == "s3cret"
            })),
            Arc::new(BearerAuthenticator::new(|token| {
                (token == "tok-1").then(|| "robot".to_string())
            })),
        ]
    }

    fn ctx(authorization: Option<&str>, session: Session) -> RequestContext {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        RequestContext::new(builder.body(Bytes::new()).unwrap(), session)
    }

    #[test]
    fn test_basic_credentials() {
        // alice:s3cret
        let c = ctx(Some("Basic YWxpY2U6czNjcmV0"), Session::new());
        assert_eq!(
            resolve_identity(&authenticators(), &c).unwrap().as_deref(),
            Some("alice")
        );

        // alice:wrong
        let c = ctx(Some("basic YWxpY2U6d3Jvbmc="), Session::new());
        assert!(matches!(
            resolve_identity(&authenticators(), &c),
            Err(DispatchError::Authentication(_))
        ));
    }

    #[test]
    fn test_bearer_token() {
        let c = ctx(Some("Bearer tok-1"), Session::new());
        assert_eq!(
            resolve_identity(&authenticators(), &c).unwrap().as_deref(),
            Some("robot")
        );
    }

    #[test]
    fn test_unknown_scheme_falls_back_to_session() {
        let mut session = Session::new();
        session.insert(SESSION_USER_KEY, "bob");
        let c = ctx(Some("Digest abc"), session);
        assert_eq!(
            resolve_identity(&authenticators(), &c).unwrap().as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn test_anonymous() {
        let c = ctx(None, Session::new());
        assert_eq!(resolve_identity(&authenticators(), &c).unwrap(), None);
    }
}
