// Session authentication
//
// Cookie-based login/logout against the server's Django account views.
// The WebSocket endpoint authenticates with the same session cookies and
// additionally requires the `csrftoken` cookie value as a query parameter.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, REFERER};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::http::HttpConfig;

const CSRF_COOKIE: &str = "csrftoken";
const SESSION_COOKIE: &str = "sessionid";
const CSRF_HEADER: &str = "X-CSRFToken";

/// Cookies of an authenticated session.
#[derive(Debug, Clone)]
pub struct SessionCookies {
    csrf_token: SecretString,
    cookie_header: SecretString,
}

impl SessionCookies {
    /// Wrap an existing `Cookie` header value (e.g. copied from a browser).
    ///
    /// Fails with [`Error::MissingCsrfToken`] when no `csrftoken` is present.
    pub fn from_cookie_header(header: &str) -> Result<Self, Error> {
        let csrf = cookie_value(header, CSRF_COOKIE)
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingCsrfToken)?;

        Ok(Self {
            csrf_token: SecretString::from(csrf.to_owned()),
            cookie_header: SecretString::from(header.trim().to_owned()),
        })
    }

    /// Value of the `csrftoken` cookie.
    pub fn csrf_token(&self) -> &SecretString {
        &self.csrf_token
    }

    /// The full `Cookie` header to present on the WebSocket upgrade.
    pub fn cookie_header(&self) -> &SecretString {
        &self.cookie_header
    }

    /// Whether a `sessionid` cookie is part of the header.
    pub fn has_session(&self) -> bool {
        cookie_value(self.cookie_header.expose_secret(), SESSION_COOKIE).is_some()
    }
}

/// Log in with username/password and collect the session cookies.
///
/// Fetches the login page first so the server issues a `csrftoken`,
/// then posts the form with that token echoed in both the body and the
/// `X-CSRFToken` header.
pub async fn login(
    base: &Url,
    username: &str,
    password: &SecretString,
    http: &HttpConfig,
) -> Result<SessionCookies, Error> {
    let jar = Arc::new(Jar::default());
    let client = http.build_client(Arc::clone(&jar))?;
    let url = account_url(base, "login")?;

    debug!("fetching login page at {}", url);
    client.get(url.clone()).send().await?.error_for_status()?;

    let seeded = jar_cookies(&jar, &url).ok_or(Error::MissingCsrfToken)?;
    let csrf = cookie_value(&seeded, CSRF_COOKIE)
        .ok_or(Error::MissingCsrfToken)?
        .to_owned();

    debug!("logging in as {}", username);

    let resp = client
        .post(url.clone())
        .header(CSRF_HEADER, &csrf)
        .header(REFERER, url.as_str())
        .form(&[
            ("username", username),
            ("password", password.expose_secret()),
            ("csrfmiddlewaretoken", csrf.as_str()),
        ])
        .send()
        .await?;

    let status = resp.status();
    if !(status.is_success() || status.is_redirection()) {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            message: format!("login failed (HTTP {status}): {body}"),
        });
    }

    let header = jar_cookies(&jar, &url).ok_or(Error::MissingCsrfToken)?;
    let cookies = SessionCookies::from_cookie_header(&header)?;
    if !cookies.has_session() {
        return Err(Error::Authentication {
            message: "server did not issue a session cookie".into(),
        });
    }

    debug!("login successful");
    Ok(cookies)
}

/// End the session behind `cookies`.
pub async fn logout(base: &Url, cookies: &SessionCookies, http: &HttpConfig) -> Result<(), Error> {
    let client = http.build_client(Arc::new(Jar::default()))?;
    let url = account_url(base, "logout")?;

    debug!("logging out at {}", url);

    client
        .post(url)
        .header(COOKIE, cookies.cookie_header().expose_secret())
        .header(CSRF_HEADER, cookies.csrf_token().expose_secret())
        .send()
        .await?;

    debug!("logout complete");
    Ok(())
}

/// `<base>/accounts/<view>/`, keeping the base path (e.g. `/MAAS`).
fn account_url(base: &Url, view: &str) -> Result<Url, Error> {
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let path = format!("{}/", dir.path());
        dir.set_path(&path);
    }
    Ok(dir.join(&format!("accounts/{view}/"))?)
}

fn jar_cookies(jar: &Jar, url: &Url) -> Option<String> {
    jar.cookies(url)
        .and_then(|value| value.to_str().ok().map(str::to_owned))
}

/// Find `name` in a `a=b; c=d` cookie header.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}
