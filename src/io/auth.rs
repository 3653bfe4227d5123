//! Account calls. The identity-provider handshakes happen elsewhere; this
//! only forwards their codes and tokens to the backend and keeps the
//! bearer token it hands back.

use serde::{Deserialize, Serialize};

use crate::io::api::{ApiClient, ApiError};
use crate::io::local_store::LocalStore;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Identity providers the backend accepts ID tokens from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
}

#[derive(Serialize)]
struct SocialLoginBody<'a> {
    provider: Provider,
    id_token: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
}

#[derive(Serialize)]
struct NaverCallbackBody<'a> {
    code: &'a str,
    state: &'a str,
    redirect_uri: &'a str,
}

#[derive(Serialize)]
struct KakaoCallbackBody<'a> {
    code: &'a str,
    redirect_uri: &'a str,
}

/// Built once at start-up and handed to the commands that sign in or out.
pub struct AuthClient<'a> {
    api: &'a ApiClient,
    store: &'a LocalStore,
}

impl<'a> AuthClient<'a> {
    pub fn new(api: &'a ApiClient, store: &'a LocalStore) -> Self {
        AuthClient { api, store }
    }

    /// Usernames default to the local part of the e-mail address.
    pub fn username_for(email: &str) -> &str {
        email.split('@').next().unwrap_or(email)
    }

    /// Create an account. The backend answers with the user, not a token;
    /// call `login` afterwards.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self.api.post_json(
            "/auth/register",
            &RegisterBody {
                username,
                password,
                email,
            },
        )?;
        tracing::info!(username, "registered");
        Ok(())
    }

    /// Password login (form-encoded, OAuth2 password flow).
    pub fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let token = self.api.post_form(
            "/auth/login",
            &[("username", username), ("password", password)],
        )?;
        Ok(self.keep(token))
    }

    pub fn social_login(
        &self,
        provider: Provider,
        id_token: &str,
        email: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<TokenResponse, ApiError> {
        let body = SocialLoginBody {
            provider,
            id_token,
            email,
            display_name,
            photo_url,
        };
        let token = self.api.post_json("/auth/social-login", &body)?;
        Ok(self.keep(token))
    }

    pub fn naver_callback(
        &self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ApiError> {
        let body = NaverCallbackBody {
            code,
            state,
            redirect_uri,
        };
        let token = self.api.post_json("/auth/naver-callback", &body)?;
        Ok(self.keep(token))
    }

    pub fn kakao_callback(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, ApiError> {
        let body = KakaoCallbackBody { code, redirect_uri };
        let token = self.api.post_json("/auth/kakao-callback", &body)?;
        Ok(self.keep(token))
    }

    /// Forget the stored token. There is no server-side session to end.
    pub fn logout(&self) {
        self.store.remove_token();
        tracing::info!("signed out");
    }

    pub fn is_signed_in(&self) -> bool {
        self.store.load_token().is_some()
    }

    fn keep(&self, token: TokenResponse) -> TokenResponse {
        self.store.save_token(&token.access_token);
        tracing::info!("signed in");
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::api::tests::{client, serve_once};
    use tempfile::TempDir;

    #[test]
    fn username_from_email() {
        assert_eq!(AuthClient::username_for("kim@example.com"), "kim");
        assert_eq!(AuthClient::username_for("plain"), "plain");
    }

    #[test]
    fn login_is_form_encoded_and_stores_token() {
        let (url, server) = serve_once(200, r#"{"access_token":"jwt.abc","token_type":"bearer"}"#);
        let dir = TempDir::new().unwrap();
        let api = client(&url, &dir);
        let auth = AuthClient::new(&api, api.store());

        let token = auth.login("kim", "pw 1&2").unwrap();
        assert_eq!(token.access_token, "jwt.abc");
        assert!(auth.is_signed_in());

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /auth/login HTTP/1.1"));
        assert!(
            request
                .to_ascii_lowercase()
                .contains("content-type: application/x-www-form-urlencoded")
        );
        assert!(request.ends_with("username=kim&password=pw+1%262"));

        auth.logout();
        assert!(!auth.is_signed_in());
    }

    #[test]
    fn kakao_callback_forwards_code() {
        let (url, server) = serve_once(200, r#"{"access_token":"k1"}"#);
        let dir = TempDir::new().unwrap();
        let api = client(&url, &dir);
        let auth = AuthClient::new(&api, api.store());

        let token = auth.kakao_callback("c0de", "http://localhost/cb").unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(api.store().load_token().as_deref(), Some("k1"));

        let request = server.join().unwrap();
        assert!(request.ends_with(r#"{"code":"c0de","redirect_uri":"http://localhost/cb"}"#));
    }

    #[test]
    fn failed_login_keeps_previous_state() {
        let (url, server) = serve_once(400, r#"{"detail":"Incorrect username or password"}"#);
        let dir = TempDir::new().unwrap();
        let api = client(&url, &dir);
        let auth = AuthClient::new(&api, api.store());

        let err = auth.login("kim", "wrong").unwrap_err();
        assert!(err.to_string().contains("Incorrect username or password"));
        assert!(!auth.is_signed_in());
        server.join().unwrap();
    }
}
