use reqwest::Client;
use serde::Deserialize;

use super::OAuthError;

/// OpenID Connect `userinfo` response. Google and LinkedIn both return
/// this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl Profile {
    /// Lower-cased verified email, or `None` when the provider did not
    /// vouch for one.
    pub fn verified_email(&self) -> Option<String> {
        match (&self.email, self.email_verified) {
            (Some(email), Some(true) | None) if !email.trim().is_empty() => {
                Some(email.trim().to_lowercase())
            }
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "cardlink user".to_string())
    }
}

/// Fetches the signed-in user's profile from `userinfo_url`.
pub async fn fetch_profile(
    http: &Client,
    userinfo_url: &str,
    access_token: &str,
) -> Result<Profile, OAuthError> {
    let response = http
        .get(userinfo_url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| OAuthError::Profile(e.to_string()))?;

    if !response.status().is_success() {
        return Err(OAuthError::Profile(format!(
            "userinfo returned {}",
            response.status()
        )));
    }

    response
        .json::<Profile>()
        .await
        .map_err(|e| OAuthError::Profile(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(json: &str) -> Profile {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_linkedin_profile() {
        let p = profile(
            r#"{"sub":"782bbtaQ","name":"Ada Lovelace","given_name":"Ada","family_name":"Lovelace",
                "picture":"https://media.licdn.com/ada.jpg","locale":"en-US",
                "email":"Ada@Example.com","email_verified":true}"#,
        );
        assert_eq!(p.verified_email().as_deref(), Some("ada@example.com"));
        assert_eq!(p.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_unverified_email_rejected() {
        let p = profile(r#"{"sub":"1","email":"x@example.com","email_verified":false}"#);
        assert_eq!(p.verified_email(), None);
        assert_eq!(p.display_name(), "x");
    }

    #[test]
    fn test_missing_email() {
        let p = profile(r#"{"sub":"1"}"#);
        assert_eq!(p.verified_email(), None);
        assert_eq!(p.display_name(), "cardlink user");
    }
}
