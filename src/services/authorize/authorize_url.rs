use url::Url;

use crate::services::policy::ApplicationPolicy;

/// Identity-provider login URL for one redirect attempt.
#[derive(Debug, Clone)]
pub struct AuthorizeUrl<'a> {
    authorize_url: &'a Url,
    app: &'a ApplicationPolicy,
    state: &'a str,
}

impl<'a> AuthorizeUrl<'a> {
    /// `state` is the already encoded `AuthorizeState`.
    pub fn new(authorize_url: &'a Url, app: &'a ApplicationPolicy, state: &'a str) -> Self {
        Self {
            authorize_url,
            app,
            state,
        }
    }

    /// Absolute URI with every parameter percent-encoded. Query parameters
    /// already present on the configured authorize URL are kept.
    pub fn to_uri(&self) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.app.client_id)
                .append_pair("redirect_uri", &self.app.redirect_uri)
                .append_pair("scope", &self.app.scope);
            if let Some(audience) = &self.app.audience {
                query.append_pair("audience", audience);
            }
            query.append_pair("state", self.state);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn app(audience: Option<&str>) -> ApplicationPolicy {
        ApplicationPolicy {
            name: "app.example.com".into(),
            client_id: "client id".into(),
            audience: audience.map(str::to_string),
            scope: "openid profile".into(),
            redirect_uri: "https://auth.example.com/signin?x=1".into(),
            token_cookie_domain: "example.com".into(),
            claims: vec![],
            required_claims: BTreeMap::new(),
            required_permissions: vec![],
        }
    }

    fn params(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn renders_all_parameters() {
        let base = Url::parse("https://idp.example.com/authorize").unwrap();
        let app = app(Some("https://api.example.com"));
        let uri = AuthorizeUrl::new(&base, &app, "payload.sig").to_uri();

        assert_eq!(uri.scheme(), "https");
        assert_eq!(uri.host_str(), Some("idp.example.com"));
        assert_eq!(uri.path(), "/authorize");

        let params = params(&uri);
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client id");
        assert_eq!(params["redirect_uri"], "https://auth.example.com/signin?x=1");
        assert_eq!(params["scope"], "openid profile");
        assert_eq!(params["audience"], "https://api.example.com");
        assert_eq!(params["state"], "payload.sig");
    }

    #[test]
    fn components_are_percent_encoded() {
        let base = Url::parse("https://idp.example.com/authorize").unwrap();
        let app = app(None);
        let uri = AuthorizeUrl::new(&base, &app, "a&b=c").to_uri();
        let query = uri.query().unwrap();

        assert!(!query.contains("audience="));
        assert!(query.contains("redirect_uri=https%3A%2F%2Fauth.example.com%2Fsignin%3Fx%3D1"));
        assert!(query.contains("state=a%26b%3Dc"));
        assert_eq!(params(&uri)["state"], "a&b=c");
    }

    #[test]
    fn keeps_existing_query() {
        let base = Url::parse("https://idp.example.com/authorize?tenant=acme").unwrap();
        let app = app(None);
        let uri = AuthorizeUrl::new(&base, &app, "s").to_uri();
        assert_eq!(params(&uri)["tenant"], "acme");
    }
}
