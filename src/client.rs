use crate::error::FmcError;
use crate::model::{Domain, Page};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const TOKEN_PATH: &str = "api/fmc_platform/v1/auth/generatetoken";
const TOKEN_HEADER: &str = "X-auth-access-token";
const UA: &str = "fmctl/0.1";

/// Largest page the FMC hands out.
pub const PAGE_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
}

/// An authenticated session. The token is fixed for the lifetime of the
/// value; log in again for a fresh one.
#[derive(Debug, Clone)]
pub struct FmcClient {
    base_url: Url,
    http: Client,
    token: String,
    domains: Vec<Domain>,
}

impl FmcClient {
    pub fn login(
        server: &str,
        username: &str,
        password: &str,
        verify_tls: bool,
    ) -> Result<Self, FmcError> {
        let base_url = server_url(server)?;
        let http = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .user_agent(HeaderValue::from_static(UA))
            // no overall deadline, only the connect is bounded
            .timeout(None::<Duration>)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| FmcError::Auth {
                url: base_url.to_string(),
                reason: format!("building HTTP client: {e}"),
            })?;

        let url = join(&base_url, TOKEN_PATH)?;
        info!(%url, username, "requesting access token");
        let response = http
            .post(url.clone())
            .basic_auth(username, Some(password))
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .map_err(|e| FmcError::Auth {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FmcError::Auth {
                url: url.to_string(),
                reason: "invalid username or password (401)".into(),
            });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FmcError::Auth {
                url: url.to_string(),
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let headers = response.headers();
        let token = header_str(headers, TOKEN_HEADER).ok_or_else(|| FmcError::Auth {
            url: url.to_string(),
            reason: format!("response carried no {TOKEN_HEADER} header"),
        })?;
        let domains = parse_domains(headers).map_err(|reason| FmcError::Auth {
            url: url.to_string(),
            reason,
        })?;
        debug!(domains = domains.len(), "authenticated");

        Ok(Self {
            base_url,
            http,
            token: token.to_string(),
            domains,
        })
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Host name of the FMC, as used in reports and registration commands.
    pub fn server_name(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ResponseData, FmcError> {
        let url = join(&self.base_url, path)?;
        self.send(Method::GET, url, query, Option::<&Value>::None)
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FmcError> {
        let url = join(&self.base_url, path)?;
        let response = self.send(Method::GET, url.clone(), query, Option::<&Value>::None)?;
        decode(&url, &response)
    }

    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, FmcError> {
        let url = join(&self.base_url, path)?;
        let response = self.send(Method::POST, url.clone(), query, Some(body))?;
        decode(&url, &response)
    }

    pub fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, FmcError> {
        let url = join(&self.base_url, path)?;
        let response = self.send(Method::PUT, url.clone(), query, Some(body))?;
        decode(&url, &response)
    }

    /// Fetches every item of a collection, following `paging.next` links.
    pub fn get_items<T: DeserializeOwned>(
        &self,
        path: &str,
        expanded: bool,
    ) -> Result<Vec<T>, FmcError> {
        let mut query = vec![("offset", "0".to_string()), ("limit", PAGE_LIMIT.to_string())];
        if expanded {
            query.push(("expanded", "true".to_string()));
        }

        let mut url = join(&self.base_url, path)?;
        let mut items = Vec::new();
        let mut pages = 0usize;
        loop {
            let response = match self.send(Method::GET, url.clone(), &query, Option::<&Value>::None)
            {
                Ok(response) => response,
                // the FMC answers 404 for a collection with nothing in it
                Err(FmcError::Transport { status: 404, body, .. }) => {
                    debug!(path, %url, body = %body, "collection not found, treating as empty");
                    break;
                }
                Err(err) => return Err(err),
            };
            let page: Page<T> = decode(&url, &response)?;
            pages += 1;
            let fetched = page.items.len();
            items.extend(page.items);

            let next = page.paging.and_then(|p| p.next.into_iter().next());
            match next {
                Some(link) if fetched > 0 => {
                    url = Url::parse(&link).or_else(|_| join(&self.base_url, &link))?;
                    // next links already carry offset/limit/expanded
                    query.clear();
                }
                _ => break,
            }
        }
        debug!(path, pages, items = items.len(), "collected items");
        Ok(items)
    }

    fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<ResponseData, FmcError> {
        debug!(%method, %url, "sending request");
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(TOKEN_HEADER, &self.token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static(UA));

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|source| FmcError::Connection {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let text = response.text().map_err(|source| FmcError::Connection {
            url: url.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(FmcError::Transport {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let json = serde_json::from_str(&text).ok();
        Ok(ResponseData {
            status: status.as_u16(),
            body: text,
            json,
        })
    }
}

/// Path of a resource under a domain's configuration API.
pub fn config_path(domain: &str, resource: &str) -> String {
    format!(
        "api/fmc_config/v1/domain/{domain}/{}",
        resource.trim_start_matches('/')
    )
}

/// Accepts `fmc.example.com`, `https://fmc.example.com/` and the like.
pub fn server_url(raw: &str) -> Result<Url, FmcError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    Url::parse(&format!("{with_scheme}/")).map_err(|e| FmcError::parse(raw, e))
}

fn join(base: &Url, path: &str) -> Result<Url, FmcError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| FmcError::parse(path, e))
}

fn decode<T: DeserializeOwned>(url: &Url, response: &ResponseData) -> Result<T, FmcError> {
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        &response.body
    };
    serde_json::from_str(body).map_err(|source| FmcError::Decode {
        url: url.to_string(),
        source,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn parse_domains(headers: &HeaderMap) -> Result<Vec<Domain>, String> {
    if let Some(raw) = header_str(headers, "DOMAINS") {
        let domains: Vec<Domain> =
            serde_json::from_str(raw).map_err(|e| format!("parsing DOMAINS header: {e}"))?;
        if !domains.is_empty() {
            return Ok(domains);
        }
    }
    header_str(headers, "DOMAIN_UUID")
        .map(|uuid| {
            vec![Domain {
                name: "Global".into(),
                uuid: uuid.to_string(),
            }]
        })
        .ok_or_else(|| "response listed no domains".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NamedObject;
    use httpmock::prelude::*;
    use serde_json::json;

    fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/fmc_platform/v1/auth/generatetoken")
                .header("authorization", "Basic dTpw");
            then.status(204)
                .header("X-auth-access-token", "tok-1")
                .header(
                    "DOMAINS",
                    r#"[{"name":"Global","uuid":"d-global"},{"name":"Global/Lab","uuid":"d-lab"}]"#,
                );
        })
    }

    #[test]
    fn login_reads_token_and_domains() {
        let server = MockServer::start();
        let login = mock_login(&server);

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();

        login.assert();
        assert_eq!(client.domains().len(), 2);
        assert_eq!(client.domains()[1].name, "Global/Lab");
        assert_eq!(client.server_name(), "127.0.0.1");
    }

    #[test]
    fn bad_credentials_are_auth_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/fmc_platform/v1/auth/generatetoken");
            then.status(401);
        });

        let err = FmcClient::login(&server.base_url(), "u", "wrong", false).unwrap_err();
        assert!(matches!(err, FmcError::Auth { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn falls_back_to_domain_uuid_header() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/fmc_platform/v1/auth/generatetoken");
            then.status(204)
                .header("X-auth-access-token", "tok")
                .header("DOMAIN_UUID", "d-only");
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        assert_eq!(client.domains()[0].uuid, "d-only");
    }

    #[test]
    fn get_items_follows_next_links_and_sends_token() {
        let server = MockServer::start();
        mock_login(&server);
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/api/fmc_config/v1/domain/d-global/object/hosts")
                .query_param("offset", "0")
                .query_param("expanded", "true")
                .header("X-auth-access-token", "tok-1");
            then.status(200).json_body(json!({
                "items": [{"id": "h1", "name": "a", "type": "Host", "value": "10.0.0.1"}],
                "paging": {
                    "count": 2,
                    "next": [server.url("/api/fmc_config/v1/domain/d-global/object/hosts?offset=1&limit=1&expanded=true")]
                }
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/api/fmc_config/v1/domain/d-global/object/hosts")
                .query_param("offset", "1");
            then.status(200).json_body(json!({
                "items": [{"id": "h2", "name": "b", "type": "Host", "value": "10.0.0.2"}],
                "paging": {"count": 2}
            }));
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        let hosts: Vec<NamedObject> = client
            .get_items(&config_path("d-global", "object/hosts"), true)
            .unwrap();

        first.assert();
        second.assert();
        let ids: Vec<_> = hosts.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["h1", "h2"]);
    }

    #[test]
    fn empty_collections_have_no_items_key() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/fmc_config/v1/domain/d-global/object/networks");
            then.status(200)
                .json_body(json!({"links": {}, "paging": {"count": 0, "offset": 0}}));
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        let nets: Vec<NamedObject> = client
            .get_items(&config_path("d-global", "object/networks"), true)
            .unwrap();
        assert!(nets.is_empty());
    }

    #[test]
    fn missing_collection_lists_as_empty() {
        let server = MockServer::start();
        mock_login(&server);
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path("/api/fmc_config/v1/domain/d-global/deviceclusters/ftddevicecluster");
            then.status(404)
                .json_body(json!({"error": {"messages": [{"description": "No resource found"}]}}));
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        let clusters: Vec<Value> = client
            .get_items(&config_path("d-global", "deviceclusters/ftddevicecluster"), true)
            .unwrap();

        listing.assert();
        assert!(clusters.is_empty());
    }

    #[test]
    fn missing_single_item_is_still_an_error() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/fmc_config/v1/domain/d-global/object/networkgroups/gone");
            then.status(404)
                .json_body(json!({"error": {"messages": [{"description": "No resource found"}]}}));
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        let err = client
            .get_json::<Value>(&config_path("d-global", "object/networkgroups/gone"), &[])
            .unwrap_err();
        assert!(matches!(err, FmcError::Transport { status: 404, .. }));
    }

    #[test]
    fn slow_responses_are_not_cut_off() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/fmc_config/v1/domain/d-global/object/networks");
            then.status(200)
                .delay(Duration::from_secs(11))
                .json_body(json!({"items": [
                    {"id": "n1", "name": "Net-10-0-0-0-8", "type": "Network", "value": "10.0.0.0/8"}
                ]}));
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        let nets: Vec<NamedObject> = client
            .get_items(&config_path("d-global", "object/networks"), true)
            .unwrap();
        assert_eq!(nets.len(), 1);
    }

    #[test]
    fn non_success_status_surfaces_body() {
        let server = MockServer::start();
        mock_login(&server);
        server.mock(|when, then| {
            when.method(PUT)
                .path("/api/fmc_config/v1/domain/d-global/object/networkgroups/g1");
            then.status(422)
                .json_body(json!({"error": {"messages": [{"description": "bad literal"}]}}));
        });

        let client = FmcClient::login(&server.base_url(), "u", "p", false).unwrap();
        let err = client
            .put_json::<_, Value>(
                &config_path("d-global", "object/networkgroups/g1"),
                &[],
                &json!({"name": "g"}),
            )
            .unwrap_err();

        match &err {
            FmcError::Transport { status, body, .. } => {
                assert_eq!(*status, 422);
                assert!(body.contains("bad literal"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn server_url_adds_scheme_and_trailing_slash() {
        assert_eq!(
            server_url("fmc.example.com").unwrap().as_str(),
            "https://fmc.example.com/"
        );
        assert_eq!(
            server_url("https://fmc.example.com/").unwrap().as_str(),
            "https://fmc.example.com/"
        );
    }
}
