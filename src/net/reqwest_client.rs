use super::{HttpClient, HttpRequest, HttpResponse, NetError};
use crate::models::ProxySettings;
use crate::platform::PlatformProxyAdapter;
use crate::proxy::pac;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

/// `reqwest` client that routes each request the way the host is currently
/// configured, so a freshly applied proxy affects the very next request.
pub struct ReqwestClient {
    adapter: Arc<dyn PlatformProxyAdapter>,
    user_agent: String,
}

impl ReqwestClient {
    pub fn new(adapter: Arc<dyn PlatformProxyAdapter>) -> Self {
        Self {
            adapter,
            user_agent: format!("Proxy-Manager/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    async fn routing(&self) -> Option<ProxySettings> {
        let adapter = Arc::clone(&self.adapter);
        match tokio::task::spawn_blocking(move || adapter.current()).await {
            Ok(Ok(settings)) => settings,
            Ok(Err(err)) => {
                tracing::debug!(?err, "Could not read host proxy settings; going direct");
                None
            }
            Err(err) => {
                tracing::debug!(?err, "Proxy settings read panicked; going direct");
                None
            }
        }
    }

    fn build(&self, settings: Option<&ProxySettings>) -> Result<reqwest::Client, NetError> {
        let mut builder = reqwest::Client::builder().user_agent(&self.user_agent);

        builder = match settings {
            Some(ProxySettings::FixedServers { rules }) => {
                let no_proxy = reqwest::NoProxy::from_string(&rules.bypass_list.join(","));
                let proxy = reqwest::Proxy::all(rules.single_proxy.url())
                    .map_err(|e| NetError::Other(e.to_string()))?
                    .no_proxy(no_proxy);
                builder.proxy(proxy)
            }
            Some(ProxySettings::PacScript { pac_script }) => {
                match pac::parse_directive(&pac_script.data) {
                    Some(target) => {
                        let mut proxy =
                            reqwest::Proxy::all(format!("http://{}:{}", target.host, target.port))
                                .map_err(|e| NetError::Other(e.to_string()))?;
                        if let Some((user, pass)) = &target.credentials {
                            proxy = proxy.basic_auth(user, pass);
                        }
                        builder.proxy(proxy)
                    }
                    None => {
                        tracing::warn!("Host PAC script has no usable PROXY directive; going direct");
                        builder.no_proxy()
                    }
                }
            }
            _ => builder.no_proxy(),
        };

        builder.build().map_err(|e| NetError::Other(e.to_string()))
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NetError> {
        let settings = self.routing().await;
        let client = self.build(settings.as_ref())?;

        let mut req = client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(&'a self, request: HttpRequest) -> BoxFuture<'a, Result<HttpResponse, NetError>> {
        self.execute(request).boxed()
    }
}

fn classify(err: reqwest::Error) -> NetError {
    if err.is_timeout() {
        NetError::Timeout
    } else if err.is_connect() {
        NetError::Connect(err.to_string())
    } else {
        NetError::Other(err.to_string())
    }
}
