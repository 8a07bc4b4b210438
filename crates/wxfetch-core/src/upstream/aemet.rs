//! AEMET OpenData client (libcurl).
//!
//! The upstream serves window data in two steps: the metadata endpoint
//! returns a JSON envelope whose `datos` field is a temporary URL, and the
//! actual measurement array is fetched from that URL with a second GET.

use chrono::{DateTime, Utc};
use std::str;
use std::time::Duration;

use super::classify::{classify_curl_error, classify_http_status, parse_retry_after};
use super::error::UpstreamError;
use super::{Payload, UpstreamClient};
use crate::config::UpstreamConfig;
use crate::window::TimeWindow;

/// JSON envelope returned by the metadata endpoint.
#[derive(Debug, serde::Deserialize)]
struct MetaEnvelope {
    estado: Option<u32>,
    datos: Option<String>,
    descripcion: Option<String>,
}

struct HttpResponse {
    status: u32,
    retry_after: Option<Duration>,
    body: Vec<u8>,
}

/// Blocking client for the AEMET OpenData API.
pub struct AemetClient {
    base_url: String,
    api_key: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl AemetClient {
    pub fn new(cfg: &UpstreamConfig, api_key: String) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        }
    }

    /// Metadata endpoint for one station window. The upstream expects
    /// timestamps in its own `%Y-%m-%dT%H:%M:%SUTC` form.
    fn meta_url(&self, station_id: &str, window: &TimeWindow) -> String {
        format!(
            "{}/antartida/datos/fechaini/{}/fechafin/{}/estacion/{}",
            self.base_url,
            format_upstream_time(window.start),
            format_upstream_time(window.end),
            station_id
        )
    }

    fn with_api_key(&self, raw: &str) -> Result<String, UpstreamError> {
        let mut url = url::Url::parse(raw)
            .map_err(|e| UpstreamError::Network(format!("invalid upstream url {raw}: {e}")))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url.to_string())
    }

    /// One GET, following redirects, collecting the body and any
    /// `Retry-After` header.
    fn http_get(&self, url: &str) -> Result<HttpResponse, UpstreamError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(|e| classify_curl_error(&e))?;
        easy.follow_location(true)
            .map_err(|e| classify_curl_error(&e))?;
        easy.connect_timeout(self.connect_timeout)
            .map_err(|e| classify_curl_error(&e))?;
        easy.timeout(self.request_timeout)
            .map_err(|e| classify_curl_error(&e))?;

        let mut body: Vec<u8> = Vec::new();
        let mut retry_after: Option<Duration> = None;
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|line| {
                    if let Ok(s) = str::from_utf8(line) {
                        if let Some((name, value)) = s.split_once(':') {
                            if name.trim().eq_ignore_ascii_case("retry-after") {
                                retry_after = parse_retry_after(value);
                            }
                        }
                    }
                    true
                })
                .map_err(|e| classify_curl_error(&e))?;
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(|e| classify_curl_error(&e))?;
            transfer.perform().map_err(|e| classify_curl_error(&e))?;
        }

        let status = easy
            .response_code()
            .map_err(|e| classify_curl_error(&e))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

impl UpstreamClient for AemetClient {
    fn fetch(&self, station_id: &str, window: &TimeWindow) -> Result<Payload, UpstreamError> {
        let meta_url = self.with_api_key(&self.meta_url(station_id, window))?;
        tracing::debug!(station = station_id, window = %window, "requesting upstream metadata");

        let meta = self.http_get(&meta_url)?;
        if !(200..300).contains(&meta.status) {
            return Err(classify_http_status(meta.status, meta.retry_after));
        }

        let envelope: MetaEnvelope = serde_json::from_slice(&meta.body)
            .map_err(|e| UpstreamError::Decode(format!("metadata envelope: {e}")))?;
        // Some upstream failures hide behind HTTP 200 with an error `estado`.
        if let Some(estado) = envelope.estado {
            if !(200..300).contains(&estado) {
                return Err(classify_http_status(estado, None));
            }
        }
        let datos = envelope.datos.ok_or_else(|| {
            UpstreamError::Decode(match envelope.descripcion {
                Some(d) => format!("metadata envelope has no data url: {d}"),
                None => "metadata envelope has no data url".to_string(),
            })
        })?;

        tracing::debug!(station = station_id, "downloading window data from temporary url");
        let data = self.http_get(&datos)?;
        if !(200..300).contains(&data.status) {
            return Err(classify_http_status(data.status, data.retry_after));
        }

        Ok(Payload {
            body: data.body,
            status: data.status,
        })
    }
}

fn format_upstream_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SUTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AemetClient {
        AemetClient::new(&UpstreamConfig::default(), "secret-key".to_string())
    }

    fn window() -> TimeWindow {
        let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let end = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        TimeWindow { start, end }
    }

    #[test]
    fn meta_url_uses_upstream_time_format() {
        let url = client().meta_url("89064", &window());
        assert_eq!(
            url,
            "https://opendata.aemet.es/opendata/api/antartida/datos\
             /fechaini/2024-01-01T00:00:00UTC/fechafin/2024-02-01T00:00:00UTC/estacion/89064"
        );
    }

    #[test]
    fn api_key_is_appended_as_query_parameter() {
        let c = client();
        let url = c.with_api_key(&c.meta_url("89064", &window())).unwrap();
        assert!(url.ends_with("?api_key=secret-key"));
    }

    #[test]
    fn envelope_parses_success_shape() {
        let body = br#"{"descripcion":"exito","estado":200,"datos":"https://example.org/data/abc","metadatos":"https://example.org/meta/abc"}"#;
        let envelope: MetaEnvelope = serde_json::from_slice(body).unwrap();
        assert_eq!(envelope.estado, Some(200));
        assert_eq!(envelope.datos.as_deref(), Some("https://example.org/data/abc"));
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let envelope: MetaEnvelope = serde_json::from_slice(br#"{"estado":404}"#).unwrap();
        assert_eq!(envelope.estado, Some(404));
        assert!(envelope.datos.is_none());
        assert!(envelope.descripcion.is_none());
    }
}
