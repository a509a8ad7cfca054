use crate::predictor::features::{FeatureSchema, FeatureVector};
use crate::predictor::model::{
    Prediction, PredictionOutput, Predictor, PredictorError, ensure_schema,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::warn;

const API_VERSION: &str = "1.0";

/// Model served by an external inference endpoint over HTTP/JSON.
pub struct RemoteModel {
    endpoint: String,
    timeout: Duration,
    model_id: String,
    schema: FeatureSchema,
    params: serde_json::Value,
}

impl RemoteModel {
    pub fn new(
        endpoint: String,
        timeout: Duration,
        model_id: String,
        schema: FeatureSchema,
        params: serde_json::Value,
    ) -> Self {
        Self {
            endpoint,
            timeout,
            model_id,
            schema,
            params,
        }
    }

    fn call_remote(&self, features: &FeatureVector) -> Result<PredictResponse, RemoteError> {
        let request = PredictRequest::new(&self.model_id, self.schema, &self.params, features)?;
        let payload = serde_json::to_string(&request).map_err(RemoteError::Json)?;
        let response_body = send_http_json(&self.endpoint, &payload, self.timeout)?;
        let response: PredictResponse =
            serde_json::from_str(&response_body).map_err(RemoteError::Json)?;
        Ok(response)
    }
}

impl fmt::Debug for RemoteModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteModel")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("model_id", &self.model_id)
            .field("schema", &self.schema)
            .finish()
    }
}

impl Predictor for RemoteModel {
    fn schema(&self) -> FeatureSchema {
        self.schema
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictorError> {
        ensure_schema(self.schema, features)?;
        let response = self.call_remote(features).map_err(|err| {
            warn!(error = %err, endpoint = %self.endpoint, "Remote model call failed");
            PredictorError::Remote(err.to_string())
        })?;
        response.into_prediction(self.schema)
    }

    fn name(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    api_version: &'static str,
    model_id: &'a str,
    schema: FeatureSchema,
    params: &'a serde_json::Value,
    features: BTreeMap<&'static str, f64>,
}

impl<'a> PredictRequest<'a> {
    fn new(
        model_id: &'a str,
        schema: FeatureSchema,
        params: &'a serde_json::Value,
        features: &FeatureVector,
    ) -> Result<Self, RemoteError> {
        let values = features
            .named_values()
            .map_err(|err| RemoteError::Features(err.to_string()))?;
        Ok(Self {
            api_version: API_VERSION,
            model_id,
            schema,
            params,
            features: values.into_iter().collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    probabilities: BTreeMap<String, f64>,
}

impl PredictResponse {
    fn into_prediction(self, schema: FeatureSchema) -> Result<Prediction, PredictorError> {
        let output = match (schema, self.value, self.label) {
            (FeatureSchema::AirQuality, Some(value), _) if value.is_finite() => {
                PredictionOutput::Value(value)
            }
            (FeatureSchema::Activity, _, Some(label)) if !label.is_empty() => {
                PredictionOutput::Label(label)
            }
            _ => {
                return Err(PredictorError::InvalidOutput(format!(
                    "response has no usable {schema} output"
                )));
            }
        };
        Ok(Prediction {
            output,
            confidence: self.confidence,
            probabilities: self.probabilities,
        })
    }
}

#[derive(Debug)]
enum RemoteError {
    InvalidUrl(String),
    Dns(String),
    Connect(std::io::Error),
    Io(std::io::Error),
    Http(u16, String),
    Json(serde_json::Error),
    Features(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
            RemoteError::Dns(msg) => write!(f, "dns error: {msg}"),
            RemoteError::Connect(err) => write!(f, "connect error: {err}"),
            RemoteError::Io(err) => write!(f, "io error: {err}"),
            RemoteError::Http(code, body) => {
                write!(f, "http status {code} ({})", body.trim())
            }
            RemoteError::Json(err) => write!(f, "json error: {err}"),
            RemoteError::Features(msg) => write!(f, "feature error: {msg}"),
        }
    }
}

#[derive(Debug, PartialEq)]
struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, RemoteError> {
    let trimmed = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| RemoteError::InvalidUrl("only http:// supported".to_string()))?;

    let (host_port, path) = match trimmed.split_once('/') {
        Some((host_port, path)) if !path.is_empty() => (host_port, format!("/{path}")),
        Some((host_port, _)) => (host_port, "/".to_string()),
        None => (trimmed, "/".to_string()),
    };
    if host_port.is_empty() {
        return Err(RemoteError::InvalidUrl("missing host".to_string()));
    }

    let (host, port) = match host_port.split_once(':') {
        Some((host, port_str)) if !port_str.is_empty() => (
            host,
            port_str
                .parse::<u16>()
                .map_err(|_| RemoteError::InvalidUrl("invalid port".to_string()))?,
        ),
        Some((host, _)) => (host, 80),
        None => (host_port, 80),
    };
    if host.is_empty() {
        return Err(RemoteError::InvalidUrl("missing host".to_string()));
    }

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path,
    })
}

fn send_http_json(endpoint: &str, body: &str, timeout: Duration) -> Result<String, RemoteError> {
    let parsed = parse_http_url(endpoint)?;
    let addr = (parsed.host.as_str(), parsed.port)
        .to_socket_addrs()
        .map_err(|err| RemoteError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| RemoteError::Dns("no addresses resolved".to_string()))?;

    let mut stream = TcpStream::connect_timeout(&addr, timeout).map_err(RemoteError::Connect)?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(RemoteError::Io)?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(RemoteError::Io)?;

    let request = format!(
        concat!(
            "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\n",
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}"
        ),
        parsed.path,
        parsed.host,
        body.len(),
        body
    );

    stream
        .write_all(request.as_bytes())
        .map_err(RemoteError::Io)?;

    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .map_err(RemoteError::Io)?;

    let (headers, body) = response
        .split_once("\r\n\r\n")
        .ok_or_else(|| RemoteError::Http(0, "invalid http response".to_string()))?;

    let status_code = headers
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| RemoteError::Http(0, "missing status code".to_string()))?
        .parse::<u16>()
        .map_err(|_| RemoteError::Http(0, "invalid status code".to_string()))?;

    if status_code >= 400 {
        return Err(RemoteError::Http(status_code, body.to_string()));
    }

    Ok(body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::features::fixtures::air_quality;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn parses_host_port_and_path() -> Result<(), Box<dyn std::error::Error>> {
        let parsed = parse_http_url("http://models.local:9000/v1/predict")
            .map_err(|err| err.to_string())?;

        assert_eq!(
            parsed,
            ParsedUrl {
                host: "models.local".to_string(),
                port: 9000,
                path: "/v1/predict".to_string(),
            }
        );
        Ok(())
    }

    #[test]
    fn defaults_port_and_path() -> Result<(), Box<dyn std::error::Error>> {
        let parsed = parse_http_url("http://models.local").map_err(|err| err.to_string())?;

        assert_eq!(parsed.port, 80);
        assert_eq!(parsed.path, "/");
        Ok(())
    }

    #[test]
    fn rejects_https_and_bad_ports() {
        assert!(matches!(
            parse_http_url("https://models.local"),
            Err(RemoteError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_http_url("http://models.local:notaport/"),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    fn serve_once(response: &'static str) -> Result<String, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Ok(format!("http://{addr}/predict"))
    }

    #[test]
    fn remote_value_becomes_prediction() -> Result<(), Box<dyn std::error::Error>> {
        let endpoint = serve_once(concat!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n",
            "{\"value\": 123.5, \"confidence\": 0.8}"
        ))?;
        let model = RemoteModel::new(
            endpoint,
            Duration::from_secs(2),
            "aqi-gbr".to_string(),
            FeatureSchema::AirQuality,
            serde_json::Value::Null,
        );

        let prediction = model.predict(&FeatureVector::AirQuality(air_quality()))?;

        assert_eq!(prediction.output, PredictionOutput::Value(123.5));
        assert_eq!(prediction.confidence, Some(0.8));
        Ok(())
    }

    #[test]
    fn http_error_maps_to_remote_error() -> Result<(), Box<dyn std::error::Error>> {
        let endpoint = serve_once("HTTP/1.1 500 Internal Server Error\r\n\r\nboom")?;
        let model = RemoteModel::new(
            endpoint,
            Duration::from_secs(2),
            "aqi-gbr".to_string(),
            FeatureSchema::AirQuality,
            serde_json::Value::Null,
        );

        let result = model.predict(&FeatureVector::AirQuality(air_quality()));

        assert!(matches!(result, Err(PredictorError::Remote(_))));
        Ok(())
    }

    #[test]
    fn label_response_for_air_quality_is_invalid() {
        let response = PredictResponse {
            value: None,
            label: Some("Running".to_string()),
            confidence: None,
            probabilities: BTreeMap::new(),
        };

        assert!(matches!(
            response.into_prediction(FeatureSchema::AirQuality),
            Err(PredictorError::InvalidOutput(_))
        ));
    }
}
