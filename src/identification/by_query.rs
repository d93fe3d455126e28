use super::{validate_name, IdentificationMethod, DEFAULT_SESSION_ID_NAME};
use crate::{
    CryptographyConfiguration, DefaultSessionIdFactory, Error, Result, SessionId, TransportCodec,
};
use http::header::LOCATION;
use http::{request, response, HeaderValue, StatusCode, Uri};
use std::sync::Arc;
use url::form_urlencoded;

/// Identifies sessions by a query parameter.
///
/// When a new session id has to be communicated, the response is replaced by a redirect to the
/// requested url with the session id parameter added. The caller has to save the session before
/// the response is committed.
#[derive(Debug, Clone)]
pub struct QueryParameterIdentificationMethod {
    codec: TransportCodec,
    parameter_name: String,
}

impl QueryParameterIdentificationMethod {
    /// Create a method that protects session ids with `crypto`, using the parameter `_nsid`.
    pub fn new(crypto: CryptographyConfiguration) -> Self {
        Self::with_codec(TransportCodec::new(crypto, Arc::new(DefaultSessionIdFactory)))
    }

    /// Create a method that uses the given codec, using the parameter `_nsid`.
    pub fn with_codec(codec: TransportCodec) -> Self {
        Self {
            codec,
            parameter_name: DEFAULT_SESSION_ID_NAME.to_owned(),
        }
    }

    /// Use the query parameter `parameter_name`. Fails if the name is blank.
    pub fn with_parameter_name(mut self, parameter_name: impl Into<String>) -> Result<Self> {
        self.parameter_name = validate_name(parameter_name.into())?;
        Ok(self)
    }

    /// The name of the query parameter.
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    fn query_parameter(&self, uri: &Uri) -> Option<String> {
        form_urlencoded::parse(uri.query()?.as_bytes())
            .filter(|(name, _)| *name == self.parameter_name)
            .last()
            .map(|(_, value)| value.into_owned())
    }
}

impl IdentificationMethod for QueryParameterIdentificationMethod {
    fn current_session_id(&self, request: &request::Parts) -> SessionId {
        self.codec.open(self.query_parameter(&request.uri).as_deref())
    }

    fn save_session_id(
        &self,
        id: &SessionId,
        request: &request::Parts,
        response: &mut response::Parts,
    ) -> Result {
        if id.is_empty() {
            return Err(Error::EmptySessionId);
        }
        if !id.is_new() {
            return Ok(());
        }

        let data = self.codec.seal(id)?;
        redirect_to_session_aware_url(
            &request.uri,
            response,
            &self.parameter_name,
            &self.codec.encode(&data),
        )
    }
}

/// Turn `response` into a redirect to `uri`, with the query parameter `name` set to `value`.
pub(crate) fn redirect_to_session_aware_url(
    uri: &Uri,
    response: &mut response::Parts,
    name: &str,
    value: &str,
) -> Result {
    let location = HeaderValue::from_str(&session_aware_url(uri, name, value))?;
    response.status = StatusCode::FOUND;
    response.headers.insert(LOCATION, location);
    Ok(())
}

/// Rebuild `uri` with the query parameter `name` set to `value`.
///
/// The first parameter called `name` gets the new value and any further ones are dropped; if there
/// is none, the parameter is appended. All other parameters keep their relative order.
/// Every name and value is form-urlencoded.
fn session_aware_url(uri: &Uri, name: &str, value: &str) -> String {
    let mut parameters: Vec<(String, String)> = uri
        .query()
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut replaced = false;
    parameters.retain_mut(|(parameter_name, parameter_value)| {
        if parameter_name.as_str() != name {
            true
        } else if replaced {
            false
        } else {
            *parameter_value = value.to_owned();
            replaced = true;
            true
        }
    });
    if !replaced {
        parameters.push((name.to_owned(), value.to_owned()));
    }

    let query = parameters
        .iter()
        .map(|(name, value)| format!("{}={}", form_encode(name), form_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    let mut url = String::new();
    if let (Some(scheme), Some(authority)) = (uri.scheme_str(), uri.authority()) {
        url.push_str(scheme);
        url.push_str("://");
        url.push_str(authority.as_str());
    }
    url.push_str(uri.path());
    url.push('?');
    url.push_str(&query);
    url
}

fn form_encode(text: &str) -> String {
    form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DebugSessionIdFactory;
    use http::{Request, Response};

    fn method() -> QueryParameterIdentificationMethod {
        QueryParameterIdentificationMethod::new(CryptographyConfiguration::from_keys(
            [7; 32], [8; 32],
        ))
    }

    fn request(uri: &str) -> request::Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    fn empty_response() -> response::Parts {
        Response::new(()).into_parts().0
    }

    fn location(response: &response::Parts) -> String {
        response
            .headers
            .get(LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[test]
    fn test_appends_parameter() {
        let url = session_aware_url(&"/x?a=1".parse().unwrap(), "_nsid", "v");
        assert_eq!(url, "/x?a=1&_nsid=v");
    }

    #[test]
    fn test_adds_query_when_missing() {
        let url = session_aware_url(&"/x".parse().unwrap(), "_nsid", "v");
        assert_eq!(url, "/x?_nsid=v");
    }

    #[test]
    fn test_replaces_existing_parameter_in_place() {
        let url = session_aware_url(
            &"/x?a=1&_nsid=OLD&b=2&_nsid=OLDER&c=3".parse().unwrap(),
            "_nsid",
            "NEW",
        );
        assert_eq!(url, "/x?a=1&_nsid=NEW&b=2&c=3");
    }

    #[test]
    fn test_parameter_names_are_case_sensitive() {
        let url = session_aware_url(&"/x?_NSID=other".parse().unwrap(), "_nsid", "v");
        assert_eq!(url, "/x?_NSID=other&_nsid=v");
    }

    #[test]
    fn test_values_are_encoded() {
        let url = session_aware_url(
            &"/x?q=hello%20world&r=a%2Bb".parse().unwrap(),
            "_nsid",
            "ab+/=",
        );
        assert_eq!(url, "/x?q=hello+world&r=a%2Bb&_nsid=ab%2B%2F%3D");
    }

    #[test]
    fn test_keeps_scheme_and_authority() {
        let url = session_aware_url(
            &"https://example.com:8080/x/y?a=1".parse().unwrap(),
            "_nsid",
            "v",
        );
        assert_eq!(url, "https://example.com:8080/x/y?a=1&_nsid=v");
    }

    #[test]
    fn test_redirect_overwrites_status_and_location() {
        let mut response = empty_response();
        response
            .headers
            .insert(LOCATION, HeaderValue::from_static("/elsewhere"));
        redirect_to_session_aware_url(&"/x?a=1".parse().unwrap(), &mut response, "_nsid", "v")
            .unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.headers.get_all(LOCATION).iter().count(), 1);
        assert_eq!(location(&response), "/x?a=1&_nsid=v");
    }

    #[test]
    fn test_round_trip_through_redirect() {
        let method = method();
        let first = request("/x?a=1");
        let id = method.current_session_id(&first);
        assert!(id.is_new());

        let mut response = empty_response();
        method.save_session_id(&id, &first, &mut response).unwrap();
        assert_eq!(response.status, StatusCode::FOUND);
        let location = location(&response);
        assert!(location.starts_with("/x?a=1&_nsid="));

        let recovered = method.current_session_id(&request(&location));
        assert_eq!(recovered, id);
        assert!(!recovered.is_new());
    }

    #[test]
    fn test_garbage_parameter_yields_new_id() {
        let method = QueryParameterIdentificationMethod::with_codec(TransportCodec::new(
            CryptographyConfiguration::from_keys([7; 32], [8; 32]),
            Arc::new(DebugSessionIdFactory::default()),
        ));
        for uri in ["/x", "/x?_nsid=", "/x?_nsid=abc", "/x?other=1"] {
            assert!(method.current_session_id(&request(uri)).is_new());
        }
    }

    #[test]
    fn test_existing_id_leaves_response_untouched() {
        let method = method();
        let id = SessionId::new(uuid::Uuid::from_u128(3), false);
        let mut response = empty_response();
        method
            .save_session_id(&id, &request("/x?a=1"), &mut response)
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let mut response = empty_response();
        assert!(matches!(
            method().save_session_id(&SessionId::empty(), &request("/x"), &mut response),
            Err(Error::EmptySessionId)
        ));
    }

    #[test]
    fn test_blank_parameter_name_is_rejected() {
        assert!(matches!(
            method().with_parameter_name(""),
            Err(Error::InvalidName)
        ));
    }
}
