//! Protocol client for authentication and entitlement resolution

use crate::classify::{classify_failure, FailureKind};
use crate::device::device_guid;
use base64::Engine as _;
use ipaforge_config::StoreConfig;
use ipaforge_errors::{Error, StoreError};
use ipaforge_events::{AppEvent, EventEmitter, EventSender, StoreEvent};
use ipaforge_types::{AuthOutcome, Credentials, Entitlement, PackageRequest, Session, Sinf};
use std::io::Cursor;
use tracing::debug;

/// Storefront client for one acquisition flow.
///
/// Owns a dedicated cookie jar: the storefront requires cookie/session
/// affinity between the authenticate and resolve-entitlement calls, and
/// a jar per client keeps concurrent jobs isolated.
pub struct StoreClient {
    client: reqwest::Client,
    config: StoreConfig,
    guid: String,
    tx: Option<EventSender>,
}

impl StoreClient {
    /// Create a client with its own cookie store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: StoreConfig, tx: Option<EventSender>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| StoreError::RequestFailed {
                message: e.to_string(),
            })?;

        let guid = device_guid(config.device_seed.as_deref());

        Ok(Self {
            client,
            config,
            guid,
            tx,
        })
    }

    /// The device identifier sent with every call of this session.
    #[must_use]
    pub fn guid(&self) -> &str {
        &self.guid
    }

    /// Authenticate the account, folding an optional second-factor code
    /// into the same call.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures or an unparseable
    /// response. Rejected credentials and a pending second factor are
    /// not errors; they are [`AuthOutcome`] variants.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthOutcome, Error> {
        self.tx.emit(AppEvent::Store(StoreEvent::AuthenticationStarted {
            account: credentials.account.clone(),
        }));

        let mut form: Vec<(&str, &str)> = vec![
            ("appleId", credentials.account.as_str()),
            ("password", credentials.secret.as_str()),
            ("guid", self.guid.as_str()),
            ("attempt", "4"),
        ];
        if let Some(code) = &credentials.code {
            form.push(("verificationCode", code.as_str()));
        }

        let response = self
            .client
            .post(&self.config.auth_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed {
                message: e.to_string(),
            })?;

        let body = response.bytes().await.map_err(|e| StoreError::RequestFailed {
            message: e.to_string(),
        })?;
        let dict = parse_plist_dict(&body)?;

        // A person/session identifier means success regardless of any
        // message text riding along.
        let ds_person_id = dict.get("dsPersonId").and_then(value_to_string);
        let password_token = dict
            .get("passwordToken")
            .and_then(plist::Value::as_string)
            .map(str::to_owned);

        if let (Some(ds_person_id), Some(password_token)) = (ds_person_id, password_token) {
            self.tx.emit(AppEvent::Store(StoreEvent::Authenticated {
                account: credentials.account.clone(),
            }));
            return Ok(AuthOutcome::Authenticated(Session {
                ds_person_id,
                password_token,
            }));
        }

        let message = dict
            .get("customerMessage")
            .and_then(plist::Value::as_string)
            .unwrap_or("authentication rejected")
            .to_string();
        let fields = failure_fields(&dict);

        match classify_failure(&field_refs(&fields)) {
            FailureKind::SecondFactor => {
                self.tx
                    .emit(AppEvent::Store(StoreEvent::SecondFactorRequested {
                        account: credentials.account.clone(),
                    }));
                Ok(AuthOutcome::SecondFactorRequired)
            }
            _ => {
                debug!(account = %credentials.account, "authentication rejected");
                Ok(AuthOutcome::Failed { message })
            }
        }
    }

    /// Resolve a downloadable entitlement for a purchased package.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotOwned`] when the account has no purchase
    ///   record for the package.
    /// - [`StoreError::SecondFactorRequired`] when the session needs a
    ///   fresh second factor.
    /// - [`StoreError::RateLimited`] when the storefront throttles us.
    /// - [`StoreError::RequestFailed`] for everything else.
    pub async fn resolve_entitlement(
        &self,
        request: &PackageRequest,
        session: &Session,
    ) -> Result<Entitlement, Error> {
        let body = self.entitlement_request_body(request)?;
        let authorization = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD
                .encode(format!("{}:", session.password_token))
        );

        let response = self
            .client
            .post(&self.config.entitlement_url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("X-Dsid", &session.ds_person_id)
            .header("iCloud-DSID", &session.ds_person_id)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed {
                message: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let seconds = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(StoreError::RateLimited { seconds }.into());
        }

        let body = response.bytes().await.map_err(|e| StoreError::RequestFailed {
            message: e.to_string(),
        })?;
        let dict = parse_plist_dict(&body)?;

        if let Some(item) = dict
            .get("songList")
            .and_then(plist::Value::as_array)
            .and_then(|items| items.first())
            .and_then(plist::Value::as_dictionary)
        {
            let entitlement = parse_entitlement(item)?;
            self.tx.emit(AppEvent::Store(StoreEvent::EntitlementResolved {
                package_id: request.package_id.clone(),
            }));
            return Ok(entitlement);
        }

        let fields = failure_fields(&dict);
        match classify_failure(&field_refs(&fields)) {
            FailureKind::NotOwned => Err(StoreError::NotOwned.into()),
            FailureKind::SecondFactor => Err(StoreError::SecondFactorRequired.into()),
            FailureKind::Other => Err(StoreError::RequestFailed {
                message: fields
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "entitlement resolution failed".to_string()),
            }
            .into()),
        }
    }

    /// Property-list request document for the entitlement call.
    fn entitlement_request_body(&self, request: &PackageRequest) -> Result<Vec<u8>, Error> {
        let mut dict = plist::Dictionary::new();
        dict.insert(
            "creditDisplay".to_string(),
            plist::Value::String(String::new()),
        );
        dict.insert("guid".to_string(), plist::Value::String(self.guid.clone()));
        dict.insert(
            "salableAdamId".to_string(),
            plist::Value::String(request.package_id.clone()),
        );
        if let Some(version_id) = &request.version_id {
            dict.insert(
                "externalVersionId".to_string(),
                plist::Value::String(version_id.clone()),
            );
        }

        let mut buf = Vec::new();
        plist::Value::Dictionary(dict)
            .to_writer_xml(&mut buf)
            .map_err(|e| Error::internal(format!("failed to encode entitlement request: {e}")))?;
        Ok(buf)
    }
}

/// Parse a property-list response body into its top-level dictionary.
fn parse_plist_dict(bytes: &[u8]) -> Result<plist::Dictionary, StoreError> {
    plist::Value::from_reader(Cursor::new(bytes))
        .map_err(|e| StoreError::MalformedResponse(e.to_string()))?
        .into_dictionary()
        .ok_or_else(|| StoreError::MalformedResponse("response is not a dictionary".to_string()))
}

/// Extract one entitlement from a `songList` item.
fn parse_entitlement(item: &plist::Dictionary) -> Result<Entitlement, StoreError> {
    let download_url = item
        .get("URL")
        .and_then(plist::Value::as_string)
        .ok_or_else(|| StoreError::MalformedResponse("songList item lacks URL".to_string()))?
        .to_string();

    let sinfs = item
        .get("sinfs")
        .and_then(plist::Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(plist::Value::as_dictionary)
                .filter_map(|sinf| {
                    let id = sinf
                        .get("id")
                        .and_then(plist::Value::as_signed_integer)?;
                    let data = sinf.get("sinf").and_then(plist::Value::as_data)?;
                    Some(Sinf {
                        id,
                        data: data.to_vec(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let metadata = item
        .get("metadata")
        .and_then(plist::Value::as_dictionary)
        .cloned()
        .unwrap_or_default();

    Ok(Entitlement {
        download_url,
        sinfs,
        metadata,
    })
}

/// Message fields consulted for failure classification, in order.
fn failure_fields(dict: &plist::Dictionary) -> Vec<String> {
    ["customerMessage", "failureMessage", "failureType", "authType"]
        .iter()
        .filter_map(|key| dict.get(key).and_then(value_to_string))
        .collect()
}

fn field_refs(fields: &[String]) -> Vec<&str> {
    fields.iter().map(String::as_str).collect()
}

/// Render a plist value as a string; the storefront is inconsistent
/// about whether identifiers arrive as strings or integers.
fn value_to_string(value: &plist::Value) -> Option<String> {
    match value {
        plist::Value::String(s) => Some(s.clone()),
        plist::Value::Integer(i) => i
            .as_signed()
            .map(|v| v.to_string())
            .or_else(|| i.as_unsigned().map(|v| v.to_string())),
        _ => None,
    }
}
