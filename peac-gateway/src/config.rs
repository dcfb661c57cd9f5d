use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use ed25519_dalek::{SigningKey, VerifyingKey};
use peac_safe_fetch::RedactionLevel;
use serde::{Deserialize, Serialize};
use tap::prelude::*;
use tokio::sync::Notify;

const COMPANY_DIR: &str = "peac";
const PROGRAM_DIR: &str = "gateway";

/// Raw Ed25519 key material, base64- or hex-encoded, loaded from a file or
/// inlined in the config. Mirrors the teacher's `ConfData` pattern, minus
/// the PKCS8/X509 machinery this profile has no use for (keys here are
/// always exactly 32 raw bytes).
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEncoding {
    #[default]
    Base64,
    Hex,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct KeyData {
    pub value: String,
    #[serde(default)]
    pub encoding: KeyEncoding,
}

impl KeyData {
    fn decode(&self) -> anyhow::Result<Vec<u8>> {
        match self.encoding {
            KeyEncoding::Base64 => {
                use base64::Engine as _;
                base64::engine::general_purpose::STANDARD
                    .decode(&self.value)
                    .context("invalid base64 key data")
            }
            KeyEncoding::Hex => hex::decode(&self.value).context("invalid hex key data"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct TrustedKeyConf {
    pub kid: String,
    #[serde(flatten)]
    pub data: KeyData,
}

/// Safe-fetch policy knobs, serialized as the gateway config's `safeFetch`
/// section. Each field maps onto a `peac_net_guard`/`peac_dns_pin`/
/// `peac_safe_fetch` policy field by the same name.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeFetchConfFile {
    #[serde(default)]
    pub allow_mixed_public_and_private_dns: bool,
    #[serde(default)]
    pub allow_cgnat: bool,
    #[serde(default)]
    pub allow_dangerous_ports: bool,
    #[serde(default)]
    pub allow_ports: Vec<u16>,
    #[serde(default)]
    pub redaction_level: RedactionLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redaction_key: Option<KeyData>,
}

impl Default for SafeFetchConfFile {
    fn default() -> Self {
        Self {
            allow_mixed_public_and_private_dns: false,
            allow_cgnat: false,
            allow_dangerous_ports: false,
            allow_ports: Vec::new(),
            redaction_level: RedactionLevel::Public,
            redaction_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafeFetchConf {
    pub allow_mixed_public_and_private_dns: bool,
    pub allow_cgnat: bool,
    pub allow_dangerous_ports: bool,
    pub allow_ports: Vec<u16>,
    pub redaction_level: RedactionLevel,
    pub redaction_key: Option<(Vec<u8>, String)>,
}

/// Unsafe debug options, only ever meant for development.
#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConf {
    /// Dump issued/verified JWS compact strings using a `debug` statement.
    #[serde(default)]
    pub dump_receipts: bool,
    /// Skip signature verification entirely (any `kid`/signature accepted).
    #[serde(default)]
    pub disable_signature_validation: bool,
}

/// Validated, immutable snapshot of the gateway configuration.
#[derive(Clone)]
pub struct Conf {
    pub id: uuid::Uuid,
    pub hostname: String,
    pub bind_address: SocketAddr,
    pub log_file: Utf8PathBuf,
    pub issuer: String,
    pub expected_audience: Option<String>,
    pub issuance_api_key: Option<String>,
    pub provisioner_kid: String,
    pub provisioner_signing_key: Option<SigningKey>,
    pub verification_keys: HashMap<String, VerifyingKey>,
    pub safe_fetch: SafeFetchConf,
    pub debug: DebugConf,
}

impl std::fmt::Debug for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conf")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("bind_address", &self.bind_address)
            .field("issuer", &self.issuer)
            .field("provisioner_kid", &self.provisioner_kid)
            .field("verification_keys", &self.verification_keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Conf {
    pub fn from_conf_file(conf_file: &dto::ConfFile) -> anyhow::Result<Self> {
        let hostname = conf_file.hostname.clone().unwrap_or_else(|| "localhost".to_owned());

        let bind_address = conf_file
            .bind_address
            .clone()
            .unwrap_or_else(|| "0.0.0.0:8443".to_owned())
            .parse()
            .context("invalid bind address")?;

        let data_dir = get_data_dir();

        let log_file = conf_file
            .log_file
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from("gateway"))
            .pipe_ref(|path| normalize_data_path(path, &data_dir));

        let provisioner_signing_key = read_signing_key(
            conf_file.provisioner_private_key_file.as_deref(),
            conf_file.provisioner_private_key_data.as_ref(),
        )
        .context("provisioner private key")?;

        let mut verification_keys = HashMap::new();

        if let Some(signing_key) = &provisioner_signing_key {
            verification_keys.insert(conf_file.provisioner_kid.clone(), signing_key.verifying_key());
        } else {
            let provisioner_public_key = read_verifying_key(
                conf_file.provisioner_public_key_file.as_deref(),
                conf_file.provisioner_public_key_data.as_ref(),
            )
            .context("provisioner public key")?
            .context("provisioner key material is missing (need a private key to issue, or at least a public key to verify)")?;
            verification_keys.insert(conf_file.provisioner_kid.clone(), provisioner_public_key);
        }

        for trusted in &conf_file.trusted_keys {
            let bytes = trusted.data.decode().context("trusted key data")?;
            let key = peac_jws::verifying_key_from_bytes(&bytes).context("trusted key is not a valid Ed25519 public key")?;
            verification_keys.insert(trusted.kid.clone(), key);
        }

        let safe_fetch_file = conf_file.safe_fetch.clone().unwrap_or_default();
        let redaction_key = safe_fetch_file
            .redaction_key
            .as_ref()
            .map(|data| -> anyhow::Result<(Vec<u8>, String)> {
                let bytes = data.decode().context("redaction key data")?;
                Ok((bytes, conf_file.provisioner_kid.clone()))
            })
            .transpose()?;

        if matches!(safe_fetch_file.redaction_level, RedactionLevel::Tenant) && redaction_key.is_none() {
            anyhow::bail!("safeFetch.redactionLevel is \"tenant\" but no redactionKey was provided");
        }

        Ok(Conf {
            id: conf_file.id.unwrap_or_else(uuid::Uuid::now_v7),
            hostname,
            bind_address,
            log_file,
            issuer: conf_file.issuer.clone(),
            expected_audience: conf_file.expected_audience.clone(),
            issuance_api_key: conf_file.issuance_api_key.clone(),
            provisioner_kid: conf_file.provisioner_kid.clone(),
            provisioner_signing_key,
            verification_keys,
            safe_fetch: SafeFetchConf {
                allow_mixed_public_and_private_dns: safe_fetch_file.allow_mixed_public_and_private_dns,
                allow_cgnat: safe_fetch_file.allow_cgnat,
                allow_dangerous_ports: safe_fetch_file.allow_dangerous_ports,
                allow_ports: safe_fetch_file.allow_ports,
                redaction_level: safe_fetch_file.redaction_level,
                redaction_key,
            },
            debug: conf_file.debug.clone().unwrap_or_default(),
        })
    }
}

/// Configuration handle: source of truth for current configuration state,
/// hot-reloadable via [`ConfHandle::save_new_conf_file`].
#[derive(Clone)]
pub struct ConfHandle {
    inner: Arc<ConfHandleInner>,
}

struct ConfHandleInner {
    conf: parking_lot::RwLock<Arc<Conf>>,
    conf_file: parking_lot::RwLock<Arc<dto::ConfFile>>,
    changed: Notify,
}

impl ConfHandle {
    /// Initializes configuration for this instance.
    ///
    /// It's best to call this only once to avoid inconsistencies.
    pub fn init() -> anyhow::Result<Self> {
        let conf_file = load_conf_file_or_generate_new()?;
        let conf = Conf::from_conf_file(&conf_file).context("invalid configuration file")?;

        Ok(Self {
            inner: Arc::new(ConfHandleInner {
                conf: parking_lot::RwLock::new(Arc::new(conf)),
                conf_file: parking_lot::RwLock::new(Arc::new(conf_file)),
                changed: Notify::new(),
            }),
        })
    }

    #[doc(hidden)]
    pub fn mock(json_config: &str) -> anyhow::Result<Self> {
        let conf_file = serde_json::from_str::<dto::ConfFile>(json_config).context("invalid JSON config")?;
        let conf = Conf::from_conf_file(&conf_file).context("invalid configuration file")?;

        Ok(Self {
            inner: Arc::new(ConfHandleInner {
                conf: parking_lot::RwLock::new(Arc::new(conf)),
                conf_file: parking_lot::RwLock::new(Arc::new(conf_file)),
                changed: Notify::new(),
            }),
        })
    }

    /// Returns current configuration state (do not hold it forever as it may become outdated).
    pub fn get_conf(&self) -> Arc<Conf> {
        self.inner.conf.read().clone()
    }

    /// Returns current configuration file state (do not hold it forever as it may become outdated).
    pub fn get_conf_file(&self) -> Arc<dto::ConfFile> {
        self.inner.conf_file.read().clone()
    }

    /// Waits for configuration to be changed.
    pub async fn change_notified(&self) {
        self.inner.changed.notified().await;
    }

    /// Atomically saves and replaces current configuration with a new one.
    pub fn save_new_conf_file(&self, conf_file: dto::ConfFile) -> anyhow::Result<()> {
        let conf = Conf::from_conf_file(&conf_file).context("invalid configuration file")?;
        save_config(&conf_file).context("failed to save configuration")?;
        *self.inner.conf.write() = Arc::new(conf);
        *self.inner.conf_file.write() = Arc::new(conf_file);
        self.inner.changed.notify_waiters();
        Ok(())
    }
}

fn save_config(conf: &dto::ConfFile) -> anyhow::Result<()> {
    let conf_file_path = get_conf_file_path();
    let json = serde_json::to_string_pretty(conf).context("failed JSON serialization of configuration")?;
    std::fs::write(&conf_file_path, json).with_context(|| format!("failed to write file at {conf_file_path}"))?;
    Ok(())
}

pub fn get_data_dir() -> Utf8PathBuf {
    if let Ok(config_path_env) = env::var("PEAC_GATEWAY_CONFIG_PATH") {
        Utf8PathBuf::from(config_path_env)
    } else {
        let mut config_path = Utf8PathBuf::new();
        config_path.push("/etc");
        config_path.push(COMPANY_DIR);
        config_path.push(PROGRAM_DIR);
        config_path
    }
}

fn get_conf_file_path() -> Utf8PathBuf {
    get_data_dir().join("gateway.json")
}

fn normalize_data_path(path: &Utf8Path, data_dir: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        data_dir.join(path)
    }
}

fn load_conf_file(conf_path: &Utf8Path) -> anyhow::Result<Option<dto::ConfFile>> {
    match std::fs::File::open(conf_path) {
        Ok(file) => std::io::BufReader::new(file)
            .pipe(serde_json::from_reader)
            .map(Some)
            .with_context(|| format!("invalid config file at {conf_path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!(e).context(format!("couldn't open config file at {conf_path}"))),
    }
}

pub fn load_conf_file_or_generate_new() -> anyhow::Result<dto::ConfFile> {
    let conf_file_path = get_conf_file_path();

    let conf_file = match load_conf_file(&conf_file_path).context("failed to load configuration")? {
        Some(conf_file) => conf_file,
        None => {
            let defaults = dto::ConfFile::generate_new();
            println!("Write default configuration to disk…");
            save_config(&defaults).context("failed to save configuration")?;
            defaults
        }
    };

    Ok(conf_file)
}

fn read_signing_key(path: Option<&Utf8Path>, data: Option<&KeyData>) -> anyhow::Result<Option<SigningKey>> {
    let bytes = match (path, data) {
        (Some(path), _) => normalize_data_path(path, &get_data_dir())
            .pipe_ref(std::fs::read_to_string)
            .with_context(|| format!("couldn't read file at {path}"))?
            .trim()
            .pipe(|value| KeyData {
                value: value.to_owned(),
                encoding: KeyEncoding::Base64,
            })
            .decode()
            .context("invalid key file contents")?
            .pipe(Some),
        (None, Some(data)) => Some(data.decode().context("invalid inline key data")?),
        (None, None) => None,
    };

    bytes
        .map(|bytes| peac_jws::signing_key_from_bytes(&bytes).context("provisioner private key must be 32 raw bytes"))
        .transpose()
}

fn read_verifying_key(path: Option<&Utf8Path>, data: Option<&KeyData>) -> anyhow::Result<Option<VerifyingKey>> {
    let bytes = match (path, data) {
        (Some(path), _) => normalize_data_path(path, &get_data_dir())
            .pipe_ref(std::fs::read_to_string)
            .with_context(|| format!("couldn't read file at {path}"))?
            .trim()
            .pipe(|value| KeyData {
                value: value.to_owned(),
                encoding: KeyEncoding::Base64,
            })
            .decode()
            .context("invalid key file contents")?
            .pipe(Some),
        (None, Some(data)) => Some(data.decode().context("invalid inline key data")?),
        (None, None) => None,
    };

    bytes
        .map(|bytes| peac_jws::verifying_key_from_bytes(&bytes).context("provisioner public key must be 32 raw bytes"))
        .transpose()
}

pub mod dto {
    use super::*;

    /// Source of truth for gateway configuration.
    ///
    /// This struct represents the JSON file used for configuration as close
    /// as possible and is not trying to be too smart.
    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ConfFile {
        /// This gateway's unique ID.
        pub id: Option<uuid::Uuid>,
        /// This gateway's hostname, used in log context only.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub hostname: Option<String>,
        /// Address the HTTP server binds to (e.g. `0.0.0.0:8443`).
        #[serde(skip_serializing_if = "Option::is_none")]
        pub bind_address: Option<String>,

        /// This gateway's issuer URL, used as the `iss` claim on issuance.
        pub issuer: String,
        /// Expected `aud` on verification; `None` accepts any audience.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub expected_audience: Option<String>,
        /// Shared secret required (via `X-Provisioner-Key`) to call `POST /receipts`.
        /// `None` leaves issuance open, for local/dev use only.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub issuance_api_key: Option<String>,

        /// `kid` under which the provisioner key (below) is published.
        pub provisioner_kid: String,
        /// Path to the provisioner private key (issuance), raw 32 bytes.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub provisioner_private_key_file: Option<Utf8PathBuf>,
        /// Inlined provisioner private key (issuance), raw 32 bytes.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub provisioner_private_key_data: Option<KeyData>,
        /// Path to the provisioner public key (verification-only deployments).
        #[serde(skip_serializing_if = "Option::is_none")]
        pub provisioner_public_key_file: Option<Utf8PathBuf>,
        /// Inlined provisioner public key (verification-only deployments).
        #[serde(skip_serializing_if = "Option::is_none")]
        pub provisioner_public_key_data: Option<KeyData>,

        /// Additional trusted public keys (rotation / multi-issuer verification).
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub trusted_keys: Vec<TrustedKeyConf>,

        /// Safe-fetch engine policy.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub safe_fetch: Option<SafeFetchConfFile>,

        /// (Unstable) folder and prefix for log files.
        #[serde(skip_serializing_if = "Option::is_none")]
        pub log_file: Option<Utf8PathBuf>,

        /// (Unstable) unsafe debug options for developers.
        #[serde(default, rename = "__debug__", skip_serializing_if = "Option::is_none")]
        pub debug: Option<DebugConf>,

        // Other unofficial options, kept for lossless round-trip serialization.
        #[serde(flatten)]
        pub rest: serde_json::Map<String, serde_json::Value>,
    }

    impl ConfFile {
        pub fn generate_new() -> Self {
            Self {
                id: Some(uuid::Uuid::now_v7()),
                hostname: None,
                bind_address: Some("0.0.0.0:8443".to_owned()),
                issuer: "https://gateway.example".to_owned(),
                expected_audience: None,
                issuance_api_key: None,
                provisioner_kid: "2024-01-01T00:00:00Z".to_owned(),
                provisioner_private_key_file: Some("provisioner.key".into()),
                provisioner_private_key_data: None,
                provisioner_public_key_file: None,
                provisioner_public_key_data: None,
                trusted_keys: Vec::new(),
                safe_fetch: None,
                log_file: None,
                debug: None,
                rest: serde_json::Map::new(),
            }
        }
    }
}
