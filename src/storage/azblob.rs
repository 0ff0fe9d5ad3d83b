use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use opendal::{services::Azblob, Operator};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, Request, StatusCode};
use sha2::Sha256;
use std::time::Instant;
use tracing::{debug, error, info};
use url::Url;

use super::traits::Storage;
use crate::util::http_client::{HttpClient, HttpClientConfig};

/// Azurite 本地模拟器的固定账户
const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// 容器级请求使用的 Blob REST 版本
const API_VERSION: &str = "2021-08-06";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";
const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";

/// Azure 存储连接串
///
/// 形如 `DefaultEndpointsProtocol=https;AccountName=xxx;AccountKey=yyy;EndpointSuffix=core.windows.net`，
/// 也支持 `BlobEndpoint`、`SharedAccessSignature` 与 `UseDevelopmentStorage=true`。
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: Option<String>,
    pub sas_token: Option<String>,
    pub blob_endpoint: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "***"))
            .field("sas_token", &self.sas_token.as_ref().map(|_| "***"))
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut sas_token = None;
        let mut blob_endpoint = None;
        let mut development = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // 值中可能含有 base64 填充的 '='，只按第一个切分
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| anyhow!("存储连接串片段格式无效: {part}"))?;
            let value = value.trim().to_string();
            match key.trim() {
                "DefaultEndpointsProtocol" => protocol = value,
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "SharedAccessSignature" => sas_token = Some(value),
                "EndpointSuffix" => suffix = value,
                "BlobEndpoint" => blob_endpoint = Some(value),
                "UseDevelopmentStorage" => development = value.eq_ignore_ascii_case("true"),
                other => debug!(target: "storage.azblob", "忽略连接串字段: {}", other),
            }
        }

        if development {
            return Ok(Self {
                account_name: DEV_ACCOUNT_NAME.to_string(),
                account_key: Some(DEV_ACCOUNT_KEY.to_string()),
                sas_token: None,
                blob_endpoint: blob_endpoint.unwrap_or_else(|| DEV_BLOB_ENDPOINT.to_string()),
            });
        }

        let account_name = account_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("无效的存储连接串: 缺少 AccountName"))?;

        if account_key.is_none() && sas_token.is_none() {
            bail!("无效的存储连接串: 缺少 AccountKey 或 SharedAccessSignature");
        }

        let blob_endpoint = blob_endpoint
            .unwrap_or_else(|| format!("{protocol}://{account_name}.blob.{suffix}"));

        Ok(Self {
            account_name,
            account_key,
            sas_token,
            blob_endpoint: blob_endpoint.trim_end_matches('/').to_string(),
        })
    }
}

/// 构造容器级 REST 请求（`?restype=container`）
///
/// 有 AccountKey 时按 Shared Key 签名，否则把 SAS 拼进查询串。
/// `PUT` 为创建容器，`HEAD` 为读取容器属性。
pub fn container_request(
    client: &reqwest::Client,
    connection: &ConnectionString,
    container: &str,
    method: Method,
    now: DateTime<Utc>,
) -> Result<Request> {
    let mut url = Url::parse(&format!("{}/{}", connection.blob_endpoint, container))
        .with_context(|| format!("无效的 Blob 地址: {}", connection.blob_endpoint))?;
    let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();

    let mut builder = match (&connection.account_key, &connection.sas_token) {
        (Some(key), _) => {
            url.set_query(Some("restype=container"));
            // 标准头全部为空，Content-Length 为 0 时同样留空
            let string_to_sign = format!(
                "{}\n{}\nx-ms-date:{}\nx-ms-version:{}\n{}",
                method.as_str(),
                [""; 11].join("\n"),
                date,
                API_VERSION,
                canonicalized_resource(&connection.account_name, &url),
            );
            let signature = sign(key, &string_to_sign)?;
            client.request(method.clone(), url).header(
                "Authorization",
                format!("SharedKey {}:{}", connection.account_name, signature),
            )
        }
        (None, Some(sas)) => {
            url.set_query(Some(&format!(
                "restype=container&{}",
                sas.trim_start_matches('?')
            )));
            client.request(method.clone(), url)
        }
        (None, None) => bail!("无效的存储连接串: 缺少 AccountKey 或 SharedAccessSignature"),
    };

    builder = builder
        .header("x-ms-date", date)
        .header("x-ms-version", API_VERSION);
    if method == Method::PUT {
        builder = builder.header(CONTENT_LENGTH, "0");
    }
    builder.build().context("构造容器请求失败")
}

/// Shared Key 的 CanonicalizedResource：`/{account}{path}` 加排序后的查询参数
fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();
    params.sort();

    let mut resource = format!("/{}{}", account, url.path());
    for (key, value) in params {
        resource.push_str(&format!("\n{key}:{value}"));
    }
    resource
}

fn sign(account_key: &str, string_to_sign: &str) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;
    let key = STANDARD
        .decode(account_key)
        .context("AccountKey 不是有效的 base64")?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| anyhow!("无效的 AccountKey"))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Azure Blob 存储实现
pub struct AzblobStorage {
    operator: Operator,
    http: HttpClient,
    connection: ConnectionString,
    container: String,
    endpoint: String,
}

impl AzblobStorage {
    pub fn new(connection: &ConnectionString, container: &str) -> Result<Self> {
        info!(
            target: "storage.azblob",
            event = "azblob.connect.start",
            endpoint = %connection.blob_endpoint,
            container
        );

        let mut builder = Azblob::default()
            .root("/")
            .container(container)
            .endpoint(&connection.blob_endpoint)
            .account_name(&connection.account_name);
        if let Some(key) = &connection.account_key {
            builder = builder.account_key(key);
        }
        if let Some(sas) = &connection.sas_token {
            builder = builder.sas_token(sas);
        }

        let operator = Operator::new(builder)
            .context("创建 Azure Blob Operator 失败")?
            .finish();

        info!(
            target: "storage.azblob",
            event = "azblob.connect.success",
            container
        );

        Ok(Self {
            operator,
            http: HttpClient::new(HttpClientConfig::default().with_env_proxy())?,
            connection: connection.clone(),
            container: container.to_string(),
            endpoint: connection.blob_endpoint.clone(),
        })
    }

    /// 容器不存在时创建，返回是否新建
    pub async fn ensure_container(&self) -> Result<bool> {
        let request = container_request(
            self.http.inner(),
            &self.connection,
            &self.container,
            Method::PUT,
            Utc::now(),
        )?;
        let response = self
            .http
            .inner()
            .execute(request)
            .await
            .context("创建容器请求失败")?;

        let status = response.status();
        let error_code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match status {
            StatusCode::CREATED => {
                info!(
                    target: "storage.azblob",
                    event = "azblob.container.created",
                    container = %self.container
                );
                Ok(true)
            }
            StatusCode::CONFLICT if error_code == CONTAINER_ALREADY_EXISTS => {
                debug!(
                    target: "storage.azblob",
                    event = "azblob.container.exists",
                    container = %self.container
                );
                Ok(false)
            }
            _ => bail!(
                "创建容器 {} 失败: status={}, code={}",
                self.container,
                status,
                if error_code.is_empty() { "-" } else { error_code.as_str() }
            ),
        }
    }
}

#[async_trait]
impl Storage for AzblobStorage {
    fn backend(&self) -> &'static str {
        "azblob"
    }

    async fn put(&self, key: &str, data: &[u8], content_type: Option<&str>) -> Result<()> {
        let start = Instant::now();
        info!(
            "[upload] Blob写入操作: key={}, size={}字节, container={}",
            key,
            data.len(),
            self.container
        );

        let mut writer = self.operator.write_with(key, data.to_vec());
        if let Some(content_type) = content_type {
            writer = writer.content_type(content_type);
        }

        match writer.await {
            Ok(_) => {
                info!("[ok] Blob写入成功: {}, 用时: {:?}", key, start.elapsed());
                Ok(())
            }
            Err(e) => {
                error!(
                    "[fail] Blob写入失败: key={}, kind={:?}, error={}",
                    key,
                    e.kind(),
                    e
                );
                Err(e).context("Failed to write to Azure Blob")
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.operator.read(key).await {
            Ok(data) => Ok(Some(data.to_vec())),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read from Azure Blob"),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.operator.stat(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to check existence in Azure Blob"),
        }
    }

    async fn get_public_url(&self, key: &str) -> Result<String> {
        Ok(format!(
            "{}/{}/{}",
            self.endpoint,
            self.container,
            key.trim_start_matches('/')
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        info!(
            "[search] 开始Blob健康检查... container={}, endpoint={}",
            self.container, self.endpoint
        );

        // 直接读取容器属性，容器缺失（404）同样视为不健康
        let request = container_request(
            self.http.inner(),
            &self.connection,
            &self.container,
            Method::HEAD,
            Utc::now(),
        )?;
        match self.http.inner().execute(request).await {
            Ok(response) if response.status().is_success() => Ok(true),
            Ok(response) => {
                error!(
                    "[fail] Blob健康检查失败: container={}, status={}",
                    self.container,
                    response.status()
                );
                Ok(false)
            }
            Err(e) => {
                error!("[fail] Blob健康检查失败: error={}", e);
                Ok(false)
            }
        }
    }

    async fn prepare(&self) -> Result<()> {
        self.ensure_container().await.map(|_| ())
    }
}
