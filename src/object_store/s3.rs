use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;

use super::{ObjectStore, ObjectStoreError, ReadHandle, StorageKind, UploadGrant};

/// How long a presigned GET stays valid; used by view/download links.
const SIGNED_GET_EXPIRY_SECS: u64 = 300;

/// How long a direct-upload credential stays valid.
const UPLOAD_GRANT_EXPIRY_SECS: u64 = 600;

/// S3-compatible object storage backend.
///
/// Talks straight to the S3 REST API with SigV4 request signing; no SDK.
/// Supports AWS virtual-host addressing and path-style custom endpoints
/// (MinIO and friends).
pub struct S3Store {
    bucket: String,
    region: String,
    access_key: String,
    secret_key: String,
    client: Client,
    scheme: String,
    host: String,
    /// "/{bucket}" for path-style endpoints, "" for virtual-host style.
    base_path: String,
}

impl S3Store {
    pub fn new(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let (scheme, host, base_path) = match endpoint {
            Some(endpoint) => {
                let (scheme, rest) = endpoint
                    .split_once("://")
                    .ok_or_else(|| anyhow::anyhow!("S3 endpoint must include a scheme"))?;
                (
                    scheme.to_string(),
                    rest.trim_end_matches('/').to_string(),
                    format!("/{bucket}"),
                )
            }
            None => (
                "https".to_string(),
                format!("{bucket}.s3.{region}.amazonaws.com"),
                String::new(),
            ),
        };

        Ok(Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            client,
            scheme,
            host,
            base_path,
        })
    }

    fn object_uri(&self, key: &str) -> String {
        format!("{}/{}", self.base_path, uri_encode(key, false))
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.object_uri(key))
    }

    fn bucket_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.base_path)
    }

    /// The derived SigV4 signing key for a given date.
    fn signing_key(&self, date: &str) -> ring::hmac::Key {
        let secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes());
        let k_region = hmac_sha256(k_date.as_ref(), self.region.as_bytes());
        let k_service = hmac_sha256(k_region.as_ref(), b"s3");
        let k_signing = hmac_sha256(k_service.as_ref(), b"aws4_request");
        ring::hmac::Key::new(ring::hmac::HMAC_SHA256, k_signing.as_ref())
    }

    fn credential_scope(&self, date: &str) -> String {
        format!("{date}/{}/s3/aws4_request", self.region)
    }

    /// Sign an authenticated request. Returns the headers to attach.
    fn sign_request(
        &self,
        method: &str,
        key: &str,
        query: &str,
        payload_hash: &str,
        extra_headers: &[(&str, &str)],
    ) -> Vec<(String, String)> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers: Vec<(String, String)> = vec![
            ("host".to_string(), self.host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.to_string()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        for (name, value) in extra_headers {
            headers.push((name.to_string(), value.to_string()));
        }
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{k}:{v}\n"))
            .collect();
        let signed_headers: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        let signed_headers = signed_headers.join(";");

        let canonical_request = format!(
            "{method}\n{}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
            self.object_uri(key)
        );

        let scope = self.credential_scope(&date);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex(sha256(canonical_request.as_bytes()).as_ref())
        );

        let signature = hex(ring::hmac::sign(
            &self.signing_key(&date),
            string_to_sign.as_bytes(),
        )
        .as_ref());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        );

        let mut out: Vec<(String, String)> = headers
            .into_iter()
            .filter(|(k, _)| k != "host")
            .collect();
        out.push(("authorization".to_string(), authorization));
        out
    }

    /// Build a presigned GET URL (query-string auth, UNSIGNED-PAYLOAD).
    fn presign_get(&self, key: &str, expires_secs: u64) -> String {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = self.credential_scope(&date);

        let mut params: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into()),
            (
                "X-Amz-Credential".into(),
                format!("{}/{scope}", self.access_key),
            ),
            ("X-Amz-Date".into(), amz_date.clone()),
            ("X-Amz-Expires".into(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".into(), "host".into()),
            ("response-content-disposition".into(), "inline".into()),
        ];
        params.sort();

        let canonical_query: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k, true), uri_encode(v, true)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{canonical_query}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            self.object_uri(key),
            self.host
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex(sha256(canonical_request.as_bytes()).as_ref())
        );

        let signature = hex(ring::hmac::sign(
            &self.signing_key(&date),
            string_to_sign.as_bytes(),
        )
        .as_ref());

        format!(
            "{}?{canonical_query}&X-Amz-Signature={signature}",
            self.object_url(key)
        )
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), ObjectStoreError> {
        let payload_hash = hex(sha256(&data).as_ref());
        let headers = self.sign_request("PUT", key, "", &payload_hash, &[]);

        let mut req = self
            .client
            .put(self.object_url(key))
            .header("content-type", content_type)
            .body(data);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "S3 upload failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn resolve_read(&self, key: &str, public: bool) -> Result<ReadHandle, ObjectStoreError> {
        // Public objects are reachable at their plain URL; private reads get
        // a short-lived signed URL.
        if public {
            return Ok(ReadHandle::Url(self.object_url(key)));
        }
        Ok(ReadHandle::Url(
            self.presign_get(key, SIGNED_GET_EXPIRY_SECS),
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let payload_hash = hex(sha256(b"").as_ref());
        let headers = self.sign_request("DELETE", key, "", &payload_hash, &[]);

        let mut req = self.client.delete(self.object_url(key));
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "S3 delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let payload_hash = hex(sha256(b"").as_ref());
        let headers = self.sign_request("HEAD", key, "", &payload_hash, &[]);

        let mut req = self.client.head(self.object_url(key));
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(resp.status().is_success())
    }

    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        max_bytes: u64,
    ) -> Result<UploadGrant, ObjectStoreError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = self.credential_scope(&date);
        let credential = format!("{}/{scope}", self.access_key);
        let expiration = (now + chrono::Duration::seconds(UPLOAD_GRANT_EXPIRY_SECS as i64))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();

        // POST policy: binds bucket, exact key, content type, and a byte
        // ceiling on the upload.
        let policy = serde_json::json!({
            "expiration": expiration,
            "conditions": [
                { "bucket": self.bucket },
                { "key": key },
                { "Content-Type": content_type },
                ["content-length-range", 0, max_bytes],
                { "x-amz-algorithm": "AWS4-HMAC-SHA256" },
                { "x-amz-credential": credential },
                { "x-amz-date": amz_date },
            ],
        });

        let policy_b64 = base64_encode(policy.to_string().as_bytes());
        let signature = hex(ring::hmac::sign(&self.signing_key(&date), policy_b64.as_bytes()).as_ref());

        let mut fields = HashMap::new();
        fields.insert("key".to_string(), key.to_string());
        fields.insert("Content-Type".to_string(), content_type.to_string());
        fields.insert("policy".to_string(), policy_b64);
        fields.insert(
            "x-amz-algorithm".to_string(),
            "AWS4-HMAC-SHA256".to_string(),
        );
        fields.insert("x-amz-credential".to_string(), credential);
        fields.insert("x-amz-date".to_string(), amz_date);
        fields.insert("x-amz-signature".to_string(), signature);

        Ok(UploadGrant {
            url: self.bucket_url(),
            fields,
            storage_key: key.to_string(),
            expires_in_secs: UPLOAD_GRANT_EXPIRY_SECS,
        })
    }

    async fn set_visibility(&self, key: &str, public: bool) -> Result<(), ObjectStoreError> {
        let acl = if public { "public-read" } else { "private" };
        let payload_hash = hex(sha256(b"").as_ref());
        let headers = self.sign_request("PUT", key, "acl=", &payload_hash, &[("x-amz-acl", acl)]);

        let mut req = self.client.put(format!("{}?acl", self.object_url(key)));
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "S3 ACL update failed ({status}): {body}"
            )));
        }

        Ok(())
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> ring::hmac::Tag {
    let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key);
    ring::hmac::sign(&key, data)
}

fn sha256(data: &[u8]) -> ring::digest::Digest {
    ring::digest::digest(&ring::digest::SHA256, data)
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// SigV4 URI encoding: unreserved characters pass through, everything else
/// is percent-encoded. Slashes are preserved in object paths.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
