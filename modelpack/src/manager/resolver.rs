//! Asset discovery: package identifier to ordered archive parts.
//!
//! The release metadata endpoint is asked first. When it is unavailable or
//! lists no matching assets, direct download URLs are probed one part number
//! at a time until the first missing part.

use serde::Deserialize;
use tracing::debug;

use super::context::RunContext;
use super::download::parse_sha256_digest;
use super::error::{ManagerError, ManagerResult};
use super::transport::{HttpRequest, Transport};
use crate::package::{
    part_filename, parse_part_number, sort_parts, AssetPart, PackageIdentifier, ReleaseTag,
};

/// Default release metadata API.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default host for direct asset downloads.
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";

/// Upper bound on the number of parts found by probing.
pub const DEFAULT_MAX_PROBE_PARTS: u32 = 999;

/// Largest release listing accepted.
const MAX_LISTING_BYTES: usize = 8 * 1024 * 1024;

const ACCEPT_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct ReleaseListing {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    digest: Option<String>,
}

/// Resolves a [`PackageIdentifier`] to its archive parts.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    transport: Transport,
    api_base: String,
    download_base: String,
    max_probe_parts: u32,
}

impl AssetResolver {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            max_probe_parts: DEFAULT_MAX_PROBE_PARTS,
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = trim_base(base.into());
        self
    }

    pub fn with_download_base(mut self, base: impl Into<String>) -> Self {
        self.download_base = trim_base(base.into());
        self
    }

    pub fn with_max_probe_parts(mut self, max: u32) -> Self {
        self.max_probe_parts = max.max(1);
        self
    }

    /// Release metadata URL for an identifier.
    pub fn release_url(&self, id: &PackageIdentifier) -> String {
        match &id.tag {
            ReleaseTag::Latest => {
                format!("{}/repos/{}/releases/latest", self.api_base, id.repository)
            }
            ReleaseTag::Named(tag) => format!(
                "{}/repos/{}/releases/tags/{}",
                self.api_base, id.repository, tag
            ),
        }
    }

    /// Direct download URL of one asset.
    pub fn direct_url(&self, id: &PackageIdentifier, asset: &str) -> String {
        match &id.tag {
            ReleaseTag::Latest => format!(
                "{}/{}/releases/latest/download/{}",
                self.download_base, id.repository, asset
            ),
            ReleaseTag::Named(tag) => format!(
                "{}/{}/releases/download/{}/{}",
                self.download_base, id.repository, tag, asset
            ),
        }
    }

    /// Resolve `id` to its parts, sorted by part number.
    ///
    /// Fails with `NotFound` when neither the listing nor probing finds a
    /// part, or with the listing's error when the listing failed for a
    /// reason other than a missing release.
    pub async fn resolve(
        &self,
        id: &PackageIdentifier,
        ctx: &RunContext,
    ) -> ManagerResult<Vec<AssetPart>> {
        if !id.is_valid_repository() {
            return Err(ManagerError::InvalidConfig(format!(
                "repository must be in owner/name form, got '{}'",
                id.repository
            )));
        }

        ctx.check_cancelled()?;
        ctx.info(format!("Looking up release {}", id));

        let listing_error = match self.list_release(id).await {
            Ok(parts) if !parts.is_empty() => {
                ctx.info(format!("Release lists {} part(s)", parts.len()));
                return Ok(parts);
            }
            Ok(_) => {
                ctx.info("Release lists no matching parts, probing download URLs");
                None
            }
            Err(e) => {
                ctx.info(format!(
                    "Release listing unavailable ({}), probing download URLs",
                    e
                ));
                Some(e)
            }
        };

        let parts = self.probe(id, ctx).await?;
        if !parts.is_empty() {
            ctx.info(format!("Found {} part(s) by probing", parts.len()));
            return Ok(parts);
        }

        match listing_error {
            Some(e) if !e.is_not_found() => Err(e),
            _ => Err(ManagerError::NotFound {
                identifier: id.to_string(),
            }),
        }
    }

    /// Parts named in the release listing.
    pub async fn list_release(&self, id: &PackageIdentifier) -> ManagerResult<Vec<AssetPart>> {
        let url = self.release_url(id);
        let request = HttpRequest::get(&url)
            .with_header("Accept", ACCEPT_JSON)
            .with_headers(&auth_headers(id));

        let body = self
            .transport
            .fetch(request)
            .await?
            .bytes(MAX_LISTING_BYTES)
            .await?;

        let listing: ReleaseListing =
            serde_json::from_slice(&body).map_err(|e| ManagerError::Protocol {
                url: url.clone(),
                reason: format!("invalid release listing: {}", e),
            })?;

        let mut parts: Vec<AssetPart> = listing
            .assets
            .into_iter()
            .filter(|asset| parse_part_number(&id.asset_prefix, &asset.name).is_some())
            .map(|asset| {
                let part = AssetPart::new(asset.name, asset.browser_download_url)
                    .with_size(asset.size);
                match asset.digest.as_deref().and_then(parse_sha256_digest) {
                    Some(digest) => part.with_sha256(digest),
                    None => part,
                }
            })
            .collect();

        sort_parts(&id.asset_prefix, &mut parts);
        debug!(url = %url, parts = parts.len(), "release listing parsed");
        Ok(parts)
    }

    /// Probe direct URLs `prefix001`, `prefix002`, ... until one is missing.
    pub async fn probe(
        &self,
        id: &PackageIdentifier,
        ctx: &RunContext,
    ) -> ManagerResult<Vec<AssetPart>> {
        let headers = auth_headers(id);
        let mut parts = Vec::new();

        for number in 1..=self.max_probe_parts {
            ctx.check_cancelled()?;

            let name = part_filename(&id.asset_prefix, number);
            let url = self.direct_url(id, &name);

            match self.transport.content_length(&url, &headers).await {
                Ok(size) => {
                    debug!(part = %name, ?size, "probe hit");
                    parts.push(AssetPart::new(name, url).with_size(size.unwrap_or(0)));
                }
                Err(e) if e.is_not_found() => {
                    debug!(part = %name, "probe miss");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(parts)
    }
}

pub(crate) fn auth_headers(id: &PackageIdentifier) -> Vec<(String, String)> {
    id.access_token
        .as_ref()
        .map(|token| vec![("Authorization".to_string(), format!("Bearer {}", token))])
        .unwrap_or_default()
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::manager::testing::{context, ScriptedSender};
    use crate::manager::transport::{HttpMethod, DEFAULT_MAX_REDIRECTS};

    const API: &str = "https://api.test";
    const DL: &str = "https://dl.test";

    fn resolver(sender: &Arc<ScriptedSender>) -> AssetResolver {
        AssetResolver::new(Transport::new(sender.clone(), DEFAULT_MAX_REDIRECTS))
            .with_api_base(API)
            .with_download_base(format!("{}/", DL))
    }

    fn identifier() -> PackageIdentifier {
        PackageIdentifier::new("acme/models")
    }

    fn listing(names: &[&str]) -> Vec<u8> {
        let assets: Vec<serde_json::Value> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                serde_json::json!({
                    "name": name,
                    "browser_download_url": format!("{}/files/{}", DL, name),
                    "size": 100 + i,
                })
            })
            .collect();
        serde_json::to_vec(&serde_json::json!({ "tag_name": "v1", "assets": assets })).unwrap()
    }

    #[test]
    fn test_urls() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let latest = identifier();
        let named = identifier().with_tag(ReleaseTag::Named("v2".into()));

        assert_eq!(
            resolver.release_url(&latest),
            "https://api.test/repos/acme/models/releases/latest"
        );
        assert_eq!(
            resolver.release_url(&named),
            "https://api.test/repos/acme/models/releases/tags/v2"
        );
        assert_eq!(
            resolver.direct_url(&latest, "model-pack.7z.001"),
            "https://dl.test/acme/models/releases/latest/download/model-pack.7z.001"
        );
        assert_eq!(
            resolver.direct_url(&named, "model-pack.7z.001"),
            "https://dl.test/acme/models/releases/download/v2/model-pack.7z.001"
        );
    }

    #[tokio::test]
    async fn test_listing_selects_and_sorts_parts() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier();
        sender.serve(
            &resolver.release_url(&id),
            listing(&[
                "model-pack.7z.010",
                "README.md",
                "model-pack.7z.002",
                "model-pack.7z.001",
                "model-pack.7z.sha256",
                "other.7z.003",
            ]),
        );
        let (ctx, _log) = context();

        let parts = resolver.resolve(&id, &ctx).await.unwrap();

        let names: Vec<&str> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["model-pack.7z.001", "model-pack.7z.002", "model-pack.7z.010"]
        );
        assert_eq!(parts[0].expected_size, 103);
        assert_eq!(parts[0].source_url, "https://dl.test/files/model-pack.7z.001");
    }

    #[tokio::test]
    async fn test_listing_digest_is_parsed() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier();
        let digest = "a".repeat(64);
        let body = serde_json::json!({
            "assets": [{
                "name": "model-pack.7z.001",
                "browser_download_url": "https://dl.test/x",
                "size": 5,
                "digest": format!("sha256:{}", digest),
            }]
        });
        sender.serve(&resolver.release_url(&id), serde_json::to_vec(&body).unwrap());

        let parts = resolver.list_release(&id).await.unwrap();
        assert_eq!(parts[0].sha256.as_deref(), Some(digest.as_str()));
    }

    #[tokio::test]
    async fn test_token_sent_with_listing() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier().with_access_token(Some("s3cret".into()));
        sender.serve(&resolver.release_url(&id), listing(&["model-pack.7z.001"]));

        resolver.list_release(&id).await.unwrap();

        let request = &sender.requests()[0];
        assert_eq!(request.header("authorization"), Some("Bearer s3cret"));
        assert_eq!(request.header("accept"), Some(ACCEPT_JSON));
    }

    #[tokio::test]
    async fn test_listing_404_falls_back_to_probing() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier();
        for n in 1..=4 {
            let name = part_filename(&id.asset_prefix, n);
            sender.serve(&resolver.direct_url(&id, &name), vec![0u8; 10 * n as usize]);
        }
        let (ctx, _log) = context();

        let parts = resolver.resolve(&id, &ctx).await.unwrap();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[3].name, "model-pack.7z.004");
        assert_eq!(parts[3].expected_size, 40);

        let fifth = resolver.direct_url(&id, "model-pack.7z.005");
        assert_eq!(sender.requests_for(HttpMethod::Head, &fifth).len(), 1);
        let sixth = resolver.direct_url(&id, "model-pack.7z.006");
        assert!(sender.requests_for(HttpMethod::Head, &sixth).is_empty());
    }

    #[tokio::test]
    async fn test_empty_listing_falls_back_to_probing() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier();
        sender.serve(&resolver.release_url(&id), listing(&["notes.txt"]));
        sender.serve(&resolver.direct_url(&id, "model-pack.7z.001"), vec![1, 2, 3]);
        let (ctx, _log) = context();

        let parts = resolver.resolve(&id, &ctx).await.unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[tokio::test]
    async fn test_probe_respects_bound() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender).with_max_probe_parts(2);
        let id = identifier();
        for n in 1..=3 {
            let name = part_filename(&id.asset_prefix, n);
            sender.serve(&resolver.direct_url(&id, &name), vec![0u8; 4]);
        }
        let (ctx, _log) = context();

        let parts = resolver.probe(&id, &ctx).await.unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_found_is_not_found() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let (ctx, _log) = context();

        let err = resolver.resolve(&identifier(), &ctx).await.unwrap_err();
        assert!(matches!(err, ManagerError::NotFound { .. }));
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_listing_failure_reported_when_probing_finds_nothing() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier();
        sender.status(&resolver.release_url(&id), 503);
        let (ctx, _log) = context();

        let err = resolver.resolve(&id, &ctx).await.unwrap_err();
        assert_eq!(err.http_status(), Some(503));
    }

    #[tokio::test]
    async fn test_probe_error_propagates() {
        let sender = Arc::new(ScriptedSender::new());
        let resolver = resolver(&sender);
        let id = identifier();
        sender.status(&resolver.direct_url(&id, "model-pack.7z.001"), 500);
        let (ctx, _log) = context();

        let err = resolver.probe(&id, &ctx).await.unwrap_err();
        assert_eq!(err.http_status(), Some(500));
    }

    #[tokio::test]
    async fn test_invalid_repository() {
        let sender = Arc::new(ScriptedSender::new());
        let (ctx, _log) = context();

        let err = resolver(&sender)
            .resolve(&PackageIdentifier::new("just-a-name"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidConfig(_)));
        assert!(sender.requests().is_empty());
    }
}
