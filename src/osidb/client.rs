// src/osidb/client.rs

use anyhow::{Context, Result};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::models::affect::AffectCvss;
use crate::models::flaw::Flaw;

use super::api::{OsidbApi, ServiceError};
use super::types::{
    AffectRequest, AffectsResponse, FileTrackersResponse, ModuleComponentsResponse, TrackerPost,
    TrackerSuggestions,
};

const DEFAULT_BASE_URL: &str = "https://osidb.example.com";
const BASE_URL_ENV: &str = "OSIM_OSIDB_URL";
const TOKEN_ENV: &str = "OSIM_OSIDB_TOKEN";

#[derive(Clone)]
pub struct OsidbClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsidbClient {
    pub fn new(base_url: String, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("osim-console/0.1"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Invalid characters in OSIDB token")?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from `OSIM_OSIDB_URL` / `OSIM_OSIDB_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let token = std::env::var(TOKEN_ENV).ok();
        Self::new(base_url, token.as_deref())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Status { status, body })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        debug!("GET {path}");
        let response = self.client.get(self.url(path)).send().await?;
        Ok(Self::check(response).await?.json::<T>().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!("POST {path}");
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Ok(Self::check(response).await?.json::<T>().await?)
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!("PUT {path}");
        let response = self.client.put(self.url(path)).json(body).send().await?;
        Ok(Self::check(response).await?.json::<T>().await?)
    }
}

impl OsidbApi for OsidbClient {
    async fn get_flaw(&self, id: &str) -> Result<Flaw, ServiceError> {
        self.get_json(&format!("/osidb/api/v1/flaws/{id}")).await
    }

    async fn post_affects(&self, affects: &[AffectRequest]) -> Result<AffectsResponse, ServiceError> {
        self.post_json("/osidb/api/v1/affects/bulk", affects).await
    }

    async fn put_affects(&self, affects: &[AffectRequest]) -> Result<AffectsResponse, ServiceError> {
        self.put_json("/osidb/api/v1/affects/bulk", affects).await
    }

    async fn delete_affects(&self, uuids: &[Uuid]) -> Result<(), ServiceError> {
        debug!("DELETE /osidb/api/v1/affects/bulk ({} affects)", uuids.len());
        let response = self
            .client
            .delete(self.url("/osidb/api/v1/affects/bulk"))
            .json(uuids)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn post_affect_cvss(&self, affect: Uuid, cvss: &AffectCvss) -> Result<AffectCvss, ServiceError> {
        self.post_json(&format!("/osidb/api/v1/affects/{affect}/cvss_scores"), cvss)
            .await
    }

    async fn put_affect_cvss(
        &self,
        affect: Uuid,
        cvss_uuid: Uuid,
        cvss: &AffectCvss,
    ) -> Result<AffectCvss, ServiceError> {
        self.put_json(
            &format!("/osidb/api/v1/affects/{affect}/cvss_scores/{cvss_uuid}"),
            cvss,
        )
        .await
    }

    async fn delete_affect_cvss(&self, affect: Uuid, cvss_uuid: Uuid) -> Result<(), ServiceError> {
        debug!("DELETE /osidb/api/v1/affects/{affect}/cvss_scores/{cvss_uuid}");
        let response = self
            .client
            .delete(self.url(&format!(
                "/osidb/api/v1/affects/{affect}/cvss_scores/{cvss_uuid}"
            )))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn module_components(
        &self,
        flaw_uuids: &[Uuid],
    ) -> Result<ModuleComponentsResponse, ServiceError> {
        self.post_json(
            "/trackers/api/v1/file",
            &serde_json::json!({ "flaw_uuids": flaw_uuids }),
        )
        .await
    }

    async fn tracker_suggestions(
        &self,
        flaw_uuids: &[Uuid],
    ) -> Result<TrackerSuggestions, ServiceError> {
        self.post_json(
            "/trackers/api/v1/suggest",
            &serde_json::json!({ "flaw_uuids": flaw_uuids }),
        )
        .await
    }

    async fn file_trackers(
        &self,
        trackers: &[TrackerPost],
    ) -> Result<FileTrackersResponse, ServiceError> {
        self.post_json(
            "/trackers/api/v1/file",
            &serde_json::json!({ "trackers": trackers }),
        )
        .await
    }
}
