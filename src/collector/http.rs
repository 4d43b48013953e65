//! HTTP/JSON client for the collector server.
//!
//! | Operation | Request | Success |
//! |-----------|---------|---------|
//! | ping | `GET /ping` | 204 |
//! | surface movement | `POST /fabric_movement` | 201 |
//! | picture batch | `POST /pictures_batch` | 201 |
//!
//! Images travel base64-encoded inside the JSON body.

use super::{CollectorError, RemoteCollector};
use crate::config::CollectorConfig;
use crate::error::RigResult;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use rig_core::{CapturedLight, LightBatch, LightType, Picture, SurfaceMovement};
use serde::Serialize;
use std::time::Duration;

impl From<reqwest::Error> for CollectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CollectorError::Timeout
        } else if err.is_connect() {
            CollectorError::Connection(err.to_string())
        } else {
            CollectorError::Http(err.to_string())
        }
    }
}

/// One camera's picture as sent to the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PicturePayload {
    /// Base64 (standard alphabet) image bytes
    pub picture: String,
    pub iso: u32,
    pub exposure_time: f64,
    pub diaphragm_opening: f64,
}

impl From<&Picture> for PicturePayload {
    fn from(picture: &Picture) -> Self {
        Self {
            picture: STANDARD.encode(&picture.image),
            iso: picture.iso,
            exposure_time: picture.exposure_time_s,
            diaphragm_opening: picture.diaphragm_opening,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StereoPayload {
    pub left: PicturePayload,
    pub right: PicturePayload,
}

/// One light of a capture cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightPayload {
    pub light: LightType,
    /// RFC 3339 timestamp
    pub creation_date: String,
    pub surface_velocity: f64,
    pub surface_displacement: f64,
    pub pictures: StereoPayload,
}

impl From<&CapturedLight> for LightPayload {
    fn from(light: &CapturedLight) -> Self {
        Self {
            light: light.light,
            creation_date: light.created_at.to_rfc3339(),
            surface_velocity: light.surface_velocity,
            surface_displacement: light.surface_displacement,
            pictures: StereoPayload {
                left: PicturePayload::from(&light.left),
                right: PicturePayload::from(&light.right),
            },
        }
    }
}

/// Body of `POST /pictures_batch`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PictureBatchPayload {
    pub lights: Vec<LightPayload>,
}

impl From<&LightBatch> for PictureBatchPayload {
    fn from(batch: &LightBatch) -> Self {
        Self {
            lights: batch.iter().map(LightPayload::from).collect(),
        }
    }
}

/// Collector reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCollector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollectorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &CollectorConfig) -> RigResult<Self> {
        Ok(Self::new(&config.base_url, config.request_timeout()?)?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_expecting<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        expected: StatusCode,
    ) -> Result<(), CollectorError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        expect_status(response.status(), expected)
    }
}

fn expect_status(status: StatusCode, expected: StatusCode) -> Result<(), CollectorError> {
    if status == expected {
        Ok(())
    } else {
        Err(CollectorError::UnexpectedStatus {
            status: status.as_u16(),
            expected: expected.as_u16(),
        })
    }
}

#[async_trait]
impl RemoteCollector for HttpCollector {
    async fn ping(&self) -> bool {
        match self.client.get(self.url("/ping")).send().await {
            Ok(response) => response.status() == StatusCode::NO_CONTENT,
            Err(e) => {
                tracing::debug!(error = %e, "Collector ping failed");
                false
            }
        }
    }

    async fn post_surface_movement(
        &self,
        velocity: f64,
        displacement: f64,
    ) -> Result<(), CollectorError> {
        let body = SurfaceMovement {
            velocity,
            displacement,
        };
        self.post_expecting("/fabric_movement", &body, StatusCode::CREATED)
            .await
    }

    async fn post_picture_batch(&self, batch: LightBatch) -> Result<(), CollectorError> {
        let body = PictureBatchPayload::from(&batch);
        self.post_expecting("/pictures_batch", &body, StatusCode::CREATED)
            .await
    }
}
