use std::io::Read;

use anyhow::{ensure, Result};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

use crate::workload::{Payload, UserId};

pub struct PhotoClient {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl PhotoClient {
    fn photo_url(&self, user: UserId) -> String {
        format!("{}/users/{user}/photo", self.base_url)
    }

    pub async fn write(&self, user: UserId, mut payload: Payload) -> Result<()> {
        let mut bytes = Vec::with_capacity(payload.len as usize);
        payload.read_to_end(&mut bytes)?;

        let part = Part::bytes(bytes)
            .file_name("photo.bin")
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.photo_url(user))
            .multipart(form)
            .send()
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "unexpected upload status {} for user {user}",
            response.status()
        );

        Ok(())
    }

    pub async fn read(&self, user: UserId, mut expected: Payload) -> Result<()> {
        let response = self.client.get(self.photo_url(user)).send().await?;
        ensure!(
            response.status() == StatusCode::OK,
            "unexpected download status {} for user {user}",
            response.status()
        );
        let body = response.bytes().await?;

        let mut expected_bytes = Vec::with_capacity(expected.len as usize);
        expected.read_to_end(&mut expected_bytes)?;
        ensure!(body == expected_bytes, "readback mismatch for user {user}");

        Ok(())
    }
}
