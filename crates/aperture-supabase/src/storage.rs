//! Storage object API for the posts bucket.

use bytes::Bytes;
use reqwest::header;
use serde::Deserialize;

use aperture_core::{Error, POSTS_BUCKET};

use crate::Supabase;
use crate::rest::{check, transport};

impl Supabase {
    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url, POSTS_BUCKET, key
        )
    }

    pub(crate) async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), Error> {
        let mut req = self
            .http
            .post(self.object_url(key))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
            .header(header::CONTENT_TYPE, content_type.to_string())
            .body(bytes);
        if overwrite {
            req = req.header("x-upsert", "true");
        }
        check(req.send().await.map_err(transport)?).await?;
        Ok(())
    }

    pub(crate) fn object_public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, POSTS_BUCKET, key
        )
    }

    /// Ask the store to mint a time-limited URL for `key`. The response
    /// carries a path relative to the storage root.
    pub(crate) async fn create_signed_url(&self, key: &str, ttl_secs: u32) -> Result<String, Error> {
        #[derive(Deserialize)]
        struct Signed {
            #[serde(rename = "signedURL")]
            signed_url: String,
        }

        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config.url, POSTS_BUCKET, key
        );
        let resp = self
            .http
            .post(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        let signed: Signed = resp.json().await.map_err(transport)?;
        Ok(format!("{}/storage/v1{}", self.config.url, signed.signed_url))
    }
}
