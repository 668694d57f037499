//! PostgREST plumbing and the table half of the `DataGateway` impl.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use aperture_core::{
    Comment, DataGateway, Error, NewComment, NewPost, NewProfile, Post, Profile,
};

use crate::Supabase;

const NEWEST_FIRST: &str = "created_at.desc,id.desc";

impl Supabase {
    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url, table)
    }

    async fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
    }

    /// `GET` rows matching `filters`, ordered when `order` is given.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        order: Option<&str>,
    ) -> Result<Vec<T>, Error> {
        let mut req = self
            .request(Method::GET, self.table_url(table))
            .await
            .query(&[("select", "*")])
            .query(filters);
        if let Some(order) = order {
            req = req.query(&[("order", order)]);
        }
        let resp = check(req.send().await.map_err(transport)?).await?;
        resp.json().await.map_err(transport)
    }

    /// Exact row count for `filters`, via `HEAD` + `Prefer: count=exact`.
    /// The total arrives in the `content-range` header (`0-24/57`).
    async fn count(&self, table: &str, filters: &[(&str, String)]) -> Result<u64, Error> {
        let resp = self
            .request(Method::HEAD, self.table_url(table))
            .await
            .query(&[("select", "*")])
            .query(filters)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        let range = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(content_range_total(range).unwrap_or(0))
    }

    /// Insert one row and return the stored representation.
    async fn insert<T: Serialize + Sync, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, Error> {
        let resp = self
            .request(Method::POST, self.table_url(table))
            .await
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        let mut rows: Vec<R> = resp.json().await.map_err(transport)?;
        rows.pop()
            .ok_or_else(|| Error::remote("insert returned no rows", None))
    }

    /// Insert without asking for the row back.
    async fn insert_only<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), Error> {
        let resp = self
            .request(Method::POST, self.table_url(table))
            .await
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }

    async fn update<R: DeserializeOwned>(
        &self,
        table: &str,
        patch: &serde_json::Value,
        filters: &[(&str, String)],
    ) -> Result<Vec<R>, Error> {
        let resp = self
            .request(Method::PATCH, self.table_url(table))
            .await
            .query(filters)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .map_err(transport)?;
        let resp = check(resp).await?;
        resp.json().await.map_err(transport)
    }

    async fn delete(&self, table: &str, filters: &[(&str, String)]) -> Result<(), Error> {
        let resp = self
            .request(Method::DELETE, self.table_url(table))
            .await
            .query(filters)
            .send()
            .await
            .map_err(transport)?;
        check(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl DataGateway for Supabase {
    async fn list_posts(&self) -> Result<Vec<Post>, Error> {
        self.select("posts", &[], Some(NEWEST_FIRST)).await
    }

    async fn list_posts_by_user(&self, user_id: Uuid) -> Result<Vec<Post>, Error> {
        self.select("posts", &[("user_id", eq(user_id))], Some(NEWEST_FIRST))
            .await
    }

    async fn insert_post(&self, row: &NewPost) -> Result<Post, Error> {
        self.insert("posts", row).await
    }

    async fn update_image_path(
        &self,
        post_id: Uuid,
        image_path: &str,
    ) -> Result<Option<Post>, Error> {
        let rows: Vec<Post> = self
            .update(
                "posts",
                &serde_json::json!({ "image_path": image_path }),
                &[("id", eq(post_id))],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<(), Error> {
        self.delete("posts", &[("id", eq(post_id))]).await
    }

    async fn profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, Error> {
        let rows: Vec<Profile> = self
            .select("user_info", &[("user_id", eq(user_id))], None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn profile_by_user_name(&self, user_name: &str) -> Result<Option<Profile>, Error> {
        let rows: Vec<Profile> = self
            .select("user_info", &[("user_name", format!("eq.{user_name}"))], None)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, row: &NewProfile) -> Result<Profile, Error> {
        self.insert("user_info", row).await
    }

    async fn like_count(&self, post_id: Uuid) -> Result<u64, Error> {
        self.count("likes", &[("post_id", eq(post_id))]).await
    }

    async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, Error> {
        let rows: Vec<serde_json::Value> = self
            .select(
                "likes",
                &[("post_id", eq(post_id)), ("user_id", eq(user_id))],
                None,
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        self.insert_only(
            "likes",
            &serde_json::json!({ "post_id": post_id, "user_id": user_id }),
        )
        .await
    }

    async fn delete_like(&self, post_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        self.delete(
            "likes",
            &[("post_id", eq(post_id)), ("user_id", eq(user_id))],
        )
        .await
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>, Error> {
        self.select(
            "comments",
            &[("post_id", eq(post_id))],
            Some("created_at.asc"),
        )
        .await
    }

    async fn insert_comment(&self, row: &NewComment) -> Result<Comment, Error> {
        self.insert("comments", row).await
    }

    async fn upload_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), Error> {
        self.put_object(key, bytes, content_type, overwrite).await
    }

    fn public_url(&self, key: &str) -> String {
        self.object_public_url(key)
    }

    async fn signed_url(&self, key: &str, ttl_secs: u32) -> Result<String, Error> {
        self.create_signed_url(key, ttl_secs).await
    }
}

fn eq(id: Uuid) -> String {
    format!("eq.{id}")
}

pub(crate) fn transport(error: reqwest::Error) -> Error {
    Error::remote(error.to_string(), error.status().map(|s| s.as_u16()))
}

/// Surface a non-2xx response as a remote error, preferring the store's
/// structured `message` field over the raw body.
pub(crate) async fn check(resp: Response) -> Result<Response, Error> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("request failed with status {status}")
            } else {
                body
            }
        });
    Err(Error::remote(message, Some(status)))
}

fn content_range_total(range: &str) -> Option<u64> {
    range.rsplit('/').next()?.trim().parse().ok()
}
