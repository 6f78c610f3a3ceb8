use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Destination for full-size cover and screenshot images. Returns the
/// location recorded in the scraped data.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, image_url: &str, folder: &str) -> Result<String>;
}

/// Records the site's own image URL.
pub struct KeepSourceUrl;

#[async_trait]
impl ImageStore for KeepSourceUrl {
    async fn store(&self, image_url: &str, _folder: &str) -> Result<String> {
        Ok(image_url.to_string())
    }
}

/// Downloads images below a local folder, one subfolder per kind.
pub struct LocalMirror {
    client: reqwest::Client,
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(client: reqwest::Client, root: PathBuf) -> Self {
        Self { client, root }
    }
}

/// File name of an image URL, e.g. `1234-pong-cover.jpg`.
pub fn image_file_name(image_url: &str) -> Option<String> {
    let url = Url::parse(image_url).ok()?;
    let name = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(name.to_string())
}

#[async_trait]
impl ImageStore for LocalMirror {
    async fn store(&self, image_url: &str, folder: &str) -> Result<String> {
        let upload_error = |reason: String| ScrapeError::Upload {
            url: image_url.to_string(),
            reason,
        };

        let file_name = image_file_name(image_url)
            .ok_or_else(|| upload_error("no file name in image URL".to_string()))?;
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| upload_error(e.to_string()))?;
        let path = dir.join(&file_name);

        // Same name means same image on this site
        if path.exists() {
            return Ok(path.to_string_lossy().into_owned());
        }

        let response = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| upload_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(upload_error(format!("HTTP {}", response.status())));
        }

        let partial = dir.join(format!("{}.part", file_name));
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|e| upload_error(e.to_string()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| upload_error(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| upload_error(e.to_string()))?;
        }
        file.flush().await.map_err(|e| upload_error(e.to_string()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        tracing::debug!("Mirrored {} to {}", image_url, path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_path_segment() {
        assert_eq!(
            image_file_name("https://cdn.mobygames.com/covers/123-pong.jpg?w=1").as_deref(),
            Some("123-pong.jpg")
        );
        assert_eq!(image_file_name("https://cdn.mobygames.com/"), None);
        assert_eq!(image_file_name("not a url"), None);
    }

    #[tokio::test]
    async fn source_url_is_kept() {
        let url = "https://cdn.mobygames.com/a.jpg";
        assert_eq!(KeepSourceUrl.store(url, "covers/").await.unwrap(), url);
    }

    #[tokio::test]
    async fn already_mirrored_image_is_not_refetched() {
        let root = crate::checkpoint::scratch_dir("images-existing");
        std::fs::create_dir_all(root.join("covers/")).unwrap();
        std::fs::write(root.join("covers/").join("a.jpg"), b"jpeg").unwrap();
        let mirror = LocalMirror::new(reqwest::Client::new(), root.clone());
        let stored = mirror
            .store("http://127.0.0.1:9/covers/a.jpg", "covers/")
            .await
            .unwrap();
        assert!(stored.ends_with("a.jpg"));
    }
}
