use std::path::PathBuf;

use anyhow::Context;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::{Config, Image, ImageData};

pub async fn fetch_image_data(config: &Config, client: &Client) -> anyhow::Result<ImageData> {
    let url = config.to_url();
    log::debug!("fetching metadata from {url}");
    let data = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .with_context(|| format!("Unexpected metadata from {url}"))?;
    Ok(data)
}

pub async fn fetch_raw(client: &Client, url: Url) -> anyhow::Result<serde_json::Value> {
    Ok(client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?)
}

/// Download an image into the data directory, along with its metadata
///
/// Existing files are kept unless `overwrite` is set. Returns the image path either way.
pub async fn download_image(
    config: &Config,
    client: &Client,
    image: &Image,
    overwrite: bool,
) -> anyhow::Result<PathBuf> {
    let file_name = image.absolute_file_name(config)?;
    if !overwrite && file_name.try_exists()? {
        log::debug!("{} already exists", file_name.display());
        return Ok(file_name);
    }

    let url = image.to_url(config)?;
    log::info!("Retrieving {url} and saving to {}", file_name.display());

    let response = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("Unable to fetch {url}"))?;

    // Partial downloads never show up under the final name
    let part_file_name = file_name.with_extension("part");
    let written: anyhow::Result<()> = async {
        let mut file = tokio::fs::File::create(&part_file_name)
            .await
            .with_context(|| format!("Failed to create {}", part_file_name.display()))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk.with_context(|| format!("Unable to fetch {url}"))?)
                .await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(err) = written {
        if let Err(remove_err) = tokio::fs::remove_file(&part_file_name).await {
            log::warn!("Failed to remove {}: {remove_err}", part_file_name.display());
        }
        return Err(err);
    }
    tokio::fs::rename(&part_file_name, &file_name).await?;

    let sidecar = image.sidecar_file_name(config)?;
    tokio::fs::write(&sidecar, serde_json::to_string_pretty(image)?)
        .await
        .with_context(|| format!("Failed to write {}", sidecar.display()))?;

    Ok(file_name)
}

/// Download anything new and merge it into the local index
///
/// Returns how many images were added.
pub async fn sync_images(
    config: &Config,
    client: &Client,
    local: &mut ImageData,
    remote: ImageData,
    quiet: bool,
) -> anyhow::Result<usize> {
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(remote.images.len() as u64).with_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}")?,
        )
    };

    let mut added = 0;
    for image in remote.images {
        progress.set_message(image.title.clone());
        download_image(config, client, &image, false).await?;

        if !local.images.contains(&image) {
            log::info!("adding image {:?}...", image.title);
            local.add_image(image);
            added += 1;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    Ok(added)
}
